use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use course_shop_sync::api::{AdminApi, Caller};
use course_shop_sync::config;
use course_shop_sync::db::{self, NewCourse};
use course_shop_sync::lifecycle::{self, Flags};
use course_shop_sync::model::{CompletedOrder, OrderItem};
use course_shop_sync::runner::{BatchSyncDriver, LocalEndpoint, Progress};
use course_shop_sync::triggers::{self, CourseEvents, SaveContext, SyncTriggers};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync every published course in batches, printing progress
    SyncAll,
    /// Sync the given courses and enable their auto-sync flag
    Sync {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Trash the linked products and disable auto-sync for the given courses
    Unsync {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// List published courses with their link and flag state
    List,
    /// Insert a course and run the save trigger, as the host would on save
    AddCourse(AddCourse),
    /// Run the delete trigger for a course, then remove it
    DeleteCourse { id: i64 },
    /// Feed a completed order into the enrollment trigger
    CompleteOrder {
        /// Ordering user; omit for a guest order
        #[arg(long)]
        user: Option<i64>,
        /// Product ids of the order's line items
        #[arg(long, value_delimiter = ',', required = true)]
        products: Vec<i64>,
    },
    /// Print the "take course" URL after the checkout redirect filter
    CheckoutUrl { course_id: i64, original: String },
    /// Search products, including course-backed ones
    SearchProducts { term: String },
    /// Run the first-activation sync (guarded by the persisted marker)
    Activate,
    /// Clear the activation marker so the next activate syncs again
    Deactivate,
    /// Opt in or out of uninstall cleanup
    SetCleanup {
        #[arg(long)]
        enabled: bool,
    },
    /// Remove mirrored data, honoring the cleanup opt-in
    Uninstall,
}

#[derive(Debug, ClapArgs)]
struct AddCourse {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    excerpt: String,
    #[arg(long, default_value = "publish")]
    status: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    image_id: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let cfg = config::load(Some(&cli.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/courses.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    match cli.command {
        Command::SyncAll => {
            let api = AdminApi::new(pool.clone(), cfg.admin.token.clone());
            let endpoint = LocalEndpoint::new(api, cfg.admin.token.clone());
            let mut driver = BatchSyncDriver::new(cfg.app.batch_size);
            let report = driver
                .run(&endpoint, |progress| match progress {
                    Progress::Started { total } => {
                        println!("Starting synchronization of {total} courses.");
                    }
                    Progress::Step {
                        processed,
                        total,
                        percent,
                    } => {
                        println!("Processed {processed} of {total} courses ({percent:.0}%).");
                    }
                })
                .await;
            if let Some(message) = report.error {
                bail!("sync failed: {message}");
            }
            println!(
                "Synchronization complete! {} of {} courses processed.",
                report.processed, report.total
            );
        }
        Command::Sync { ids } => {
            let api = AdminApi::new(pool.clone(), cfg.admin.token.clone());
            let caller = operator(&cfg);
            let count = api.sync_selected(&caller, &ids).await?;
            println!("{count} courses synced successfully.");
        }
        Command::Unsync { ids } => {
            let api = AdminApi::new(pool.clone(), cfg.admin.token.clone());
            let caller = operator(&cfg);
            let count = api.unsync_selected(&caller, &ids).await?;
            println!("{count} courses unsynced successfully.");
        }
        Command::List => {
            let overviews = db::list_course_overviews(&pool).await?;
            if overviews.is_empty() {
                println!("No courses found.");
            }
            for c in overviews {
                let status = if c.product_id.is_some() {
                    "synced"
                } else {
                    "not synced"
                };
                let flag = c.sync_enabled.map(|f| f.as_str()).unwrap_or("-");
                let price = c
                    .price
                    .map(|p| format!("{p:.2}"))
                    .unwrap_or_else(|| "-".into());
                let category = c.category.unwrap_or_else(|| "-".into());
                println!(
                    "{:>5}  {:<40}  {:<16}  {:>8}  {:<10}  auto-sync: {}",
                    c.id, c.title, category, price, status, flag
                );
            }
        }
        Command::AddCourse(add) => {
            let course_id = db::insert_course(
                &pool,
                &NewCourse {
                    title: add.title,
                    description: add.description,
                    excerpt: add.excerpt,
                    status: add.status,
                    category: add.category,
                    price: add.price,
                    image_id: add.image_id,
                },
            )
            .await?;
            let events = SyncTriggers::new(pool.clone());
            events
                .on_course_saved(
                    course_id,
                    SaveContext {
                        autosave: false,
                        can_edit: true,
                    },
                )
                .await?;
            println!("Created course {course_id}.");
        }
        Command::DeleteCourse { id } => {
            let events = SyncTriggers::new(pool.clone());
            events.on_course_deleted(id).await?;
            db::delete_course(&pool, id).await?;
            println!("Deleted course {id}.");
        }
        Command::CompleteOrder { user, products } => {
            let order = CompletedOrder {
                user_id: user,
                items: products
                    .into_iter()
                    .map(|product_id| OrderItem { product_id })
                    .collect(),
            };
            let events = SyncTriggers::new(pool.clone());
            events.on_order_completed(&order).await?;
            println!("Order processed.");
        }
        Command::CheckoutUrl {
            course_id,
            original,
        } => {
            let url =
                triggers::course_checkout_url(&pool, &cfg.shop, course_id, &original).await?;
            println!("{url}");
        }
        Command::SearchProducts { term } => {
            let mut results: HashMap<i64, String> = HashMap::new();
            triggers::augment_product_search(&pool, &cfg.shop, &term, &mut results).await?;
            if results.is_empty() {
                println!("No matches.");
            }
            let mut entries: Vec<_> = results.into_iter().collect();
            entries.sort_by_key(|(id, _)| *id);
            for (product_id, name) in entries {
                println!("{product_id:>5}  {name}");
            }
        }
        Command::Activate => {
            let mut flags = Flags::load(&pool).await?;
            if flags.initial_sync_done {
                println!("Already activated; initial sync skipped.");
            } else {
                let synced = lifecycle::activate(&pool, &mut flags).await?;
                println!("Activated; {synced} courses synced.");
            }
        }
        Command::Deactivate => {
            let mut flags = Flags::load(&pool).await?;
            lifecycle::deactivate(&pool, &mut flags).await?;
            println!("Deactivated.");
        }
        Command::SetCleanup { enabled } => {
            let mut flags = Flags::load(&pool).await?;
            lifecycle::set_cleanup_on_uninstall(&pool, &mut flags, enabled).await?;
            println!(
                "Uninstall cleanup {}.",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Command::Uninstall => {
            let mut flags = Flags::load(&pool).await?;
            let deleted = lifecycle::uninstall(&pool, &mut flags).await?;
            println!("Uninstall cleanup removed {deleted} products.");
        }
    }

    Ok(())
}

fn operator(cfg: &config::Config) -> Caller {
    Caller {
        token: cfg.admin.token.clone(),
        can_manage_shop: true,
    }
}
