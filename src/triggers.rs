//! Sync trigger layer: course/order event handlers plus storefront filters.
//!
//! The host system's save/delete/order hooks are modeled as one explicit
//! interface, [`CourseEvents`], implemented by [`SyncTriggers`] and invoked
//! directly by whatever boundary adapter talks to the host.

use crate::config::Shop;
use crate::db::{self, repo::Pool};
use crate::model::{CompletedOrder, SyncFlag};
use crate::sync;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Context the boundary adapter passes along with a course save.
#[derive(Debug, Clone, Copy)]
pub struct SaveContext {
    /// Draft autosave rather than a deliberate save.
    pub autosave: bool,
    /// Whether the acting principal may edit this course.
    pub can_edit: bool,
}

#[async_trait]
pub trait CourseEvents: Send + Sync {
    async fn on_course_saved(&self, course_id: i64, ctx: SaveContext) -> Result<()>;
    async fn on_course_deleted(&self, course_id: i64) -> Result<()>;
    async fn on_order_completed(&self, order: &CompletedOrder) -> Result<()>;
}

pub struct SyncTriggers {
    pool: Pool,
}

impl SyncTriggers {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseEvents for SyncTriggers {
    #[instrument(skip(self))]
    async fn on_course_saved(&self, course_id: i64, ctx: SaveContext) -> Result<()> {
        if ctx.autosave {
            return Ok(());
        }
        if !ctx.can_edit {
            return Ok(());
        }

        let flag = match db::get_sync_flag(&self.pool, course_id).await? {
            Some(flag) => flag,
            None => {
                // Never set: default to enabled and persist the default.
                db::set_sync_flag(&self.pool, course_id, SyncFlag::Enabled).await?;
                SyncFlag::Enabled
            }
        };

        if flag == SyncFlag::Enabled {
            sync::sync_course(&self.pool, course_id).await?;
        }
        Ok(())
    }

    /// Runs before the host removes the course row.
    #[instrument(skip(self))]
    async fn on_course_deleted(&self, course_id: i64) -> Result<()> {
        if !db::course_exists(&self.pool, course_id).await? {
            return Ok(());
        }
        if let Some(product_id) = db::course_product_id(&self.pool, course_id).await? {
            db::trash_product(&self.pool, product_id).await?;
            info!(course_id, product_id, "trashed product of deleted course");
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn on_order_completed(&self, order: &CompletedOrder) -> Result<()> {
        let Some(user_id) = order.user_id else {
            return Ok(());
        };
        for item in &order.items {
            match db::product_course_id(&self.pool, item.product_id).await {
                Ok(Some(course_id)) => {
                    if let Err(err) = db::insert_enrollment(&self.pool, user_id, course_id).await
                    {
                        warn!(?err, user_id, course_id, "enrollment failed; continuing");
                    } else {
                        info!(user_id, course_id, "enrolled user from completed order");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        ?err,
                        product_id = item.product_id,
                        "course lookup failed; continuing"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Rewrite the "take course" URL to an add-to-cart checkout URL when the
/// course has a linked product; otherwise pass the original URL through.
pub async fn course_checkout_url(
    pool: &Pool,
    shop: &Shop,
    course_id: i64,
    original: &str,
) -> Result<String> {
    match db::course_product_id(pool, course_id).await? {
        Some(product_id) => Ok(format!("{}?add-to-cart={}", shop.checkout_url, product_id)),
        None => Ok(original.to_string()),
    }
}

/// Add course-backed products to a product search result set keyed by product
/// id. Unlinked courses and already-present product ids are skipped; injected
/// names carry the configured label prefix.
pub async fn augment_product_search(
    pool: &Pool,
    shop: &Shop,
    term: &str,
    results: &mut HashMap<i64, String>,
) -> Result<()> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(());
    }
    for course_id in db::search_published_courses(pool, term).await? {
        let Some(product_id) = db::course_product_id(pool, course_id).await? else {
            continue;
        };
        if results.contains_key(&product_id) {
            continue;
        }
        if let Some(product) = db::fetch_product(pool, product_id).await? {
            results.insert(product_id, format!("{} {}", shop.search_label, product.name));
        }
    }
    Ok(())
}
