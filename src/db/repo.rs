use super::model::{CourseForSync, CourseOverview, NewCourse, ProductDraft};
use crate::model::{CatalogVisibility, Product, SyncFlag};
use anyhow::Result;
use sqlx::Row;
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn insert_course(pool: &Pool, course: &NewCourse) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO courses (title, description, excerpt, status, category, price, image_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&course.title)
    .bind(&course.description)
    .bind(&course.excerpt)
    .bind(&course.status)
    .bind(&course.category)
    .bind(course.price)
    .bind(course.image_id)
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn course_exists(pool: &Pool, course_id: i64) -> Result<bool> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(pool)
        .await?;
    Ok(id.is_some())
}

/// Course slice the mapper needs, regardless of course status. `None` when the
/// id does not resolve.
#[instrument(skip_all)]
pub async fn fetch_course_for_sync(pool: &Pool, course_id: i64) -> Result<Option<CourseForSync>> {
    let row = sqlx::query(
        "SELECT id, title, description, excerpt, price, image_id, product_id \
         FROM courses WHERE id = ?",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| CourseForSync {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        excerpt: row.get("excerpt"),
        price: row.get("price"),
        image_id: row.get("image_id"),
        product_id: row.get("product_id"),
    }))
}

#[instrument(skip_all)]
pub async fn list_published_course_ids(pool: &Pool) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM courses WHERE status = 'publish' ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Every course id, any status. Used by uninstall cleanup.
#[instrument(skip_all)]
pub async fn list_course_ids_any_status(pool: &Pool) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM courses ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

#[instrument(skip_all)]
pub async fn search_published_courses(pool: &Pool, term: &str) -> Result<Vec<i64>> {
    let pattern = format!("%{}%", term);
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM courses WHERE status = 'publish' AND title LIKE ? ORDER BY id",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

#[instrument(skip_all)]
pub async fn list_course_overviews(pool: &Pool) -> Result<Vec<CourseOverview>> {
    let rows = sqlx::query(
        "SELECT c.id, c.title, c.category, c.price, c.sync_enabled, p.id AS linked_product_id \
         FROM courses c LEFT JOIN products p ON p.id = c.product_id \
         WHERE c.status = 'publish' ORDER BY c.id",
    )
    .fetch_all(pool)
    .await?;

    let overviews = rows
        .into_iter()
        .map(|row| CourseOverview {
            id: row.get("id"),
            title: row.get("title"),
            category: row.get("category"),
            price: row.get("price"),
            product_id: row.get("linked_product_id"),
            sync_enabled: row
                .get::<Option<String>, _>("sync_enabled")
                .as_deref()
                .and_then(SyncFlag::parse),
        })
        .collect();
    Ok(overviews)
}

#[instrument(skip_all)]
pub async fn get_sync_flag(pool: &Pool, course_id: i64) -> Result<Option<SyncFlag>> {
    let value = sqlx::query_scalar::<_, Option<String>>(
        "SELECT sync_enabled FROM courses WHERE id = ?",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;
    Ok(value.flatten().as_deref().and_then(SyncFlag::parse))
}

/// Persist the per-course flag. A no-op when the course id does not resolve.
#[instrument(skip_all)]
pub async fn set_sync_flag(pool: &Pool, course_id: i64, flag: SyncFlag) -> Result<()> {
    sqlx::query("UPDATE courses SET sync_enabled = ? WHERE id = ?")
        .bind(flag.as_str())
        .bind(course_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove the course row. The host side of a delete; the trigger layer has
/// already run by the time this is called.
#[instrument(skip_all)]
pub async fn delete_course(pool: &Pool, course_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(course_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Link (course↔product, both halves)
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn course_product_id(pool: &Pool, course_id: i64) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT product_id FROM courses WHERE id = ?",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;
    Ok(id.flatten())
}

#[instrument(skip_all)]
pub async fn product_course_id(pool: &Pool, product_id: i64) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT course_id FROM products WHERE id = ?",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    Ok(id.flatten())
}

/// Write both halves of the link in one transaction.
#[instrument(skip_all)]
pub async fn link_course_product(pool: &Pool, course_id: i64, product_id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE courses SET product_id = ? WHERE id = ?")
        .bind(product_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE products SET course_id = ? WHERE id = ?")
        .bind(course_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Remove the course-side half of the link. Used by uninstall cleanup, where
/// the product row itself is deleted outright.
#[instrument(skip_all)]
pub async fn clear_course_link(pool: &Pool, course_id: i64) -> Result<()> {
    sqlx::query("UPDATE courses SET product_id = NULL WHERE id = ?")
        .bind(course_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn insert_product(pool: &Pool, draft: &ProductDraft) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO products (name, description, short_description, regular_price, price, \
                               is_virtual, catalog_visibility, image_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(&draft.short_description)
    .bind(draft.regular_price)
    .bind(draft.price)
    .bind(draft.is_virtual)
    .bind(draft.catalog_visibility.as_str())
    .bind(draft.image_id)
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn update_product(pool: &Pool, product_id: i64, draft: &ProductDraft) -> Result<()> {
    sqlx::query(
        "UPDATE products SET name = ?, description = ?, short_description = ?, \
                             regular_price = ?, price = ?, is_virtual = ?, \
                             catalog_visibility = ?, image_id = ? \
         WHERE id = ?",
    )
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(&draft.short_description)
    .bind(draft.regular_price)
    .bind(draft.price)
    .bind(draft.is_virtual)
    .bind(draft.catalog_visibility.as_str())
    .bind(draft.image_id)
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn fetch_product(pool: &Pool, product_id: i64) -> Result<Option<Product>> {
    let row = sqlx::query(
        "SELECT id, name, description, short_description, regular_price, price, is_virtual, \
                catalog_visibility, image_id, course_id, status, created_at \
         FROM products WHERE id = ?",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Product {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        short_description: row.get("short_description"),
        regular_price: row.get("regular_price"),
        price: row.get("price"),
        is_virtual: row.get("is_virtual"),
        catalog_visibility: CatalogVisibility::parse(row.get::<String, _>("catalog_visibility").as_str())
            .unwrap_or(CatalogVisibility::Visible),
        image_id: row.get("image_id"),
        course_id: row.get("course_id"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }))
}

/// Soft-delete: the row stays, recoverable by the shop.
#[instrument(skip_all)]
pub async fn trash_product(pool: &Pool, product_id: i64) -> Result<()> {
    sqlx::query("UPDATE products SET status = 'trash' WHERE id = ?")
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Hard delete. Only uninstall cleanup goes through here.
#[instrument(skip_all)]
pub async fn delete_product(pool: &Pool, product_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Enrollments
// ---------------------------------------------------------------------------

/// Idempotent: enrolling an already-enrolled user is a no-op.
#[instrument(skip_all)]
pub async fn insert_enrollment(pool: &Pool, user_id: i64, course_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO enrollments (user_id, course_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn user_enrollments(pool: &Pool, user_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT course_id FROM enrollments WHERE user_id = ? ORDER BY course_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn get_option(pool: &Pool, name: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM options WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

#[instrument(skip_all)]
pub async fn set_option(pool: &Pool, name: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO options (name, value) VALUES (?, ?) \
         ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(name)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn delete_option(pool: &Pool, name: &str) -> Result<()> {
    sqlx::query("DELETE FROM options WHERE name = ?")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}
