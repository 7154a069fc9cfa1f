//! View models used by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

use crate::model::{CatalogVisibility, SyncFlag};

/// Course slice the mapper reads when mirroring into a product.
#[derive(Debug, Clone)]
pub struct CourseForSync {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub excerpt: String,
    pub price: Option<f64>,
    pub image_id: Option<i64>,
    pub product_id: Option<i64>,
}

/// Course slice backing the admin listing.
#[derive(Debug, Clone)]
pub struct CourseOverview {
    pub id: i64,
    pub title: String,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub product_id: Option<i64>,
    pub sync_enabled: Option<SyncFlag>,
}

/// Field set the mapper persists into a product, for both create and update.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub regular_price: Option<f64>,
    pub price: Option<f64>,
    pub is_virtual: bool,
    pub catalog_visibility: CatalogVisibility,
    pub image_id: Option<i64>,
}

/// Insert payload for a new course.
#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub excerpt: String,
    pub status: String,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub image_id: Option<i64>,
}
