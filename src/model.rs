use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-course auto-sync setting. Stored as text so "never set" stays
/// distinguishable from an explicit choice; an unset flag defaults to enabled
/// at the first save and is persisted then.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncFlag {
    Enabled,
    Disabled,
}

impl SyncFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncFlag::Enabled => "yes",
            SyncFlag::Disabled => "no",
        }
    }

    pub fn parse(s: &str) -> Option<SyncFlag> {
        match s {
            "yes" => Some(SyncFlag::Enabled),
            "no" => Some(SyncFlag::Disabled),
            _ => None,
        }
    }
}

/// Catalog visibility of a mirrored product. Synced products are always
/// `Hidden` so they are purchasable through the course page but never browsable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CatalogVisibility {
    Visible,
    Hidden,
}

impl CatalogVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogVisibility::Visible => "visible",
            CatalogVisibility::Hidden => "hidden",
        }
    }

    pub fn parse(s: &str) -> Option<CatalogVisibility> {
        match s {
            "visible" => Some(CatalogVisibility::Visible),
            "hidden" => Some(CatalogVisibility::Hidden),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub excerpt: String,
    pub status: String,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub image_id: Option<i64>,
    pub product_id: Option<i64>,
    pub sync_enabled: Option<SyncFlag>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub regular_price: Option<f64>,
    pub price: Option<f64>,
    pub is_virtual: bool,
    pub catalog_visibility: CatalogVisibility,
    pub image_id: Option<i64>,
    pub course_id: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A completed storefront order as handed over by the boundary adapter.
/// Only the fields the enrollment trigger needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedOrder {
    pub user_id: Option<i64>,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
}
