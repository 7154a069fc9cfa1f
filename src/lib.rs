//! Keeps LMS courses mirrored as storefront products: one-way field copy on
//! save, enrollment on order completion, and an admin surface for bulk and
//! selective sync driven by a chunked batch loop.

pub mod api;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod model;
pub mod runner;
pub mod sync;
pub mod triggers;
