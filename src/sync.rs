//! Course→product mapper: one-way field copy plus the bidirectional id link.

use crate::db::{self, repo::Pool, CourseForSync, ProductDraft};
use crate::model::{CatalogVisibility, Product};
use anyhow::Result;
use tracing::{info, instrument};

/// Mirror a course into its linked product, creating the product when the link
/// is absent or stale. Idempotent; an unresolvable course id is a no-op and
/// returns `Ok(None)`.
#[instrument(skip(pool))]
pub async fn sync_course(pool: &Pool, course_id: i64) -> Result<Option<i64>> {
    let Some(course) = db::fetch_course_for_sync(pool, course_id).await? else {
        return Ok(None);
    };

    // Resolve the stored link; a stale id (product row gone) means create anew.
    let existing = match course.product_id {
        Some(product_id) => db::fetch_product(pool, product_id).await?,
        None => None,
    };

    let draft = build_draft(&course, existing.as_ref());

    let product_id = match &existing {
        Some(product) => {
            db::update_product(pool, product.id, &draft).await?;
            product.id
        }
        None => db::insert_product(pool, &draft).await?,
    };

    db::link_course_product(pool, course_id, product_id).await?;
    info!(course_id, product_id, "course mirrored to product");
    Ok(Some(product_id))
}

/// Build the product field set from a course. A course without a computed
/// price leaves the product's price fields as they were; same for the image.
fn build_draft(course: &CourseForSync, existing: Option<&Product>) -> ProductDraft {
    let (regular_price, price) = match course.price {
        Some(p) => (Some(p), Some(p)),
        None => (
            existing.and_then(|p| p.regular_price),
            existing.and_then(|p| p.price),
        ),
    };
    ProductDraft {
        name: course.title.clone(),
        description: course.description.clone(),
        short_description: course.excerpt.clone(),
        regular_price,
        price,
        is_virtual: true,
        catalog_visibility: CatalogVisibility::Hidden,
        image_id: course.image_id.or_else(|| existing.and_then(|p| p.image_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn course(price: Option<f64>, image_id: Option<i64>) -> CourseForSync {
        CourseForSync {
            id: 1,
            title: "Intro".into(),
            description: "body".into(),
            excerpt: "blurb".into(),
            price,
            image_id,
            product_id: None,
        }
    }

    fn product(regular_price: Option<f64>, image_id: Option<i64>) -> Product {
        Product {
            id: 10,
            name: "old".into(),
            description: "old".into(),
            short_description: "old".into(),
            regular_price,
            price: regular_price,
            is_virtual: true,
            catalog_visibility: CatalogVisibility::Hidden,
            image_id,
            course_id: Some(1),
            status: "publish".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn draft_copies_price_when_present() {
        let d = build_draft(&course(Some(49.0), None), None);
        assert_eq!(d.regular_price, Some(49.0));
        assert_eq!(d.price, Some(49.0));
        assert!(d.is_virtual);
        assert_eq!(d.catalog_visibility, CatalogVisibility::Hidden);
    }

    #[test]
    fn draft_keeps_existing_price_when_course_has_none() {
        let existing = product(Some(99.0), Some(5));
        let d = build_draft(&course(None, None), Some(&existing));
        assert_eq!(d.regular_price, Some(99.0));
        assert_eq!(d.price, Some(99.0));
        assert_eq!(d.image_id, Some(5));
    }

    #[test]
    fn draft_prefers_course_image() {
        let existing = product(None, Some(5));
        let d = build_draft(&course(None, Some(8)), Some(&existing));
        assert_eq!(d.image_id, Some(8));
    }
}
