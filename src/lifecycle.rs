//! Activation, deactivation, and uninstall handlers.
//!
//! The persisted flags are loaded once into [`Flags`] and passed explicitly
//! into the handlers; nothing here reads options ambiently mid-operation.

use crate::db::{self, repo::Pool};
use crate::sync;
use anyhow::Result;
use tracing::{info, instrument};

pub const OPT_INITIAL_SYNC_DONE: &str = "initial_sync_done";
pub const OPT_CLEANUP_ON_UNINSTALL: &str = "cleanup_on_uninstall";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub initial_sync_done: bool,
    pub cleanup_on_uninstall: bool,
}

impl Flags {
    pub async fn load(pool: &Pool) -> Result<Flags> {
        Ok(Flags {
            initial_sync_done: option_is_set(pool, OPT_INITIAL_SYNC_DONE).await?,
            cleanup_on_uninstall: option_is_set(pool, OPT_CLEANUP_ON_UNINSTALL).await?,
        })
    }
}

async fn option_is_set(pool: &Pool, name: &str) -> Result<bool> {
    Ok(matches!(
        db::get_option(pool, name).await?.as_deref(),
        Some("1")
    ))
}

/// First activation runs a full sync of published courses; the persisted
/// marker guards every later activation. Returns how many courses were synced.
#[instrument(skip_all)]
pub async fn activate(pool: &Pool, flags: &mut Flags) -> Result<usize> {
    if flags.initial_sync_done {
        return Ok(0);
    }

    let mut synced = 0;
    for course_id in db::list_published_course_ids(pool).await? {
        if sync::sync_course(pool, course_id).await?.is_some() {
            synced += 1;
        }
    }

    db::set_option(pool, OPT_INITIAL_SYNC_DONE, "1").await?;
    flags.initial_sync_done = true;
    info!(synced, "initial sync completed on activation");
    Ok(synced)
}

/// Clears the initial-sync marker so a later re-activation syncs again.
#[instrument(skip_all)]
pub async fn deactivate(pool: &Pool, flags: &mut Flags) -> Result<()> {
    db::delete_option(pool, OPT_INITIAL_SYNC_DONE).await?;
    flags.initial_sync_done = false;
    Ok(())
}

/// Persist the uninstall-cleanup opt-in.
pub async fn set_cleanup_on_uninstall(
    pool: &Pool,
    flags: &mut Flags,
    enabled: bool,
) -> Result<()> {
    db::set_option(
        pool,
        OPT_CLEANUP_ON_UNINSTALL,
        if enabled { "1" } else { "0" },
    )
    .await?;
    flags.cleanup_on_uninstall = enabled;
    Ok(())
}

/// Uninstall-time cleanup. Only when the opt-in flag is set: iterate all
/// courses (any status), permanently delete each linked product, drop the
/// course-side link, then clear the opt-in flag itself. Returns how many
/// products were deleted.
#[instrument(skip_all)]
pub async fn uninstall(pool: &Pool, flags: &mut Flags) -> Result<usize> {
    if !flags.cleanup_on_uninstall {
        return Ok(0);
    }

    let mut deleted = 0;
    for course_id in db::list_course_ids_any_status(pool).await? {
        if let Some(product_id) = db::course_product_id(pool, course_id).await? {
            db::delete_product(pool, product_id).await?;
            deleted += 1;
        }
        db::clear_course_link(pool, course_id).await?;
    }

    db::delete_option(pool, OPT_CLEANUP_ON_UNINSTALL).await?;
    flags.cleanup_on_uninstall = false;
    info!(deleted, "uninstall cleanup removed linked products");
    Ok(deleted)
}
