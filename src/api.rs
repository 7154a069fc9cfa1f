//! Admin endpoints: the two-phase batch sync protocol plus bulk selection
//! actions. The server side is stateless between requests; every call carries
//! the shared admin token.

use crate::db::{self, repo::Pool};
use crate::model::SyncFlag;
use crate::sync;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("no courses selected")]
    EmptySelection,
    #[error("no courses found to sync")]
    NothingToSync,
    #[error("invalid course list")]
    InvalidBatch,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Acting principal, as established by the boundary adapter.
#[derive(Debug, Clone)]
pub struct Caller {
    pub token: String,
    pub can_manage_shop: bool,
}

#[derive(Clone)]
pub struct AdminApi {
    pool: Pool,
    token: String,
}

impl AdminApi {
    pub fn new(pool: Pool, token: impl Into<String>) -> Self {
        Self {
            pool,
            token: token.into(),
        }
    }

    fn check_token(&self, token: &str) -> Result<(), ApiError> {
        if token != self.token {
            return Err(ApiError::PermissionDenied);
        }
        Ok(())
    }

    /// Phase one of the batch protocol: every published course id, in order.
    /// Re-syncing an already-linked course is safe, so no link-state filter.
    #[instrument(skip(self, token))]
    pub async fn start_sync(&self, token: &str) -> Result<Vec<i64>, ApiError> {
        self.check_token(token)?;
        let ids = db::list_published_course_ids(&self.pool).await?;
        if ids.is_empty() {
            return Err(ApiError::NothingToSync);
        }
        Ok(ids)
    }

    /// Phase two: process one slice synchronously and return how many ids were
    /// handed to the mapper. Ids <= 0 are skipped and not counted.
    #[instrument(skip(self, token))]
    pub async fn process_batch(&self, token: &str, courses: &[i64]) -> Result<usize, ApiError> {
        self.check_token(token)?;
        if courses.is_empty() {
            return Err(ApiError::InvalidBatch);
        }
        let mut processed = 0;
        for &course_id in courses {
            if course_id <= 0 {
                continue;
            }
            sync::sync_course(&self.pool, course_id).await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Sync each selected course and enable its flag. Returns the selection
    /// size; ids that resolve to nothing still count.
    #[instrument(skip(self, caller))]
    pub async fn sync_selected(
        &self,
        caller: &Caller,
        course_ids: &[i64],
    ) -> Result<usize, ApiError> {
        self.check_token(&caller.token)?;
        if !caller.can_manage_shop {
            return Err(ApiError::PermissionDenied);
        }
        if course_ids.is_empty() {
            return Err(ApiError::EmptySelection);
        }
        let mut count = 0;
        for &course_id in course_ids {
            sync::sync_course(&self.pool, course_id).await?;
            db::set_sync_flag(&self.pool, course_id, SyncFlag::Enabled).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Trash the linked product (when present) and disable the flag for each
    /// selected course. The course itself is left untouched.
    #[instrument(skip(self, caller))]
    pub async fn unsync_selected(
        &self,
        caller: &Caller,
        course_ids: &[i64],
    ) -> Result<usize, ApiError> {
        self.check_token(&caller.token)?;
        if !caller.can_manage_shop {
            return Err(ApiError::PermissionDenied);
        }
        if course_ids.is_empty() {
            return Err(ApiError::EmptySelection);
        }
        let mut count = 0;
        for &course_id in course_ids {
            if let Some(product_id) = db::course_product_id(&self.pool, course_id).await? {
                db::trash_product(&self.pool, product_id).await?;
            }
            db::set_sync_flag(&self.pool, course_id, SyncFlag::Disabled).await?;
            count += 1;
        }
        Ok(count)
    }
}
