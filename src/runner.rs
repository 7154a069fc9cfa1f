//! Client-side batch sync driver.
//!
//! Holds the session-scoped work queue in memory and drives the two-phase
//! pull protocol strictly sequentially: fetch the full pending list, then send
//! fixed-size slices until the local queue is empty or a request fails. State
//! is lost when the process ends; a restart refetches the full list.

use crate::api::{AdminApi, ApiError};
use async_trait::async_trait;
use std::collections::VecDeque;

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Server seam for the driver. Production uses the in-process
/// [`LocalEndpoint`]; tests substitute recording fakes.
#[async_trait]
pub trait SyncEndpoint: Send + Sync {
    async fn start_sync(&self) -> Result<Vec<i64>, ApiError>;
    async fn process_batch(&self, courses: &[i64]) -> Result<usize, ApiError>;
}

/// In-process endpoint wrapping [`AdminApi`] together with its auth token.
pub struct LocalEndpoint {
    api: AdminApi,
    token: String,
}

impl LocalEndpoint {
    pub fn new(api: AdminApi, token: impl Into<String>) -> Self {
        Self {
            api,
            token: token.into(),
        }
    }
}

#[async_trait]
impl SyncEndpoint for LocalEndpoint {
    async fn start_sync(&self) -> Result<Vec<i64>, ApiError> {
        self.api.start_sync(&self.token).await
    }

    async fn process_batch(&self, courses: &[i64]) -> Result<usize, ApiError> {
        self.api.process_batch(&self.token, courses).await
    }
}

/// Progress events surfaced to the UI while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Started {
        total: usize,
    },
    Step {
        processed: usize,
        total: usize,
        percent: f64,
    },
}

/// Final state of a run. On failure `error` carries the server message or a
/// generic fallback; progress already committed by earlier batches stands.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub total: usize,
    pub processed: usize,
    pub completed: bool,
    pub error: Option<String>,
}

/// Session-scoped driver state: remaining queue, counters, running guard.
pub struct BatchSyncDriver {
    batch_size: usize,
    queue: VecDeque<i64>,
    total: usize,
    processed: usize,
    running: bool,
}

impl BatchSyncDriver {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            queue: VecDeque::new(),
            total: 0,
            processed: 0,
            running: false,
        }
    }

    /// Drive a full sync. Calling `run` while a run is in flight is a no-op
    /// that reports a failure without touching the server.
    pub async fn run(
        &mut self,
        endpoint: &dyn SyncEndpoint,
        mut on_progress: impl FnMut(Progress) + Send,
    ) -> SyncReport {
        if self.running {
            return SyncReport {
                total: self.total,
                processed: self.processed,
                completed: false,
                error: Some("a sync is already running".into()),
            };
        }
        self.running = true;
        self.processed = 0;

        let report = self.drive(endpoint, &mut on_progress).await;
        self.running = false;
        report
    }

    async fn drive(
        &mut self,
        endpoint: &dyn SyncEndpoint,
        on_progress: &mut (impl FnMut(Progress) + Send),
    ) -> SyncReport {
        match endpoint.start_sync().await {
            Ok(ids) => {
                self.total = ids.len();
                self.queue = ids.into();
            }
            Err(err) => return self.fail(err),
        }
        on_progress(Progress::Started { total: self.total });

        // One in-flight request at a time; the next slice goes out only after
        // the previous response has landed.
        while !self.queue.is_empty() {
            let take = self.batch_size.min(self.queue.len());
            let batch: Vec<i64> = self.queue.drain(..take).collect();
            match endpoint.process_batch(&batch).await {
                Ok(count) => {
                    self.processed += count;
                    let percent = self.processed as f64 / self.total as f64 * 100.0;
                    on_progress(Progress::Step {
                        processed: self.processed,
                        total: self.total,
                        percent,
                    });
                }
                Err(err) => return self.fail(err),
            }
        }

        // Queue exhausted: completion is reported locally, without a further
        // round trip. The processed count can trail the total when a batch
        // silently skipped malformed ids.
        SyncReport {
            total: self.total,
            processed: self.processed,
            completed: true,
            error: None,
        }
    }

    fn fail(&mut self, err: ApiError) -> SyncReport {
        let message = match err {
            ApiError::Internal(_) => "the sync request to the server failed".to_string(),
            other => other.to_string(),
        };
        SyncReport {
            total: self.total,
            processed: self.processed,
            completed: false,
            error: Some(message),
        }
    }
}
