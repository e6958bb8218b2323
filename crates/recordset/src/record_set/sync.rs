//! Sync orchestration: persist new and modified records and delete pending
//! removals, all concurrently.
//!
//! A sync either succeeds as a whole or reports a partial failure. Work that
//! succeeded is never compensated; the [`SyncReport`] says exactly what
//! landed and what did not.

use std::sync::Arc;

use futures::future::join_all;
use tokio::runtime::Handle;

use crate::{
    error::{ConfigError, ProxyError, RecordError, SyncError},
    proxy::Action,
    record::RecordRef,
    types::ModifiedOptions,
};

use super::{Pending, RecordSet};

/// Outcome of one [`RecordSet::sync`].
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub created: Vec<RecordRef>,
    pub updated: Vec<RecordRef>,
    pub destroyed: Vec<RecordRef>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Number of saves and destroys issued.
    pub fn attempted(&self) -> usize {
        self.created.len() + self.updated.len() + self.destroyed.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One save or destroy that failed during a sync.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub record: RecordRef,
    pub action: Action,
    pub error: RecordError,
}

pub type SyncReportFn = dyn Fn(&RecordSet, &SyncReport) + Send + Sync;
pub type SyncErrorFn = dyn Fn(&RecordSet, &SyncError) + Send + Sync;

/// Per-call sync callbacks.
#[derive(Default, Clone)]
pub struct SyncOptions {
    pub on_success: Option<Arc<SyncReportFn>>,
    pub on_error: Option<Arc<SyncErrorFn>>,
    /// Runs after `on_success`/`on_error`, in both outcomes.
    pub on_complete: Option<Arc<SyncReportFn>>,
}

impl RecordSet {
    /// Save every new or persist-modified record and destroy every pending
    /// removal. Unmodified persisted records are skipped.
    ///
    /// All requests are issued before this returns. Successful destroys are
    /// struck from [`removed_records`](RecordSet::removed_records).
    pub fn sync(&self, options: SyncOptions) -> Result<Pending<SyncReport, SyncError>, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let (records, removals) = {
            let st = self.inner.state.lock();
            (st.list.clone(), st.pending_removals.clone())
        };
        let persisted_only = ModifiedOptions {
            persisted_only: true,
            shallow: false,
        };

        let mut tasks = Vec::new();
        for record in records {
            let action = if record.is_new() {
                Action::Create
            } else if record.is_modified(persisted_only) {
                Action::Update
            } else {
                continue;
            };
            let task = runtime.spawn({
                let record = Arc::clone(&record);
                async move { record.save().await }
            });
            tasks.push((record, action, task));
        }

        for record in removals.into_iter().rev() {
            let set = self.clone();
            let task = runtime.spawn({
                let record = Arc::clone(&record);
                async move {
                    record.destroy().await?;
                    set.inner.state.lock().strike_pending(record.client_id());
                    Ok::<(), RecordError>(())
                }
            });
            tasks.push((record, Action::Destroy, task));
        }

        tracing::debug!(requests = tasks.len(), "issuing sync");

        let (tx, pending) = Pending::channel();
        let set = self.clone();
        runtime.spawn(async move {
            let (issued, handles): (Vec<_>, Vec<_>) = tasks
                .into_iter()
                .map(|(record, action, task)| ((record, action), task))
                .unzip();
            let results = join_all(handles).await;

            let mut report = SyncReport::default();
            for ((record, action), result) in issued.into_iter().zip(results) {
                let result = result.unwrap_or_else(|join| {
                    Err(RecordError::Proxy {
                        client_id: record.client_id().get(),
                        source: ProxyError::new(format!(
                            "{} task failed: {join}",
                            action.as_str()
                        )),
                    })
                });
                match result {
                    Ok(()) => match action {
                        Action::Create => report.created.push(record),
                        Action::Update => report.updated.push(record),
                        _ => report.destroyed.push(record),
                    },
                    Err(error) => {
                        tracing::warn!(
                            record = %record.client_id(),
                            action = action.as_str(),
                            error = %error,
                            "sync request failed"
                        );
                        report.failures.push(SyncFailure {
                            record,
                            action,
                            error,
                        });
                    }
                }
            }

            let _ = tx.send(set.settle_sync(report, &options));
        });

        Ok(pending)
    }

    fn settle_sync(&self, report: SyncReport, options: &SyncOptions) -> Result<SyncReport, SyncError> {
        tracing::debug!(
            created = report.created.len(),
            updated = report.updated.len(),
            destroyed = report.destroyed.len(),
            failed = report.failures.len(),
            "sync settled"
        );

        let outcome = if report.is_success() {
            if let Some(cb) = &options.on_success {
                cb(self, &report);
            }
            Ok(report.clone())
        } else {
            let error = SyncError::Partial {
                report: report.clone(),
            };
            if let Some(cb) = &options.on_error {
                cb(self, &error);
            }
            Err(error)
        };
        if let Some(cb) = &options.on_complete {
            cb(self, &report);
        }
        outcome
    }
}
