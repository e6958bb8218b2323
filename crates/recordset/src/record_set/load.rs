//! Load orchestration: single, ranged, paged, and page-range loads.
//!
//! Every entry point validates its configuration synchronously, issues all
//! of its read operations on the runtime before returning, and settles as
//! one logical load:
//!
//! ```text
//! Idle ──load*()──▶ Loading ──all reads settled──▶ Success | Error ──▶ Idle
//! ```
//!
//! The `Loaded` event and the `on_complete` callback fire once per logical
//! load whatever the outcome.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::runtime::Handle;

use crate::{
    error::{ConfigError, LoadError, ProxyError, ProxyErrorKind},
    proxy::{Batch, Operation, ResultSet},
    reactive::SetEvent,
    record::RecordRef,
    types::AddOptions,
};

use super::{Pending, RecordSet};

pub type LoadSuccessFn = dyn Fn(&RecordSet, &Batch) + Send + Sync;
pub type LoadErrorFn = dyn Fn(&RecordSet, &LoadError) + Send + Sync;

/// Per-call load options.
#[derive(Default, Clone)]
pub struct LoadOptions {
    /// Passed through to the proxy on every read operation.
    pub params: Map<String, Value>,
    /// Accumulate into the current contents instead of replacing them.
    /// Defaults to false for plain loads; for paged loads it defaults to
    /// `!clear_on_page_load`.
    pub add_records: Option<bool>,
    pub on_success: Option<Arc<LoadSuccessFn>>,
    pub on_error: Option<Arc<LoadErrorFn>>,
    /// Runs after `on_success`/`on_error`, in both outcomes.
    pub on_complete: Option<Arc<LoadSuccessFn>>,
}

impl LoadOptions {
    pub fn accumulate() -> Self {
        Self {
            add_records: Some(true),
            ..Default::default()
        }
    }
}

impl RecordSet {
    /// Load the first page when paging is configured, otherwise everything
    /// the proxy returns for `options.params`.
    pub fn load(&self, options: LoadOptions) -> Result<Pending<Batch, LoadError>, ConfigError> {
        if self.inner.page_size.is_some() {
            return self.load_page(1, options);
        }
        let operation = Operation::read().with_params(options.params.clone());
        let add_records = options.add_records.unwrap_or(false);
        self.issue_reads(vec![operation], add_records, options)
    }

    /// Load records `start..=end` by index. With paging configured the range
    /// is widened to whole pages.
    pub fn load_range(
        &self,
        start: usize,
        end: usize,
        options: LoadOptions,
    ) -> Result<Pending<Batch, LoadError>, ConfigError> {
        if let Some(page_size) = self.inner.page_size {
            let start_page = start / page_size + 1;
            let end_page = (end / page_size).saturating_add(1);
            return self.load_page_range(start_page, end_page, options);
        }
        let operation = Operation::read()
            .with_params(options.params.clone())
            .with_range(start, end.saturating_sub(start));
        let add_records = options.add_records.unwrap_or(false);
        self.issue_reads(vec![operation], add_records, options)
    }

    /// Load a single 1-based page.
    pub fn load_page(
        &self,
        page: usize,
        options: LoadOptions,
    ) -> Result<Pending<Batch, LoadError>, ConfigError> {
        if page == 0 {
            return Err(ConfigError::InvalidPage { start: 0, end: 0 });
        }
        self.load_page_range(page, page, options)
    }

    /// Load pages `start_page..=end_page`, all requested concurrently.
    pub fn load_page_range(
        &self,
        start_page: usize,
        end_page: usize,
        options: LoadOptions,
    ) -> Result<Pending<Batch, LoadError>, ConfigError> {
        if start_page == 0 || end_page == 0 || start_page > end_page {
            return Err(ConfigError::InvalidPage {
                start: start_page,
                end: end_page,
            });
        }
        let page_size = self.inner.page_size.ok_or(ConfigError::MissingPageSize)?;
        // The last page's end offset must be addressable.
        if end_page.checked_mul(page_size).is_none() {
            return Err(ConfigError::InvalidPage {
                start: start_page,
                end: end_page,
            });
        }

        let operations = (start_page..=end_page)
            .map(|page| {
                Operation::read()
                    .with_params(options.params.clone())
                    .with_page(page, page_size)
            })
            .collect();
        let add_records = options
            .add_records
            .unwrap_or(!self.inner.clear_on_page_load);
        self.issue_reads(operations, add_records, options)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn issue_reads(
        &self,
        operations: Vec<Operation>,
        add_records: bool,
        options: LoadOptions,
    ) -> Result<Pending<Batch, LoadError>, ConfigError> {
        let proxy = self.proxy().ok_or(ConfigError::MissingProxy)?;
        if self.inner.factory.is_none() && self.inner.schema.is_none() {
            return Err(ConfigError::MissingSchema("loaded data".to_string()));
        }
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        self.inner.state.lock().loads_in_flight += 1;
        tracing::debug!(
            operations = operations.len(),
            add_records,
            "issuing load"
        );

        let requests: Vec<_> = operations
            .iter()
            .cloned()
            .map(|operation| {
                let proxy = Arc::clone(&proxy);
                runtime.spawn(async move { proxy.read(operation).await })
            })
            .collect();

        let (tx, pending) = Pending::channel();
        let set = self.clone();
        runtime.spawn(async move {
            let results = join_all(requests).await;
            let mut completed = Vec::with_capacity(operations.len());
            let mut first_error: Option<ProxyError> = None;

            for (issued, result) in operations.into_iter().zip(results) {
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(join) => Err(ProxyError::new(format!("read task failed: {join}"))),
                };
                let operation = match outcome {
                    Ok(done) => match done.error().cloned() {
                        Some(e) => {
                            first_error.get_or_insert(e);
                            done
                        }
                        None if done.result_set().is_none() => done.complete(ResultSet::default()),
                        None => done,
                    },
                    Err(e) => {
                        first_error.get_or_insert(e.clone());
                        issued.fail(e)
                    }
                };
                completed.push(operation);
            }

            let outcome = set.settle_load(Batch::new(completed), add_records, first_error, &options);
            let _ = tx.send(outcome);
        });

        Ok(pending)
    }

    fn settle_load(
        &self,
        batch: Batch,
        add_records: bool,
        error: Option<ProxyError>,
        options: &LoadOptions,
    ) -> Result<Batch, LoadError> {
        let loaded = match error {
            None => self.create_loaded(&batch),
            Some(e) => Err(e),
        };

        let outcome = match loaded {
            Ok(records) => {
                let _apply = self.inner.apply.lock();
                if let Some(total) = batch.total_count() {
                    self.inner.state.lock().total_count = Some(total);
                }
                if !add_records {
                    self.remove_all();
                }
                // Records were created up front, so the factory cannot fail here.
                let _ = self.add(records, AddOptions::default());
                Ok(batch.clone())
            }
            Err(source) => {
                let failed = batch.exceptions().len().max(1);
                tracing::warn!(
                    failed,
                    total = batch.len(),
                    error = %source,
                    "load failed"
                );
                Err(LoadError {
                    batch: batch.clone(),
                    failed,
                    total: batch.len(),
                    source,
                })
            }
        };

        {
            let mut st = self.inner.state.lock();
            st.loads_in_flight = st.loads_in_flight.saturating_sub(1);
        }

        match &outcome {
            Ok(batch) => {
                tracing::debug!(
                    operations = batch.len(),
                    total_count = ?batch.total_count(),
                    "load settled"
                );
                if let Some(cb) = &options.on_success {
                    cb(self, batch);
                }
            }
            Err(e) => {
                if let Some(cb) = &options.on_error {
                    cb(self, e);
                }
            }
        }
        if let Some(cb) = &options.on_complete {
            cb(self, &batch);
        }
        self.inner.events.emit(&SetEvent::Loaded { batch });
        outcome
    }

    /// Build records for every returned row before touching the set, so a
    /// malformed row fails the whole load instead of half-applying it.
    fn create_loaded(&self, batch: &Batch) -> Result<Vec<RecordRef>, ProxyError> {
        batch
            .records()
            .into_iter()
            .map(|data| self.create_record(data))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProxyError::with_kind(e.to_string(), ProxyErrorKind::Permanent))
    }
}
