use std::sync::Arc;

use log::{debug, info};
use tracing::debug_span;

use crate::error::WorkerError;
use crate::pipeline::{ProgressEvent, ProgressReporter};
use crate::screening::cache::{Lookup, ScreeningCache};
use crate::screening::types::{CacheEntry, EntityRecord, ScreeningResult, ScreeningStatus};
use crate::search::SearchAdapter;
use crate::worker::{ScreeningTask, WorkerPool};

/// State shared by the workers of one job.
pub struct ScreeningContext {
    adapter: Arc<SearchAdapter>,
    cache: ScreeningCache,
    progress: Arc<dyn ProgressReporter>,
}

impl ScreeningContext {
    pub fn new(
        adapter: Arc<SearchAdapter>,
        cache: ScreeningCache,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            adapter,
            cache,
            progress,
        }
    }

    pub fn cache(&self) -> &ScreeningCache {
        &self.cache
    }

    /// Screens one record and reports it as processed.
    pub fn screen(&self, record: &EntityRecord) -> ScreeningResult {
        let _span = debug_span!("screen_entity", row = record.row).entered();

        let result = self.classify(record);
        self.progress.report(ProgressEvent::EntityScreened {
            row: result.row,
            status: result.status,
        });
        result
    }

    fn classify(&self, record: &EntityRecord) -> ScreeningResult {
        let name = match record.normalized_name() {
            Some(name) => name,
            None => {
                debug!("Row {} has no name, skipping search", record.row);
                return ScreeningResult::empty_name(record);
            }
        };

        debug!("Searching: {}", name);
        match self.cache.get_or_lookup(name, || self.adapter.query(name)) {
            Lookup::Cached(entry) => {
                debug!("Cache hit for '{}': {}", name, entry.status);
                ScreeningResult::from_entry(record, &entry)
            }
            Lookup::Fresh(outcome) => match CacheEntry::from_outcome(&outcome) {
                Some(entry) => ScreeningResult::from_entry(record, &entry),
                None => ScreeningResult::blocked(record),
            },
        }
    }
}

/// The concurrent dispatcher: fans a job's records out over a worker pool
/// and collects one result per record.
pub struct Screener {
    adapter: Arc<SearchAdapter>,
    worker_count: usize,
}

impl Screener {
    pub fn new(adapter: SearchAdapter, worker_count: usize) -> Self {
        Self {
            adapter: Arc::new(adapter),
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn adapter(&self) -> &SearchAdapter {
        &self.adapter
    }

    /// Screens every record with a fresh cache. Results come back in
    /// completion order; the first failed task aborts the run and the
    /// remaining tasks are abandoned.
    pub fn run(
        &self,
        records: Vec<EntityRecord>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<Vec<ScreeningResult>, WorkerError> {
        let total = records.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let context = Arc::new(ScreeningContext::new(
            Arc::clone(&self.adapter),
            ScreeningCache::new(),
            progress,
        ));
        let pool = WorkerPool::new(context, self.worker_count.min(total), total)?;

        for record in records {
            if let Err(e) = pool.submit(ScreeningTask::new(record)) {
                pool.abandon();
                return Err(e);
            }
        }

        let mut results = Vec::with_capacity(total);
        while results.len() < total {
            let task_result = match pool.recv_result() {
                Some(task_result) => task_result,
                None => {
                    pool.abandon();
                    return Err(WorkerError::ChannelClosed);
                }
            };

            match task_result.into_result() {
                Ok(result) => results.push(result),
                Err(e) => {
                    pool.abandon();
                    return Err(e);
                }
            }
        }

        pool.wait();

        info!(
            "Screened {} entities: {} adverse, {} blocked",
            total,
            count(&results, ScreeningStatus::Adverse),
            count(&results, ScreeningStatus::Blocked)
        );
        Ok(results)
    }
}

fn count(results: &[ScreeningResult], status: ScreeningStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}
