pub mod broadcast;
pub mod config;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod sanitize;
pub mod screening;
pub mod search;
pub mod sheet;
pub mod worker;

pub use broadcast::{Job, JobProgressBroadcaster, JobProgressEvent, JobStatus, JobStore};
pub use config::{load_config, ScreenerConfig, SearchConfig};
pub use error::{
    ConfigError, JobError, ProviderError, Result, ScreenerError, SheetError, WorkerError,
};
pub use matcher::{match_keywords, KeywordMatcher};
pub use pipeline::{JobRequest, JobRunner, JobSummary, PipelineError, ProgressEvent, ProgressReporter};
pub use screening::{EntityRecord, Screener, ScreeningResult, ScreeningStatus};
pub use search::{DuckDuckGoProvider, ResultItem, SearchAdapter, SearchOutcome, SearchProvider};
