pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod publish;
pub mod queue;
pub mod run;
pub mod staging;
pub mod transform;
pub mod uri_matcher;

pub use config::{ConnectorConfig, ConnectorConfigBuilder, MailConfig, load_properties};
pub use document::{Document, DocumentType, Field, FieldSchema, FieldValue, nsd_id};
pub use error::{PipelineError, PipelineResult, RetryPolicy};
pub use metrics::{CrawlMetrics, PhaseStats};
pub use publish::{
    HttpSearchIndex, MemorySearchIndex, PublishSummary, SearchIndex, schema_fragment,
};
pub use queue::{AbortFlag, CrawlQueue, Sentinel, append_phase, decode_item, encode_item};
pub use run::{CrawlRun, CrawlType, LockFile, RunController, RunOutcome, RunStatus, ServiceTracker, ServiceTimer};
pub use staging::StagingArea;
pub use transform::DocumentHandoff;
pub use uri_matcher::{UriClass, UriRules};
