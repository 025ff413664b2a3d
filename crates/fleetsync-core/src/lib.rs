pub mod config;
pub mod equipment;
pub mod error;
pub mod oauth;
pub mod pipeline;
pub mod sheets;
pub mod sink;
pub mod timestamps;
pub mod types;
pub mod xml_output;

pub use config::{Config, ConfigError, OutputMode};
pub use equipment::{EquipmentSource, FetchError, SamsaraClient};
pub use error::{Result, SyncError};
pub use pipeline::{run_sync, SyncSummary};
pub use sink::{sink_for, PublishError, RecordSink};
pub use timestamps::PublishTimestamps;
pub use types::EquipmentRecord;
