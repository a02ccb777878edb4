pub mod config;
pub mod descriptor;
pub mod maintenance;
pub mod metrics;
pub mod runner;
pub mod storage;
pub mod stream;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, StorageConfig,
    StreamConfig,
};
pub use descriptor::{parse_batch, parse_record, Batch, DescriptorError, JobDescriptor};
pub use runner::{AckPolicy, BatchReport, BatchRunner, JobStatus, RunnerConfig};
pub use storage::{HttpObjectStore, ObjectStore, ObjectStoreError};
pub use stream::{HttpStreamPublisher, StreamError, StreamPublisher};
