//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the external service traits,
//! allowing full batch runs without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use gristmill_core::testing::{MockObjectStore, MockStreamPublisher};
//!
//! let store = MockObjectStore::new();
//! store.insert_object("bucket", "wf/run-1/bin/run.sh", data).await;
//!
//! // Run a batch against the mocks, then assert on recorded calls.
//! assert_eq!(store.get_count("wf/run-1/bin/run.sh").await, 1);
//! ```

mod mock_object_store;
mod mock_stream_publisher;

pub use mock_object_store::{MockObjectStore, RecordedPut};
pub use mock_stream_publisher::{MockStreamPublisher, PublishedRecord};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::descriptor::JobDescriptor;

    /// Create a test job descriptor with reasonable defaults.
    pub fn job_descriptor(id: &str) -> JobDescriptor {
        JobDescriptor {
            workflow: "wf".to_string(),
            bucket: "bucket".to_string(),
            prefix: "wf/run-1".to_string(),
            id: id.to_string(),
            name: format!("job {}", id),
            command: "run.bin".to_string(),
            bin_files: vec!["run.bin".to_string()],
            in_files: vec![],
            out_files: vec![],
        }
    }

    /// Create a raw wire record with the given whitespace-separated file
    /// lists.
    pub fn job_record_json(id: &str, bin_files: &str, in_files: &str, out_files: &str) -> String {
        format!(
            concat!(
                r#"{{"workflow": "wf", "bucket": "bucket", "prefix": "wf/run-1", "#,
                r#""id": "{}", "name": "job {}", "command": "run.bin", "#,
                r#""binFiles": "{}", "inFiles": "{}", "outFiles": "{}"}}"#
            ),
            id, id, bin_files, in_files, out_files
        )
    }
}
