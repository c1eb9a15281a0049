//! Shared test utilities

pub mod fixtures;
pub mod mock_client;

pub use fixtures::*;
pub use mock_client::{MockRemoteClient, MockResponse, RecordingProgress};
