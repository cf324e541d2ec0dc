// src/lib.rs

pub mod bulk;
pub mod commands;
pub mod config;
pub mod envelope;
pub mod export;
pub mod gateway;
pub mod models;
pub mod preview;
pub mod reducer;
pub mod refresh;
pub mod staleness;
pub mod store;

pub use bulk::{BulkFailure, BulkOutcome, BulkStrategy};
pub use commands::{extract_error_message, CommandError, PayrollService, ServiceSettings};
pub use config::{ConfigError, PayrollClient, PayrollConfig};
pub use gateway::{
    ApiRequest, CredentialStore, FileCredentialStore, Gateway, GatewayError, HttpGateway,
    InMemoryCredentialStore, SessionEvent,
};
pub use reducer::{reduce, Action, Family, LoadingSlot, PayrollState};
pub use staleness::{Clock, ManualClock, StalenessCache, SystemClock};
pub use store::Store;

#[cfg(test)]
mod test_support;

mod reducer_tests;
