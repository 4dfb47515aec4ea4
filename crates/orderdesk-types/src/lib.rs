//! Common types for the order desk.
//!
//! This crate defines the data types shared by every order desk component:
//! the order record and its validated inputs, engine events, storage keys,
//! and the schema framework used to validate backend configuration.

/// Engine event types consumed by presentation.
pub mod events;
/// Network reachability input.
pub mod network;
/// Order records, sync status and input validation.
pub mod order;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// Display helpers.
pub mod utils;
/// Configuration schema validation.
pub mod validation;

pub use events::*;
pub use network::NetworkStatus;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{format_amount, format_timestamp, truncate_id};
pub use validation::*;
