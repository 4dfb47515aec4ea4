//! Core engine for the order desk.
//!
//! This crate keeps the device's orders in step with the remote order
//! service. Orders are created and edited offline, written through to a
//! durable collection, and pushed to the remote side in sequential batches
//! whenever the device is online.
//!
//! The [`SyncEngine`] coordinates:
//! - State: the observable live collection and its flags
//! - Storage: the durable whole-collection order store
//! - Sync: the remote adapter, bounded by a per-call timeout
//! - Events: lifecycle notifications for presentation

pub mod builder;
pub mod engine;
pub mod state;

pub use builder::{BuilderError, EngineFactories, SyncEngineBuilder};
pub use engine::event_bus::EventBus;
pub use engine::{OrderError, SyncEngine, SyncOutcome, SyncReport};
pub use state::{OrderState, OrderStateError, OrderStateMachine, StateContainer};
