//! State management for orders on the device.
//!
//! This module provides the state machine that validates sync status
//! transitions and the observable container that holds the live collection.

pub mod container;
pub mod order;

pub use container::{BatchStart, OrderState, StateContainer};
pub use order::{OrderStateError, OrderStateMachine};
