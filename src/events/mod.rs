//! Events Module
//!
//! Listener registry for container events. Mutating steps publish a [`ContainerEvent`] during
//! their `PublishEvent` step; every listener registered for that container on the executing
//! member receives it over an unbounded channel.
//!
//! A container with at least one live listener is never destroyed by an eviction check.

pub mod service;
pub mod types;

pub use service::{EventService, ListenerId};
pub use types::{ContainerEvent, EventKind};
