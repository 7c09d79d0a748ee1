//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for the upstream feed and the downstream sink.
pub mod ports;

/// Subscription control and tick forwarding services.
pub mod services;
