//! Domain layer for grant discovery.

pub mod audit;
pub mod classifier;
pub mod coverage;
pub mod decision;
pub mod error;
pub mod evaluator;
pub mod groups;
pub mod guard;
pub mod local_client;
pub mod repo;
pub mod service;
pub mod snapshot;
pub mod synthesizer;
pub mod template;


pub use error::DomainError;
pub use local_client::GrantDiscoveryLocalClient;
pub use service::{RunSummary, Service};
