#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Grant Discovery SDK
//!
//! This crate provides the public contract for the `grant_discovery` module:
//!
//! - [`GrantDiscoveryClient`] - Public API trait for the job layer
//! - [`RunRequest`], [`RunOutcome`] - Completion input and signal
//! - [`PolicyTemplate`], [`Actor`], [`TargetDatabase`], [`TargetObject`],
//!   [`ListPolicy`], [`AccessGroup`], [`PolicyGrant`] - Catalog and output models
//! - [`IdSet`] - Decoder for the three id-set encodings used by list-policies
//! - [`snapshot`] - Snapshot payload types and the `schema.table[n]` key codec
//! - [`GrantDiscoveryError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use grant_discovery_sdk::{GrantDiscoveryClient, RunRequest};
//!
//! let outcome = client
//!     .complete(RunRequest::new("job-42", connection_id, payload))
//!     .await?;
//!
//! if outcome.success {
//!     tracing::info!(grants = outcome.grants_created, "discovery finished");
//! }
//! ```

pub mod api;
pub mod error;
pub mod id_set;
pub mod models;
pub mod snapshot;

pub use api::GrantDiscoveryClient;
pub use error::GrantDiscoveryError;
pub use id_set::{IdSet, IdSetError};
pub use models::{
    AccessGroup, Actor, GrantStatus, ListPolicy, NO_SCOPE, PolicyGrant, PolicyTemplate, Probe,
    RunOutcome, RunRequest, TargetDatabase, TargetObject,
};
pub use snapshot::{QueryKeyError, SnapshotEntry, SnapshotQueryKey, SnapshotStatus};
