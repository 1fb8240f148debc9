//! Grant Discovery Module
//!
//! Infers database-access policy grants by evaluating SQL probe templates
//! against a point-in-time snapshot of a target database's privilege catalog.
//!
//! ## Architecture
//!
//! ### Contract Layer (`grant-discovery-sdk`)
//! - `GrantDiscoveryClient` trait, catalog/output models, `RunRequest` / `RunOutcome`
//! - Snapshot payload types and the `IdSet` decoder
//!
//! ### Domain Layer (`grant_discovery::domain`)
//! - `snapshot/` - disposable SQLite session holding the privilege snapshot
//! - `template.rs` - placeholder expansion of templates into probe tasks
//! - `classifier.rs` - super / action-wide / object-specific tiers
//! - `evaluator.rs` - bounded-width probe execution with a per-pass barrier
//! - `decision.rs` - allow/deny comparison
//! - `synthesizer.rs` - idempotent grant creation and coverage marks
//! - `groups.rs` - actor to access-group matching
//! - `service.rs` - run orchestration, one transaction per run
//!
//! ### Infrastructure Layer (`grant_discovery::infra`)
//! - `storage/entity/` - `SeaORM` entities
//! - `storage/migrations/` - schema migrations
//! - `storage/sea_orm_repo.rs` - `GrantDiscoveryRepository` implementation
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === PUBLIC API (from SDK) ===
pub use grant_discovery_sdk::{
    GrantDiscoveryClient, GrantDiscoveryError, RunOutcome, RunRequest,
};

pub mod config;
pub use config::GrantDiscoveryConfig;

// === INTERNAL MODULES ===
// Exposed for integration testing; only the SDK types are a stable API.
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

#[cfg(test)]
mod test_support;
