//! Run-scoped record of what has already been resolved.

use std::collections::BTreeSet;

use dashmap::{DashMap, DashSet};

/// Coverage marks shared by the passes of one run.
///
/// Only mark/query operations are exposed; the underlying sets stay private.
#[derive(Debug, Default)]
pub struct CoverageCache {
    super_actors: DashSet<i64>,
    granted_actions: DashSet<(i64, i64)>,
    /// Allowed template ids keyed by actor.
    allowed_templates: DashMap<i64, BTreeSet<i64>>,
}

impl CoverageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_super(&self, actor_id: i64) {
        self.super_actors.insert(actor_id);
    }

    #[must_use]
    pub fn is_super(&self, actor_id: i64) -> bool {
        self.super_actors.contains(&actor_id)
    }

    pub fn mark_action_granted(&self, actor_id: i64, action_id: i64) {
        self.granted_actions.insert((actor_id, action_id));
    }

    #[must_use]
    pub fn is_action_granted(&self, actor_id: i64, action_id: i64) -> bool {
        self.granted_actions.contains(&(actor_id, action_id))
    }

    pub fn mark_template_allowed(&self, actor_id: i64, template_id: i64) {
        self.allowed_templates
            .entry(actor_id)
            .or_default()
            .insert(template_id);
    }

    #[must_use]
    pub fn is_template_allowed(&self, actor_id: i64, template_id: i64) -> bool {
        self.allowed_templates
            .get(&actor_id)
            .is_some_and(|templates| templates.contains(&template_id))
    }

    /// Snapshot of the templates allowed for one actor.
    #[must_use]
    pub fn allowed_templates(&self, actor_id: i64) -> BTreeSet<i64> {
        self.allowed_templates
            .get(&actor_id)
            .map_or_else(BTreeSet::new, |templates| templates.value().clone())
    }

    /// Super actors in ascending id order.
    #[must_use]
    pub fn super_actors(&self) -> BTreeSet<i64> {
        self.super_actors.iter().map(|id| *id).collect()
    }
}
