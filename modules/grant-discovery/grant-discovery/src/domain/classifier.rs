//! Partition of the template catalog into evaluation tiers.

use std::collections::BTreeSet;

use grant_discovery_sdk::{ListPolicy, PolicyTemplate};

/// Disjoint template tiers, one per pass.
#[derive(Debug, Default, Clone)]
pub struct TemplateTiers {
    /// The reserved "grants everything" template, if present in the catalog.
    pub super_template: Option<PolicyTemplate>,
    /// Templates referenced by at least one active list-policy.
    pub action_wide: Vec<PolicyTemplate>,
    pub object_specific: Vec<PolicyTemplate>,
}

impl TemplateTiers {
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.super_template.is_some())
            + self.action_wide.len()
            + self.object_specific.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classify purely by id membership; nothing is evaluated here.
#[must_use]
pub fn classify(
    templates: Vec<PolicyTemplate>,
    list_policies: &[ListPolicy],
    super_template_id: i64,
) -> TemplateTiers {
    let bundled: BTreeSet<i64> = list_policies
        .iter()
        .filter(|lp| lp.active)
        .flat_map(|lp| lp.template_ids.iter().copied())
        .collect();

    let mut tiers = TemplateTiers::default();
    for template in templates {
        if template.id == super_template_id {
            tiers.super_template = Some(template);
        } else if bundled.contains(&template.id) {
            tiers.action_wide.push(template);
        } else {
            tiers.object_specific.push(template);
        }
    }
    tiers
}
