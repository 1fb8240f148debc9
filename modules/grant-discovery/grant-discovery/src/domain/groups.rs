//! Actor to access-group matching after all passes.
//!
//! Matching reads only the run's in-memory allow-set, never persisted
//! grants, so concurrent grant activity elsewhere cannot skew it.

use std::collections::BTreeSet;

use grant_discovery_sdk::{AccessGroup, Actor, ListPolicy};
use sea_orm::ConnectionTrait;
use tracing::{debug, info};

use super::audit::{self, AuditEvent, AuditSink};
use super::coverage::CoverageCache;
use super::error::DomainError;
use super::repo::GrantDiscoveryRepository;

/// Active list-policies fully contained in `allowed` ("Level 1").
#[must_use]
pub fn satisfied_list_policies(
    allowed: &BTreeSet<i64>,
    list_policies: &[ListPolicy],
) -> BTreeSet<i64> {
    list_policies
        .iter()
        .filter(|lp| lp.active && !lp.template_ids.is_empty())
        .filter(|lp| lp.template_ids.is_subset(allowed))
        .map(|lp| lp.id)
        .collect()
}

/// Lowest-id group whose required list-policies are all satisfied ("Level 2").
///
/// The reserved super group and groups without requirements never qualify.
#[must_use]
pub fn select_group(
    satisfied: &BTreeSet<i64>,
    groups: &[AccessGroup],
    super_group_id: i64,
) -> Option<i64> {
    groups
        .iter()
        .filter(|g| g.id != super_group_id && !g.list_policy_ids.is_empty())
        .filter(|g| g.list_policy_ids.is_subset(satisfied))
        .map(|g| g.id)
        .min()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentSummary {
    pub assigned: usize,
    pub already_member: usize,
    pub unassigned: usize,
}

pub struct GroupAssigner<'a, R, C> {
    pub repo: &'a R,
    pub conn: &'a C,
    pub coverage: &'a CoverageCache,
    pub audit: &'a dyn AuditSink,
    pub super_group_id: i64,
}

impl<R, C> GroupAssigner<'_, R, C>
where
    R: GrantDiscoveryRepository,
    C: ConnectionTrait,
{
    /// Assign every actor to at most one group, in ascending actor id order.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Persistence`] if a membership lookup or insert fails.
    pub async fn assign(
        &self,
        actors: &[Actor],
        list_policies: &[ListPolicy],
        groups: &[AccessGroup],
    ) -> Result<AssignmentSummary, DomainError> {
        let mut summary = AssignmentSummary::default();

        for actor in actors {
            let target = if self.coverage.is_super(actor.id) {
                Some(self.super_group_id)
            } else {
                let allowed = self.coverage.allowed_templates(actor.id);
                let satisfied = satisfied_list_policies(&allowed, list_policies);
                select_group(&satisfied, groups, self.super_group_id)
            };

            let Some(group_id) = target else {
                info!(
                    actor_id = actor.id,
                    user = %actor.user,
                    host = %actor.host,
                    "No access group qualifies; actor left unassigned"
                );
                summary.unassigned += 1;
                continue;
            };

            if self.repo.is_member(self.conn, actor.id, group_id).await? {
                debug!(actor_id = actor.id, group_id, "Actor already in group");
                summary.already_member += 1;
                continue;
            }

            self.repo
                .insert_membership(self.conn, actor.id, group_id)
                .await?;
            audit::record(
                self.audit,
                &AuditEvent::GroupAssigned {
                    actor_id: actor.id,
                    group_id,
                },
            );
            summary.assigned += 1;
        }

        Ok(summary)
    }
}
