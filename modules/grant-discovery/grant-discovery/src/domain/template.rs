//! Expansion of policy templates into concrete probe tasks.
//!
//! A template carries up to two probes. The general probe is rendered once
//! per actor and applicable database, with every object placeholder bound to
//! the wildcard `*`. The specific probe is rendered once per actor, database
//! and object of the template's kind. Every task gets a [`TaskKey`] encoding
//! all contributing ids, so a result can always be traced back to its origin.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use grant_discovery_sdk::{Actor, NO_SCOPE, PolicyTemplate, Probe, TargetDatabase, TargetObject};
use thiserror::Error;

use super::snapshot::escape_literal;

pub const DATABASE_PLACEHOLDER: &str = "{database}";
pub const USER_PLACEHOLDER: &str = "{user}";
pub const HOST_PLACEHOLDER: &str = "{host}";
pub const OBJECT_PLACEHOLDER: &str = "{object}";
pub const OBJECT_HOST_PLACEHOLDER: &str = "{object_host}";
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    General,
    Specific,
}

impl ProbeKind {
    fn tag(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Specific => "specific",
        }
    }
}

/// Globally unique identity of one probe task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub probe: ProbeKind,
    pub template_id: i64,
    pub actor_id: i64,
    pub database_id: i64,
    pub object_id: i64,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:t{}:a{}:d{}:o{}",
            self.probe.tag(),
            self.template_id,
            self.actor_id,
            self.database_id,
            self.object_id
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed task key '{0}'")]
pub struct TaskKeyError(String);

impl FromStr for TaskKey {
    type Err = TaskKeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || TaskKeyError(raw.to_owned());
        let parts: Vec<&str> = raw.split(':').collect();
        let [tag, t, a, d, o] = parts.as_slice() else {
            return Err(malformed());
        };

        let probe = match *tag {
            "general" => ProbeKind::General,
            "specific" => ProbeKind::Specific,
            _ => return Err(malformed()),
        };
        let field = |part: &str, prefix: char| {
            part.strip_prefix(prefix)
                .and_then(|n| n.parse::<i64>().ok())
                .ok_or_else(malformed)
        };

        Ok(Self {
            probe,
            template_id: field(t, 't')?,
            actor_id: field(a, 'a')?,
            database_id: field(d, 'd')?,
            object_id: field(o, 'o')?,
        })
    }
}

/// One executable probe. Lives only for the run.
#[derive(Debug, Clone)]
pub struct QueryTask {
    pub key: TaskKey,
    pub sql: String,
    pub action_id: i64,
    pub expected_allow: String,
    pub expected_deny: String,
}

/// Objects needed by the object-specific pass, keyed by `(kind, database)`.
#[derive(Debug, Default)]
pub struct ObjectLookup {
    by_scope: HashMap<(String, i64), Vec<TargetObject>>,
}

impl ObjectLookup {
    #[must_use]
    pub fn new(objects: Vec<TargetObject>) -> Self {
        let mut by_scope: HashMap<(String, i64), Vec<TargetObject>> = HashMap::new();
        for object in objects {
            by_scope
                .entry((object.kind.clone(), object.database_id))
                .or_default()
                .push(object);
        }
        Self { by_scope }
    }

    #[must_use]
    pub fn get(&self, kind: &str, database_id: i64) -> &[TargetObject] {
        self.by_scope
            .get(&(kind.to_owned(), database_id))
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_scope.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_scope.is_empty()
    }
}

/// Run-wide inputs every expansion draws from.
pub struct ExpansionScope<'a> {
    pub databases: &'a [TargetDatabase],
    /// Full actor set, the object domain of the user-object kind.
    pub actors: &'a [Actor],
    pub objects: &'a ObjectLookup,
}

#[derive(Debug, Clone)]
pub struct TemplateEngine {
    user_object_kind: String,
    schema_object_kind: String,
}

impl TemplateEngine {
    #[must_use]
    pub fn new(user_object_kind: impl Into<String>, schema_object_kind: impl Into<String>) -> Self {
        Self {
            user_object_kind: user_object_kind.into(),
            schema_object_kind: schema_object_kind.into(),
        }
    }

    /// Object kinds the specific probes of `templates` read from `TargetObject`s.
    #[must_use]
    pub fn object_kinds<'t>(
        &self,
        templates: impl IntoIterator<Item = &'t PolicyTemplate>,
    ) -> BTreeSet<String> {
        templates
            .into_iter()
            .filter(|t| t.specific.is_some())
            .filter_map(|t| t.object_kind.clone())
            .filter(|kind| *kind != self.user_object_kind)
            .collect()
    }

    /// General-probe tasks for one actor.
    #[must_use]
    pub fn expand_general(
        &self,
        template: &PolicyTemplate,
        actor: &Actor,
        scope: &ExpansionScope<'_>,
    ) -> Vec<QueryTask> {
        let Some(probe) = &template.general else {
            return Vec::new();
        };

        for_each_database(probe, scope.databases)
            .into_iter()
            .map(|database| {
                let bindings = Bindings {
                    database: database.map_or(WILDCARD, |d| d.name.as_str()),
                    user: &actor.user,
                    host: &actor.host,
                    object: WILDCARD,
                    object_host: WILDCARD,
                };
                build_task(
                    template,
                    probe,
                    ProbeKind::General,
                    actor.id,
                    database.map_or(NO_SCOPE, |d| d.id),
                    NO_SCOPE,
                    &bindings,
                )
            })
            .collect()
    }

    /// Specific-probe tasks for one actor.
    #[must_use]
    pub fn expand_specific(
        &self,
        template: &PolicyTemplate,
        actor: &Actor,
        scope: &ExpansionScope<'_>,
    ) -> Vec<QueryTask> {
        let (Some(probe), Some(kind)) = (&template.specific, template.object_kind.as_deref())
        else {
            return Vec::new();
        };

        if kind == self.user_object_kind {
            return expand_over_actors(template, probe, actor, scope);
        }
        if kind == self.schema_object_kind && !probe.sql.contains(OBJECT_PLACEHOLDER) {
            return Vec::new();
        }

        let mut tasks = Vec::new();
        for database in scope.databases {
            for object in scope.objects.get(kind, database.id) {
                let bindings = Bindings {
                    database: &database.name,
                    user: &actor.user,
                    host: &actor.host,
                    object: &object.name,
                    object_host: WILDCARD,
                };
                tasks.push(build_task(
                    template,
                    probe,
                    ProbeKind::Specific,
                    actor.id,
                    database.id,
                    object.id,
                    &bindings,
                ));
            }
        }
        tasks
    }
}

fn expand_over_actors(
    template: &PolicyTemplate,
    probe: &Probe,
    actor: &Actor,
    scope: &ExpansionScope<'_>,
) -> Vec<QueryTask> {
    let databases = for_each_database(probe, scope.databases);
    let mut tasks = Vec::with_capacity(databases.len() * scope.actors.len());
    for database in databases {
        for target in scope.actors {
            let bindings = Bindings {
                database: database.map_or(WILDCARD, |d| d.name.as_str()),
                user: &actor.user,
                host: &actor.host,
                object: &target.user,
                object_host: &target.host,
            };
            tasks.push(build_task(
                template,
                probe,
                ProbeKind::Specific,
                actor.id,
                database.map_or(NO_SCOPE, |d| d.id),
                target.id,
                &bindings,
            ));
        }
    }
    tasks
}

/// Databases a probe runs against; `None` means "not database-scoped".
fn for_each_database<'d>(
    probe: &Probe,
    databases: &'d [TargetDatabase],
) -> Vec<Option<&'d TargetDatabase>> {
    if probe.sql.contains(DATABASE_PLACEHOLDER) {
        databases.iter().map(Some).collect()
    } else {
        vec![None]
    }
}

struct Bindings<'a> {
    database: &'a str,
    user: &'a str,
    host: &'a str,
    object: &'a str,
    object_host: &'a str,
}

/// Substitute every placeholder with its SQL-literal-escaped value.
///
/// Single pass: substituted values are never rescanned for placeholders.
fn render(sql: &str, bindings: &Bindings<'_>) -> String {
    let table = [
        (OBJECT_HOST_PLACEHOLDER, bindings.object_host),
        (OBJECT_PLACEHOLDER, bindings.object),
        (DATABASE_PLACEHOLDER, bindings.database),
        (USER_PLACEHOLDER, bindings.user),
        (HOST_PLACEHOLDER, bindings.host),
    ];

    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match table.iter().find(|(p, _)| tail.starts_with(p)) {
            Some((placeholder, value)) => {
                out.push_str(&escape_literal(value));
                rest = &tail[placeholder.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn build_task(
    template: &PolicyTemplate,
    probe: &Probe,
    kind: ProbeKind,
    actor_id: i64,
    database_id: i64,
    object_id: i64,
    bindings: &Bindings<'_>,
) -> QueryTask {
    QueryTask {
        key: TaskKey {
            probe: kind,
            template_id: template.id,
            actor_id,
            database_id,
            object_id,
        },
        sql: render(&probe.sql, bindings),
        action_id: template.action_id,
        expected_allow: probe.expected_allow.clone(),
        expected_deny: probe.expected_deny.clone(),
    }
}
