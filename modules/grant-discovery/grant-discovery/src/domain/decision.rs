//! Allow/deny comparison of a probe output against a template's literals.

use super::snapshot::NULL_LITERAL;

/// Expected-allow sentinel matching any non-NULL output.
pub const NOT_NULL: &str = "NOT NULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    /// Neither literal matched. Treated as a deny and audited.
    Unmatched,
}

impl Decision {
    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Deny is checked first and wins over an equal allow literal.
#[must_use]
pub fn decide(output: &str, expected_allow: &str, expected_deny: &str) -> Decision {
    if output == expected_deny {
        Decision::Deny
    } else if output == expected_allow {
        Decision::Allow
    } else if expected_allow == NOT_NULL && output != NULL_LITERAL {
        Decision::Allow
    } else {
        Decision::Unmatched
    }
}

#[must_use]
pub fn is_allowed(output: &str, expected_allow: &str, expected_deny: &str) -> bool {
    decide(output, expected_allow, expected_deny).is_allow()
}
