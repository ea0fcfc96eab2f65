//! Reserved identity namespace and per-prefix reconciliation policy.
//!
//! # Responsibility
//! - Decide which ids the reconciler owns and may prune.
//! - Hold the explicit per-prefix policy table for sub-namespaces that get
//!   stricter treatment than item-level flags request.
//!
//! # Invariants
//! - Every definition id starts with `NAMESPACE_SENTINEL`.
//! - Branches and attributes whose relevant id lies outside the namespace
//!   are never mutated or deleted.

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading character marking an id as owned by the reconciler.
pub const NAMESPACE_SENTINEL: char = '_';

/// Sentinel `note_position` for the one item that must always sort last.
pub const MAX_NOTE_POSITION: i64 = 999_999_999;

static DEFINITION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^_[A-Za-z0-9_]+$").expect("valid definition id regex"));

/// Returns whether an id lies inside the reserved namespace.
pub fn in_namespace(id: &str) -> bool {
    id.starts_with(NAMESPACE_SENTINEL)
}

/// Returns whether an id is acceptable as a definition-item id.
pub fn is_valid_definition_id(id: &str) -> bool {
    DEFINITION_ID_RE.is_match(id)
}

/// Reconciliation policy applied to every id under one namespace prefix.
///
/// The table is deliberately explicit: stricter cleanup for a sub-namespace
/// is a stated policy here, never an inferred rule.
#[derive(Debug, Clone, Copy)]
pub struct NamespacePolicy {
    pub prefix: &'static str,
    /// Branches of matching notes converge to the definition's parent set.
    pub enforce_branches: bool,
    /// Titles of matching notes always converge to the declared title.
    pub restore_names: bool,
    /// `iconClass` labels on matching notes are authoritative to overwrite.
    pub authoritative_icon: bool,
}

const POLICIES: &[NamespacePolicy] = &[
    NamespacePolicy {
        prefix: "_help",
        enforce_branches: true,
        restore_names: true,
        authoritative_icon: false,
    },
    NamespacePolicy {
        prefix: "_lb",
        enforce_branches: true,
        restore_names: false,
        authoritative_icon: true,
    },
];

/// Looks up the policy covering an id, if any prefix matches.
pub fn policy_for(id: &str) -> Option<&'static NamespacePolicy> {
    POLICIES.iter().find(|policy| id.starts_with(policy.prefix))
}

#[cfg(test)]
mod tests {
    use super::{in_namespace, is_valid_definition_id, policy_for};

    #[test]
    fn namespace_membership_checks_leading_sentinel() {
        assert!(in_namespace("_system"));
        assert!(!in_namespace("root"));
        assert!(!in_namespace("abCd12Ef34"));
    }

    #[test]
    fn definition_ids_require_sentinel_and_safe_charset() {
        assert!(is_valid_definition_id("_lbSpacer1"));
        assert!(is_valid_definition_id("_help_9f2c"));
        assert!(!is_valid_definition_id("lbSpacer1"));
        assert!(!is_valid_definition_id("_"));
        assert!(!is_valid_definition_id("_bad id"));
    }

    #[test]
    fn policy_table_covers_help_and_launcher_bar() {
        let help = policy_for("_help_intro").expect("help policy");
        assert!(help.enforce_branches);
        assert!(help.restore_names);
        assert!(!help.authoritative_icon);

        let launcher = policy_for("_lbSearch").expect("launcher policy");
        assert!(launcher.enforce_branches);
        assert!(!launcher.restore_names);
        assert!(launcher.authoritative_icon);

        assert!(policy_for("_system").is_none());
    }
}
