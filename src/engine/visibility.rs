//! Projection of a role's grants onto per-action visibility.

use std::collections::{BTreeMap, BTreeSet};

use crate::db::models::{PermissionSnapshot, Role, Visibility};
use crate::engine::seed::WILDCARD_PERMISSION;

/// Tag clients compare to decide whether a cached snapshot is stale.
pub const POLICY_VERSION: &str = "v0.4.0-rbac-abac-json-1";

/// A granted key (or the wildcard) is enabled; an ungranted `*.read` key is
/// readonly; anything else is disabled.
pub fn action_visibility<'a, I>(
    granted: &BTreeSet<String>,
    catalog_keys: I,
) -> BTreeMap<String, Visibility>
where
    I: IntoIterator<Item = &'a str>,
{
    let wildcard = granted.contains(WILDCARD_PERMISSION);
    catalog_keys
        .into_iter()
        .map(|key| {
            let visibility = if wildcard || granted.contains(key) {
                Visibility::Enabled
            } else if key.ends_with(".read") {
                Visibility::Readonly
            } else {
                Visibility::Disabled
            };
            (key.to_string(), visibility)
        })
        .collect()
}

pub fn build_snapshot(
    role: Role,
    granted: BTreeSet<String>,
    menu_visibility: BTreeMap<String, Visibility>,
    catalog_keys: &[String],
    generated_at: String,
) -> PermissionSnapshot {
    let action_visibility = action_visibility(&granted, catalog_keys.iter().map(String::as_str));
    PermissionSnapshot {
        role,
        permissions: granted.into_iter().collect(),
        menu_visibility,
        action_visibility,
        policy_version: POLICY_VERSION.to_string(),
        generated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grants(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn wildcard_enables_everything() {
        let out = action_visibility(&grants(&["*"]), ["project.write", "share.approve"]);
        assert!(out.values().all(|v| *v == Visibility::Enabled));
    }

    #[test]
    fn ungranted_reads_are_readonly() {
        let out = action_visibility(
            &grants(&["project.read"]),
            ["project.read", "admin.audit.read", "project.write"],
        );
        assert_eq!(out["project.read"], Visibility::Enabled);
        assert_eq!(out["admin.audit.read"], Visibility::Readonly);
        assert_eq!(out["project.write"], Visibility::Disabled);
    }

    #[test]
    fn snapshot_permissions_come_out_sorted() {
        let snapshot = build_snapshot(
            Role::Viewer,
            grants(&["resource.read", "conversation.read"]),
            BTreeMap::new(),
            &["conversation.read".to_string()],
            "2026-01-01T00:00:00Z".into(),
        );
        assert_eq!(snapshot.permissions, vec!["conversation.read", "resource.read"]);
        assert_eq!(snapshot.policy_version, POLICY_VERSION);
    }

    proptest! {
        #[test]
        fn visibility_never_hides_and_only_reads_go_readonly(
            granted in proptest::collection::btree_set("[a-c]\\.(read|write)", 0..4),
            catalog in proptest::collection::vec("[a-c]\\.(read|write)", 0..8),
        ) {
            let out = action_visibility(&granted, catalog.iter().map(String::as_str));
            for (key, visibility) in &out {
                prop_assert_ne!(*visibility, Visibility::Hidden);
                if *visibility == Visibility::Readonly {
                    prop_assert!(key.ends_with(".read"));
                    prop_assert!(!granted.contains(key));
                }
                prop_assert_eq!(*visibility == Visibility::Enabled, granted.contains(key));
            }
        }
    }
}
