//! Protected-resource matching
//!
//! Patterns come from `OrgConfig` and are compiled once; matching is a
//! pure structural check over resource kind, name substring, and tag
//! presence. A pattern with no predicates at all matches nothing, so an
//! empty config entry can never protect the whole cloud by accident.

use cell_provider::ResourceRef;
use cell_types::ProtectedPattern;

/// Compiled set of protected-resource predicates
#[derive(Debug, Clone)]
pub struct ProtectedMatcher {
    patterns: Vec<ProtectedPattern>,
}

impl ProtectedMatcher {
    pub fn new(patterns: &[ProtectedPattern]) -> Self {
        Self {
            patterns: patterns.to_vec(),
        }
    }

    /// The first pattern matching this resource, described for the
    /// veto message.
    pub fn match_for(&self, resource: &ResourceRef) -> Option<String> {
        self.patterns
            .iter()
            .find(|p| Self::matches(p, resource))
            .map(Self::describe)
    }

    /// Whether any candidate matches a protected pattern.
    pub fn any_protected<'a>(
        &self,
        resources: impl IntoIterator<Item = &'a ResourceRef>,
    ) -> Option<(&'a ResourceRef, String)> {
        resources
            .into_iter()
            .find_map(|r| self.match_for(r).map(|p| (r, p)))
    }

    fn matches(pattern: &ProtectedPattern, resource: &ResourceRef) -> bool {
        let mut any_predicate = false;

        if let Some(kind) = &pattern.kind {
            any_predicate = true;
            if !kind.eq_ignore_ascii_case(&resource.kind.to_string()) {
                return false;
            }
        }
        if let Some(needle) = &pattern.name_contains {
            any_predicate = true;
            if !resource.name.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(tag_key) = &pattern.tag_key {
            any_predicate = true;
            if !resource.tags.contains_key(tag_key) {
                return false;
            }
        }

        any_predicate
    }

    fn describe(pattern: &ProtectedPattern) -> String {
        let mut parts = Vec::new();
        if let Some(kind) = &pattern.kind {
            parts.push(format!("kind={kind}"));
        }
        if let Some(needle) = &pattern.name_contains {
            parts.push(format!("name contains {needle:?}"));
        }
        if let Some(tag_key) = &pattern.tag_key {
            parts.push(format!("tag {tag_key}"));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cell_provider::ResourceKind;
    use cell_types::OrgConfig;

    fn matcher() -> ProtectedMatcher {
        ProtectedMatcher::new(&OrgConfig::default_protected_patterns())
    }

    #[test]
    fn test_lock_tables_and_backups_match_by_name() {
        let m = matcher();
        let lock = ResourceRef::new(ResourceKind::LockTable, "acme-payments-dev-tflock");
        let backup = ResourceRef::new(ResourceKind::Bucket, "acme-backups");
        let service = ResourceRef::new(ResourceKind::Service, "acme-payments-dev-automation");

        assert!(m.match_for(&lock).is_some());
        assert!(m.match_for(&backup).is_some());
        assert!(m.match_for(&service).is_none());
    }

    #[test]
    fn test_protection_tag_matches_any_kind() {
        let m = matcher();
        let tagged = ResourceRef::new(ResourceKind::Service, "acme-payments-dev-automation")
            .with_tag("cellkit:protected", "true");

        let description = m.match_for(&tagged).unwrap();
        assert!(description.contains("cellkit:protected"));
    }

    #[test]
    fn test_empty_pattern_matches_nothing() {
        let m = ProtectedMatcher::new(&[ProtectedPattern {
            kind: None,
            name_contains: None,
            tag_key: None,
        }]);
        let resource = ResourceRef::new(ResourceKind::Bucket, "anything");

        assert!(m.match_for(&resource).is_none());
    }

    #[test]
    fn test_kind_predicate_restricts_matches() {
        let m = ProtectedMatcher::new(&[ProtectedPattern {
            kind: Some("bucket".into()),
            name_contains: Some("audit".into()),
            tag_key: None,
        }]);

        let bucket = ResourceRef::new(ResourceKind::Bucket, "acme-audit-trail");
        let table = ResourceRef::new(ResourceKind::LockTable, "acme-audit-trail");
        assert!(m.match_for(&bucket).is_some());
        assert!(m.match_for(&table).is_none());
    }
}
