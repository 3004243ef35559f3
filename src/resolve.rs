//! Bundle spec resolution: from the text a worksheet author wrote to a
//! concrete bundle identity and a fresh metadata snapshot.
//!
//! A spec is tried as, in order: a positional reference (`^`, `^N`), a UUID
//! literal, a bare name resolved by the collaborator. Resolution never
//! raises — every failure becomes [`Resolution::Unresolved`] and the
//! interpreter decides how to surface it.

use tracing::debug;
use uuid::Uuid;

use crate::client::BundleClient;
use crate::model::Resolution;

/// A parsed bundle spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSpec {
    /// A UUID literal.
    Uuid(Uuid),

    /// `^N`: the bundle referenced N items back on this worksheet (`^` is
    /// `^1`). Resolved against the raw item sequence, since interpretation
    /// has not completed when references resolve top-to-bottom.
    Offset(usize),

    /// A bare name, resolved in the caller's namespace by the collaborator.
    Name(String),
}

impl BundleSpec {
    /// Classify a spec string. Never fails: anything that is not a
    /// positional reference or a UUID is a name.
    pub fn parse(text: &str) -> Self {
        if text == "^" {
            return Self::Offset(1);
        }
        if let Some(digits) = text.strip_prefix('^')
            && let Ok(n) = digits.parse::<usize>()
            && n >= 1
        {
            return Self::Offset(n);
        }
        if let Ok(uuid) = Uuid::parse_str(text) {
            return Self::Uuid(uuid);
        }
        Self::Name(text.to_string())
    }
}

/// Resolve one spec to a bundle snapshot.
///
/// `prior_refs` holds the identity of each bundle reference appearing
/// earlier in the raw item sequence, in order; entries are `None` when the
/// earlier reference itself failed to resolve.
pub fn resolve(
    client: &dyn BundleClient,
    spec: &str,
    prior_refs: &[Option<Uuid>],
) -> Resolution {
    match BundleSpec::parse(spec) {
        BundleSpec::Offset(n) => {
            let Some(slot) = prior_refs.len().checked_sub(n) else {
                return Resolution::Unresolved {
                    reason: format!(
                        "{spec} points past the start of the worksheet \
                         ({} reference(s) precede it)",
                        prior_refs.len()
                    ),
                };
            };
            match prior_refs[slot] {
                Some(uuid) => fetch(client, &uuid.to_string()),
                None => Resolution::Unresolved {
                    reason: format!("{spec} points at a reference that did not resolve"),
                },
            }
        }
        BundleSpec::Uuid(_) | BundleSpec::Name(_) => fetch(client, spec),
    }
}

/// Ask the collaborator for a snapshot, folding every failure into
/// [`Resolution::Unresolved`].
fn fetch(client: &dyn BundleClient, spec: &str) -> Resolution {
    match client.get_bundle_info(spec) {
        Ok(Some(info)) => {
            debug!(spec, uuid = %info.uuid, "resolved bundle spec");
            Resolution::Resolved {
                uuid: info.uuid,
                info: Box::new(info),
            }
        }
        Ok(None) => Resolution::Unresolved {
            reason: format!("bundle not found: {spec}"),
        },
        Err(e) => {
            debug!(spec, error = %e, "bundle spec resolution failed");
            Resolution::Unresolved {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use crate::client::ClientError;
    use crate::model::{BundleInfo, BundleState, Target, TargetInfo, WorksheetItem, WorksheetSummary};

    fn info(uuid: Uuid, name: &str) -> BundleInfo {
        BundleInfo {
            uuid,
            bundle_type: "dataset".to_string(),
            state: BundleState::Ready,
            metadata: BTreeMap::from([(
                "name".to_string(),
                serde_json::Value::String(name.to_string()),
            )]),
            owner_name: Some("casey".to_string()),
            permission: Some("all".to_string()),
            data_hash: None,
        }
    }

    /// Knows a fixed set of bundles by name and by UUID; errors on demand.
    struct FakeClient {
        bundles: Vec<(String, BundleInfo)>,
        fail_with: Option<ClientError>,
    }

    impl FakeClient {
        fn with(bundles: Vec<(String, BundleInfo)>) -> Self {
            Self {
                bundles,
                fail_with: None,
            }
        }
    }

    impl BundleClient for FakeClient {
        fn get_bundle_info(&self, spec: &str) -> Result<Option<BundleInfo>, ClientError> {
            if let Some(e) = &self.fail_with {
                return Err(e.clone());
            }
            Ok(self
                .bundles
                .iter()
                .find(|(name, b)| name == spec || b.uuid.to_string() == spec)
                .map(|(_, b)| b.clone()))
        }

        fn search_bundles(&self, _: &[String]) -> Result<Vec<BundleInfo>, ClientError> {
            Ok(vec![])
        }

        fn search_worksheets(&self, _: &[String]) -> Result<Vec<WorksheetSummary>, ClientError> {
            Ok(vec![])
        }

        fn head_target(
            &self,
            _: &Target,
            _: usize,
        ) -> Result<Option<Vec<Vec<u8>>>, ClientError> {
            Ok(None)
        }

        fn get_target_info(
            &self,
            _: &Target,
            _: usize,
        ) -> Result<Option<TargetInfo>, ClientError> {
            Ok(None)
        }

        fn persist_worksheet_items(
            &self,
            _: Uuid,
            _: &[WorksheetItem],
        ) -> Result<(), ClientError> {
            Ok(())
        }

        fn resolve_owner_name(&self, _: &str) -> Result<Option<String>, ClientError> {
            Ok(None)
        }
    }

    #[test]
    fn parse_classifies_specs() {
        let uuid = Uuid::new_v4();
        assert_eq!(BundleSpec::parse("^"), BundleSpec::Offset(1));
        assert_eq!(BundleSpec::parse("^3"), BundleSpec::Offset(3));
        assert_eq!(BundleSpec::parse(&uuid.to_string()), BundleSpec::Uuid(uuid));
        assert_eq!(
            BundleSpec::parse("mnist-data"),
            BundleSpec::Name("mnist-data".to_string())
        );
        // Degenerate positional forms are names, not errors.
        assert_eq!(
            BundleSpec::parse("^0"),
            BundleSpec::Name("^0".to_string())
        );
        assert_eq!(
            BundleSpec::parse("^x"),
            BundleSpec::Name("^x".to_string())
        );
    }

    #[test]
    fn resolves_by_name() {
        let uuid = Uuid::new_v4();
        let client = FakeClient::with(vec![("mnist".to_string(), info(uuid, "mnist"))]);

        let resolution = resolve(&client, "mnist", &[]);

        assert!(matches!(
            resolution,
            Resolution::Resolved { uuid: u, .. } if u == uuid
        ));
    }

    #[test]
    fn resolves_by_uuid() {
        let uuid = Uuid::new_v4();
        let client = FakeClient::with(vec![("mnist".to_string(), info(uuid, "mnist"))]);

        let resolution = resolve(&client, &uuid.to_string(), &[]);

        assert!(matches!(resolution, Resolution::Resolved { .. }));
    }

    #[test]
    fn unknown_spec_is_unresolved_not_an_error() {
        let client = FakeClient::with(vec![]);

        let resolution = resolve(&client, "missing", &[]);

        assert!(matches!(
            resolution,
            Resolution::Unresolved { reason } if reason.contains("missing")
        ));
    }

    #[test]
    fn transport_failure_is_unresolved() {
        let mut client = FakeClient::with(vec![]);
        client.fail_with = Some(ClientError::Transport("connection reset".to_string()));

        let resolution = resolve(&client, "whatever", &[]);

        assert!(matches!(
            resolution,
            Resolution::Unresolved { reason } if reason.contains("connection reset")
        ));
    }

    #[test]
    fn positional_specs_count_back_from_the_end() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let client = FakeClient::with(vec![
            ("a".to_string(), info(first, "a")),
            ("b".to_string(), info(second, "b")),
        ]);
        let prior = [Some(first), Some(second)];

        assert!(matches!(
            resolve(&client, "^", &prior),
            Resolution::Resolved { uuid, .. } if uuid == second
        ));
        assert!(matches!(
            resolve(&client, "^2", &prior),
            Resolution::Resolved { uuid, .. } if uuid == first
        ));
    }

    #[test]
    fn positional_past_start_is_unresolved() {
        let client = FakeClient::with(vec![]);

        let resolution = resolve(&client, "^2", &[Some(Uuid::new_v4())]);

        assert!(matches!(
            resolution,
            Resolution::Unresolved { reason } if reason.contains("past the start")
        ));
    }

    #[test]
    fn positional_at_unresolved_reference_is_unresolved() {
        let client = FakeClient::with(vec![]);

        let resolution = resolve(&client, "^", &[None]);

        assert!(matches!(
            resolution,
            Resolution::Unresolved { reason } if reason.contains("did not resolve")
        ));
    }
}
