//! Access Control Tests
//!
//! Open and creator-only ACLs on created nodes

use crate::common::*;
use statekeeper::prelude::*;
use statekeeper_coordination::NodeAcl;

fn creator_only(principal: &str) -> ProviderConfig {
    let mut config = test_config();
    config.access_control = AccessControl::CreatorOnly;
    config.credentials = Some(Credentials::digest(principal, "secret"));
    config
}

fn component_path(id: &str) -> String {
    format!("{}/components/{}", TEST_ROOT, id)
}

#[test]
fn test_open_nodes_by_default() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);
    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();

    assert_eq!(ensemble.node_acl(&component_path("comp-1")), Some(NodeAcl::Open));
    assert_eq!(ensemble.node_acl(TEST_ROOT), Some(NodeAcl::Open));
}

#[test]
fn test_creator_only_nodes_carry_identity() {
    let ensemble = InMemoryEnsemble::new();
    let owner = provider_with(&ensemble, creator_only("engine-a"));
    owner.set_state(&values(&[("a", "1")]), "comp-1").unwrap();

    let expected = NodeAcl::CreatorOnly {
        identity: "digest:engine-a".to_string(),
    };
    assert_eq!(ensemble.node_acl(&component_path("comp-1")), Some(expected.clone()));
    assert_eq!(ensemble.node_acl(TEST_ROOT), Some(expected));
    assert_eq!(owner.get_state("comp-1").unwrap().get("a"), Some("1"));
}

#[test]
fn test_creator_only_unreadable_by_other_identity() {
    let ensemble = InMemoryEnsemble::new();
    let owner = provider_with(&ensemble, creator_only("engine-a"));
    owner.set_state(&values(&[("a", "1")]), "comp-1").unwrap();

    let intruder = provider_with(&ensemble, creator_only("engine-b"));
    assert!(matches!(
        intruder.get_state("comp-1"),
        Err(Error::AccessDenied(_))
    ));
    assert!(matches!(
        intruder.set_state(&values(&[("a", "2")]), "comp-2"),
        Err(Error::AccessDenied(_))
    ));

    let anonymous = enabled_provider(&ensemble);
    assert!(matches!(
        anonymous.get_state("comp-1"),
        Err(Error::AccessDenied(_))
    ));
    assert!(!anonymous.get_state("comp-1").unwrap_err().is_retryable());

    assert_eq!(owner.get_state("comp-1").unwrap().get("a"), Some("1"));
}

#[test]
fn test_same_identity_shares_nodes() {
    let ensemble = InMemoryEnsemble::new();
    let node_a = provider_with(&ensemble, creator_only("engine"));
    let node_b = provider_with(&ensemble, creator_only("engine"));

    node_a.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    assert_eq!(node_b.get_state("comp-1").unwrap().get("a"), Some("1"));
}

#[test]
fn test_acl_reapplied_after_expiry() {
    let ensemble = InMemoryEnsemble::new();
    let owner = provider_with(&ensemble, creator_only("engine-a"));
    owner.set_state(&values(&[("a", "1")]), "comp-1").unwrap();

    ensemble.expire_all_sessions();
    owner.set_state(&values(&[("b", "1")]), "comp-2").unwrap();

    assert_eq!(
        ensemble.node_acl(&component_path("comp-2")),
        Some(NodeAcl::CreatorOnly {
            identity: "digest:engine-a".to_string()
        })
    );
}

#[test]
fn test_tls_context_passed_through() {
    let ensemble = InMemoryEnsemble::new();
    ensemble.require_tls(true);

    let without = VersionedStateProvider::new(std::sync::Arc::new(ensemble.clone()));
    without.initialize(test_config()).unwrap();
    assert!(without.enable().unwrap_err().is_connectivity());

    let mut config = test_config();
    config.tls = Some(TlsContext::new("prebuilt-ssl-context"));
    let with = provider_with(&ensemble, config);
    with.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
}
