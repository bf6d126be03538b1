//! Cluster Tests
//!
//! Several providers sharing one ensemble behave like cluster members

use crate::common::*;
use statekeeper::prelude::*;

#[test]
fn test_providers_see_each_others_writes() {
    let ensemble = InMemoryEnsemble::new();
    let node_a = enabled_provider(&ensemble);
    let node_b = enabled_provider(&ensemble);

    let version = node_a.set_state(&values(&[("owner", "a")]), "comp-1").unwrap();
    let seen = node_b.get_state("comp-1").unwrap();
    assert_eq!(seen.get("owner"), Some("a"));
    assert_eq!(seen.version(), Some(version));
    assert_eq!(ensemble.session_count(), 2);
}

#[test]
fn test_cas_across_providers() {
    let ensemble = InMemoryEnsemble::new();
    let node_a = enabled_provider(&ensemble);
    let node_b = enabled_provider(&ensemble);
    node_a.set_state(&values(&[("n", "0")]), "comp-1").unwrap();

    let seen_by_a = node_a.get_state("comp-1").unwrap();
    let seen_by_b = node_b.get_state("comp-1").unwrap();
    assert_eq!(seen_by_a, seen_by_b);

    assert!(node_b.replace(&seen_by_b, &values(&[("n", "b")]), "comp-1").unwrap());
    assert!(!node_a.replace(&seen_by_a, &values(&[("n", "a")]), "comp-1").unwrap());
    assert_eq!(node_a.get_state("comp-1").unwrap().get("n"), Some("b"));
}

#[test]
fn test_removal_visible_to_peer() {
    let ensemble = InMemoryEnsemble::new();
    let node_a = enabled_provider(&ensemble);
    let node_b = enabled_provider(&ensemble);

    node_a.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    node_b.on_component_removed("comp-1").unwrap();
    assert_eq!(node_a.get_state("comp-1").unwrap().version(), None);
}

#[test]
fn test_different_roots_are_isolated() {
    let ensemble = InMemoryEnsemble::new();
    let team1 = enabled_provider(&ensemble);
    let mut config = test_config();
    config.root_node = "/app/team2/testing".to_string();
    let team2 = provider_with(&ensemble, config);

    team1.set_state(&values(&[("team", "1")]), "comp-1").unwrap();
    assert_eq!(team2.get_state("comp-1").unwrap().version(), None);
    assert!(team2.stored_component_ids().unwrap().is_empty());
    assert_eq!(team1.stored_component_ids().unwrap(), vec![ComponentId::new("comp-1")]);
}

#[test]
fn test_peer_shutdown_leaves_others_running() {
    let ensemble = InMemoryEnsemble::new();
    let node_a = enabled_provider(&ensemble);
    let node_b = enabled_provider(&ensemble);

    node_a.disable().unwrap();
    node_a.shutdown().unwrap();
    assert_eq!(ensemble.session_count(), 1);

    node_b.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    assert_eq!(node_b.connection_state(), ConnectionState::Connected);
}

#[test]
fn test_peer_session_expiry_is_isolated() {
    let ensemble = InMemoryEnsemble::new();
    let node_a = enabled_provider(&ensemble);
    let node_b = enabled_provider(&ensemble);
    let ids = ensemble.session_ids();

    ensemble.expire_session(ids[0]);
    let states = [node_a.connection_state(), node_b.connection_state()];
    assert!(states.contains(&ConnectionState::SessionExpired));
    assert!(states.contains(&ConnectionState::Connected));

    node_a.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    node_b.set_state(&values(&[("b", "1")]), "comp-2").unwrap();
    assert_eq!(ensemble.session_count(), 2);
}
