//! ZooKeeper Backend Tests
//!
//! The provider against a real ensemble. Tests that need a running server
//! are ignored by default; point `STATEKEEPER_ZK_CONNECT` at an ensemble and
//! run them with `--ignored`.

use crate::common::*;
use statekeeper::prelude::*;
use std::time::Duration;

fn zk_connect() -> String {
    std::env::var("STATEKEEPER_ZK_CONNECT").unwrap_or_else(|_| "localhost:2181".to_string())
}

fn zk_config(connect: &str, root: &str) -> ProviderConfig {
    ProviderConfig::builder(connect)
        .identifier("zk-test-provider")
        .root_node(root)
        .session_timeout(Duration::from_secs(6))
        .connection_timeout(Duration::from_secs(10))
        .retry(fast_retry())
        .build()
}

fn zk_provider(root: &str) -> VersionedStateProvider {
    init_tracing();
    let provider = VersionedStateProvider::zookeeper();
    provider.initialize(zk_config(&zk_connect(), root)).unwrap();
    provider.enable().unwrap();
    provider
}

fn unique_root(name: &str) -> String {
    format!(
        "/statekeeper-tests/{}-{}-{}",
        name,
        std::process::id(),
        chrono::Utc::now().timestamp_millis()
    )
}

/// An endpoint nobody answers on must fail `enable`, not fall back to
/// process-local storage
#[test]
fn test_unreachable_ensemble_fails_enable() {
    init_tracing();
    let provider = VersionedStateProvider::zookeeper();
    provider
        .initialize(
            ProviderConfig::builder("zk1.example.invalid:2181")
                .session_timeout(Duration::from_millis(200))
                .connection_timeout(Duration::from_secs(1))
                .retry(fast_retry())
                .build(),
        )
        .unwrap();

    let err = provider.enable().unwrap_err();
    assert!(err.is_connectivity(), "unexpected error: {}", err);
    assert_eq!(provider.lifecycle(), LifecycleState::Initialized);
}

#[test]
fn test_tls_context_is_refused() {
    init_tracing();
    let provider = VersionedStateProvider::zookeeper();
    provider
        .initialize(
            ProviderConfig::builder("localhost:2181")
                .tls(TlsContext::new(()))
                .build(),
        )
        .unwrap();
    assert!(matches!(provider.enable(), Err(Error::Coordination(_))));
    assert_eq!(provider.lifecycle(), LifecycleState::Initialized);
}

/// State written by one provider survives its shutdown and is read back by
/// a fresh provider on the same ensemble
#[test]
#[ignore] // Needs a ZooKeeper server at STATEKEEPER_ZK_CONNECT
fn test_state_survives_provider_restart() {
    let root = unique_root("restart");

    let first = zk_provider(&root);
    let written = first
        .set_state(&values(&[("offset", "42")]), "comp-1")
        .unwrap();
    first.disable().unwrap();
    first.shutdown().unwrap();

    let second = zk_provider(&root);
    let snapshot = second.get_state("comp-1").unwrap();
    assert_eq!(snapshot.get("offset"), Some("42"));
    assert_eq!(snapshot.version(), Some(written));

    second.on_component_removed("comp-1").unwrap();
    second.disable().unwrap();
    second.shutdown().unwrap();
}

#[test]
#[ignore] // Needs a ZooKeeper server at STATEKEEPER_ZK_CONNECT
fn test_replace_against_server_versions() {
    let root = unique_root("cas");
    let provider = zk_provider(&root);

    let empty = provider.get_state("comp-1").unwrap();
    assert!(provider.replace(&empty, &values(&[("a", "1")]), "comp-1").unwrap());
    let v1 = provider.get_state("comp-1").unwrap();
    assert_eq!(v1.version().map(Version::get), Some(Version::INITIAL_REVISION));

    assert!(provider.replace(&v1, &values(&[("a", "2")]), "comp-1").unwrap());
    assert!(!provider.replace(&v1, &values(&[("a", "3")]), "comp-1").unwrap());

    provider.on_component_removed("comp-1").unwrap();
    provider.set_state(&values(&[("a", "again")]), "comp-1").unwrap();
    assert!(!provider.replace(&v1, &values(&[("a", "stale")]), "comp-1").unwrap());
    assert_eq!(provider.get_state("comp-1").unwrap().get("a"), Some("again"));

    provider.on_component_removed("comp-1").unwrap();
}

#[test]
#[ignore] // Needs a ZooKeeper server at STATEKEEPER_ZK_CONNECT
fn test_creator_only_nodes_reject_other_identities() {
    let root = unique_root("acl");
    init_tracing();

    let owner = VersionedStateProvider::zookeeper();
    owner
        .initialize(
            ProviderConfig::builder(zk_connect())
                .root_node(root.as_str())
                .access_control(AccessControl::CreatorOnly)
                .credentials(Credentials::digest("owner", "secret"))
                .retry(fast_retry())
                .build(),
        )
        .unwrap();
    owner.enable().unwrap();
    owner.set_state(&values(&[("k", "v")]), "private").unwrap();

    let intruder = VersionedStateProvider::zookeeper();
    intruder
        .initialize(
            ProviderConfig::builder(zk_connect())
                .root_node(root.as_str())
                .credentials(Credentials::digest("intruder", "other"))
                .retry(fast_retry())
                .build(),
        )
        .unwrap();
    intruder.enable().unwrap();
    assert!(matches!(
        intruder.get_state("private"),
        Err(Error::AccessDenied(_))
    ));

    owner.on_component_removed("private").unwrap();
}
