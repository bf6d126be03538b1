//! Lifecycle Tests
//!
//! UNINITIALIZED -> INITIALIZED -> ENABLED -> DISABLED -> SHUT_DOWN

use crate::common::*;
use statekeeper::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn assert_data_ops_rejected(provider: &VersionedStateProvider) {
    let state = provider.lifecycle();
    let check = |result: Result<()>| match result {
        Err(Error::IllegalState { state: seen, .. }) => assert_eq!(seen, state),
        other => panic!("expected IllegalState in {}, got {:?}", state, other),
    };
    let empty = StateSnapshot::empty("comp-1");
    check(provider.get_state("comp-1").map(|_| ()));
    check(provider.set_state(&values(&[("a", "1")]), "comp-1").map(|_| ()));
    check(provider.replace(&empty, &values(&[("a", "1")]), "comp-1").map(|_| ()));
    check(provider.on_component_removed("comp-1"));
    check(provider.clear("comp-1").map(|_| ()));
    check(provider.stored_component_ids().map(|_| ()));
}

#[test]
fn test_full_lifecycle() {
    init_tracing();
    let ensemble = InMemoryEnsemble::new();
    let provider = VersionedStateProvider::new(Arc::new(ensemble.clone()));

    assert_eq!(provider.lifecycle(), LifecycleState::Uninitialized);
    assert_data_ops_rejected(&provider);

    provider.initialize(test_config()).unwrap();
    assert_eq!(provider.lifecycle(), LifecycleState::Initialized);
    assert_data_ops_rejected(&provider);
    assert_eq!(ensemble.session_count(), 0);

    provider.enable().unwrap();
    assert_eq!(provider.lifecycle(), LifecycleState::Enabled);
    assert_eq!(provider.connection_state(), ConnectionState::Connected);
    assert_eq!(ensemble.session_count(), 1);
    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();

    provider.disable().unwrap();
    assert_eq!(provider.lifecycle(), LifecycleState::Disabled);
    assert_data_ops_rejected(&provider);
    // Disabling keeps the session
    assert_eq!(ensemble.session_count(), 1);

    provider.shutdown().unwrap();
    assert_eq!(provider.lifecycle(), LifecycleState::ShutDown);
    assert_data_ops_rejected(&provider);
    assert_eq!(ensemble.session_count(), 0);
    assert_eq!(provider.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn test_transitions_are_exact() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    assert!(provider.initialize(test_config()).unwrap_err().is_illegal_state());
    assert!(provider.enable().unwrap_err().is_illegal_state());
    assert!(provider.shutdown().unwrap_err().is_illegal_state());

    provider.disable().unwrap();
    assert!(provider.disable().unwrap_err().is_illegal_state());
    assert!(provider.enable().unwrap_err().is_illegal_state());

    provider.shutdown().unwrap();
    assert!(provider.shutdown().unwrap_err().is_illegal_state());
    assert!(provider.enable().unwrap_err().is_illegal_state());
}

#[test]
fn test_state_survives_provider_restart() {
    let ensemble = InMemoryEnsemble::new();
    let first = enabled_provider(&ensemble);
    let version = first.set_state(&values(&[("offset", "42")]), "comp-1").unwrap();
    first.disable().unwrap();
    first.shutdown().unwrap();

    let second = enabled_provider(&ensemble);
    let snapshot = second.get_state("comp-1").unwrap();
    assert_eq!(snapshot.get("offset"), Some("42"));
    assert_eq!(snapshot.version(), Some(version));
}

#[test]
fn test_enable_failure_stays_initialized() {
    init_tracing();
    let ensemble = InMemoryEnsemble::new();
    ensemble.set_available(false);
    let provider = VersionedStateProvider::new(Arc::new(ensemble.clone()));
    provider.initialize(test_config()).unwrap();

    let err = provider.enable().unwrap_err();
    assert!(err.is_connectivity(), "{:?}", err);
    assert_eq!(provider.lifecycle(), LifecycleState::Initialized);

    ensemble.set_available(true);
    provider.enable().unwrap();
    assert_eq!(provider.lifecycle(), LifecycleState::Enabled);
}

#[test]
fn test_enable_bounded_by_connection_timeout() {
    init_tracing();
    let ensemble = InMemoryEnsemble::new();
    ensemble.set_available(false);
    let mut config = test_config();
    config.connection_timeout = Duration::from_millis(150);
    config.retry = RetryPolicy {
        max_attempts: u32::MAX,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(50),
        multiplier: 2.0,
    };
    let provider = VersionedStateProvider::new(Arc::new(ensemble));
    provider.initialize(config).unwrap();

    let started = std::time::Instant::now();
    assert!(provider.enable().unwrap_err().is_connectivity());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_initialize_rejects_bad_config() {
    let bad_configs = vec![
        ProviderConfig::builder("localhost:2181").root_node("relative").build(),
        ProviderConfig::builder("localhost:2181").root_node("/").build(),
        ProviderConfig::builder("localhost:2181").root_node("/a//b").build(),
        ProviderConfig::builder("localhost:2181").root_node("/zookeeper/x").build(),
        ProviderConfig::builder("").build(),
        ProviderConfig::builder("host:notaport").build(),
        ProviderConfig::builder("localhost:2181")
            .session_timeout(Duration::ZERO)
            .build(),
        ProviderConfig::builder("localhost:2181")
            .access_control(AccessControl::CreatorOnly)
            .build(),
    ];

    for config in bad_configs {
        let provider = VersionedStateProvider::new(Arc::new(InMemoryEnsemble::new()));
        let described = format!("{:?}", config);
        assert!(
            matches!(provider.initialize(config), Err(Error::Configuration(_))),
            "accepted {}",
            described
        );
        assert_eq!(provider.lifecycle(), LifecycleState::Uninitialized);
    }
}
