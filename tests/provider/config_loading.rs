//! Configuration Loading Tests
//!
//! Property maps and TOML files feeding a live provider

use crate::common::*;
use statekeeper::prelude::*;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_provider_from_properties() {
    let properties: HashMap<String, String> = [
        ("Connect String", "localhost:2181"),
        ("Session Timeout", "3 secs"),
        ("Root Node", TEST_ROOT),
        ("Access Control", "Open"),
        ("Connection Timeout", "500 millis"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let config = ProviderConfig::from_properties(&properties).unwrap();
    assert_eq!(config.session_timeout, Duration::from_secs(3));
    assert_eq!(config.connection_timeout, Duration::from_millis(500));

    let ensemble = InMemoryEnsemble::new();
    let provider = provider_with(&ensemble, config);
    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    assert!(ensemble.stat(&format!("{}/components/comp-1", TEST_ROOT)).is_some());
}

#[test]
fn test_unknown_access_control_rejected() {
    let properties: HashMap<String, String> = [
        ("Connect String", "localhost:2181"),
        ("Access Control", "Everyone"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    assert!(matches!(
        ProviderConfig::from_properties(&properties),
        Err(statekeeper_core::ConfigError::UnknownAccessControl(_))
    ));
}

#[test]
fn test_provider_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
identifier = "toml-provider"
connect_string = "zk1:2181,zk2:2181"
session_timeout = "3 secs"
root_node = "/app/team1/testing"
access_control = "Creator Only"

[credentials]
principal = "engine"
secret = "secret"

[retry]
max_attempts = 2
base_delay = "1 millis"
"#
    )
    .unwrap();

    let config = ProviderConfig::from_toml_file(file.path()).unwrap();
    assert_eq!(config.identifier, "toml-provider");
    assert_eq!(config.access_control, AccessControl::CreatorOnly);
    assert_eq!(config.retry.max_attempts, 2);

    let ensemble = InMemoryEnsemble::new();
    let provider = provider_with(&ensemble, config);
    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    assert_eq!(provider.get_state("comp-1").unwrap().get("a"), Some("1"));
}
