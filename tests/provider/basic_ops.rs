//! Basic Operations Tests
//!
//! get_state, set_state, on_component_removed, clear, stored_component_ids

use crate::common::*;
use statekeeper::prelude::*;

#[test]
fn test_get_unknown_component_is_empty() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    let snapshot = provider.get_state("never-written").unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.version(), None);
}

#[test]
fn test_set_then_get() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    let stored = values(&[("offset", "1024"), ("file", "/data/in/a.csv")]);
    let version = provider.set_state(&stored, "list-files-1").unwrap();

    let snapshot = provider.get_state("list-files-1").unwrap();
    assert_eq!(snapshot.values(), &stored);
    assert_eq!(snapshot.version(), Some(version));
    assert_eq!(snapshot.get("offset"), Some("1024"));
}

#[test]
fn test_components_are_independent() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    provider.set_state(&values(&[("a", "2")]), "comp-2").unwrap();

    assert_eq!(provider.get_state("comp-1").unwrap().get("a"), Some("1"));
    assert_eq!(provider.get_state("comp-2").unwrap().get("a"), Some("2"));
}

#[test]
fn test_remove_then_get_is_empty() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    provider.on_component_removed("comp-1").unwrap();

    let snapshot = provider.get_state("comp-1").unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.version(), None);
    assert_eq!(
        ensemble.stat(&format!("{}/components/comp-1", TEST_ROOT)),
        None
    );
}

#[test]
fn test_remove_twice_is_fine() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    provider.on_component_removed("comp-1").unwrap();
    provider.on_component_removed("comp-1").unwrap();
    provider.on_component_removed("never-written").unwrap();
}

#[test]
fn test_recreate_after_remove_starts_new_generation() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    let old = provider.set_state(&values(&[("a", "2")]), "comp-1").unwrap();
    provider.on_component_removed("comp-1").unwrap();

    let version = provider.set_state(&values(&[("a", "3")]), "comp-1").unwrap();
    assert_eq!(version.get(), Version::INITIAL_REVISION);
    assert!(version.generation() > old.generation());
    assert!(version > old);
}

#[test]
fn test_empty_map_round_trips() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    let version = provider.set_state(&values(&[]), "comp-1").unwrap();
    let snapshot = provider.get_state("comp-1").unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.version(), Some(version));
}

#[test]
fn test_clear_advances_version() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    let v1 = provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    let v2 = provider.clear("comp-1").unwrap();
    assert!(v2 > v1);
    assert!(provider.get_state("comp-1").unwrap().is_empty());
}

#[test]
fn test_unusual_component_ids() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    let ids = ["a/b", "a%2Fb", ".", "..", "with space", "ünïcödé", "zookeeper"];
    for (i, id) in ids.iter().enumerate() {
        provider
            .set_state(&values(&[("i", &i.to_string())]), *id)
            .unwrap();
    }
    for (i, id) in ids.iter().enumerate() {
        let snapshot = provider.get_state(*id).unwrap();
        assert_eq!(snapshot.get("i"), Some(i.to_string().as_str()), "id {:?}", id);
    }

    let mut expected: Vec<ComponentId> = ids.iter().map(|id| ComponentId::new(*id)).collect();
    expected.sort();
    assert_eq!(provider.stored_component_ids().unwrap(), expected);
}

#[test]
fn test_values_with_unicode_and_empty_strings() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    let stored = values(&[("", "empty key"), ("empty value", ""), ("κλειδί", "τιμή")]);
    provider.set_state(&stored, "comp-1").unwrap();
    assert_eq!(provider.get_state("comp-1").unwrap().values(), &stored);
}

#[test]
fn test_root_deleted_out_of_band() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    ensemble.remove_subtree(TEST_ROOT);

    assert_eq!(provider.get_state("comp-1").unwrap().version(), None);
    assert!(provider.stored_component_ids().unwrap().is_empty());

    // Parents are recreated on the next write
    let version = provider.set_state(&values(&[("a", "2")]), "comp-1").unwrap();
    assert_eq!(version.get(), Version::INITIAL_REVISION);
}
