//! Compare-and-Swap Tests
//!
//! replace() against current, stale and absent versions

use crate::common::*;
use statekeeper::prelude::*;

/// The reference scenario: v1, replace to v2, stale replace rejected
#[test]
fn test_replace_scenario() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    let v1 = provider.get_state("comp-1").unwrap();
    assert_eq!(v1.get("a"), Some("1"));
    assert_eq!(v1.version().map(Version::get), Some(1));

    assert!(provider.replace(&v1, &values(&[("a", "2")]), "comp-1").unwrap());
    let v2 = provider.get_state("comp-1").unwrap();
    assert_eq!(v2.get("a"), Some("2"));
    assert_eq!(v2.version().map(Version::get), Some(2));

    assert!(!provider.replace(&v1, &values(&[("a", "3")]), "comp-1").unwrap());
    let after = provider.get_state("comp-1").unwrap();
    assert_eq!(after.get("a"), Some("2"));
    assert_eq!(after.version().map(Version::get), Some(2));
}

#[test]
fn test_replace_current_version_strictly_increases() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);
    provider.set_state(&values(&[("n", "0")]), "counter").unwrap();

    let mut last = provider.get_state("counter").unwrap();
    for n in 1..=10 {
        let next = values(&[("n", &n.to_string())]);
        assert!(provider.replace(&last, &next, "counter").unwrap());
        let current = provider.get_state("counter").unwrap();
        assert!(current.version() > last.version());
        assert_eq!(current.values(), &next);
        last = current;
    }
}

#[test]
fn test_stale_replace_keeps_intervening_write() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    let stale = provider.get_state("comp-1").unwrap();
    provider.set_state(&values(&[("a", "intervening")]), "comp-1").unwrap();

    assert!(!provider.replace(&stale, &values(&[("a", "lost")]), "comp-1").unwrap());
    assert_eq!(
        provider.get_state("comp-1").unwrap().get("a"),
        Some("intervening")
    );
}

#[test]
fn test_replace_on_absent_component_creates() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    let empty = provider.get_state("fresh").unwrap();
    assert!(provider.replace(&empty, &values(&[("a", "1")]), "fresh").unwrap());

    let snapshot = provider.get_state("fresh").unwrap();
    assert_eq!(snapshot.get("a"), Some("1"));
    assert_eq!(snapshot.version().map(Version::get), Some(Version::INITIAL_REVISION));
}

#[test]
fn test_replace_expecting_absent_fails_when_present() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    let empty = provider.get_state("comp-1").unwrap();
    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();

    assert!(!provider.replace(&empty, &values(&[("a", "2")]), "comp-1").unwrap());
    assert_eq!(provider.get_state("comp-1").unwrap().get("a"), Some("1"));
}

#[test]
fn test_replace_after_remove_fails() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    let snapshot = provider.get_state("comp-1").unwrap();
    provider.on_component_removed("comp-1").unwrap();

    assert!(!provider.replace(&snapshot, &values(&[("a", "2")]), "comp-1").unwrap());
    assert_eq!(provider.get_state("comp-1").unwrap().version(), None);
}

/// Remove, recreate and write again: the recreated node reaches the same
/// data version as the snapshot, but belongs to a later generation
#[test]
fn test_replace_with_snapshot_from_before_removal_fails() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    provider.set_state(&values(&[("a", "1")]), "comp-1").unwrap();
    let stale = provider.get_state("comp-1").unwrap();
    assert_eq!(stale.version().map(Version::get), Some(1));

    provider.on_component_removed("comp-1").unwrap();
    provider.set_state(&values(&[("a", "other")]), "comp-1").unwrap();
    let current = provider.get_state("comp-1").unwrap();
    assert_eq!(current.version().map(Version::get), Some(1));
    assert_ne!(current.version(), stale.version());

    assert!(!provider.replace(&stale, &values(&[("a", "lost")]), "comp-1").unwrap());
    assert_eq!(provider.get_state("comp-1").unwrap().get("a"), Some("other"));

    // The fresh snapshot still wins
    assert!(provider.replace(&current, &values(&[("a", "mine")]), "comp-1").unwrap());
}

#[test]
fn test_fetch_modify_replace_loop() {
    let ensemble = InMemoryEnsemble::new();
    let provider = enabled_provider(&ensemble);

    // A competing writer bumps the state once, the loop must absorb it
    let mut interfered = false;
    loop {
        let snapshot = provider.get_state("comp-1").unwrap();
        if !interfered {
            provider.set_state(&values(&[("seen", "other")]), "comp-1").unwrap();
            interfered = true;
        }
        let mut next = snapshot.values().clone();
        next.insert("mine".to_string(), "yes".to_string());
        if provider.replace(&snapshot, &next, "comp-1").unwrap() {
            break;
        }
    }

    let finished = provider.get_state("comp-1").unwrap();
    assert_eq!(finished.get("seen"), Some("other"));
    assert_eq!(finished.get("mine"), Some("yes"));
}
