//! Tests for environment-based credential loading

use std::collections::HashMap;
use std::env;

use crate::error::OrchestratorError;
use crate::services::api_keys::RealCredentialSource;
use crate::traits::CredentialSource;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_comma_separated_list() {
    let source = RealCredentialSource::new();
    let credentials = source
        .collect(lookup_from(&[("DISCOVERY_API_KEYS", "key-a, key-b ,key-c")]))
        .unwrap();

    let keys: Vec<_> = credentials.iter().map(|c| c.api_key.as_str()).collect();
    assert_eq!(keys, vec!["key-a", "key-b", "key-c"]);
    let indices: Vec<_> = credentials.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_numbered_keys_stop_at_first_gap() {
    let source = RealCredentialSource::new();
    let credentials = source
        .collect(lookup_from(&[
            ("DISCOVERY_API_KEY_1", "one"),
            ("DISCOVERY_API_KEY_2", "two"),
            ("DISCOVERY_API_KEY_4", "four"),
        ]))
        .unwrap();

    assert_eq!(credentials.len(), 2);
    assert_eq!(credentials[1].label, "DISCOVERY_API_KEY_2");
}

#[test]
fn test_duplicates_and_blanks_are_dropped() {
    let source = RealCredentialSource::new();
    let credentials = source
        .collect(lookup_from(&[
            ("DISCOVERY_API_KEYS", "shared,,shared"),
            ("DISCOVERY_API_KEY_1", "shared"),
            ("DISCOVERY_API_KEY_2", "own"),
        ]))
        .unwrap();

    let keys: Vec<_> = credentials.iter().map(|c| c.api_key.as_str()).collect();
    assert_eq!(keys, vec!["shared", "own"]);
}

#[test]
fn test_no_keys_is_missing_credential() {
    let source = RealCredentialSource::new();
    let err = source.collect(lookup_from(&[])).unwrap_err();

    match err {
        OrchestratorError::MissingCredential { key_name } => {
            assert!(key_name.contains("DISCOVERY_API_KEYS"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Reads the real process environment under a prefix no other test touches
#[tokio::test]
async fn test_load_credentials_from_environment() {
    env::set_var("RSTEST_ENVLOAD_API_KEYS", "env-a,env-b");
    let source = RealCredentialSource::with_prefix("RSTEST_ENVLOAD");

    let credentials = source.load_credentials().await.unwrap();
    env::remove_var("RSTEST_ENVLOAD_API_KEYS");

    assert_eq!(credentials.len(), 2);
    assert_eq!(credentials[0].api_key, "env-a");
}
