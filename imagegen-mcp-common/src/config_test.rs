//! Property-based tests for the configuration module.
//!
//! These tests drive `Config::from_lookup` with in-memory variable maps so no
//! process environment is touched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use proptest::prelude::*;

use crate::config::{Config, DEFAULT_MAX_IMAGES_TO_KEEP, DEFAULT_OPENAI_BASE_URL, DEFAULT_PORT};
use crate::error::ConfigError;

fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|name| map.get(name).cloned())
}

/// Strategy for generating API keys
fn api_key_strategy() -> impl Strategy<Value = String> {
    "sk-[A-Za-z0-9]{10,40}"
}

/// Strategy for generating valid port numbers
fn port_strategy() -> impl Strategy<Value = u16> {
    1024u16..65535u16
}

#[test]
fn missing_api_key_is_reported() {
    let err = load(&[]).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar(ref name) if name == "OPENAI_API_KEY"));
}

#[test]
fn empty_api_key_counts_as_missing() {
    let err = load(&[("OPENAI_API_KEY", "   ")]).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar(_)));
}

#[test]
fn defaults_applied_when_only_key_is_set() {
    let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();

    assert_eq!(config.openai.api_key, "sk-test");
    assert_eq!(config.openai.base_url, DEFAULT_OPENAI_BASE_URL);
    assert!(!config.openai.is_azure());
    assert!(config.flux.is_none());
    assert_eq!(config.backend_server, format!("http://localhost:{}", DEFAULT_PORT));
    assert_eq!(config.tmp_path, PathBuf::from("./images"));
    assert_eq!(config.max_images_to_keep, DEFAULT_MAX_IMAGES_TO_KEEP);
    assert!(config.gcs_bucket.is_none());
    assert_eq!(config.fetch_timeout, Duration::from_secs(30));
    assert_eq!(config.generation_timeout, Duration::from_secs(300));
}

#[test]
fn azure_flavour_selected_by_api_version() {
    let config = load(&[
        ("OPENAI_API_KEY", "key"),
        ("OPENAI_BASE_URL", "https://my-resource.openai.azure.com/"),
        ("OPENAI_API_VERSION", "2025-04-01-preview"),
    ])
    .unwrap();

    assert!(config.openai.is_azure());
    assert_eq!(config.openai.base_url, "https://my-resource.openai.azure.com");
    assert_eq!(
        config.openai.api_version.as_deref(),
        Some("2025-04-01-preview")
    );
}

#[test]
fn flux_inherits_endpoint_when_not_overridden() {
    let config = load(&[
        ("OPENAI_API_KEY", "key"),
        ("OPENAI_BASE_URL", "https://my-resource.openai.azure.com"),
        ("OPENAI_API_VERSION", "2025-04-01-preview"),
        ("FLUX_API_KEY", "flux-key"),
    ])
    .unwrap();

    let flux = config.flux.expect("flux configured");
    assert_eq!(flux.api_key, "flux-key");
    assert_eq!(flux.base_url, "https://my-resource.openai.azure.com");
    assert_eq!(flux.api_version.as_deref(), Some("2025-04-01-preview"));
}

#[test]
fn flux_endpoint_override() {
    let config = load(&[
        ("OPENAI_API_KEY", "key"),
        ("FLUX_API_KEY", "flux-key"),
        ("FLUX_BASE_URL", "https://flux.example.com/v1"),
    ])
    .unwrap();

    let flux = config.flux.expect("flux configured");
    assert_eq!(flux.base_url, "https://flux.example.com/v1");
    assert!(!flux.is_azure());
}

#[test]
fn port_variable_is_left_to_transport() {
    let config = load(&[("OPENAI_API_KEY", "key"), ("PORT", "eighty")]).unwrap();
    assert_eq!(config.backend_server, "http://localhost:8080");
}

#[test]
fn listen_port_overrides_default_backend() {
    let config = load(&[("OPENAI_API_KEY", "key")]).unwrap().with_listen_port(3001);
    assert_eq!(config.backend_server, "http://localhost:3001");
    assert_eq!(config.upload_base_url(), "http://localhost:3001/_upload");
}

#[test]
fn listen_port_keeps_explicit_backend() {
    let config = load(&[
        ("OPENAI_API_KEY", "key"),
        ("BACKEND_SERVER", "https://images.example.com"),
    ])
    .unwrap()
    .with_listen_port(3001);
    assert_eq!(config.backend_server, "https://images.example.com");
}

#[test]
fn zero_retention_is_rejected() {
    let err = load(&[("OPENAI_API_KEY", "key"), ("MAX_IMAGES_TO_KEEP", "0")]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "MAX_IMAGES_TO_KEEP"));
}

#[test]
fn upload_base_url_appends_route() {
    let config = load(&[
        ("OPENAI_API_KEY", "key"),
        ("BACKEND_SERVER", "https://images.example.com/"),
    ])
    .unwrap();
    assert_eq!(config.upload_base_url(), "https://images.example.com/_upload");
}

proptest! {
    /// The bound port feeds the default backend URL.
    #[test]
    fn port_flows_into_backend_default(key in api_key_strategy(), port in port_strategy()) {
        let config = load(&[("OPENAI_API_KEY", key.as_str())]).unwrap().with_listen_port(port);

        prop_assert_eq!(config.backend_server, format!("http://localhost:{}", port));
        prop_assert_eq!(config.openai.api_key, key);
    }

    /// Numeric settings round-trip through the environment.
    #[test]
    fn numeric_settings_parse(
        keep in 1usize..10_000,
        fetch in 1u64..600,
        generation in 1u64..3600
    ) {
        let keep_str = keep.to_string();
        let fetch_str = fetch.to_string();
        let generation_str = generation.to_string();
        let config = load(&[
            ("OPENAI_API_KEY", "key"),
            ("MAX_IMAGES_TO_KEEP", keep_str.as_str()),
            ("FETCH_TIMEOUT_SECS", fetch_str.as_str()),
            ("GENERATION_TIMEOUT_SECS", generation_str.as_str()),
        ]).unwrap();

        prop_assert_eq!(config.max_images_to_keep, keep);
        prop_assert_eq!(config.fetch_timeout, Duration::from_secs(fetch));
        prop_assert_eq!(config.generation_timeout, Duration::from_secs(generation));
    }

    /// Non-numeric timeouts are rejected with the offending variable name.
    #[test]
    fn non_numeric_timeout_rejected(raw in "[a-z]{1,10}") {
        let err = load(&[("OPENAI_API_KEY", "key"), ("FETCH_TIMEOUT_SECS", raw.as_str())]).unwrap_err();
        let is_fetch_timeout = matches!(err, ConfigError::InvalidValue(ref name, _) if name == "FETCH_TIMEOUT_SECS");
        prop_assert!(is_fetch_timeout);
    }
}
