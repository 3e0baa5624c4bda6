//! Integration tests for the full Config::from_file_with_env pipeline.
//!
//! These tests exercise the end-to-end flow: TOML file -> raw parse -> env var
//! expansion -> final Config with KeySource metadata.
//!
//! Each test uses unique env var and provider names to avoid parallel test interference.

use std::io::Write;

use chatrelay::config::{Config, ConfigError, KeySource};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}

fn source_for<'a>(key_sources: &'a [(String, KeySource)], name: &str) -> &'a KeySource {
    &key_sources
        .iter()
        .find(|(n, _)| n == name)
        .unwrap_or_else(|| panic!("key source for '{}'", name))
        .1
}

/// ${VAR} references in api_key are expanded from the environment.
#[test]
fn test_env_expansion_resolves_var() {
    let var_name = "CHATRELAY_TEST_E2E_RESOLVE_KEY";
    unsafe { std::env::set_var(var_name, "sk-resolved") };

    let file = write_config(&format!(
        r#"
[[providers]]
name = "env-test"
url = "https://example.com/v1"
model = "gpt-4o-mini"
api_key = "${{{}}}"
"#,
        var_name
    ));

    let (config, key_sources) = Config::from_file_with_env(file.path()).unwrap();

    let provider = &config.providers[0];
    assert_eq!(provider.name, "env-test");
    assert_eq!(provider.vendor, "env-test");
    assert_eq!(provider.api_key.as_ref().unwrap().expose_secret(), "sk-resolved");
    assert_eq!(source_for(&key_sources, "env-test"), &KeySource::EnvExpanded);

    unsafe { std::env::remove_var(var_name) };
}

/// A missing variable is an error naming both the variable and the provider.
#[test]
fn test_env_expansion_missing_var_errors() {
    let var_name = "CHATRELAY_TEST_E2E_DEFINITELY_UNSET";
    unsafe { std::env::remove_var(var_name) };

    let file = write_config(&format!(
        r#"
[[providers]]
name = "missing-var"
url = "https://example.com/v1"
model = "gpt-4o-mini"
api_key = "${{{}}}"
"#,
        var_name
    ));

    let err = Config::from_file_with_env(file.path()).unwrap_err();
    match &err {
        ConfigError::EnvVar { var, owner, .. } => {
            assert_eq!(var, var_name);
            assert_eq!(owner, "missing-var");
        }
        other => panic!("expected EnvVar error, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains(var_name), "{}", message);
    assert!(message.contains("missing-var"), "{}", message);
}

/// Literal keys pass through untouched.
#[test]
fn test_literal_key_passthrough() {
    let file = write_config(
        r#"
[[providers]]
name = "literal-test"
vendor = "openai"
url = "https://example.com/v1"
model = "gpt-4o-mini"
api_key = "sk-literal"
"#,
    );

    let (config, key_sources) = Config::from_file_with_env(file.path()).unwrap();
    assert_eq!(
        config.providers[0].api_key.as_ref().unwrap().expose_secret(),
        "sk-literal"
    );
    assert_eq!(config.providers[0].vendor, "openai");
    assert_eq!(source_for(&key_sources, "literal-test"), &KeySource::Literal);
}

/// A provider without api_key picks up CHATRELAY_<NAME>_API_KEY.
#[test]
fn test_convention_key_discovery() {
    let var_name = "CHATRELAY_CONVENTION_E2E_API_KEY";
    unsafe { std::env::set_var(var_name, "sk-convention") };

    let file = write_config(
        r#"
[[providers]]
name = "convention-e2e"
url = "https://example.com/v1"
model = "gpt-4o-mini"
"#,
    );

    let (config, key_sources) = Config::from_file_with_env(file.path()).unwrap();
    assert_eq!(
        config.providers[0].api_key.as_ref().unwrap().expose_secret(),
        "sk-convention"
    );
    assert_eq!(
        source_for(&key_sources, "convention-e2e"),
        &KeySource::Convention(var_name.to_string())
    );

    unsafe { std::env::remove_var(var_name) };
}

/// A provider with no key anywhere stays in the pool, keyless.
#[test]
fn test_keyless_provider_kept() {
    let file = write_config(
        r#"
[[providers]]
name = "keyless-e2e-provider"
url = "https://example.com/v1"
model = "gpt-4o-mini"

[[providers]]
name = "keyed-e2e-provider"
url = "https://example.com/v1"
model = "gpt-4o-mini"
api_key = "sk-present"
"#,
    );

    let (config, key_sources) = Config::from_file_with_env(file.path()).unwrap();
    assert_eq!(config.providers.len(), 2);
    assert!(config.providers[0].api_key.is_none());
    assert_eq!(source_for(&key_sources, "keyless-e2e-provider"), &KeySource::None);
}

/// The storage token expands ${VAR} too.
#[test]
fn test_storage_token_expansion() {
    let var_name = "CHATRELAY_TEST_E2E_BLOB_TOKEN";
    unsafe { std::env::set_var(var_name, "blob-secret") };

    let file = write_config(&format!(
        r#"
[storage]
base_url = "https://blob.example.com"
token = "${{{}}}"
"#,
        var_name
    ));

    let (config, _) = Config::from_file_with_env(file.path()).unwrap();
    let storage = config.storage.expect("storage section");
    assert_eq!(storage.base_url, "https://blob.example.com");
    assert_eq!(storage.token.unwrap().expose_secret(), "blob-secret");

    unsafe { std::env::remove_var(var_name) };
}

/// No providers section means the built-in table.
#[test]
fn test_builtin_table_when_no_providers() {
    let file = write_config("[server]\nlisten = \"127.0.0.1:0\"\n");

    let (config, key_sources) = Config::from_file_with_env(file.path()).unwrap();
    let names: Vec<&str> = config.providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names.len(), 12);
    assert_eq!(names[0], "deepseek-1");
    assert!(names.contains(&"groq-4"));
    assert!(names.contains(&"openrouter-3"));
    assert_eq!(key_sources.len(), 12);
}

/// A missing file is an IO error from from_file_with_env but defaults from load_or_default.
#[test]
fn test_missing_file_handling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        Config::from_file_with_env(&path),
        Err(ConfigError::Io { .. })
    ));

    let (config, _) = Config::load_or_default(&path).unwrap();
    assert_eq!(config.server.listen, "127.0.0.1:3000");
    assert_eq!(config.providers.len(), 12);
}
