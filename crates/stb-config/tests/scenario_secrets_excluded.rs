//! Literal secrets never make it into a loaded config.
//!
//! GREEN when:
//! - A token-looking literal anywhere in the tree fails with
//!   CONFIG_SECRET_DETECTED and the value is not echoed.
//! - Env var NAMES load fine.
//! - A missing Discord token in daemon mode names the env var only.

use stb_config::{load_layered_yaml_from_strings, resolve_secrets, SecretsMode};

const YAML_WITH_GOOGLE_KEY: &str = r#"
roster:
  spreadsheet_id: "1Xd0ohSMrYKsB"
  credentials_env: "AIzaSyA-literal-google-key-value"
"#;

const YAML_SECRET_IN_ARRAY: &str = r#"
access:
  admins:
    - "96492516966174720"
    - "MTE0NjY3OTk0NzE2NjE4OTYwMA.GxYz12.abcdefghijklmnopqrstuvwxyz0123"
"#;

const YAML_WITH_ENV_NAMES: &str = r#"
discord:
  token_env: "STARBOT_TEST_TOKEN_NEVER_SET_8898"
roster:
  credentials_env: "STARBOT_TEST_SHEETS_NEVER_SET_8898"
  credentials_kind: "bearer"
"#;

#[test]
fn google_key_literal_is_rejected() {
    let err = load_layered_yaml_from_strings(&[YAML_WITH_GOOGLE_KEY]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"), "got: {msg}");
    assert!(msg.contains("/roster/credentials_env"));
    assert!(!msg.contains("AIzaSyA-literal"), "value must be redacted");
}

#[test]
fn secret_inside_array_is_rejected() {
    let err = load_layered_yaml_from_strings(&[YAML_SECRET_IN_ARRAY]).unwrap_err();
    assert!(err.to_string().contains("/access/admins/1"));
}

#[test]
fn env_names_load_and_tool_mode_tolerates_missing_values() {
    let cfg = load_layered_yaml_from_strings(&[YAML_WITH_ENV_NAMES]).unwrap();
    let secrets = resolve_secrets(&cfg.config_json, SecretsMode::Tool).unwrap();
    assert!(secrets.discord_token.is_none());
    assert!(secrets.roster_credentials.is_none());
    assert_eq!(
        secrets.roster_credentials_kind,
        stb_config::CredentialKind::Bearer
    );
}

#[test]
fn daemon_mode_requires_token_and_names_the_var() {
    let cfg = load_layered_yaml_from_strings(&[YAML_WITH_ENV_NAMES]).unwrap();
    let err = resolve_secrets(&cfg.config_json, SecretsMode::Daemon).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("SECRETS_MISSING"));
    assert!(msg.contains("STARBOT_TEST_TOKEN_NEVER_SET_8898"));
}
