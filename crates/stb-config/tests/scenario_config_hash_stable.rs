//! Config hash stability.
//!
//! GREEN when:
//! - Loading the same YAML twice yields the same `config_hash`.
//! - Reordering keys does not change the hash.
//! - An overlay that changes a value changes the hash.

use stb_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
discord:
  server_id: "426172214677602304"
  token_env: "STARBOT_DISCORD_TOKEN"
channels:
  match_reports: "945736138864349234"
teams:
  role_color: 2358021
"#;

const BASE_YAML_REORDERED: &str = r#"
teams:
  role_color: 2358021
channels:
  match_reports: "945736138864349234"
discord:
  token_env: "STARBOT_DISCORD_TOKEN"
  server_id: "426172214677602304"
"#;

const OVERLAY_YAML: &str = r#"
channels:
  match_reports: "945364478973861898"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex is 64 chars");
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_changes_hash_and_wins() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);
    assert_eq!(
        merged.config_json["channels"]["match_reports"],
        "945364478973861898"
    );
    assert_eq!(merged.config_json["discord"]["server_id"], "426172214677602304");
}
