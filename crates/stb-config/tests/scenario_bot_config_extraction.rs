//! `BotConfig` extraction and unused-key reporting over a full config.

use stb_config::{
    load_layered_yaml_from_strings, report_unused_keys, BotConfig, UnusedKeyPolicy,
    DEFAULT_DISCORD_API_BASE, DEFAULT_TEAM_ROLE_COLOR,
};
use stb_schemas::{Race, RoleId, Tier};

const FULL_YAML: &str = r#"
discord:
  server_id: 426172214677602304
  token_env: "STARBOT_DISCORD_TOKEN"
channels:
  match_reports: "945736138864349234"
  clips: "868530162852057139"
access:
  admins: ["96492516966174720"]
  privileged: ["105697010165747712", 228586200741445642]
roles:
  coach: "426370872740413440"
  assistant_coach: "514179771295334420"
  zerg: "426370952402698270"
  terran: "426371039241437184"
  protoss: "426371009982103555"
  tier0: "686335315492732963"
  tier1: "486932541396221962"
  tier2: "486932586724065285"
  tier3: "486932645519818752"
roster:
  spreadsheet_id: "1Xd0ohSMrYKsB-d0g3OgbovA3BV4NntQg_ZXjDJ7js8I"
  ranges:
    teams: "Teams 2!A1:Z"
storage:
  data_dir: "/var/lib/starbot"
"#;

#[test]
fn full_config_extracts_with_defaults() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let cfg = BotConfig::from_config_json(&loaded.config_json).unwrap();

    assert_eq!(cfg.server_id, "426172214677602304");
    assert_eq!(cfg.discord_api_base, DEFAULT_DISCORD_API_BASE);
    assert_eq!(cfg.channels.clips.as_deref(), Some("868530162852057139"));
    assert_eq!(cfg.team_role_color, DEFAULT_TEAM_ROLE_COLOR);
    assert_eq!(cfg.member_page_size, 1000);

    assert_eq!(cfg.roles.race_role(Race::Terran), &RoleId::new("426371039241437184"));
    assert_eq!(cfg.roles.tier_role(Tier::T0), &RoleId::new("686335315492732963"));

    assert_eq!(cfg.roster.ranges.teams, "Teams 2!A1:Z");
    assert_eq!(cfg.roster.ranges.handles, "Player List!B2:B");
    assert_eq!(
        cfg.storage.match_log,
        std::path::PathBuf::from("/var/lib/starbot/match_log.jsonl")
    );

    assert!(cfg.is_admin("96492516966174720"));
    assert!(cfg.is_privileged("96492516966174720"));
    assert!(cfg.is_privileged("228586200741445642"));
    assert!(!cfg.is_admin("228586200741445642"));
}

#[test]
fn missing_role_is_an_error() {
    let yaml = FULL_YAML.replace("  tier3: \"486932645519818752\"\n", "");
    let loaded = load_layered_yaml_from_strings(&[yaml.as_str()]).unwrap();
    let err = BotConfig::from_config_json(&loaded.config_json).unwrap_err();
    assert!(err.to_string().contains("roles.tier3"), "got: {err}");
}

#[test]
fn full_config_has_no_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn stray_key_is_reported_and_fails_in_fail_mode() {
    let overlay = "discord:\n  shard_count: 2\n";
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML, overlay]).unwrap();

    let warn = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(warn.unused_leaf_pointers, vec!["/discord/shard_count".to_string()]);

    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}
