//! `stb roster preview`: fetch the sheet and show what a run would see.

use anyhow::Result;
use stb_config::{resolve_secrets, SecretsMode};
use stb_roster::{read_roster, SheetsCredential, SheetsRosterSource};

use super::load_bot_config;

pub async fn preview(config_paths: &[String]) -> Result<()> {
    let (loaded, config) = load_bot_config(config_paths)?;
    let secrets = resolve_secrets(&loaded.config_json, SecretsMode::Tool)?;
    let source = SheetsRosterSource::new_with_base_url(
        SheetsCredential::from_secrets(&secrets),
        config.roster.api_base.clone(),
    );

    let read = read_roster(&source, &config.roster).await?;

    println!("config_hash={}", loaded.config_hash);
    println!(
        "entries={} teams={} assigned={} dropped={}",
        read.roster.len(),
        read.teams.team_names.len(),
        read.teams.assigned,
        read.teams.dropped.len()
    );
    for e in read.roster.values() {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            e.screen_name,
            e.external_handle,
            e.race.map(|r| r.as_str()).unwrap_or("-"),
            e.group.map(|g| g.as_str()).unwrap_or("-"),
            e.tier.map(|t| t.as_str()).unwrap_or("-"),
            if e.team.is_empty() { "-" } else { e.team.as_str() },
        );
    }
    for name in &read.teams.dropped {
        println!("dropped={}", name);
    }
    Ok(())
}
