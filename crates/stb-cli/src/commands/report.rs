//! `stb report check`: the match-channel parser, offline.

use anyhow::{bail, Result};

pub fn check(text: &str) -> Result<()> {
    let verdict = stb_report::parse(text);
    match &verdict {
        Ok(r) => println!(
            "verdict=accepted group={} player_one={} score_one={} player_two={} score_two={}",
            r.group, r.player_one, r.score_one, r.player_two, r.score_two
        ),
        Err(reason) => println!("verdict=rejected reason={}", reason),
    }
    println!("{}", stb_report::render_verdict(&verdict, text));

    if let Err(reason) = verdict {
        bail!("report rejected: {}", reason);
    }
    Ok(())
}
