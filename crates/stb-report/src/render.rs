use crate::grammar::{MatchReport, RejectReason};

/// Shown to the reporter after every rejection.
pub const FORMAT_EXAMPLE: &str = "G2: player_name 1-0 player_two";

const ACCEPTED_FOOTER: &str = "```diff\n+ ACCEPTED: Message formatting passes the check\n```";

pub fn render_accepted(r: &MatchReport) -> String {
    let mut out = format!("GROUP **{}**\n", r.group_label);
    match r.winner_loser() {
        Some(((wn, ws), (ln, ls))) => {
            out.push_str(&format!("{wn}({ws}) WINNER\n"));
            out.push_str(&format!("{ln}({ls}) LOSER\n"));
        }
        None => {
            out.push_str(&format!("{}({}) TIE\n", r.player_one, r.score_one));
            out.push_str(&format!("{}({}) TIE\n", r.player_two, r.score_two));
        }
    }
    out.push_str(ACCEPTED_FOOTER);
    out
}

pub fn render_rejected(reason: RejectReason, raw: &str) -> String {
    format!(
        "```diff\n- REJECTED: {reason}\n\nYour input:\n{raw}\n\nCorrect format:\n{FORMAT_EXAMPLE}\n```"
    )
}

/// Render whichever verdict `parse` produced.
pub fn render_verdict(verdict: &Result<MatchReport, RejectReason>, raw: &str) -> String {
    match verdict {
        Ok(r) => render_accepted(r),
        Err(reason) => render_rejected(*reason, raw),
    }
}
