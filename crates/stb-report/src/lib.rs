//! stb-report
//!
//! Match Report Parser. Turns a free-text score report such as
//! `G2: Alice 1-0 Bob` into a [`MatchReport`] or a [`RejectReason`].
//!
//! Pure and deterministic. No IO; the caller posts the rendered verdict
//! and deletes rejected messages.

mod grammar;
mod render;

pub use grammar::{parse, MatchReport, Outcome, RejectReason};
pub use render::{render_accepted, render_rejected, render_verdict, FORMAT_EXAMPLE};
