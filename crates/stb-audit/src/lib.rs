//! stb-audit
//!
//! Append-only match log. One JSON object per line: every match report
//! verdict and every clip link posted in the clips channel.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Accepted,
    Rejected,
    Clip,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Accepted => "accepted",
            LogKind::Rejected => "rejected",
            LogKind::Clip => "clip",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchLogEvent {
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub kind: LogKind,
    pub author_id: String,
    pub channel_id: String,
    /// Raw message text.
    pub text: String,
    /// Reject reason or structured report, when there is one.
    #[serde(default)]
    pub detail: Value,
}

/// Append-only JSONL writer.
pub struct MatchLog {
    path: PathBuf,
    /// Sequence number of the next event.
    seq: u64,
}

impl MatchLog {
    /// Opens (or creates) the log and resumes the sequence after the last
    /// line already written.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }
        let seq = match fs::read_to_string(&path) {
            Ok(content) => content.lines().filter(|l| !l.trim().is_empty()).count() as u64,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e).with_context(|| format!("read match log {:?}", path)),
        };
        Ok(Self { path, seq })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn append(
        &mut self,
        kind: LogKind,
        author_id: &str,
        channel_id: &str,
        text: &str,
        detail: Value,
    ) -> Result<MatchLogEvent> {
        let ev = MatchLogEvent {
            seq: self.seq,
            ts_utc: Utc::now(),
            kind,
            author_id: author_id.to_string(),
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            detail,
        };
        let line = serde_json::to_string(&ev).context("serialize match log event failed")?;
        append_line(&self.path, &line)?;
        self.seq += 1;
        info!(seq = ev.seq, kind = kind.as_str(), author = author_id, text, "match log");
        Ok(ev)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open match log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write match log line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Read every event back. Blank lines are ignored.
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<MatchLogEvent>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read match log {:?}", path.as_ref()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            serde_json::from_str(l).with_context(|| format!("parse match log line {}", i + 1))
        })
        .collect()
}

/// Clip links are recognised by host.
pub fn is_clip_link(text: &str) -> bool {
    text.contains("twitch.tv")
}
