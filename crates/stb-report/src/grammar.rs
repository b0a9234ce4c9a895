//! Tokenizer and ordered grammar rules.
//!
//! ```text
//! report  := "G" int ": " result
//! result  := name " " digit "-" digit name
//! ```
//!
//! Rules run in a fixed order and the first failure wins:
//!
//! | # | rule            | rejects with        |
//! |---|-----------------|---------------------|
//! | 1 | `separator`     | UnexpectedFormatting |
//! | 2 | `group_number`  | GroupNotNumber (UnexpectedFormatting without `G`) |
//! | 3 | `single_dash`   | TooManyDashes       |
//! | 4 | `space_limit`   | TooManySpaces       |
//! | 5 | `player_one`    | FormattingError     |
//! | 6 | `player_two`    | FormattingError     |
//! | 7 | `scores_numeric`| FormattingError     |

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    P1Win,
    P2Win,
    Tie,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Group text as written after the `G`.
    pub group_label: String,
    pub group: i64,
    pub player_one: String,
    pub score_one: u32,
    pub player_two: String,
    pub score_two: u32,
    pub outcome: Outcome,
}

impl MatchReport {
    /// (name, score) of the winner and loser; `None` on a tie.
    pub fn winner_loser(&self) -> Option<((&str, u32), (&str, u32))> {
        let one = (self.player_one.as_str(), self.score_one);
        let two = (self.player_two.as_str(), self.score_two);
        match self.outcome {
            Outcome::P1Win => Some((one, two)),
            Outcome::P2Win => Some((two, one)),
            Outcome::Tie => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    UnexpectedFormatting,
    GroupNotNumber,
    TooManyDashes,
    TooManySpaces,
    FormattingError,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::UnexpectedFormatting => "unexpected formatting",
            RejectReason::GroupNotNumber => "group is not a number",
            RejectReason::TooManyDashes => "too many dashes",
            RejectReason::TooManySpaces => "too many spaces",
            RejectReason::FormattingError => "formatting error",
        };
        f.write_str(s)
    }
}

impl std::error::Error for RejectReason {}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Space,
    Dash,
}

/// Split on `' '` and `'-'`, keeping each separator as its own token.
fn tokenize(s: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        let sep = match c {
            ' ' => Token::Space,
            '-' => Token::Dash,
            _ => continue,
        };
        if start < i {
            out.push(Token::Text(&s[start..i]));
        }
        out.push(sep);
        start = i + c.len_utf8();
    }
    if start < s.len() {
        out.push(Token::Text(&s[start..]));
    }
    out
}

fn count(tokens: &[Token<'_>], want: Token<'static>) -> usize {
    tokens.iter().filter(|t| **t == want).count()
}

fn join_text(tokens: &[Token<'_>]) -> String {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Text(s) => Some(*s),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Working state threaded through the rules. Each rule reads what earlier
/// rules filled in and fills in its own part.
#[derive(Default)]
struct Draft<'a> {
    result_tokens: Vec<Token<'a>>,
    group_label: &'a str,
    group: i64,
    player_one: String,
    score_one: Option<char>,
    player_two: String,
    score_two: Option<char>,
}

type Rule = for<'a> fn(&'a str, &mut Draft<'a>) -> Result<(), RejectReason>;

const RULES: &[(&str, Rule)] = &[
    ("separator", rule_separator),
    ("group_number", rule_group_number),
    ("single_dash", rule_single_dash),
    ("space_limit", rule_space_limit),
    ("player_one", rule_player_one),
    ("player_two", rule_player_two),
];

const SEPARATOR: &str = ": ";

fn rule_separator<'a>(raw: &'a str, d: &mut Draft<'a>) -> Result<(), RejectReason> {
    let (_, result) = raw
        .split_once(SEPARATOR)
        .ok_or(RejectReason::UnexpectedFormatting)?;
    d.result_tokens = tokenize(result);
    Ok(())
}

fn rule_group_number<'a>(raw: &'a str, d: &mut Draft<'a>) -> Result<(), RejectReason> {
    let (group_seg, _) = raw
        .split_once(SEPARATOR)
        .ok_or(RejectReason::UnexpectedFormatting)?;
    let label = group_seg
        .strip_prefix('G')
        .ok_or(RejectReason::UnexpectedFormatting)?;
    d.group = label.parse().map_err(|_| RejectReason::GroupNotNumber)?;
    d.group_label = label;
    Ok(())
}

fn rule_single_dash<'a>(_: &'a str, d: &mut Draft<'a>) -> Result<(), RejectReason> {
    if count(&d.result_tokens, Token::Dash) > 1 {
        return Err(RejectReason::TooManyDashes);
    }
    Ok(())
}

fn rule_space_limit<'a>(_: &'a str, d: &mut Draft<'a>) -> Result<(), RejectReason> {
    if count(&d.result_tokens, Token::Space) > 2 {
        return Err(RejectReason::TooManySpaces);
    }
    Ok(())
}

fn halves<'d, 'a>(d: &'d Draft<'a>) -> Result<(&'d [Token<'a>], &'d [Token<'a>]), RejectReason> {
    let dash = d
        .result_tokens
        .iter()
        .position(|t| *t == Token::Dash)
        .ok_or(RejectReason::FormattingError)?;
    Ok((&d.result_tokens[..dash], &d.result_tokens[dash + 1..]))
}

/// Left half: `<name> <...score>`. The name is everything before the first
/// space; the score is the last character of the rest with spaces removed.
fn rule_player_one<'a>(_: &'a str, d: &mut Draft<'a>) -> Result<(), RejectReason> {
    let (left, _) = halves(d)?;
    let first_space = left
        .iter()
        .position(|t| *t == Token::Space)
        .ok_or(RejectReason::FormattingError)?;
    let name = join_text(&left[..first_space]);
    let score = join_text(&left[first_space + 1..])
        .chars()
        .last()
        .ok_or(RejectReason::FormattingError)?;
    d.player_one = name;
    d.score_one = Some(score);
    Ok(())
}

/// Right half with spaces removed: `<score><name>`.
fn rule_player_two<'a>(_: &'a str, d: &mut Draft<'a>) -> Result<(), RejectReason> {
    let (_, right) = halves(d)?;
    let joined = join_text(right);
    let mut chars = joined.chars();
    let score = chars.next().ok_or(RejectReason::FormattingError)?;
    d.player_two = chars.as_str().to_string();
    d.score_two = Some(score);
    Ok(())
}

fn digit(c: Option<char>) -> Result<u32, RejectReason> {
    c.and_then(|c| c.to_digit(10))
        .ok_or(RejectReason::FormattingError)
}

/// Parse one report. Deterministic: the same input always yields the same
/// verdict.
pub fn parse(raw: &str) -> Result<MatchReport, RejectReason> {
    let mut d = Draft::default();
    for (_name, rule) in RULES {
        rule(raw, &mut d)?;
    }

    // scores_numeric
    let score_one = digit(d.score_one)?;
    let score_two = digit(d.score_two)?;

    let outcome = match score_one.cmp(&score_two) {
        std::cmp::Ordering::Greater => Outcome::P1Win,
        std::cmp::Ordering::Less => Outcome::P2Win,
        std::cmp::Ordering::Equal => Outcome::Tie,
    };

    Ok(MatchReport {
        group_label: d.group_label.to_string(),
        group: d.group,
        player_one: d.player_one,
        score_one,
        player_two: d.player_two,
        score_two,
        outcome,
    })
}
