//! Chat message formatting: code-block wrappers, the help card and
//! splitting long output to the platform's message limit.

/// Maximum characters in one chat message.
pub const MESSAGE_LIMIT: usize = 2000;

/// Help card. Lines are kept narrow enough to render on mobile.
pub const AVAILABLE_COMMANDS: &str = "
[ /help           - show commands                     ]
[ /test           - bot status                        ]
[                                                     ]
[ /scan_users     - identify users based on web info  ]
[ /assignroles    - assign roles from last scan       ]
[ /webassignroles - create and assign roles from sheet]
[ /deleteroles    - delete previously created roles   ]
[ /show <name>    - look up a scanned player          ]
";

/// Green/red highlighted block; `+` lines render green, `-` lines red.
pub fn diff_block(body: &str) -> String {
    format!("```diff\n{body}\n```")
}

/// Yellow highlighted block.
pub fn fix_block(body: &str) -> String {
    format!("```fix\n{body}\n```")
}

pub fn help_card() -> String {
    format!("```ini\n{AVAILABLE_COMMANDS}\n```")
}

pub fn not_authorized(command: &str, user: &str) -> String {
    diff_block(&format!("- {command} ERROR: {user} IS NOT AUTHORIZED"))
}

pub fn in_progress(command: &str) -> String {
    diff_block(&format!("- {command} ERROR: EXECUTION IN PROGRESS"))
}

/// Join `lines` into messages no longer than `limit` characters, breaking
/// only between lines. A single line longer than the limit is split on
/// character boundaries.
pub fn chunk_lines<S: AsRef<str>>(lines: &[S], limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_chars = 0usize;

    for line in lines {
        let line = line.as_ref();
        let n = line.chars().count();

        if n > limit {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
                cur_chars = 0;
            }
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                out.push(piece.iter().collect());
            }
            continue;
        }

        let extra = if cur.is_empty() { n } else { n + 1 };
        if cur_chars + extra > limit {
            out.push(std::mem::take(&mut cur));
            cur_chars = 0;
        }
        if !cur.is_empty() {
            cur.push('\n');
            cur_chars += 1;
        }
        cur.push_str(line);
        cur_chars += n;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}
