// ABOUTME: The tmux listing format and its parser
//
// tmux reports sessions as text in the format requested with `-F`. Field order
// and delimiter here are a wire contract: the parser relies on them and any
// change must come with updated fixtures below.

use crate::multiplexer::MultiplexerSession;
use chrono::DateTime;
use std::collections::HashMap;
use tracing::debug;

pub const FIELD_DELIMITER: char = '|';

/// `list-sessions -F` format: name, creation time (unix seconds), attached client count
pub const LIST_FORMAT: &str = "#{session_name}|#{session_created}|#{session_attached}";

/// `list-panes -F` format, one pane id per line
pub const PANE_FORMAT: &str = "#{pane_id}";

/// `list-panes -a -F` format, the owning session name once per pane
pub const ALL_PANES_FORMAT: &str = "#{session_name}";

const NO_SERVER_MARKERS: &[&str] = &["no server running", "no sessions", "error connecting to"];

const MISSING_SESSION_MARKERS: &[&str] = &["can't find session", "session not found"];

/// Parses one `LIST_FORMAT` line, keeping only sessions inside `prefix`.
///
/// Fields are split from the right so a delimiter inside a session name
/// does not shift the numeric columns.
pub fn parse_session_line(line: &str, prefix: &str) -> Option<MultiplexerSession> {
    let line = line.trim_end_matches('\r');
    let mut fields = line.rsplitn(3, FIELD_DELIMITER);

    let attached = fields.next()?;
    let created = fields.next()?;
    let handle = fields.next()?;

    let name = handle.strip_prefix(prefix)?;
    if name.is_empty() {
        return None;
    }

    let attached_clients: u32 = attached.trim().parse().ok()?;
    let created_at = created
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Some(
        MultiplexerSession::new(name, handle)
            .with_attached(attached_clients > 0)
            .with_created_at(created_at),
    )
}

pub fn parse_session_list(output: &str, prefix: &str) -> Vec<MultiplexerSession> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = parse_session_line(line, prefix);
            if parsed.is_none() {
                debug!("Skipping tmux session line outside namespace or malformed: {:?}", line);
            }
            parsed
        })
        .collect()
}

pub fn count_panes(output: &str) -> usize {
    output.lines().filter(|line| !line.trim().is_empty()).count()
}

/// Counts `ALL_PANES_FORMAT` lines per session inside `prefix`, keyed by user-facing name
pub fn group_panes_by_session(output: &str, prefix: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for handle in output.lines().map(|line| line.trim_end_matches('\r')) {
        if let Some(name) = handle.strip_prefix(prefix).filter(|name| !name.is_empty()) {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// tmux's way of saying there is nothing to list
pub fn is_no_server(stderr: &str) -> bool {
    NO_SERVER_MARKERS.iter().any(|marker| stderr.contains(marker))
}

/// The target session does not exist (or nothing exists at all)
pub fn is_missing_session(stderr: &str) -> bool {
    MISSING_SESSION_MARKERS.iter().any(|marker| stderr.contains(marker)) || is_no_server(stderr)
}
