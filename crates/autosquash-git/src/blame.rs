//! Blame queries and the blame line grammar.

use std::sync::LazyLock;

use regex::Regex;

use crate::Repository;
use crate::error::Result;

/// Attribution of a single line to the commit that last touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameInfo {
    /// Commit hash as printed by blame (may be abbreviated).
    pub commit_hash: String,
    pub author: String,
    /// Timestamp as printed by blame (`YYYY-MM-DD HH:MM:SS +ZZZZ`).
    pub timestamp: String,
    /// Line number in the blamed revision.
    pub line_number: u32,
    pub line_content: String,
}

// `<hash> [<path>] (<author> <timestamp> <lineno>) <content>`
// Boundary commits carry a leading `^`; the optional path column appears when
// the file was renamed within the blamed history.
static BLAME_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^\^?([0-9a-f]+)\s+(?:\S+\s+)?\((.+?)\s+(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} [+-]\d{4})\s+(\d+)\)\s?(.*)$",
    )
    .ok()
});

impl Repository {
    /// Blame lines `start..=end` of `file_path` as of `HEAD`.
    ///
    /// # Errors
    /// Returns error if git blame fails (unknown path, range past EOF).
    pub fn blame_range(&self, file_path: &str, start: u32, end: u32) -> Result<Vec<BlameInfo>> {
        let range = format!("-L{start},{end}");
        let stdout = self
            .git()?
            .args(["blame", &range, "HEAD", "--", file_path])
            .run_checked()?;
        Ok(parse_blame_output(&stdout))
    }
}

/// Parse default-format blame output, skipping lines that don't match.
#[must_use]
pub fn parse_blame_output(output: &str) -> Vec<BlameInfo> {
    output.lines().filter_map(parse_blame_line).collect()
}

fn parse_blame_line(line: &str) -> Option<BlameInfo> {
    let caps = BLAME_LINE.as_ref()?.captures(line)?;
    Some(BlameInfo {
        commit_hash: caps.get(1)?.as_str().to_string(),
        author: caps.get(2)?.as_str().trim().to_string(),
        timestamp: caps.get(3)?.as_str().to_string(),
        line_number: caps.get(4)?.as_str().parse().ok()?,
        line_content: caps.get(5).map_or_else(String::new, |m| m.as_str().to_string()),
    })
}
