use serde::Deserialize;

/// Metadata about a pull request fetched from the GitHub API.
/// Not Deserialize: constructed manually from the pull endpoint JSON
/// plus the file listing (or from a local patch in offline mode).
#[derive(Debug, Clone)]
pub struct PullRequest {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// Author's GitHub login
    pub author: String,
    /// Total files changed
    pub files_changed: usize,
    /// Total lines added
    pub additions: usize,
    /// Total lines deleted
    pub deletions: usize,
    /// Changed files with their patch text
    pub files: Vec<ReviewFile>,
}

/// One changed file, in the shape GitHub's file listing returns.
/// All analysis operates on `patch`, the unified-diff hunk text;
/// binary and oversized files come back without one.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewFile {
    pub filename: String,
    pub status: FileStatus,
    #[serde(default)]
    pub additions: usize,
    #[serde(default)]
    pub deletions: usize,
    pub patch: Option<String>,
}

/// Change kind for a file. GitHub also emits statuses like "changed"
/// and "copied"; anything unrecognized is treated as a modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Removed,
    Renamed,
    #[serde(other)]
    Modified,
}

/// Represents the parsed components of a GitHub PR URL.
#[derive(Debug, Clone)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}
