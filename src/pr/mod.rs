pub mod diff;
pub mod types;

pub use types::{PrUrl, PullRequest, ReviewFile};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::report::ReviewReport;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),

    #[error("GitHub token not found in environment")]
    MissingToken,
}

/// Parse a GitHub PR URL into its component parts.
///
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PrUrl, PrError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    if parsed.host_str() != Some("github.com") {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| PrError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 4 || segments[2] != "pull" {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let pr_number = segments[3]
        .parse::<u64>()
        .map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    Ok(PrUrl {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

/// Fetch a complete PullRequest (metadata + changed files) from the GitHub API.
///
/// Uses the file-listing endpoint rather than the raw diff so each file
/// arrives with its own patch text, paging until a short page signals the end.
#[instrument(skip(config), fields(owner = %pr_url.owner, repo = %pr_url.repo, pr = pr_url.pr_number))]
pub async fn fetch_pull_request(
    pr_url: &PrUrl,
    config: &crate::config::Config,
) -> Result<PullRequest, PrError> {
    let token = config.github_token().ok_or(PrError::MissingToken)?;
    let client = reqwest::Client::new();
    let base_url = format!(
        "https://api.github.com/repos/{}/{}/pulls/{}",
        pr_url.owner, pr_url.repo, pr_url.pr_number
    );

    #[derive(serde::Deserialize)]
    struct User {
        login: String,
    }

    #[derive(serde::Deserialize)]
    struct PullResponse {
        number: u64,
        title: String,
        user: User,
        changed_files: usize,
        additions: usize,
        deletions: usize,
    }

    debug!("fetching PR metadata from GitHub API");
    let response = client
        .get(&base_url)
        .header("User-Agent", "pr-sentinel")
        .bearer_auth(&token)
        .send()
        .await?
        .error_for_status()?;

    let metadata = response.json::<PullResponse>().await?;
    debug!(title = %metadata.title, changed_files = metadata.changed_files, "received PR metadata");

    let mut files: Vec<ReviewFile> = Vec::new();
    let mut page = 1u32;
    loop {
        debug!(page, "fetching PR file listing");
        let batch: Vec<ReviewFile> = client
            .get(format!("{}/files", base_url))
            .header("User-Agent", "pr-sentinel")
            .bearer_auth(&token)
            .query(&[("per_page", 100u32), ("page", page)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let batch_len = batch.len();
        files.extend(batch);
        if batch_len < 100 {
            break;
        }
        page += 1;
    }
    debug!(files = files.len(), "received PR file listing");

    Ok(PullRequest {
        number: metadata.number,
        title: metadata.title,
        author: metadata.user.login,
        files_changed: metadata.changed_files,
        additions: metadata.additions,
        deletions: metadata.deletions,
        files,
    })
}

/// Post the finished review back to the PR as a single GitHub review.
///
/// The verdict selects the review event (APPROVE, REQUEST_CHANGES or
/// COMMENT), the markdown narrative becomes the review body, and inline
/// comments attach at their diff positions.
#[instrument(skip(config, report), fields(owner = %pr_url.owner, repo = %pr_url.repo, pr = pr_url.pr_number, comments = report.inline_comments.len()))]
pub async fn post_review(
    pr_url: &PrUrl,
    config: &crate::config::Config,
    report: &ReviewReport,
) -> Result<(), PrError> {
    let token = config.github_token().ok_or(PrError::MissingToken)?;
    let client = reqwest::Client::new();
    let url = format!(
        "https://api.github.com/repos/{}/{}/pulls/{}/reviews",
        pr_url.owner, pr_url.repo, pr_url.pr_number
    );

    let comments: Vec<serde_json::Value> = report
        .inline_comments
        .iter()
        .filter_map(|c| {
            let position = diff_position(c.line)?;
            Some(serde_json::json!({
                "path": c.path,
                "position": position,
                "body": c.body,
            }))
        })
        .collect();

    debug!(
        event = report.verdict.github_event(),
        comments = comments.len(),
        "posting review to GitHub"
    );
    let payload = serde_json::json!({
        "event": report.verdict.github_event(),
        "body": report.markdown,
        "comments": comments,
    });
    client
        .post(&url)
        .header("User-Agent", "pr-sentinel")
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await?
        .error_for_status()?;

    info!(event = report.verdict.github_event(), "review posted");
    Ok(())
}

// Patch-relative line 1 is the first hunk header; the review API counts
// the line after it as position 1. A comment anchored on the header has
// no postable position.
fn diff_position(line: usize) -> Option<usize> {
    line.checked_sub(1).filter(|position| *position > 0)
}
