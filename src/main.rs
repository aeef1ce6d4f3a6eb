mod analysis;
mod config;
mod llm;
mod pr;
mod report;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use analysis::ai::AiReviewer;
use analysis::lint::Linter;
use analysis::security::SecurityScanner;
use config::ReviewLevel;

/// PR Sentinel reviews a GitHub Pull Request by merging an AI review, a
/// secret/vulnerability scan and a custom lint pass into one severity-ranked
/// report with an approve/request-changes decision.
#[derive(Parser, Debug)]
#[command(name = "pr-sentinel", version, about)]
struct Cli {
    /// GitHub Pull Request URL (e.g., https://github.com/org/repo/pull/42)
    ///
    /// Not required when --patch is used.
    pr_url: Option<String>,

    /// Review a local unified diff instead of fetching a PR (no tokens needed)
    #[arg(long, value_name = "FILE", conflicts_with = "pr_url")]
    patch: Option<PathBuf>,

    /// Optional output file path for the rendered report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Review strictness; overrides the config file value
    #[arg(long, value_enum)]
    level: Option<ReviewLevel>,

    /// Emit the full report as JSON instead of markdown/terminal output
    #[arg(long)]
    json: bool,

    /// Post the finished review back to the pull request on GitHub
    #[arg(long, requires = "pr_url")]
    post: bool,

    /// Exit non-zero when the verdict is "changes requested"
    #[arg(long)]
    fail_on_changes: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = config::Config::load()?;
    let level = cli.level.unwrap_or(config.review.level);

    let (pull_request, parsed_url) = if let Some(patch_path) = &cli.patch {
        info!(path = %patch_path.display(), "reviewing local patch file");
        (build_local_pr(patch_path)?, None)
    } else {
        let pr_url = cli.pr_url.as_deref().ok_or(
            "PR URL is required unless --patch is used. Usage: pr-sentinel <URL> or pr-sentinel --patch <FILE>",
        )?;

        let _main_span = info_span!("pr_review", pr_url = %pr_url).entered();

        info!("parsing PR URL");
        let parsed_url = pr::parse_pr_url(pr_url)?;
        debug!(owner = %parsed_url.owner, repo = %parsed_url.repo, pr = parsed_url.pr_number, "parsed PR URL");

        info!("fetching pull request from GitHub");
        let fetched = pr::fetch_pull_request(&parsed_url, &config).await?;
        info!(files = fetched.files_changed, additions = fetched.additions, deletions = fetched.deletions, "fetched PR metadata");
        (fetched, Some(parsed_url))
    };

    info!(level = %level, "running analysis");
    let llm_client = llm::LlmClient::new(&config.llm)?;
    let reviewer = AiReviewer::new(&llm_client, level);
    let scanner = SecurityScanner::new();
    let linter = Linter::new(&config.lint.rules)?;

    let (ai, security, lint) =
        analysis::run_all(&reviewer, &scanner, &linter, &pull_request.files).await;
    info!(
        ai = ai.comments.len() + ai.issues.len(),
        security = security.total,
        lint = lint.total,
        "analysis complete"
    );

    info!("generating report");
    let review = report::build(&pull_request, &ai, &security, &lint, level);
    report::output(&review, cli.output.as_deref(), cli.json)?;
    info!(verdict = %review.verdict, total = review.metrics.total_issues, "done");

    if cli.post {
        if let Some(parsed_url) = &parsed_url {
            info!("posting review to GitHub");
            pr::post_review(parsed_url, &config, &review).await?;
        }
    }

    if cli.fail_on_changes && review.verdict == report::Verdict::ChangesRequested {
        std::process::exit(1);
    }

    Ok(())
}

/// Build a PullRequest from a local unified diff file, so the full pipeline
/// can run without a GitHub token.
fn build_local_pr(path: &std::path::Path) -> Result<pr::PullRequest, Box<dyn std::error::Error>> {
    let diff_text = std::fs::read_to_string(path)?;
    let files = pr::diff::parse_diff(&diff_text)?;
    let additions: usize = files.iter().map(|f| f.additions).sum();
    let deletions: usize = files.iter().map(|f| f.deletions).sum();
    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "local patch".to_string());

    Ok(pr::PullRequest {
        number: 0,
        title,
        author: "local".to_string(),
        files_changed: files.len(),
        additions,
        deletions,
        files,
    })
}
