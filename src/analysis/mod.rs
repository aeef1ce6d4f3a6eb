pub mod ai;
pub mod filter;
pub mod lint;
pub mod security;

use tracing::{debug, info_span, Instrument};

use crate::pr::ReviewFile;
use crate::report::types::{AiReview, LintReport, SecurityReport};

use ai::AiReviewer;
use lint::Linter;
use security::SecurityScanner;

/// Run the three analysis sources over the same file list and wait for all
/// of them. Each source only reads the shared file slice and builds its own
/// result, so they can run concurrently without coordination. Aggregation
/// must not start until every source has finished.
pub async fn run_all(
    reviewer: &AiReviewer<'_>,
    scanner: &SecurityScanner,
    linter: &Linter,
    files: &[ReviewFile],
) -> (AiReview, SecurityReport, LintReport) {
    let (ai, security, lint) = tokio::join!(
        reviewer
            .review(files)
            .instrument(info_span!("analyze", source = "ai")),
        async { scanner.scan(files) }.instrument(info_span!("analyze", source = "security")),
        async { linter.lint(files) }.instrument(info_span!("analyze", source = "lint")),
    );

    debug!(
        ai_comments = ai.comments.len(),
        ai_issues = ai.issues.len(),
        security = security.total,
        lint = lint.total,
        "analysis sources complete"
    );
    (ai, security, lint)
}

/// 1-based line number for a character offset into patch text. Counts
/// newline-delimited line lengths until the cumulative length (including
/// the trailing newline) exceeds the offset; offsets past the end fall
/// back to line 1.
pub fn line_at_offset(patch: &str, offset: usize) -> usize {
    let mut cumulative = 0usize;
    for (idx, line) in patch.split('\n').enumerate() {
        cumulative += line.len() + 1;
        if cumulative > offset {
            return idx + 1;
        }
    }
    1
}
