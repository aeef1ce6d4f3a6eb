use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Analysis source that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Ai,
    Security,
    Lint,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Ai => write!(f, "ai"),
            Source::Security => write!(f, "security"),
            Source::Lint => write!(f, "lint"),
        }
    }
}

/// Severity scale used by the security scanner.
/// Declaration order is ascending, so `.max()` yields the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecuritySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SecuritySeverity {
    /// Render order for report sections, most severe first.
    pub const DESCENDING: [SecuritySeverity; 4] = [
        SecuritySeverity::Critical,
        SecuritySeverity::High,
        SecuritySeverity::Medium,
        SecuritySeverity::Low,
    ];
}

impl std::fmt::Display for SecuritySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecuritySeverity::Low => write!(f, "low"),
            SecuritySeverity::Medium => write!(f, "medium"),
            SecuritySeverity::High => write!(f, "high"),
            SecuritySeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Severity scale used by the custom linter. A different vocabulary from
/// the scanner's; the two are only unified inside the report engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Info,
    Warning,
    Error,
}

impl LintSeverity {
    /// Render order for report sections, most severe first.
    pub const DESCENDING: [LintSeverity; 3] = [
        LintSeverity::Error,
        LintSeverity::Warning,
        LintSeverity::Info,
    ];
}

impl std::fmt::Display for LintSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LintSeverity::Info => write!(f, "info"),
            LintSeverity::Warning => write!(f, "warning"),
            LintSeverity::Error => write!(f, "error"),
        }
    }
}

/// Severity scale reported by the AI reviewer. Never gates the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AiSeverity {
    Info,
    Suggestion,
    Warning,
    Error,
}

impl AiSeverity {
    /// Parse a model-supplied severity string. Unknown values map to `Info`
    /// so a creative model never breaks the pipeline.
    pub fn parse(s: &str) -> AiSeverity {
        match s.trim().to_lowercase().as_str() {
            "error" | "critical" | "bug" => AiSeverity::Error,
            "warning" | "warn" => AiSeverity::Warning,
            "suggestion" => AiSeverity::Suggestion,
            _ => AiSeverity::Info,
        }
    }
}

impl std::fmt::Display for AiSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiSeverity::Info => write!(f, "info"),
            AiSeverity::Suggestion => write!(f, "suggestion"),
            AiSeverity::Warning => write!(f, "warning"),
            AiSeverity::Error => write!(f, "error"),
        }
    }
}

/// Category assigned by the AI reviewer to a comment or file-level issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AiCategory {
    Bug,
    Security,
    Performance,
    Style,
    BestPractice,
}

impl AiCategory {
    pub const ALL: [AiCategory; 5] = [
        AiCategory::Bug,
        AiCategory::Security,
        AiCategory::Performance,
        AiCategory::Style,
        AiCategory::BestPractice,
    ];

    /// Parse a model-supplied category string. Unknown values map to
    /// `BestPractice`.
    pub fn parse(s: &str) -> AiCategory {
        match s.trim().to_lowercase().as_str() {
            "bug" | "bugs" => AiCategory::Bug,
            "security" => AiCategory::Security,
            "performance" | "perf" => AiCategory::Performance,
            "style" | "code-smell" | "code-smells" | "code_smell" => AiCategory::Style,
            _ => AiCategory::BestPractice,
        }
    }
}

impl std::fmt::Display for AiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiCategory::Bug => write!(f, "bug"),
            AiCategory::Security => write!(f, "security"),
            AiCategory::Performance => write!(f, "performance"),
            AiCategory::Style => write!(f, "style"),
            AiCategory::BestPractice => write!(f, "best-practice"),
        }
    }
}

/// A severity from any source, keeping the source vocabulary intact.
///
/// `Ord` follows the cross-source priority ordering used to sort report
/// findings: the most urgent severity sorts first. AI severities always
/// rank below scanner and linter ones, whatever the model called them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Security(SecuritySeverity),
    Lint(LintSeverity),
    Ai(AiSeverity),
}

impl Severity {
    /// Position in the cross-source priority ordering, 0 = most urgent.
    fn rank(&self) -> u8 {
        match self {
            Severity::Security(SecuritySeverity::Critical) => 0,
            Severity::Lint(LintSeverity::Error) => 1,
            Severity::Security(SecuritySeverity::High) => 2,
            Severity::Lint(LintSeverity::Warning) => 3,
            Severity::Security(SecuritySeverity::Medium) => 4,
            Severity::Security(SecuritySeverity::Low) => 5,
            Severity::Lint(LintSeverity::Info) => 6,
            Severity::Ai(AiSeverity::Error) => 7,
            Severity::Ai(AiSeverity::Warning) => 8,
            Severity::Ai(AiSeverity::Suggestion) => 9,
            Severity::Ai(AiSeverity::Info) => 10,
        }
    }

    /// Whether this severity alone forces `ChangesRequested`.
    /// Only security `critical` and lint `error` gate the verdict.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Severity::Security(SecuritySeverity::Critical) | Severity::Lint(LintSeverity::Error)
        )
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Security(s) => write!(f, "security/{}", s),
            Severity::Lint(s) => write!(f, "lint/{}", s),
            Severity::Ai(s) => write!(f, "ai/{}", s),
        }
    }
}

// Serialized as the qualified label ("security/critical") so the two
// vocabularies can never collide as JSON map keys.
impl Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single issue reported by any analysis source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Which source produced this finding
    pub source: Source,
    /// Severity in the source's own vocabulary
    pub severity: Severity,
    /// Rule name, or the AI category slug
    pub rule: String,
    /// Human-readable description
    pub message: String,
    /// File path (if tied to a file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based line within the file's patch text (if tied to a line)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// 0-based column within that line (linter pattern rules only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// Remediation advice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Matched text, redacted for secret rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
}

/// Result of the security scan, bucketed by severity.
#[derive(Debug, Clone, Default)]
pub struct SecurityReport {
    pub issues: BTreeMap<SecuritySeverity, Vec<Finding>>,
    pub summary: String,
    pub total: usize,
    pub critical: usize,
    pub high: usize,
}

/// Result of the lint pass, bucketed by severity.
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    pub issues: BTreeMap<LintSeverity, Vec<Finding>>,
    pub summary: String,
    pub total: usize,
}

/// An inline review comment produced by the AI for a specific patch line.
#[derive(Debug, Clone)]
pub struct AiComment {
    pub file: String,
    /// 1-based line within the file's patch text
    pub line: usize,
    pub body: String,
    pub severity: AiSeverity,
    pub category: AiCategory,
}

/// A file-level observation from the AI with no line anchor.
#[derive(Debug, Clone)]
pub struct AiIssue {
    pub category: AiCategory,
    pub description: String,
    pub suggestion: Option<String>,
}

/// Everything the AI reviewer produced for one pull request.
#[derive(Debug, Clone, Default)]
pub struct AiReview {
    pub comments: Vec<AiComment>,
    pub issues: Vec<AiIssue>,
    pub summary: String,
}

/// Final review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    ChangesRequested,
    ReviewSuggested,
}

impl Verdict {
    /// The GitHub review event this verdict maps to.
    pub fn github_event(&self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVE",
            Verdict::ChangesRequested => "REQUEST_CHANGES",
            Verdict::ReviewSuggested => "COMMENT",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => write!(f, "Approved"),
            Verdict::ChangesRequested => write!(f, "Changes Requested"),
            Verdict::ReviewSuggested => write!(f, "Review Suggested"),
        }
    }
}

/// A comment to attach to a specific line of the PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineComment {
    pub path: String,
    /// 1-based line within the file's patch text
    pub line: usize,
    pub body: String,
}

/// Flattened counters for action outputs and exit signaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetrics {
    pub total_issues: usize,
    pub ai_issues: usize,
    pub security_issues: usize,
    pub linting_issues: usize,
    /// Security critical plus lint error, the gating set
    pub critical_issues: usize,
    /// Security high plus lint warning
    pub high_priority_issues: usize,
}

/// Complete review report. Immutable once built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    pub verdict: Verdict,
    /// All findings from all sources, most urgent first
    pub findings: Vec<Finding>,
    pub counts_by_severity: BTreeMap<Severity, usize>,
    pub counts_by_source: BTreeMap<Source, usize>,
    pub inline_comments: Vec<InlineComment>,
    /// Rendered narrative report
    pub markdown: String,
    pub metrics: ReviewMetrics,
    pub generated_at: DateTime<Utc>,
}
