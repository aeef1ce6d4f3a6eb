pub mod types;

pub use types::{ReviewReport, Verdict};

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use colored::Colorize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ReviewLevel;
use crate::pr::PullRequest;
use types::{
    AiComment, AiIssue, AiReview, AiSeverity, Finding, InlineComment, LintReport, LintSeverity,
    ReviewMetrics, SecurityReport, SecuritySeverity, Severity, Source,
};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Merge the three source results into one decision and one report.
///
/// Pure aside from the embedded timestamp: identical inputs always yield
/// the same verdict, findings, counts, and inline comments. Taking the
/// three results by reference makes a structurally missing source a type
/// error here rather than a silent zero at runtime.
pub fn build(
    pr: &PullRequest,
    ai: &AiReview,
    security: &SecurityReport,
    lint: &LintReport,
    level: ReviewLevel,
) -> ReviewReport {
    let findings = collect_findings(ai, security, lint);
    let verdict = decide(&findings);

    let counts_by_severity = findings
        .iter()
        .fold(BTreeMap::new(), |mut counts, finding| {
            *counts.entry(finding.severity).or_insert(0usize) += 1;
            counts
        });
    let counts_by_source = findings
        .iter()
        .fold(BTreeMap::new(), |mut counts, finding| {
            *counts.entry(finding.source).or_insert(0usize) += 1;
            counts
        });

    let inline_comments = derive_inline_comments(ai, security, lint);
    let metrics = compute_metrics(ai, security, lint);
    let generated_at = Utc::now();
    let markdown = render_markdown(
        pr,
        verdict,
        &metrics,
        ai,
        security,
        lint,
        level,
        generated_at,
    );

    ReviewReport {
        verdict,
        findings,
        counts_by_severity,
        counts_by_source,
        inline_comments,
        markdown,
        metrics,
        generated_at,
    }
}

/// Flatten all three sources into one list, most urgent severity first.
/// The sort is stable, so findings of equal severity keep source order.
fn collect_findings(ai: &AiReview, security: &SecurityReport, lint: &LintReport) -> Vec<Finding> {
    let mut findings: Vec<Finding> = Vec::new();
    for severity in SecuritySeverity::DESCENDING {
        if let Some(bucket) = security.issues.get(&severity) {
            findings.extend(bucket.iter().cloned());
        }
    }
    for severity in LintSeverity::DESCENDING {
        if let Some(bucket) = lint.issues.get(&severity) {
            findings.extend(bucket.iter().cloned());
        }
    }
    findings.extend(ai.comments.iter().map(comment_finding));
    findings.extend(ai.issues.iter().map(issue_finding));
    findings.sort_by_key(|finding| finding.severity);
    findings
}

fn comment_finding(comment: &AiComment) -> Finding {
    Finding {
        source: Source::Ai,
        severity: Severity::Ai(comment.severity),
        rule: comment.category.to_string(),
        message: comment.body.clone(),
        file: Some(comment.file.clone()),
        line: Some(comment.line),
        column: None,
        suggestion: None,
        matched: None,
    }
}

// File-level AI issues have no line anchor and always carry the lowest AI
// severity; only the model's inline comments keep their reported severity.
fn issue_finding(issue: &AiIssue) -> Finding {
    Finding {
        source: Source::Ai,
        severity: Severity::Ai(AiSeverity::Info),
        rule: issue.category.to_string(),
        message: issue.description.clone(),
        file: None,
        line: None,
        column: None,
        suggestion: issue.suggestion.clone(),
        matched: None,
    }
}

/// Strict three-way partition over the union of all findings. AI findings
/// count toward the union but can never force `ChangesRequested`.
fn decide(findings: &[Finding]) -> Verdict {
    if findings.is_empty() {
        return Verdict::Approved;
    }
    if findings.iter().any(|finding| finding.severity.is_blocking()) {
        return Verdict::ChangesRequested;
    }
    Verdict::ReviewSuggested
}

/// Exactly: every AI comment, every critical security finding, every lint
/// error. Lower buckets never produce inline comments. Findings without a
/// line (file-level checks) anchor at line 1 so the count law holds.
fn derive_inline_comments(
    ai: &AiReview,
    security: &SecurityReport,
    lint: &LintReport,
) -> Vec<InlineComment> {
    let mut comments: Vec<InlineComment> = ai
        .comments
        .iter()
        .map(|comment| InlineComment {
            path: comment.file.clone(),
            line: comment.line,
            body: comment.body.clone(),
        })
        .collect();

    if let Some(critical) = security.issues.get(&SecuritySeverity::Critical) {
        for finding in critical {
            comments.push(InlineComment {
                path: finding_path(finding),
                line: finding.line.unwrap_or(1),
                body: security_comment(finding),
            });
        }
    }

    if let Some(errors) = lint.issues.get(&LintSeverity::Error) {
        for finding in errors {
            comments.push(InlineComment {
                path: finding_path(finding),
                line: finding.line.unwrap_or(1),
                body: format!("🔧 **[{}]** {}", finding.rule, finding.message),
            });
        }
    }

    comments
}

// Scanner and linter findings always carry a filename; the field is an
// Option only because AI file-level issues share the struct.
fn finding_path(finding: &Finding) -> String {
    finding.file.clone().unwrap_or_default()
}

fn security_comment(finding: &Finding) -> String {
    let label = match finding.severity {
        Severity::Security(severity) => severity.to_string().to_uppercase(),
        _ => finding.severity.to_string(),
    };
    let mut body = format!("🚨 **{} security issue**: {}", label, finding.message);
    if let Some(matched) = &finding.matched {
        body.push_str(&format!("\n\nMatched: `{}`", matched));
    }
    if let Some(suggestion) = &finding.suggestion {
        body.push_str(&format!("\n\nSuggested fix: {}", suggestion));
    }
    body
}

fn compute_metrics(ai: &AiReview, security: &SecurityReport, lint: &LintReport) -> ReviewMetrics {
    let ai_issues = ai.comments.len() + ai.issues.len();
    let lint_errors = lint.issues.get(&LintSeverity::Error).map_or(0, Vec::len);
    let lint_warnings = lint.issues.get(&LintSeverity::Warning).map_or(0, Vec::len);
    ReviewMetrics {
        total_issues: ai_issues + security.total + lint.total,
        ai_issues,
        security_issues: security.total,
        linting_issues: lint.total,
        critical_issues: security.critical + lint_errors,
        high_priority_issues: security.high + lint_warnings,
    }
}

#[allow(clippy::too_many_arguments)]
fn render_markdown(
    pr: &PullRequest,
    verdict: Verdict,
    metrics: &ReviewMetrics,
    ai: &AiReview,
    security: &SecurityReport,
    lint: &LintReport,
    level: ReviewLevel,
    generated_at: DateTime<Utc>,
) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# 🤖 Automated Review: PR #{} \"{}\"\n\n",
        pr.number, pr.title
    ));
    md.push_str(&format!(
        "**Author:** {} | **Review level:** {} | **Generated:** {}\n\n",
        pr.author,
        level,
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    md.push_str(&banner(verdict, security, lint));
    md.push_str("\n\n");

    md.push_str("## Summary\n\n");
    md.push_str("| Source | Issues | Priority |\n");
    md.push_str("|--------|--------|----------|\n");
    md.push_str(&format!(
        "| AI review | {} | {} |\n",
        metrics.ai_issues,
        ai_glyph(ai)
    ));
    md.push_str(&format!(
        "| Security scan | {} | {} |\n",
        metrics.security_issues,
        security_glyph(security)
    ));
    md.push_str(&format!(
        "| Linter | {} | {} |\n\n",
        metrics.linting_issues,
        lint_glyph(lint)
    ));

    if metrics.ai_issues > 0 {
        md.push_str("## 🤖 AI Review\n\n");
        md.push_str(&ai.summary);
        md.push_str("\n\n");
    }
    if security.total > 0 {
        md.push_str("## 🔒 Security Scan\n\n");
        md.push_str(&security.summary);
        md.push_str("\n\n");
    }
    if lint.total > 0 {
        md.push_str("## 📋 Linter\n\n");
        md.push_str(&lint.summary);
        md.push_str("\n\n");
    }

    md.push_str("## Recommendations\n\n");
    for recommendation in recommendations(security, lint, metrics) {
        md.push_str(&format!("- {}\n", recommendation));
    }
    md.push('\n');

    md.push_str("---\n*Review generated automatically. Treat AI suggestions as advisory.*\n");
    md
}

/// Decision banner. A `ChangesRequested` banner names the category that
/// forced it.
fn banner(verdict: Verdict, security: &SecurityReport, lint: &LintReport) -> String {
    match verdict {
        Verdict::Approved => "### ✅ Approved\n\nNo issues found.".to_string(),
        Verdict::ChangesRequested => format!(
            "### ❌ Changes Requested\n\nBlocking: {}.",
            blocking_reason(security, lint)
        ),
        Verdict::ReviewSuggested => {
            "### ⚠️ Review Suggested\n\nNon-blocking issues found; see details below.".to_string()
        }
    }
}

fn blocking_reason(security: &SecurityReport, lint: &LintReport) -> String {
    let lint_errors = lint.issues.get(&LintSeverity::Error).map_or(0, Vec::len);
    match (security.critical, lint_errors) {
        (0, 0) => "blocking issues".to_string(),
        (c, 0) => format!("{} critical security issue(s)", c),
        (0, e) => format!("{} lint error(s)", e),
        (c, e) => format!("{} critical security issue(s) and {} lint error(s)", c, e),
    }
}

fn security_glyph(security: &SecurityReport) -> &'static str {
    let highest = SecuritySeverity::DESCENDING
        .into_iter()
        .find(|s| security.issues.get(s).map_or(false, |b| !b.is_empty()));
    match highest {
        Some(SecuritySeverity::Critical) => "🔴",
        Some(SecuritySeverity::High) => "🟠",
        Some(SecuritySeverity::Medium) => "🟡",
        Some(SecuritySeverity::Low) => "🟢",
        None => "✅",
    }
}

fn lint_glyph(lint: &LintReport) -> &'static str {
    let highest = LintSeverity::DESCENDING
        .into_iter()
        .find(|s| lint.issues.get(s).map_or(false, |b| !b.is_empty()));
    match highest {
        Some(LintSeverity::Error) => "🔴",
        Some(LintSeverity::Warning) => "🟠",
        Some(LintSeverity::Info) => "🟢",
        None => "✅",
    }
}

fn ai_glyph(ai: &AiReview) -> &'static str {
    if ai.comments.is_empty() && ai.issues.is_empty() {
        return "✅";
    }
    match ai.comments.iter().map(|c| c.severity).max() {
        Some(AiSeverity::Error) => "🔴",
        Some(AiSeverity::Warning) => "🟠",
        Some(AiSeverity::Suggestion) => "🟡",
        _ => "🟢",
    }
}

fn recommendations(
    security: &SecurityReport,
    lint: &LintReport,
    metrics: &ReviewMetrics,
) -> Vec<&'static str> {
    let mut out = Vec::new();
    if security.critical > 0 {
        out.push("🚨 Remove or rotate every flagged secret and fix critical security issues before merging.");
    }
    if security.high > 0 {
        out.push("⚠️ Review the high-severity security findings.");
    }
    if lint.issues.get(&LintSeverity::Error).map_or(false, |b| !b.is_empty()) {
        out.push("🔧 Fix the lint errors; they block this review.");
    }
    if lint.issues.get(&LintSeverity::Warning).map_or(false, |b| !b.is_empty()) {
        out.push("📝 Consider cleaning up the lint warnings.");
    }
    if metrics.ai_issues > 0 {
        out.push("🤖 Read through the AI comments; apply the ones that make sense.");
    }
    if out.is_empty() {
        out.push("✨ No recommendations; the change looks clean.");
    }
    out
}

/// Output the report to the terminal (default) or to a file, as markdown
/// or as JSON.
#[instrument(skip(report), fields(verdict = %report.verdict))]
pub fn output(
    report: &ReviewReport,
    output_path: Option<&Path>,
    json: bool,
) -> Result<(), ReportError> {
    if json {
        let payload = serde_json::to_string_pretty(report)?;
        match output_path {
            None => println!("{}", payload),
            Some(path) => {
                debug!(path = %path.display(), "writing JSON report");
                std::fs::write(path, payload)?;
            }
        }
        return Ok(());
    }
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing markdown report");
            std::fs::write(path, &report.markdown)?;
            Ok(())
        }
    }
}

/// Format and print the report to the terminal with colors.
fn print_terminal_report(report: &ReviewReport) {
    println!();
    println!("═══ Review: {} ═══", colorize_verdict(report.verdict));
    println!(
        "Issues: {} total | ai {} | security {} | lint {}",
        report.metrics.total_issues,
        report.metrics.ai_issues,
        report.metrics.security_issues,
        report.metrics.linting_issues
    );
    println!();

    if report.findings.is_empty() {
        println!("  No findings.");
    } else {
        for finding in &report.findings {
            let location = match (&finding.file, finding.line) {
                (Some(f), Some(l)) => format!(" ({}:{})", f, l),
                (Some(f), None) => format!(" ({})", f),
                _ => String::new(),
            };
            println!(
                "  • {} [{}] {}{}",
                colorize_severity(finding.severity),
                finding.rule,
                finding.message,
                location
            );
        }
    }

    if !report.inline_comments.is_empty() {
        println!();
        println!(
            "{} inline comment(s) ready to post.",
            report.inline_comments.len()
        );
    }
    println!();
}

fn colorize_verdict(verdict: Verdict) -> colored::ColoredString {
    match verdict {
        Verdict::Approved => "APPROVED".green().bold(),
        Verdict::ChangesRequested => "CHANGES REQUESTED".red().bold(),
        Verdict::ReviewSuggested => "REVIEW SUGGESTED".yellow().bold(),
    }
}

fn colorize_severity(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Security(SecuritySeverity::Critical) | Severity::Lint(LintSeverity::Error) => {
            severity.to_string().red().bold()
        }
        Severity::Security(SecuritySeverity::High) | Severity::Lint(LintSeverity::Warning) => {
            severity.to_string().yellow()
        }
        Severity::Ai(_) => severity.to_string().cyan(),
        _ => severity.to_string().normal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::AiCategory;

    fn sample_pr() -> PullRequest {
        PullRequest {
            number: 42,
            title: "Add OAuth2 login flow".to_string(),
            author: "alice".to_string(),
            files_changed: 2,
            additions: 120,
            deletions: 8,
            files: vec![],
        }
    }

    fn security_finding(severity: SecuritySeverity, rule: &str) -> Finding {
        Finding {
            source: Source::Security,
            severity: Severity::Security(severity),
            rule: rule.to_string(),
            message: format!("{} detected", rule),
            file: Some("src/auth.js".to_string()),
            line: Some(3),
            column: None,
            suggestion: Some("Rotate the credential".to_string()),
            matched: Some("AKIA********...".to_string()),
        }
    }

    fn lint_finding(severity: LintSeverity, rule: &str) -> Finding {
        Finding {
            source: Source::Lint,
            severity: Severity::Lint(severity),
            rule: rule.to_string(),
            message: format!("{} violation", rule),
            file: Some("src/app.js".to_string()),
            line: Some(7),
            column: Some(2),
            suggestion: None,
            matched: None,
        }
    }

    fn security_report(findings: Vec<Finding>) -> SecurityReport {
        let mut issues: BTreeMap<SecuritySeverity, Vec<Finding>> = BTreeMap::new();
        for finding in findings {
            if let Severity::Security(severity) = finding.severity {
                issues.entry(severity).or_default().push(finding);
            }
        }
        let total = issues.values().map(Vec::len).sum();
        let critical = issues.get(&SecuritySeverity::Critical).map_or(0, Vec::len);
        let high = issues.get(&SecuritySeverity::High).map_or(0, Vec::len);
        SecurityReport {
            issues,
            summary: format!("{} security issue(s) detected.", total),
            total,
            critical,
            high,
        }
    }

    fn lint_report(findings: Vec<Finding>) -> LintReport {
        let mut issues: BTreeMap<LintSeverity, Vec<Finding>> = BTreeMap::new();
        for finding in findings {
            if let Severity::Lint(severity) = finding.severity {
                issues.entry(severity).or_default().push(finding);
            }
        }
        let total = issues.values().map(Vec::len).sum();
        LintReport {
            issues,
            summary: format!("{} linting issue(s) detected.", total),
            total,
        }
    }

    fn ai_comment(severity: AiSeverity, body: &str) -> AiComment {
        AiComment {
            file: "src/app.js".to_string(),
            line: 5,
            body: body.to_string(),
            severity,
            category: AiCategory::Bug,
        }
    }

    fn ai_review(comments: Vec<AiComment>, issues: Vec<AiIssue>) -> AiReview {
        AiReview {
            comments,
            issues,
            summary: "AI summary.".to_string(),
        }
    }

    #[test]
    fn test_all_empty_is_approved() {
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &SecurityReport::default(),
            &LintReport::default(),
            ReviewLevel::Standard,
        );
        assert_eq!(report.verdict, Verdict::Approved);
        assert!(report.findings.is_empty());
        assert!(report.inline_comments.is_empty());
        assert_eq!(report.metrics.total_issues, 0);
        assert!(report.markdown.contains("| AI review | 0 |"));
        assert!(report.markdown.contains("| Security scan | 0 |"));
        assert!(report.markdown.contains("| Linter | 0 |"));
        assert!(report.markdown.contains("✅ Approved"));
    }

    #[test]
    fn test_single_high_security_is_review_suggested() {
        let security = security_report(vec![security_finding(
            SecuritySeverity::High,
            "credential-assignment",
        )]);
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &security,
            &LintReport::default(),
            ReviewLevel::Standard,
        );
        assert_eq!(report.verdict, Verdict::ReviewSuggested);
        assert!(report.inline_comments.is_empty());
        assert!(report.markdown.contains("## 🔒 Security Scan"));
    }

    #[test]
    fn test_single_lint_error_requests_changes() {
        let lint = lint_report(vec![lint_finding(LintSeverity::Error, "empty-catch")]);
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &SecurityReport::default(),
            &lint,
            ReviewLevel::Standard,
        );
        assert_eq!(report.verdict, Verdict::ChangesRequested);
        assert_eq!(report.inline_comments.len(), 1);
        assert!(report.inline_comments[0].body.contains("[empty-catch]"));
        assert!(report.markdown.contains("1 lint error(s)"));
    }

    #[test]
    fn test_critical_security_requests_changes_and_is_explained() {
        let security = security_report(vec![security_finding(
            SecuritySeverity::Critical,
            "aws-access-key",
        )]);
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &security,
            &LintReport::default(),
            ReviewLevel::Standard,
        );
        assert_eq!(report.verdict, Verdict::ChangesRequested);
        assert!(report.markdown.contains("1 critical security issue(s)"));
        assert_eq!(report.inline_comments.len(), 1);
        assert!(report.inline_comments[0].body.contains("CRITICAL security issue"));
        assert!(report.inline_comments[0].body.contains("Rotate the credential"));
    }

    #[test]
    fn test_ai_error_never_gates() {
        let ai = ai_review(vec![ai_comment(AiSeverity::Error, "Likely bug")], vec![]);
        let report = build(
            &sample_pr(),
            &ai,
            &SecurityReport::default(),
            &LintReport::default(),
            ReviewLevel::Standard,
        );
        assert_eq!(report.verdict, Verdict::ReviewSuggested);
    }

    #[test]
    fn test_inline_comment_law() {
        let ai = ai_review(
            vec![
                ai_comment(AiSeverity::Warning, "Check nulls"),
                ai_comment(AiSeverity::Info, "Rename this"),
            ],
            vec![AiIssue {
                category: AiCategory::Performance,
                description: "Quadratic loop".to_string(),
                suggestion: None,
            }],
        );
        let security = security_report(vec![
            security_finding(SecuritySeverity::Critical, "github-token"),
            security_finding(SecuritySeverity::High, "jwt-literal"),
        ]);
        let lint = lint_report(vec![
            lint_finding(LintSeverity::Error, "no-debugger"),
            lint_finding(LintSeverity::Warning, "no-console"),
        ]);
        let report = build(&sample_pr(), &ai, &security, &lint, ReviewLevel::Standard);

        // 2 AI comments + 1 critical + 1 lint error; nothing else.
        assert_eq!(report.inline_comments.len(), 4);
        assert_eq!(report.inline_comments[0].body, "Check nulls");
        assert!(report.inline_comments[2].body.contains("github-token"));
        assert!(report.inline_comments[3].body.contains("[no-debugger]"));
    }

    #[test]
    fn test_file_level_lint_error_still_gets_a_comment() {
        // A custom complexity rule at error severity produces a finding
        // with a file but no line; it gates, so it must also comment.
        let mut finding = lint_finding(LintSeverity::Error, "complexity");
        finding.line = None;
        let lint = lint_report(vec![finding]);
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &SecurityReport::default(),
            &lint,
            ReviewLevel::Standard,
        );
        assert_eq!(report.verdict, Verdict::ChangesRequested);
        assert_eq!(report.inline_comments.len(), 1);
        assert_eq!(report.inline_comments[0].line, 1);
        assert_eq!(report.inline_comments[0].path, "src/app.js");
        assert!(report.inline_comments[0].body.contains("[complexity]"));
    }

    #[test]
    fn test_findings_sorted_most_urgent_first() {
        let ai = ai_review(vec![ai_comment(AiSeverity::Error, "AI error")], vec![]);
        let security = security_report(vec![
            security_finding(SecuritySeverity::Medium, "weak-randomness"),
            security_finding(SecuritySeverity::Critical, "aws-access-key"),
        ]);
        let lint = lint_report(vec![lint_finding(LintSeverity::Error, "no-debugger")]);
        let report = build(&sample_pr(), &ai, &security, &lint, ReviewLevel::Standard);

        assert_eq!(
            report.findings[0].severity,
            Severity::Security(SecuritySeverity::Critical)
        );
        assert_eq!(report.findings[1].severity, Severity::Lint(LintSeverity::Error));
        assert_eq!(
            report.findings.last().unwrap().severity,
            Severity::Ai(AiSeverity::Error)
        );
        let severity_total: usize = report.counts_by_severity.values().sum();
        let source_total: usize = report.counts_by_source.values().sum();
        assert_eq!(severity_total, report.findings.len());
        assert_eq!(source_total, report.findings.len());
    }

    #[test]
    fn test_metrics_flattening() {
        let ai = ai_review(
            vec![ai_comment(AiSeverity::Warning, "Check nulls")],
            vec![AiIssue {
                category: AiCategory::Style,
                description: "Deep nesting".to_string(),
                suggestion: None,
            }],
        );
        let security = security_report(vec![
            security_finding(SecuritySeverity::Critical, "aws-access-key"),
            security_finding(SecuritySeverity::High, "jwt-literal"),
        ]);
        let lint = lint_report(vec![
            lint_finding(LintSeverity::Error, "no-debugger"),
            lint_finding(LintSeverity::Warning, "no-console"),
            lint_finding(LintSeverity::Info, "magic-number"),
        ]);
        let report = build(&sample_pr(), &ai, &security, &lint, ReviewLevel::Standard);

        assert_eq!(report.metrics.total_issues, 7);
        assert_eq!(report.metrics.ai_issues, 2);
        assert_eq!(report.metrics.security_issues, 2);
        assert_eq!(report.metrics.linting_issues, 3);
        assert_eq!(report.metrics.critical_issues, 2);
        assert_eq!(report.metrics.high_priority_issues, 2);
    }

    #[test]
    fn test_build_is_idempotent() {
        let ai = ai_review(vec![ai_comment(AiSeverity::Warning, "Check nulls")], vec![]);
        let security = security_report(vec![security_finding(
            SecuritySeverity::High,
            "jwt-literal",
        )]);
        let lint = lint_report(vec![lint_finding(LintSeverity::Warning, "no-console")]);

        let first = build(&sample_pr(), &ai, &security, &lint, ReviewLevel::Standard);
        let second = build(&sample_pr(), &ai, &security, &lint, ReviewLevel::Standard);

        assert_eq!(first.verdict, second.verdict);
        assert_eq!(first.counts_by_severity, second.counts_by_severity);
        assert_eq!(first.counts_by_source, second.counts_by_source);
        assert_eq!(first.inline_comments, second.inline_comments);
    }

    #[test]
    fn test_markdown_section_order() {
        let ai = ai_review(vec![ai_comment(AiSeverity::Info, "Nit")], vec![]);
        let security = security_report(vec![security_finding(
            SecuritySeverity::Low,
            "plain-http-url",
        )]);
        let lint = lint_report(vec![lint_finding(LintSeverity::Info, "magic-number")]);
        let report = build(&sample_pr(), &ai, &security, &lint, ReviewLevel::Strict);
        let md = &report.markdown;

        let title = md.find("# 🤖 Automated Review").unwrap();
        let banner = md.find("### ⚠️ Review Suggested").unwrap();
        let summary = md.find("## Summary").unwrap();
        let ai_section = md.find("## 🤖 AI Review").unwrap();
        let security_section = md.find("## 🔒 Security Scan").unwrap();
        let lint_section = md.find("## 📋 Linter").unwrap();
        let recs = md.find("## Recommendations").unwrap();
        let footer = md.find("---\n*Review generated").unwrap();

        assert!(title < banner);
        assert!(banner < summary);
        assert!(summary < ai_section);
        assert!(ai_section < security_section);
        assert!(security_section < lint_section);
        assert!(lint_section < recs);
        assert!(recs < footer);
        assert!(md.contains("**Review level:** strict"));
    }

    #[test]
    fn test_sections_omitted_when_source_is_clean() {
        let lint = lint_report(vec![lint_finding(LintSeverity::Info, "magic-number")]);
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &SecurityReport::default(),
            &lint,
            ReviewLevel::Standard,
        );
        assert!(!report.markdown.contains("## 🤖 AI Review"));
        assert!(!report.markdown.contains("## 🔒 Security Scan"));
        assert!(report.markdown.contains("## 📋 Linter"));
        // Clean sources still show a zero row in the table.
        assert!(report.markdown.contains("| AI review | 0 |"));
    }

    #[test]
    fn test_output_markdown_to_file() {
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &SecurityReport::default(),
            &LintReport::default(),
            ReviewLevel::Standard,
        );
        let path = std::env::temp_dir().join("sentinel_report_test.md");
        output(&report, Some(&path), false).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# 🤖 Automated Review: PR #42"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_output_json_to_file() {
        let lint = lint_report(vec![lint_finding(LintSeverity::Error, "no-debugger")]);
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &SecurityReport::default(),
            &lint,
            ReviewLevel::Standard,
        );
        let path = std::env::temp_dir().join("sentinel_report_test.json");
        output(&report, Some(&path), true).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["verdict"], "changes_requested");
        assert_eq!(value["metrics"]["criticalIssues"], 1);
        assert_eq!(value["countsBySeverity"]["lint/error"], 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_terminal_report_does_not_panic() {
        let lint = lint_report(vec![lint_finding(LintSeverity::Warning, "no-console")]);
        let report = build(
            &sample_pr(),
            &AiReview::default(),
            &SecurityReport::default(),
            &lint,
            ReviewLevel::Standard,
        );
        output(&report, None, false).unwrap();
    }
}
