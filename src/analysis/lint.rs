use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{filter, line_at_offset};
use crate::pr::ReviewFile;
use crate::report::types::{Finding, LintReport, LintSeverity, Severity, Source};

const JS_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte"];

const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "py", "rb", "go", "rs", "java", "kt", "swift", "c",
    "h", "cpp", "hpp", "cs", "php", "scala",
];

#[derive(Debug, Error)]
pub enum LintError {
    #[error("Invalid lint rule '{name}': {source}")]
    InvalidPattern {
        name: String,
        source: regex::Error,
    },
}

/// A lint rule as written in configuration. Custom rules use the same
/// shapes as the built-in table and are appended after it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LintRule {
    Pattern {
        name: String,
        pattern: String,
        severity: LintSeverity,
        message: String,
        /// Matched values to suppress, compared as integers. A match that
        /// does not parse as an integer is never suppressed.
        #[serde(default)]
        exceptions: Vec<i64>,
        /// File extensions the rule applies to; absent means all files
        #[serde(default)]
        extensions: Option<Vec<String>>,
    },
    LineLength {
        max_length: usize,
        severity: LintSeverity,
    },
    Complexity {
        threshold: usize,
        severity: LintSeverity,
    },
    ImportDuplicate {
        severity: LintSeverity,
    },
}

#[derive(Debug)]
enum CompiledRule {
    Pattern {
        name: String,
        regex: Regex,
        severity: LintSeverity,
        message: String,
        exceptions: Vec<i64>,
        extensions: Option<Vec<String>>,
    },
    LineLength {
        max_length: usize,
        severity: LintSeverity,
    },
    Complexity {
        threshold: usize,
        severity: LintSeverity,
    },
    ImportDuplicate {
        severity: LintSeverity,
    },
}

/// Custom Linter
///
/// Applies the built-in rule table plus any config-supplied rules to each
/// file's patch text, then a set of unconditional textual checks (empty
/// error handlers, async without await, bindings never referenced again).
/// Pattern rules only report matches on added lines; complexity is scored
/// over the whole patch text.
#[derive(Debug)]
pub struct Linter {
    rules: Vec<CompiledRule>,
}

impl Linter {
    /// Build a linter from the default table with custom rules appended.
    pub fn new(custom: &[LintRule]) -> Result<Self, LintError> {
        let mut rules = default_rules();
        for rule in custom {
            rules.push(compile_rule(rule)?);
        }
        Ok(Self { rules })
    }

    /// Lint every eligible file and bucket findings by severity.
    pub fn lint(&self, files: &[ReviewFile]) -> LintReport {
        let mut findings = Vec::new();
        for file in files {
            if !filter::is_reviewable(&file.filename) {
                continue;
            }
            let Some(patch) = file.patch.as_deref() else {
                continue;
            };
            for rule in &self.rules {
                findings.extend(apply_rule(rule, &file.filename, patch));
            }
            findings.extend(check_empty_catch(&file.filename, patch));
            findings.extend(check_async_without_await(&file.filename, patch));
            findings.extend(check_unused_bindings(&file.filename, patch));
        }
        debug!(findings = findings.len(), "lint pass complete");
        build_lint_report(findings)
    }
}

fn exts(list: &[&str]) -> Option<Vec<String>> {
    Some(list.iter().map(|s| s.to_string()).collect())
}

fn default_rules() -> Vec<CompiledRule> {
    vec![
        CompiledRule::Pattern {
            name: "no-debugger".to_string(),
            regex: Regex::new(r"\bdebugger\b").expect("regex: debugger"),
            severity: LintSeverity::Error,
            message: "debugger statement committed".to_string(),
            exceptions: Vec::new(),
            extensions: exts(JS_EXTENSIONS),
        },
        CompiledRule::Pattern {
            name: "no-console".to_string(),
            regex: Regex::new(r"console\.(log|debug|info|warn|error|trace)\s*\(")
                .expect("regex: console"),
            severity: LintSeverity::Warning,
            message: "console statement left in code".to_string(),
            exceptions: Vec::new(),
            extensions: exts(JS_EXTENSIONS),
        },
        CompiledRule::Pattern {
            name: "no-var".to_string(),
            regex: Regex::new(r"\bvar\s+\w").expect("regex: var"),
            severity: LintSeverity::Warning,
            message: "var declaration; prefer let or const".to_string(),
            exceptions: Vec::new(),
            extensions: exts(JS_EXTENSIONS),
        },
        CompiledRule::Pattern {
            name: "loose-equality".to_string(),
            regex: Regex::new(r"[^=!<>]==[^=]|[^!]!=[^=]").expect("regex: loose equality"),
            severity: LintSeverity::Warning,
            message: "loose equality; prefer === or !==".to_string(),
            exceptions: Vec::new(),
            extensions: exts(JS_EXTENSIONS),
        },
        CompiledRule::Pattern {
            name: "magic-number".to_string(),
            regex: Regex::new(r"\b\d+\b").expect("regex: magic number"),
            severity: LintSeverity::Info,
            message: "magic number; consider a named constant".to_string(),
            exceptions: vec![0, 1, 2, 10, 100],
            extensions: exts(CODE_EXTENSIONS),
        },
        CompiledRule::Pattern {
            name: "todo-comment".to_string(),
            regex: Regex::new(r"(?i)(//|#)\s*(todo|fixme|hack)\b").expect("regex: todo"),
            severity: LintSeverity::Info,
            message: "TODO left in changed code".to_string(),
            exceptions: Vec::new(),
            extensions: None,
        },
        CompiledRule::LineLength {
            max_length: 120,
            severity: LintSeverity::Warning,
        },
        CompiledRule::Complexity {
            threshold: 10,
            severity: LintSeverity::Warning,
        },
        CompiledRule::ImportDuplicate {
            severity: LintSeverity::Warning,
        },
    ]
}

fn compile_rule(rule: &LintRule) -> Result<CompiledRule, LintError> {
    Ok(match rule {
        LintRule::Pattern {
            name,
            pattern,
            severity,
            message,
            exceptions,
            extensions,
        } => CompiledRule::Pattern {
            regex: Regex::new(pattern).map_err(|source| LintError::InvalidPattern {
                name: name.clone(),
                source,
            })?,
            name: name.clone(),
            severity: *severity,
            message: message.clone(),
            exceptions: exceptions.clone(),
            extensions: extensions.clone(),
        },
        LintRule::LineLength {
            max_length,
            severity,
        } => CompiledRule::LineLength {
            max_length: *max_length,
            severity: *severity,
        },
        LintRule::Complexity {
            threshold,
            severity,
        } => CompiledRule::Complexity {
            threshold: *threshold,
            severity: *severity,
        },
        LintRule::ImportDuplicate { severity } => CompiledRule::ImportDuplicate {
            severity: *severity,
        },
    })
}

fn apply_rule(rule: &CompiledRule, filename: &str, patch: &str) -> Vec<Finding> {
    match rule {
        CompiledRule::Pattern {
            name,
            regex,
            severity,
            message,
            exceptions,
            extensions,
        } => {
            if !extension_matches(filename, extensions.as_deref()) {
                return Vec::new();
            }
            let mut out = Vec::new();
            for m in regex.find_iter(patch) {
                if !is_added_line(patch, m.start()) {
                    continue;
                }
                if let Ok(n) = m.as_str().trim().parse::<i64>() {
                    if exceptions.contains(&n) {
                        continue;
                    }
                }
                out.push(lint_finding(
                    name,
                    *severity,
                    message.clone(),
                    filename,
                    Some(line_at_offset(patch, m.start())),
                    Some(column_at(patch, m.start())),
                ));
            }
            out
        }
        CompiledRule::LineLength {
            max_length,
            severity,
        } => {
            let mut out = Vec::new();
            for (idx, line) in patch.lines().enumerate() {
                if !line.starts_with('+') {
                    continue;
                }
                // Measure without the diff marker.
                let length = line.chars().count().saturating_sub(1);
                if length > *max_length {
                    out.push(lint_finding(
                        "max-line-length",
                        *severity,
                        format!("Line exceeds {} characters ({})", max_length, length),
                        filename,
                        Some(idx + 1),
                        None,
                    ));
                }
            }
            out
        }
        CompiledRule::Complexity {
            threshold,
            severity,
        } => {
            let score = 1 + COMPLEXITY_TOKENS.find_iter(patch).count();
            if score > *threshold {
                vec![lint_finding(
                    "complexity",
                    *severity,
                    format!("Approximate complexity {} exceeds threshold {}", score, threshold),
                    filename,
                    None,
                    None,
                )]
            } else {
                Vec::new()
            }
        }
        CompiledRule::ImportDuplicate { severity } => {
            check_duplicate_imports(filename, patch, *severity)
        }
    }
}

static COMPLEXITY_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(if|for|while|case|catch)\b|&&|\|\||\?").expect("regex: complexity tokens")
});

static ES_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[+ ]\s*import\b[^'"\n]*['"]([^'"]+)['"]"#).expect("regex: es import")
});

static REQUIRE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("regex: require")
});

static PY_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[+ ]\s*(?:from\s+([\w.]+)\s+import\b|import\s+([\w.]+))")
        .expect("regex: py import")
});

fn check_duplicate_imports(filename: &str, patch: &str, severity: LintSeverity) -> Vec<Finding> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    // (offset, target) pairs, gathered per language family
    let mut targets: Vec<(usize, String)> = Vec::new();
    match ext.as_deref() {
        Some(e) if JS_EXTENSIONS.contains(&e) => {
            for cap in ES_IMPORT.captures_iter(patch) {
                if let Some(m) = cap.get(1) {
                    targets.push((m.start(), m.as_str().to_string()));
                }
            }
            for cap in REQUIRE_CALL.captures_iter(patch) {
                if let (Some(whole), Some(target)) = (cap.get(0), cap.get(1)) {
                    if !is_removed_line(patch, whole.start()) {
                        targets.push((target.start(), target.as_str().to_string()));
                    }
                }
            }
        }
        Some("py") => {
            for cap in PY_IMPORT.captures_iter(patch) {
                if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
                    targets.push((m.start(), m.as_str().to_string()));
                }
            }
        }
        _ => {}
    }

    targets.sort_by_key(|(offset, _)| *offset);

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for (offset, target) in targets {
        let count = seen.entry(target.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            out.push(lint_finding(
                "duplicate-import",
                severity,
                format!("Duplicate import of '{}'", target),
                filename,
                Some(line_at_offset(patch, offset)),
                None,
            ));
        }
    }
    out
}

// The character class after `{` tolerates diff markers on continuation lines.
static EMPTY_CATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"catch\s*(\([^)]*\))?\s*\{[\s+]*\}").expect("regex: empty catch"));

static EMPTY_EXCEPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\+\s*except[^:\n]*:\s*\n\+\s*pass\b").expect("regex: empty except")
});

fn check_empty_catch(filename: &str, patch: &str) -> Vec<Finding> {
    let mut out = Vec::new();
    for m in EMPTY_CATCH.find_iter(patch) {
        if !is_added_line(patch, m.start()) {
            continue;
        }
        out.push(lint_finding(
            "empty-catch",
            LintSeverity::Error,
            "Empty catch block swallows errors".to_string(),
            filename,
            Some(line_at_offset(patch, m.start())),
            None,
        ));
    }
    for m in EMPTY_EXCEPT.find_iter(patch) {
        out.push(lint_finding(
            "empty-catch",
            LintSeverity::Error,
            "Exception handler only passes".to_string(),
            filename,
            Some(line_at_offset(patch, m.start())),
            None,
        ));
    }
    out
}

static ASYNC_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\basync\s+(function\b|def\b|\w+\s*\(|\()").expect("regex: async decl")
});

static AWAIT_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bawait\b").expect("regex: await"));

/// Flags a change that introduces async functions but never awaits.
/// Whole-patch granularity: if any await appears, the check stays quiet.
fn check_async_without_await(filename: &str, patch: &str) -> Vec<Finding> {
    if AWAIT_KEYWORD.is_match(patch) {
        return Vec::new();
    }
    for m in ASYNC_DECL.find_iter(patch) {
        if is_added_line(patch, m.start()) {
            return vec![lint_finding(
                "async-without-await",
                LintSeverity::Warning,
                "Async function without any await".to_string(),
                filename,
                Some(line_at_offset(patch, m.start())),
                None,
            )];
        }
    }
    Vec::new()
}

static BINDING_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:let|const|var)\s+([A-Za-z_]\w*)").expect("regex: binding"));

/// Purely textual occurrence count, so bindings echoed only in comments or
/// strings still count as used; that imprecision is inherent to linting
/// patch text without a parser.
fn check_unused_bindings(filename: &str, patch: &str) -> Vec<Finding> {
    let mut out = Vec::new();
    for cap in BINDING_DECL.captures_iter(patch) {
        let Some(ident) = cap.get(1) else {
            continue;
        };
        if !is_added_line(patch, ident.start()) {
            continue;
        }
        let name = ident.as_str();
        if name.starts_with('_') {
            continue;
        }
        let Ok(word) = Regex::new(&format!(r"\b{}\b", regex::escape(name))) else {
            continue;
        };
        if word.find_iter(patch).count() <= 1 {
            out.push(lint_finding(
                "unused-binding",
                LintSeverity::Info,
                format!("Binding '{}' is not referenced anywhere else in this change", name),
                filename,
                Some(line_at_offset(patch, ident.start())),
                None,
            ));
        }
    }
    out
}

fn lint_finding(
    rule: &str,
    severity: LintSeverity,
    message: String,
    filename: &str,
    line: Option<usize>,
    column: Option<usize>,
) -> Finding {
    Finding {
        source: Source::Lint,
        severity: Severity::Lint(severity),
        rule: rule.to_string(),
        message,
        file: Some(filename.to_string()),
        line,
        column,
        suggestion: None,
        matched: None,
    }
}

fn extension_matches(filename: &str, extensions: Option<&[String]>) -> bool {
    let Some(list) = extensions else {
        return true;
    };
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some(ext) => list.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

fn line_text_at(patch: &str, offset: usize) -> &str {
    let start = patch[..offset].rfind('\n').map_or(0, |p| p + 1);
    let end = patch[offset..].find('\n').map_or(patch.len(), |p| offset + p);
    &patch[start..end]
}

fn is_added_line(patch: &str, offset: usize) -> bool {
    line_text_at(patch, offset).starts_with('+')
}

fn is_removed_line(patch: &str, offset: usize) -> bool {
    line_text_at(patch, offset).starts_with('-')
}

/// 0-based column of an offset within its line.
fn column_at(patch: &str, offset: usize) -> usize {
    match patch[..offset].rfind('\n') {
        Some(pos) => offset - pos - 1,
        None => offset,
    }
}

/// Fold findings into severity buckets. Same discipline as the security
/// scanner, over the linter's own vocabulary.
fn build_lint_report(findings: Vec<Finding>) -> LintReport {
    let issues: BTreeMap<LintSeverity, Vec<Finding>> =
        findings
            .into_iter()
            .fold(BTreeMap::new(), |mut buckets, finding| {
                if let Severity::Lint(severity) = finding.severity {
                    buckets.entry(severity).or_default().push(finding);
                }
                buckets
            });

    let total = issues.values().map(|v| v.len()).sum();
    let summary = summarize(&issues, total);

    LintReport {
        issues,
        summary,
        total,
    }
}

fn summarize(issues: &BTreeMap<LintSeverity, Vec<Finding>>, total: usize) -> String {
    if total == 0 {
        return "No linting issues detected.".to_string();
    }
    let mut out = format!("{} linting issue(s) detected.", total);
    for severity in LintSeverity::DESCENDING {
        let Some(bucket) = issues.get(&severity) else {
            continue;
        };
        if bucket.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "\n{} ({}):",
            severity.to_string().to_uppercase(),
            bucket.len()
        ));
        for finding in bucket.iter().take(3) {
            let location = match (&finding.file, finding.line) {
                (Some(f), Some(l)) => format!(" ({}:{})", f, l),
                (Some(f), None) => format!(" ({})", f),
                _ => String::new(),
            };
            out.push_str(&format!("\n  - [{}] {}{}", finding.rule, finding.message, location));
        }
        if bucket.len() > 3 {
            out.push_str(&format!("\n  ...and {} more", bucket.len() - 3));
        }
    }
    out
}
