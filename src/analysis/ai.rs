use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::filter;
use crate::config::ReviewLevel;
use crate::llm::{ChatBackend, LlmError};
use crate::pr::ReviewFile;
use crate::report::types::{AiCategory, AiComment, AiIssue, AiReview, AiSeverity};

const SYSTEM_PROMPT: &str =
    "You are an experienced code reviewer. Respond with a single JSON object and nothing else.";

/// AI Code Reviewer
///
/// Sends each eligible file's patch to the model with an instruction block
/// for the configured strictness level, then asks for one aggregate prose
/// summary. A failed call or unparseable response degrades that file to an
/// empty contribution; it never aborts the rest of the batch.
pub struct AiReviewer<'a> {
    backend: &'a dyn ChatBackend,
    level: ReviewLevel,
}

impl<'a> AiReviewer<'a> {
    pub fn new(backend: &'a dyn ChatBackend, level: ReviewLevel) -> Self {
        Self { backend, level }
    }

    /// Review files in input order and return every comment and issue the
    /// model produced, plus a summary.
    #[instrument(skip(self, files))]
    pub async fn review(&self, files: &[ReviewFile]) -> AiReview {
        let mut review = AiReview::default();
        for file in files {
            if !filter::is_reviewable(&file.filename) {
                continue;
            }
            let Some(patch) = file.patch.as_deref() else {
                continue;
            };
            let prompt = file_prompt(&file.filename, patch, self.level);
            match self.backend.complete(SYSTEM_PROMPT, &prompt).await {
                Ok(content) => {
                    let (comments, issues) = parse_file_review(&file.filename, &content);
                    debug!(
                        file = %file.filename,
                        comments = comments.len(),
                        issues = issues.len(),
                        "ai file review parsed"
                    );
                    review.comments.extend(comments);
                    review.issues.extend(issues);
                }
                Err(LlmError::MissingApiKey) => {
                    // The key is the same for every call; no point retrying
                    // the remaining files.
                    warn!("no LLM API key configured; skipping AI review");
                    review.summary = "AI review skipped: no API key configured.".to_string();
                    return review;
                }
                Err(err) => {
                    warn!(file = %file.filename, error = %err, "AI review failed for file");
                }
            }
        }
        review.summary = self.summarize(&review).await;
        review
    }

    async fn summarize(&self, review: &AiReview) -> String {
        if review.issues.is_empty() {
            return fallback_summary(review);
        }
        match self.backend.complete(SYSTEM_PROMPT, &summary_prompt(&review.issues)).await {
            Ok(content) => match parse_summary(&content) {
                Some(summary) => summary,
                None => {
                    warn!("AI summary response was malformed");
                    fallback_summary(review)
                }
            },
            Err(err) => {
                warn!(error = %err, "AI summary call failed");
                fallback_summary(review)
            }
        }
    }
}

fn level_instruction(level: ReviewLevel) -> &'static str {
    match level {
        ReviewLevel::Light => {
            "Report only clear bugs and security problems. \
             Ignore style, naming, and minor improvements."
        }
        ReviewLevel::Standard => {
            "Report bugs, security problems, performance issues, \
             and significant style concerns. Skip nitpicks."
        }
        ReviewLevel::Strict => {
            "Review exhaustively. Report bugs, security problems, performance \
             issues, style violations, confusing naming, missing error \
             handling, and any deviation from best practices."
        }
    }
}

fn file_prompt(filename: &str, patch: &str, level: ReviewLevel) -> String {
    format!(
        "Review this patch from `{filename}`.\n\n\
         {instruction}\n\n\
         Line numbers are 1-based positions within the patch text shown below, \
         counting the @@ hunk header as line 1.\n\n\
         Respond with a JSON object of exactly this shape:\n\
         {{\"comments\": [{{\"line\": 1, \"body\": \"...\", \"severity\": \
         \"info|suggestion|warning|error\", \"category\": \
         \"bug|security|performance|style|best-practice\"}}], \
         \"issues\": [{{\"type\": \"bugs|security|performance|code-smells|best-practices\", \
         \"description\": \"...\", \"suggestion\": \"...\"}}]}}\n\n\
         Use an empty array when there is nothing to report.\n\n\
         Patch:\n{patch}",
        filename = filename,
        instruction = level_instruction(level),
        patch = patch,
    )
}

fn summary_prompt(issues: &[AiIssue]) -> String {
    let mut sections = String::new();
    for category in AiCategory::ALL {
        let descriptions: Vec<&str> = issues
            .iter()
            .filter(|issue| issue.category == category)
            .take(3)
            .map(|issue| issue.description.as_str())
            .collect();
        if descriptions.is_empty() {
            continue;
        }
        sections.push_str(&format!("\n{}:\n", category));
        for description in descriptions {
            sections.push_str(&format!("- {}\n", description));
        }
    }
    format!(
        "Write a short prose summary (2-4 sentences) of this code review \
         for the pull request author, based on the findings below. \
         Respond with a JSON object of the shape {{\"summary\": \"...\"}}.\n{}",
        sections
    )
}

fn parse_summary(content: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(strip_code_fence(content)).ok()?;
    let summary = value.get("summary")?.as_str()?.trim();
    if summary.is_empty() {
        return None;
    }
    Some(summary.to_string())
}

fn fallback_summary(review: &AiReview) -> String {
    if review.comments.is_empty() && review.issues.is_empty() {
        return "AI review found no issues.".to_string();
    }
    format!(
        "AI review produced {} inline comment(s) and {} broader issue(s).",
        review.comments.len(),
        review.issues.len()
    )
}

/// Models sometimes wrap JSON in a markdown fence despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn parse_file_review(filename: &str, content: &str) -> (Vec<AiComment>, Vec<AiIssue>) {
    let Ok(value) = serde_json::from_str::<Value>(strip_code_fence(content)) else {
        warn!(file = %filename, "AI response was not valid JSON");
        return (Vec::new(), Vec::new());
    };

    let comments = value
        .get("comments")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| parse_comment(filename, entry))
                .collect()
        })
        .unwrap_or_default();

    let issues = value
        .get("issues")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_issue).collect())
        .unwrap_or_default();

    (comments, issues)
}

fn parse_comment(filename: &str, entry: &Value) -> Option<AiComment> {
    let body = entry.get("body").and_then(Value::as_str)?.trim();
    if body.is_empty() {
        return None;
    }
    Some(AiComment {
        file: filename.to_string(),
        line: parse_line(entry.get("line")),
        body: body.to_string(),
        severity: AiSeverity::parse(string_field(entry, "severity")),
        category: AiCategory::parse(string_field(entry, "category")),
    })
}

fn parse_issue(entry: &Value) -> Option<AiIssue> {
    let description = entry.get("description").and_then(Value::as_str)?.trim();
    if description.is_empty() {
        return None;
    }
    let suggestion = entry
        .get("suggestion")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some(AiIssue {
        category: AiCategory::parse(string_field(entry, "type")),
        description: description.to_string(),
        suggestion,
    })
}

fn string_field<'a>(entry: &'a Value, key: &str) -> &'a str {
    entry.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Models occasionally return line numbers as strings or floats.
fn parse_line(value: Option<&Value>) -> usize {
    let Some(value) = value else {
        return 1;
    };
    if let Some(n) = value.as_u64() {
        return n.max(1) as usize;
    }
    if let Some(f) = value.as_f64() {
        if f >= 1.0 {
            return f as usize;
        }
    }
    if let Some(s) = value.as_str() {
        if let Ok(n) = s.trim().parse::<usize>() {
            return n.max(1);
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::tests::test_file;

    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn remaining(&self) -> usize {
            self.responses.lock().unwrap().len()
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn prompt(&self, index: usize) -> String {
            self.prompts.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::MalformedResponse("script exhausted".to_string())))
        }
    }

    fn js_file(name: &str) -> crate::pr::ReviewFile {
        test_file(name, "@@ -1,2 +1,2 @@\n context\n+const x = compute(x);")
    }

    #[tokio::test]
    async fn test_parses_well_formed_response() {
        let backend = ScriptedBackend::new(vec![
            Ok(r#"{"comments": [{"line": 3, "body": "Possible off-by-one", "severity": "warning", "category": "bug"}], "issues": [{"type": "performance", "description": "Quadratic loop", "suggestion": "Use a map"}]}"#.to_string()),
            Ok(r#"{"summary": "One likely bug and one slow path."}"#.to_string()),
        ]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer.review(&[js_file("src/app.js")]).await;

        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].file, "src/app.js");
        assert_eq!(review.comments[0].line, 3);
        assert_eq!(review.comments[0].severity, AiSeverity::Warning);
        assert_eq!(review.comments[0].category, AiCategory::Bug);

        assert_eq!(review.issues.len(), 1);
        assert_eq!(review.issues[0].category, AiCategory::Performance);
        assert_eq!(review.issues[0].suggestion.as_deref(), Some("Use a map"));

        assert_eq!(review.summary, "One likely bug and one slow path.");
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test]
    async fn test_malformed_response_degrades_to_empty() {
        let backend = ScriptedBackend::new(vec![
            Ok("the model rambled instead of emitting JSON".to_string()),
            Ok(r#"{"comments": [{"line": 2, "body": "Check nulls", "severity": "info", "category": "bug"}], "issues": []}"#.to_string()),
        ]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer
            .review(&[js_file("src/a.js"), js_file("src/b.js")])
            .await;

        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].file, "src/b.js");
        assert_eq!(review.issues.len(), 0);
        assert_eq!(
            review.summary,
            "AI review produced 1 inline comment(s) and 0 broader issue(s)."
        );
    }

    #[tokio::test]
    async fn test_api_error_does_not_abort_batch() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::Api {
                status: reqwest::StatusCode::TOO_MANY_REQUESTS,
                body: "rate limited".to_string(),
            }),
            Ok(r#"{"comments": [], "issues": [{"type": "bugs", "description": "Missing return"}]}"#
                .to_string()),
            Ok(r#"{"summary": "One missing return."}"#.to_string()),
        ]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer
            .review(&[js_file("src/a.js"), js_file("src/b.js")])
            .await;

        assert_eq!(review.issues.len(), 1);
        assert_eq!(review.summary, "One missing return.");
    }

    #[tokio::test]
    async fn test_fenced_json_is_tolerated() {
        let fenced = "```json\n{\"comments\": [{\"line\": 1, \"body\": \"Tight coupling\", \"severity\": \"suggestion\", \"category\": \"style\"}], \"issues\": []}\n```";
        let backend = ScriptedBackend::new(vec![Ok(fenced.to_string())]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer.review(&[js_file("src/a.js")]).await;

        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].severity, AiSeverity::Suggestion);
    }

    #[tokio::test]
    async fn test_tolerant_field_handling() {
        let sloppy = r#"{
            "comments": [
                {"body": "No line given", "severity": "blocker", "category": "made-up"},
                {"line": "4", "body": "Line as string", "severity": "warn", "category": "code-smell"},
                {"line": 2, "body": "   ", "severity": "error", "category": "bug"}
            ],
            "issues": [
                {"type": "bugs", "suggestion": "no description here"},
                {"type": "code-smells", "description": "Deep nesting"}
            ]
        }"#;
        let backend = ScriptedBackend::new(vec![
            Ok(sloppy.to_string()),
            Ok(r#"{"summary": "Some nesting to flatten."}"#.to_string()),
        ]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer.review(&[js_file("src/a.js")]).await;

        // Blank body dropped; the other two kept with defaults applied.
        assert_eq!(review.comments.len(), 2);
        assert_eq!(review.comments[0].line, 1);
        assert_eq!(review.comments[0].severity, AiSeverity::Info);
        assert_eq!(review.comments[0].category, AiCategory::BestPractice);
        assert_eq!(review.comments[1].line, 4);
        assert_eq!(review.comments[1].severity, AiSeverity::Warning);
        assert_eq!(review.comments[1].category, AiCategory::Style);

        // Issue without description dropped.
        assert_eq!(review.issues.len(), 1);
        assert_eq!(review.issues[0].category, AiCategory::Style);
        assert_eq!(review.issues[0].suggestion, None);
    }

    #[tokio::test]
    async fn test_missing_api_key_short_circuits() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::MissingApiKey)]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer
            .review(&[js_file("a.js"), js_file("b.js"), js_file("c.js")])
            .await;

        assert!(review.comments.is_empty());
        assert!(review.issues.is_empty());
        assert!(review.summary.contains("no API key"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_summary_uses_first_three_per_category() {
        let issues = r#"{"comments": [], "issues": [
            {"type": "bugs", "description": "first bug"},
            {"type": "bugs", "description": "second bug"},
            {"type": "bugs", "description": "third bug"},
            {"type": "bugs", "description": "fourth bug"},
            {"type": "performance", "description": "slow join"}
        ]}"#;
        let backend = ScriptedBackend::new(vec![
            Ok(issues.to_string()),
            Ok(r#"{"summary": "Mostly bugs."}"#.to_string()),
        ]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer.review(&[js_file("src/a.js")]).await;

        assert_eq!(review.summary, "Mostly bugs.");
        let summary_prompt = backend.prompt(1);
        assert!(summary_prompt.contains("first bug"));
        assert!(summary_prompt.contains("third bug"));
        assert!(!summary_prompt.contains("fourth bug"));
        assert!(summary_prompt.contains("slow join"));
    }

    #[tokio::test]
    async fn test_summary_failure_falls_back() {
        let backend = ScriptedBackend::new(vec![
            Ok(r#"{"comments": [], "issues": [{"type": "security", "description": "Token in URL"}]}"#.to_string()),
            Err(LlmError::Api {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "upstream".to_string(),
            }),
        ]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer.review(&[js_file("src/a.js")]).await;

        assert_eq!(
            review.summary,
            "AI review produced 0 inline comment(s) and 1 broader issue(s)."
        );
    }

    #[tokio::test]
    async fn test_no_eligible_files_makes_no_calls() {
        let lockfile = test_file("package-lock.json", "@@ -1,1 +1,1 @@\n+{}");
        let binary = crate::pr::ReviewFile {
            filename: "logo.png".to_string(),
            status: crate::pr::types::FileStatus::Added,
            additions: 0,
            deletions: 0,
            patch: None,
        };
        let backend = ScriptedBackend::new(vec![]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer.review(&[lockfile, binary]).await;

        assert!(review.comments.is_empty());
        assert_eq!(review.summary, "AI review found no issues.");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_results_preserve_input_order() {
        let backend = ScriptedBackend::new(vec![
            Ok(r#"{"comments": [{"line": 1, "body": "from a", "severity": "info", "category": "style"}], "issues": []}"#.to_string()),
            Ok(r#"{"comments": [{"line": 1, "body": "from b", "severity": "info", "category": "style"}], "issues": []}"#.to_string()),
        ]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Standard);
        let review = reviewer
            .review(&[js_file("src/a.js"), js_file("src/b.js")])
            .await;

        assert_eq!(review.comments[0].file, "src/a.js");
        assert_eq!(review.comments[1].file, "src/b.js");
    }

    #[tokio::test]
    async fn test_prompt_embeds_level_and_patch() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{"comments": [], "issues": []}"#.to_string())]);
        let reviewer = AiReviewer::new(&backend, ReviewLevel::Strict);
        reviewer.review(&[js_file("src/deep/logic.js")]).await;

        let prompt = backend.prompt(0);
        assert!(prompt.contains("exhaustively"));
        assert!(prompt.contains("src/deep/logic.js"));
        assert!(prompt.contains("+const x = compute(x);"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}
