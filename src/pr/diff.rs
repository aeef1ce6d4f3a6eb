use super::types::{FileStatus, ReviewFile};
use super::PrError;

/// Parse a unified diff string into ReviewFile records, one per file section.
///
/// Used by the offline `--patch` mode. Produces the same shape the GitHub
/// file listing returns: each file's hunk text (headers included) is
/// reassembled into its `patch` field, so downstream analysis cannot tell
/// the two paths apart.
///
/// Each file section starts with:
///   diff --git a/{path} b/{path}
///
/// New files have `--- /dev/null`, deleted files have `+++ /dev/null`,
/// renames carry `rename from` / `rename to` lines. Hunks start with
/// `@@ -{old_start},{old_count} +{new_start},{new_count} @@`.
pub fn parse_diff(raw_diff: &str) -> Result<Vec<ReviewFile>, PrError> {
    if raw_diff.trim().is_empty() {
        return Ok(Vec::new());
    }

    struct PartialFile {
        filename: String,
        status: FileStatus,
        additions: usize,
        deletions: usize,
        patch_lines: Vec<String>,
        in_hunk: bool,
    }

    let mut files = Vec::new();
    let mut current: Option<PartialFile> = None;

    let finish_file = |files: &mut Vec<ReviewFile>, current: &mut Option<PartialFile>| {
        if let Some(file) = current.take() {
            let patch = if file.patch_lines.is_empty() {
                None
            } else {
                Some(file.patch_lines.join("\n"))
            };
            files.push(ReviewFile {
                filename: file.filename,
                status: file.status,
                additions: file.additions,
                deletions: file.deletions,
                patch,
            });
        }
    };

    for line in raw_diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish_file(&mut files, &mut current);
            let mut parts = rest.split_whitespace();
            let a_path = parts
                .next()
                .ok_or_else(|| PrError::DiffParse("Missing a/ path in diff header".to_string()))?;
            let b_path = parts
                .next()
                .ok_or_else(|| PrError::DiffParse("Missing b/ path in diff header".to_string()))?;
            let filename = b_path
                .strip_prefix("b/")
                .or_else(|| a_path.strip_prefix("a/"))
                .unwrap_or(b_path)
                .to_string();
            current = Some(PartialFile {
                filename,
                status: FileStatus::Modified,
                additions: 0,
                deletions: 0,
                patch_lines: Vec::new(),
                in_hunk: false,
            });
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            validate_hunk_header(line)?;
            file.patch_lines.push(line.to_string());
            file.in_hunk = true;
            continue;
        }

        if !file.in_hunk {
            // Header region: mode/index lines plus the markers that set status.
            if line.starts_with("rename from ") || line.starts_with("rename to ") {
                file.status = FileStatus::Renamed;
            } else if let Some(path) = line.strip_prefix("--- ") {
                if path.trim() == "/dev/null" {
                    file.status = FileStatus::Added;
                }
            } else if let Some(path) = line.strip_prefix("+++ ") {
                if path.trim() == "/dev/null" {
                    file.status = FileStatus::Removed;
                }
            }
            continue;
        }

        if line.starts_with('+') || line.starts_with('-') || line.starts_with(' ')
            || line.starts_with('\\')
        {
            file.patch_lines.push(line.to_string());
            if line.starts_with('+') {
                file.additions += 1;
            } else if line.starts_with('-') {
                file.deletions += 1;
            }
        }
    }

    finish_file(&mut files, &mut current);
    Ok(files)
}

fn validate_hunk_header(line: &str) -> Result<(), PrError> {
    let header = line
        .trim()
        .strip_prefix("@@")
        .ok_or_else(|| PrError::DiffParse("Invalid hunk header".to_string()))?
        .trim();
    let header = header.trim_end_matches("@@").trim();
    let mut parts = header.split_whitespace();
    let old_part = parts
        .next()
        .ok_or_else(|| PrError::DiffParse("Missing old range".to_string()))?;
    let new_part = parts
        .next()
        .ok_or_else(|| PrError::DiffParse("Missing new range".to_string()))?;

    validate_range(old_part, '-')?;
    validate_range(new_part, '+')?;
    Ok(())
}

fn validate_range(part: &str, prefix: char) -> Result<(), PrError> {
    let range = part
        .strip_prefix(prefix)
        .ok_or_else(|| PrError::DiffParse("Invalid range prefix".to_string()))?;
    let (start_str, count_str) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    start_str.parse::<usize>().map_err(|_| {
        PrError::DiffParse(format!("Invalid range start in {}", part))
    })?;
    count_str.parse::<usize>().map_err(|_| {
        PrError::DiffParse(format!("Invalid range count in {}", part))
    })?;
    Ok(())
}
