use std::path::Path;

/// Extensions the analysis sources will look at.
const REVIEWABLE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte", "py", "rb", "go", "rs", "java", "kt",
    "swift", "c", "h", "cpp", "hpp", "cs", "php", "scala", "sh", "sql", "yml", "yaml", "json",
    "toml", "env", "tf",
];

/// Exact basenames that are never worth reviewing.
const SKIPPED_BASENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
    "composer.lock",
    "go.sum",
];

/// Path fragments marking generated or vendored trees.
const SKIPPED_DIR_FRAGMENTS: &[&str] = &[
    "node_modules/",
    "dist/",
    "build/",
    "target/",
    "vendor/",
    ".next/",
    "coverage/",
];

const SKIPPED_SUFFIXES: &[&str] = &[".min.js", ".min.css", ".map", ".snap"];

/// Decide whether a changed file is worth analyzing at all.
///
/// All three sources share this filter, so a skipped file produces zero
/// findings everywhere rather than a partial review. Dotenv files have no
/// extension in the usual sense but are prime secret-scanning targets, so
/// they pass explicitly.
pub fn is_reviewable(filename: &str) -> bool {
    if SKIPPED_DIR_FRAGMENTS.iter().any(|d| filename.contains(d)) {
        return false;
    }

    let basename = filename.rsplit('/').next().unwrap_or(filename);
    if SKIPPED_BASENAMES.contains(&basename) {
        return false;
    }
    if SKIPPED_SUFFIXES.iter().any(|s| basename.ends_with(s)) {
        return false;
    }
    if basename.starts_with(".env") {
        return true;
    }

    match Path::new(basename).extension().and_then(|e| e.to_str()) {
        Some(ext) => REVIEWABLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}
