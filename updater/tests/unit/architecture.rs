//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries hold:
//! domain is pure, application never reaches into infrastructure, and only
//! infrastructure spawns processes.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Non-comment, non-test lines of a file, with their line numbers.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            let comment = trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*');
            (!in_test && !comment).then(|| (i + 1, line.to_string()))
        })
        .collect()
}

fn src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

fn scan(dir: &Path, forbidden: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(dir) {
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        for (lineno, line) in production_lines(&file) {
            for pattern in forbidden {
                if line.contains(pattern) {
                    violations.push(format!("{rel}:{lineno}: `{pattern}`: {line}"));
                }
            }
        }
    }
    violations
}

// ── Domain purity ─────────────────────────────────────────────────────────────

#[test]
fn domain_has_no_io_or_outer_layer_imports() {
    let violations = scan(
        &src_dir().join("domain"),
        &[
            "crate::infra",
            "crate::application",
            "crate::daemon",
            "tokio",
            "std::fs",
            "std::process",
            "std::net",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay pure:\n{}",
        violations.join("\n")
    );
}

// ── Application boundaries ────────────────────────────────────────────────────

#[test]
fn application_never_imports_infra() {
    let violations = scan(
        &src_dir().join("application"),
        &["crate::infra", "crate::daemon", "crate::cli", "std::fs::", "Command::new"],
    );
    assert!(
        violations.is_empty(),
        "application/ must go through ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn no_concrete_adapters_in_service_signatures() {
    let concrete = [
        "SystemdHost",
        "LaunchdHost",
        "WindowsScmHost",
        "TokioCommandRunner",
        "HttpFetcher",
        "FileStatusStore",
        "RegistryStatusStore",
        "NatsChannel",
    ];
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir().join("application")) {
        for (lineno, line) in production_lines(&file) {
            for ty in concrete {
                if line.contains(ty) {
                    violations.push(format!("{}:{lineno}: `{ty}`: {line}", file.display()));
                }
            }
        }
    }
    assert!(
        violations.is_empty(),
        "application/ must use trait bounds, not adapters:\n{}",
        violations.join("\n")
    );
}

// ── Process spawning ──────────────────────────────────────────────────────────

#[test]
fn processes_are_spawned_only_in_infra() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir()) {
        let rel = file.to_string_lossy().replace('\\', "/");
        if rel.contains("/infra/") {
            continue;
        }
        for (lineno, line) in production_lines(&file) {
            if line.contains("Command::new") || line.contains("TokioCommandRunner::new") {
                violations.push(format!("{rel}:{lineno}: {line}"));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "process execution outside infra/:\n{}",
        violations.join("\n")
    );
}
