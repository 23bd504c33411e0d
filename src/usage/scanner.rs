use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Transcript lines inspected for a working directory before giving up
const CWD_SCAN_LINES: usize = 50;

/// Resolves a session id to the project it ran in.
pub trait SessionHistory: Send + Sync {
    fn project_path(&self, session_id: &str) -> Option<String>;
}

/// Session id → project path, built from Claude Code transcripts
/// (`~/.claude/projects/<encoded-project>/<session-id>.jsonl`).
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    paths: HashMap<String, String>,
}

impl ProjectIndex {
    /// `~/.claude/projects`, when a home directory is known
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".claude").join("projects"))
    }

    /// Index every transcript under `root`. A missing root yields an empty index.
    pub fn scan(root: &Path) -> Self {
        if !root.exists() {
            return Self::default();
        }

        let mut paths = HashMap::new();
        for path in collect_jsonl_files(root) {
            let session_id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            if let Some(cwd) = read_cwd(&path) {
                paths.insert(session_id, cwd);
            }
        }

        debug!(sessions = paths.len(), root = %root.display(), "indexed transcripts");
        Self { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl SessionHistory for ProjectIndex {
    fn project_path(&self, session_id: &str) -> Option<String> {
        self.paths.get(session_id).cloned()
    }
}

/// Collect all .jsonl files recursively under a directory
fn collect_jsonl_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_jsonl_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                files.push(path);
            }
        }
    }
    files
}

/// First non-empty `cwd` field among the leading transcript lines
fn read_cwd(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let reader = BufReader::new(file);

    for line in reader.lines().take(CWD_SCAN_LINES) {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };

        // Quick filter before paying for a JSON parse
        if !line.contains("\"cwd\"") {
            continue;
        }

        let entry: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        if let Some(cwd) = entry.get("cwd").and_then(|v| v.as_str()) {
            if !cwd.is_empty() {
                return Some(cwd.to_string());
            }
        }
    }
    None
}
