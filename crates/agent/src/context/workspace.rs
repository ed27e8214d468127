//! Workspace context: a bounded text snapshot of the project on disk.
//!
//! The snapshot has up to three parts:
//! 1. a directory tree (depth-limited, dotfiles and dependency dirs skipped)
//! 2. the contents of a few small files
//! 3. a dependency/script summary of the root manifest, if one exists
//!
//! Building never fails. Anything unreadable is logged at `debug` and left
//! out.

use std::fs;
use std::path::{Path, PathBuf};

use deo_config::ContextConfig;
use tracing::debug;

/// Tree lines beyond this are elided.
const MAX_TREE_ENTRIES: usize = 300;

/// Placeholder used when no workspace root is available.
pub const NO_WORKSPACE: &str = "No workspace folder is open.";

/// Builds the workspace snapshot fed into every prompt.
#[derive(Debug, Clone)]
pub struct WorkspaceContextBuilder {
    limits: ContextConfig,
}

/// The three parts of a snapshot, kept apart so tests can inspect them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    pub tree: Vec<String>,
    pub files: Vec<(String, String)>,
    pub manifest: Option<String>,
    pub total_chars: usize,
}

impl WorkspaceContextBuilder {
    pub fn new(limits: ContextConfig) -> Self {
        Self { limits }
    }

    /// Render the snapshot of `root` as prompt text.
    pub fn build(&self, root: Option<&Path>) -> String {
        match root {
            Some(root) => self.snapshot(root).render(),
            None => NO_WORKSPACE.to_string(),
        }
    }

    /// Walk `root` and collect the snapshot.
    pub fn snapshot(&self, root: &Path) -> WorkspaceSnapshot {
        let mut snapshot = WorkspaceSnapshot::default();
        let mut candidates = Vec::new();
        self.walk(root, root, 1, &mut snapshot.tree, &mut candidates);

        for (relative, path) in candidates {
            if snapshot.files.len() >= self.limits.max_files {
                break;
            }
            let Some(content) = self.read_candidate(&path) else {
                continue;
            };
            let chars = content.chars().count();
            if snapshot.total_chars + chars > self.limits.max_total_chars {
                debug!(file = %relative, chars, "Context budget full, skipping file");
                continue;
            }
            snapshot.total_chars += chars;
            snapshot.files.push((relative, content));
        }

        snapshot.manifest = summarize_manifest(root);
        debug!(
            root = %root.display(),
            entries = snapshot.tree.len(),
            files = snapshot.files.len(),
            chars = snapshot.total_chars,
            "Workspace context built"
        );
        snapshot
    }

    fn walk(
        &self,
        root: &Path,
        dir: &Path,
        depth: usize,
        tree: &mut Vec<String>,
        candidates: &mut Vec<(String, PathBuf)>,
    ) {
        if depth > self.limits.max_depth {
            return;
        }

        let mut entries: Vec<_> = match fs::read_dir(dir) {
            Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Cannot read directory");
                return;
            }
        };
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            let relative = relative_display(root, &path);
            let indent = "  ".repeat(depth - 1);

            if file_type.is_dir() {
                if self.limits.excluded_dirs.iter().any(|d| d == &name) {
                    continue;
                }
                if tree.len() < MAX_TREE_ENTRIES {
                    tree.push(format!("{indent}{name}/"));
                }
                self.walk(root, &path, depth + 1, tree, candidates);
            } else if file_type.is_file() {
                if tree.len() < MAX_TREE_ENTRIES {
                    tree.push(format!("{indent}{name}"));
                }
                candidates.push((relative, path));
            }
        }
    }

    /// Read a file if it is text and within the per-file limit.
    fn read_candidate(&self, path: &Path) -> Option<String> {
        // Cheap pre-check: no UTF-8 text under the char limit is 4x larger in bytes.
        let len = fs::metadata(path).ok()?.len() as usize;
        if len > self.limits.max_file_chars.saturating_mul(4) {
            return None;
        }
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!(file = %path.display(), error = %e, "Skipping unreadable file");
                return None;
            }
        };
        if content.chars().count() > self.limits.max_file_chars {
            return None;
        }
        Some(content)
    }
}

impl Default for WorkspaceContextBuilder {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl WorkspaceSnapshot {
    pub fn render(&self) -> String {
        let mut out = String::from("Project structure:\n");
        if self.tree.is_empty() {
            out.push_str("(empty)\n");
        } else {
            for line in &self.tree {
                out.push_str(line);
                out.push('\n');
            }
        }

        if !self.files.is_empty() {
            out.push_str("\nFile contents:\n");
            for (path, content) in &self.files {
                out.push_str(&format!("--- {path} ---\n{content}"));
                if !content.ends_with('\n') {
                    out.push('\n');
                }
            }
        }

        if let Some(manifest) = &self.manifest {
            out.push('\n');
            out.push_str(manifest);
        }
        out
    }
}

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Summarize `package.json` or `Cargo.toml` at the root.
fn summarize_manifest(root: &Path) -> Option<String> {
    let package_json = root.join("package.json");
    if package_json.is_file() {
        return summarize_package_json(&package_json);
    }
    let cargo_toml = root.join("Cargo.toml");
    if cargo_toml.is_file() {
        return summarize_cargo_toml(&cargo_toml);
    }
    None
}

fn summarize_package_json(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let json: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "package.json is not valid JSON");
            return None;
        }
    };

    let keys = |field: &str| -> Vec<String> {
        json[field]
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    };

    let mut out = String::from("Manifest (package.json):\n");
    if let Some(name) = json["name"].as_str() {
        out.push_str(&format!("name: {name}\n"));
    }
    push_list(&mut out, "dependencies", &keys("dependencies"));
    push_list(&mut out, "devDependencies", &keys("devDependencies"));
    if let Some(scripts) = json["scripts"].as_object() {
        let scripts: Vec<String> = scripts
            .iter()
            .map(|(k, v)| format!("{k}: {}", v.as_str().unwrap_or_default()))
            .collect();
        push_list(&mut out, "scripts", &scripts);
    }
    Some(out)
}

fn summarize_cargo_toml(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let doc: toml::Value = match toml::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Cargo.toml does not parse");
            return None;
        }
    };

    let table_keys = |v: Option<&toml::Value>| -> Vec<String> {
        v.and_then(|t| t.as_table())
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    };

    let mut out = String::from("Manifest (Cargo.toml):\n");
    if let Some(name) = doc.get("package").and_then(|p| p.get("name")).and_then(|n| n.as_str()) {
        out.push_str(&format!("package: {name}\n"));
    }
    if let Some(members) = doc
        .get("workspace")
        .and_then(|w| w.get("members"))
        .and_then(|m| m.as_array())
    {
        let members: Vec<String> = members.iter().filter_map(|m| m.as_str().map(String::from)).collect();
        push_list(&mut out, "workspace members", &members);
    }
    push_list(&mut out, "dependencies", &table_keys(doc.get("dependencies")));
    push_list(&mut out, "dev-dependencies", &table_keys(doc.get("dev-dependencies")));
    Some(out)
}

fn push_list(out: &mut String, label: &str, items: &[String]) {
    if !items.is_empty() {
        out.push_str(&format!("{label}: {}\n", items.join(", ")));
    }
}
