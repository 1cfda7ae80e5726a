//! Path containment and protected-path enforcement for filesystem tools.
//!
//! Every path a tool touches is resolved to an absolute, symlink-free form and
//! compared against the canonical working-directory root. Paths that do not
//! exist yet are resolved through their nearest existing ancestor, so a
//! symlink anywhere above a new file is still followed before the check.

use globset::{Glob, GlobMatcher};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::SandboxError;
use crate::utils::display_relative;

/// Immutable description of what a run may touch.
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    pub root: PathBuf,
    /// Relative paths (exact or descendant match) or glob patterns.
    pub protected_paths: Vec<String>,
}

impl SandboxPolicy {
    pub fn new(root: impl Into<PathBuf>, protected_paths: Vec<String>) -> Self {
        Self {
            root: root.into(),
            protected_paths,
        }
    }
}

#[derive(Debug, Clone)]
enum ProtectedEntry {
    /// Root-relative path; the entry and everything beneath it is protected.
    Path(PathBuf),
    Glob { pattern: String, matcher: GlobMatcher },
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    protected: Vec<ProtectedEntry>,
    patterns: Vec<String>,
}

impl Sandbox {
    pub fn new(policy: SandboxPolicy) -> Result<Self, SandboxError> {
        let root = policy
            .root
            .canonicalize()
            .map_err(|source| SandboxError::Io {
                path: policy.root.clone(),
                source,
            })?;
        if !root.is_dir() {
            return Err(SandboxError::InvalidPolicy(format!(
                "working directory is not a directory: {}",
                root.display()
            )));
        }

        let mut protected = Vec::new();
        for raw in &policy.protected_paths {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            if is_glob(trimmed) {
                let glob = Glob::new(trimmed.trim_start_matches("./")).map_err(|e| {
                    SandboxError::InvalidPolicy(format!("bad protected pattern '{}': {}", raw, e))
                })?;
                protected.push(ProtectedEntry::Glob {
                    pattern: trimmed.to_string(),
                    matcher: glob.compile_matcher(),
                });
                continue;
            }

            let candidate = normalize_lexical(&root.join(trimmed));
            let Ok(rel) = candidate.strip_prefix(&root) else {
                warn!("Ignoring protected path outside the working directory: {}", raw);
                continue;
            };
            protected.push(ProtectedEntry::Path(rel.to_path_buf()));

            // A protected symlink also protects whatever it points at.
            if let Ok(canonical) = candidate.canonicalize() {
                if let Ok(target_rel) = canonical.strip_prefix(&root) {
                    if target_rel != rel {
                        protected.push(ProtectedEntry::Path(target_rel.to_path_buf()));
                    }
                }
            }
        }

        debug!(
            "Sandbox rooted at {} with {} protected entries",
            root.display(),
            protected.len()
        );

        Ok(Self {
            root,
            protected,
            patterns: policy.protected_paths,
        })
    }

    /// Canonical working-directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The protected entries as configured.
    pub fn protected_patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Resolve `path` (relative to the root, or absolute) to its canonical form.
    ///
    /// Fails with `PathEscape` if the result lies outside the root, or if it
    /// runs through a symlink that cannot be resolved.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, SandboxError> {
        let raw = Path::new(if path.trim().is_empty() { "." } else { path });
        let joined = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.root.join(raw)
        };
        let normalized = normalize_lexical(&joined);

        let canonical = canonicalize_existing_prefix(&normalized).ok_or_else(|| {
            SandboxError::PathEscape {
                path: path.to_string(),
            }
        })?;

        if !canonical.starts_with(&self.root) {
            debug!("Rejected path outside sandbox: {} -> {}", path, canonical.display());
            return Err(SandboxError::PathEscape {
                path: path.to_string(),
            });
        }

        Ok(canonical)
    }

    pub fn check_read(&self, path: &str) -> Result<PathBuf, SandboxError> {
        self.resolve(path)
    }

    /// Resolve and additionally reject protected targets.
    ///
    /// The root itself is never writable as a whole.
    pub fn check_write(&self, path: &str) -> Result<PathBuf, SandboxError> {
        let canonical = self.resolve(path)?;
        if self.is_protected(&canonical) {
            debug!("Rejected write to protected path: {}", path);
            return Err(SandboxError::ProtectedPath {
                path: path.to_string(),
            });
        }
        Ok(canonical)
    }

    /// Whether a canonical path inside the root is protected.
    pub fn is_protected(&self, canonical: &Path) -> bool {
        let Ok(rel) = canonical.strip_prefix(&self.root) else {
            return false;
        };
        if rel.as_os_str().is_empty() {
            return true;
        }

        self.protected.iter().any(|entry| match entry {
            ProtectedEntry::Path(p) => rel.starts_with(p),
            ProtectedEntry::Glob { matcher, .. } => rel
                .ancestors()
                .filter(|a| !a.as_os_str().is_empty())
                .any(|a| matcher.is_match(a)),
        })
    }

    /// Root-relative display form of a resolved path.
    pub fn display(&self, canonical: &Path) -> String {
        display_relative(&self.root, canonical)
    }

    /// Human-readable protected set, for the system prompt.
    pub fn describe_protected(&self) -> Vec<String> {
        self.protected
            .iter()
            .map(|e| match e {
                ProtectedEntry::Path(p) => display_relative(Path::new(""), p),
                ProtectedEntry::Glob { pattern, .. } => pattern.clone(),
            })
            .collect()
    }
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Remove `.` and `..` components without touching the filesystem.
///
/// `..` never pops past the root or a prefix.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if components
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    components.pop();
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Canonicalize the longest existing prefix of an already-normalized path and
/// re-append the missing tail.
///
/// Returns `None` when an existing component cannot be canonicalized, which
/// is the case for a dangling symlink.
fn canonicalize_existing_prefix(path: &Path) -> Option<PathBuf> {
    let mut ancestor = path;
    let mut tail = Vec::new();
    loop {
        // symlink_metadata so a dangling link counts as existing
        if ancestor.symlink_metadata().is_ok() {
            let mut result = ancestor.canonicalize().ok()?;
            for part in tail.iter().rev() {
                result.push(part);
            }
            return Some(result);
        }
        tail.push(ancestor.file_name()?.to_os_string());
        ancestor = ancestor.parent()?;
    }
}
