//! Go source file discovery.

use globset::GlobSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["vendor", "testdata", "node_modules"];

/// Options for [`collect_files`].
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub include_test_files: bool,
    pub excluded: GlobSet,
}

impl Discovery {
    fn is_skipped_dir(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        self.excluded.is_match(relative) || self.excluded.is_match(path)
    }

    fn wants_file(&self, path: &Path) -> bool {
        if path.extension().and_then(|e| e.to_str()) != Some("go") {
            return false;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        self.include_test_files || !name.ends_with("_test.go")
    }
}

/// Collect the Go files under each of `roots`, sorted and deduplicated.
///
/// A root naming a file is taken as is, even when it would be filtered out by
/// a directory walk.
pub fn collect_files(roots: &[PathBuf], discovery: &Discovery) -> walkdir::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for root in roots {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }

        let walk = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !discovery.is_skipped_dir(e) && !discovery.is_excluded(root, e.path()));

        for entry in walk {
            let entry = entry?;
            if entry.file_type().is_file() && discovery.wants_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    tracing::debug!(count = files.len(), "collected files");
    Ok(files)
}
