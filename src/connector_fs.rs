use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A document file found in the ingest folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Bare filename; the dedup key stored in `metadata.source`.
    pub name: String,
    pub path: PathBuf,
}

/// List files directly inside `folder` (no recursion) matching `include_globs`,
/// sorted by name.
pub fn scan_folder(folder: &Path, include_globs: &[String]) -> Result<Vec<SourceFile>> {
    if !folder.is_dir() {
        bail!("Ingest folder does not exist: {}", folder.display());
    }

    let include_set = build_globset(include_globs)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !include_set.is_match(&name) {
            continue;
        }

        files.push(SourceFile {
            name,
            path: entry.path().to_path_buf(),
        });
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
