//! Writing generated files to disk

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use promptkit::RegistryError;
use thiserror::Error;
use tracing::{debug, info};

use crate::codegen::{GENERATED_HEADER, GeneratedFile};

/// Errors that stop a generation run
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Failed to fetch manifests: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Refusing to overwrite {}: it was not generated by pkgen", .path.display())]
    NotGenerated { path: PathBuf },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> GenerateError + '_ {
    move |source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What a write pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Whether a file on disk carries the generated header
pub fn is_generated(path: &Path) -> Result<bool, GenerateError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.starts_with(GENERATED_HEADER)),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(false),
        Err(e) => Err(io_error(path)(e)),
    }
}

/// Write files under `output_dir`
///
/// Files whose content is already current are left untouched. Existing files
/// without the generated header are never overwritten. With `prune`, generated
/// `.rs` files no longer produced are removed.
pub fn write_files(output_dir: &Path, files: &[GeneratedFile], prune: bool) -> Result<EmitSummary, GenerateError> {
    debug!(output_dir = %output_dir.display(), count = files.len(), %prune, "write_files: called");
    fs::create_dir_all(output_dir).map_err(io_error(output_dir))?;

    let mut summary = EmitSummary::default();
    for file in files {
        let path = output_dir.join(&file.path);
        if path.exists() {
            if !is_generated(&path)? {
                return Err(GenerateError::NotGenerated { path });
            }
            let current = fs::read_to_string(&path).map_err(io_error(&path))?;
            if current == file.source {
                debug!(path = %path.display(), "write_files: unchanged");
                summary.unchanged.push(path);
                continue;
            }
        }
        fs::write(&path, &file.source).map_err(io_error(&path))?;
        info!(path = %path.display(), "Wrote generated file");
        summary.written.push(path);
    }

    if prune {
        let keep: BTreeSet<PathBuf> = files.iter().map(|f| output_dir.join(&f.path)).collect();
        summary.removed = remove_stale(output_dir, &keep)?;
    }
    Ok(summary)
}

fn remove_stale(output_dir: &Path, keep: &BTreeSet<PathBuf>) -> Result<Vec<PathBuf>, GenerateError> {
    let mut stale = Vec::new();
    for entry in fs::read_dir(output_dir).map_err(io_error(output_dir))? {
        let path = entry.map_err(io_error(output_dir))?.path();
        let is_rust = path.extension().is_some_and(|ext| ext == "rs");
        if !is_rust || !path.is_file() || keep.contains(&path) {
            continue;
        }
        if is_generated(&path)? {
            stale.push(path);
        }
    }
    stale.sort();
    for path in &stale {
        fs::remove_file(path).map_err(io_error(path))?;
        info!(path = %path.display(), "Removed stale generated file");
    }
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file(path: &str, body: &str) -> GeneratedFile {
        GeneratedFile {
            path: PathBuf::from(path),
            source: format!("{}\n{}\n", GENERATED_HEADER, body),
        }
    }

    #[test]
    fn test_write_creates_directory() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("src").join("prompts");

        let summary = write_files(&out, &[file("a.rs", "// a")], true).unwrap();
        assert_eq!(summary.written, vec![out.join("a.rs")]);
        assert!(fs::read_to_string(out.join("a.rs")).unwrap().ends_with("// a\n"));
    }

    #[test]
    fn test_unchanged_files_are_not_rewritten() {
        let temp = TempDir::new().unwrap();
        write_files(temp.path(), &[file("a.rs", "// a")], true).unwrap();

        let summary = write_files(temp.path(), &[file("a.rs", "// a")], true).unwrap();
        assert!(summary.written.is_empty());
        assert_eq!(summary.unchanged, vec![temp.path().join("a.rs")]);
    }

    #[test]
    fn test_stale_generated_files_are_pruned() {
        let temp = TempDir::new().unwrap();
        write_files(temp.path(), &[file("a.rs", "// a"), file("b.rs", "// b")], true).unwrap();
        fs::write(temp.path().join("handwritten.rs"), "fn main() {}\n").unwrap();

        let summary = write_files(temp.path(), &[file("a.rs", "// a")], true).unwrap();
        assert_eq!(summary.removed, vec![temp.path().join("b.rs")]);
        assert!(temp.path().join("handwritten.rs").exists());
    }

    #[test]
    fn test_no_prune_keeps_stale_files() {
        let temp = TempDir::new().unwrap();
        write_files(temp.path(), &[file("a.rs", "// a"), file("b.rs", "// b")], true).unwrap();

        let summary = write_files(temp.path(), &[file("a.rs", "// a")], false).unwrap();
        assert!(summary.removed.is_empty());
        assert!(temp.path().join("b.rs").exists());
    }

    #[test]
    fn test_refuses_to_overwrite_handwritten_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("mod.rs"), "pub mod mine;\n").unwrap();

        let err = write_files(temp.path(), &[file("mod.rs", "pub mod a;")], true).unwrap_err();
        assert!(matches!(err, GenerateError::NotGenerated { .. }));
        assert_eq!(fs::read_to_string(temp.path().join("mod.rs")).unwrap(), "pub mod mine;\n");
    }
}
