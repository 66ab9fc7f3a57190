use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Options shaping how command-line inputs become the ordered selection.
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Keep only these extensions (lowercase, no dot). Empty keeps all.
    pub extensions: Vec<String>,
    /// Paths matching any of these globs are dropped.
    pub exclude: Option<GlobSet>,
    /// Honor `.gitignore` and `.ignore` files during directory expansion.
    pub use_gitignore: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            exclude: None,
            use_gitignore: true,
        }
    }
}

/// Builds the exclude set from raw glob patterns.
///
/// # Errors
///
/// Returns `GlueError::Glob` when a pattern does not parse.
pub fn build_exclude_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

/// Normalizes extension filters: whitespace and leading dots are tolerated,
/// matching is case-insensitive.
pub fn normalize_extensions(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Expands command-line inputs into the ordered selection.
///
/// Explicit files keep their argument order; directories expand recursively
/// with entries visited in file-name order. Hidden entries are skipped
/// during expansion, duplicates keep their first position, and missing
/// paths pass through so later stages can report them.
///
/// # Errors
///
/// Returns `GlueError::Ignore` or `GlueError::WalkDir` when a directory
/// expansion fails.
pub fn collect_files(inputs: &[PathBuf], options: &SelectOptions) -> Result<Vec<PathBuf>> {
    let mut selected = Vec::new();
    for input in inputs {
        if input.is_dir() {
            expand_directory(input, options, &mut selected)?;
        } else {
            push_selected(input.clone(), options, &mut selected);
        }
    }
    debug!(inputs = inputs.len(), selected = selected.len(), "selection built");
    Ok(selected)
}

fn expand_directory(
    dir: &Path,
    options: &SelectOptions,
    selected: &mut Vec<PathBuf>,
) -> Result<()> {
    if options.use_gitignore {
        let mut builder = ignore::WalkBuilder::new(dir);
        builder.sort_by_file_name(|a, b| a.cmp(b));
        for entry in builder.build() {
            let entry = entry?;
            if entry.file_type().is_some_and(|ft| ft.is_file()) {
                push_selected(entry.into_path(), options, selected);
            }
        }
    } else {
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() {
                push_selected(entry.into_path(), options, selected);
            }
        }
    }
    Ok(())
}

/// Dot-files and dot-directories below the walk root.
fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn push_selected(path: PathBuf, options: &SelectOptions, selected: &mut Vec<PathBuf>) {
    if let Some(exclude) = &options.exclude
        && excluded(&path, exclude)
    {
        debug!(path = %path.display(), "excluded by glob");
        return;
    }
    if !options.extensions.is_empty() {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());
        if !ext.is_some_and(|ext| options.extensions.contains(&ext)) {
            return;
        }
    }
    if !selected.contains(&path) {
        selected.push(path);
    }
}

/// A pattern drops a file when it matches the full path or the bare file
/// name, so `*.log` works without spelling out directories.
fn excluded(path: &Path, exclude: &GlobSet) -> bool {
    exclude.is_match(path)
        || path
            .file_name()
            .is_some_and(|name| exclude.is_match(Path::new(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "x").unwrap();
        path
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_explicit_files_keep_argument_order() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt");
        let b = write_file(dir.path(), "b.txt");

        let selected =
            collect_files(&[b.clone(), a.clone()], &SelectOptions::default()).unwrap();
        assert_eq!(selected, vec![b, a]);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt");
        let b = write_file(dir.path(), "b.txt");

        let selected =
            collect_files(&[a.clone(), b.clone(), a.clone()], &SelectOptions::default()).unwrap();
        assert_eq!(selected, vec![a, b]);
    }

    #[test]
    fn test_directory_expands_in_name_order() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "c.txt");
        write_file(dir.path(), "a.txt");
        write_file(dir.path(), "b.txt");

        let selected =
            collect_files(&[dir.path().to_path_buf()], &SelectOptions::default()).unwrap();
        assert_eq!(names(&selected), vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_hidden_entries_skipped_during_expansion() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "visible.txt");
        write_file(dir.path(), ".hidden.txt");
        fs::create_dir(dir.path().join(".secrets")).unwrap();
        write_file(&dir.path().join(".secrets"), "inner.txt");

        for use_gitignore in [true, false] {
            let options = SelectOptions {
                use_gitignore,
                ..SelectOptions::default()
            };
            let selected = collect_files(&[dir.path().to_path_buf()], &options).unwrap();
            assert_eq!(names(&selected), vec!["visible.txt"]);
        }
    }

    #[test]
    fn test_nested_directories_are_walked() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_file(dir.path(), "top.txt");
        write_file(&dir.path().join("sub"), "deep.txt");

        let selected =
            collect_files(&[dir.path().to_path_buf()], &SelectOptions::default()).unwrap();
        let found = names(&selected);
        assert!(found.contains(&"top.txt".to_string()));
        assert!(found.contains(&"deep.txt".to_string()));
    }

    #[test]
    fn test_extension_filter_applies_everywhere() {
        let dir = TempDir::new().unwrap();
        let keep = write_file(dir.path(), "keep.txt");
        let skipped = write_file(dir.path(), "skip.log");

        let options = SelectOptions {
            extensions: normalize_extensions(&[" .TXT ".to_string()]),
            ..SelectOptions::default()
        };
        let selected = collect_files(&[keep.clone(), skipped], &options).unwrap();
        assert_eq!(selected, vec![keep]);
    }

    #[test]
    fn test_exclude_globs_match_file_names() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "keep.txt");
        write_file(dir.path(), "noise.log");

        let options = SelectOptions {
            exclude: build_exclude_set(&["*.log".to_string()]).unwrap(),
            ..SelectOptions::default()
        };
        let selected = collect_files(&[dir.path().to_path_buf()], &options).unwrap();
        assert_eq!(names(&selected), vec!["keep.txt"]);
    }

    #[test]
    fn test_invalid_exclude_pattern_is_an_error() {
        assert!(build_exclude_set(&["a{".to_string()]).is_err());
    }

    #[test]
    fn test_ignore_files_honored_unless_disabled() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "kept.txt");
        write_file(dir.path(), "noise.log");
        fs::write(dir.path().join(".ignore"), "*.log\n").unwrap();

        let selected =
            collect_files(&[dir.path().to_path_buf()], &SelectOptions::default()).unwrap();
        assert_eq!(names(&selected), vec!["kept.txt"]);

        let options = SelectOptions {
            use_gitignore: false,
            ..SelectOptions::default()
        };
        let selected = collect_files(&[dir.path().to_path_buf()], &options).unwrap();
        assert_eq!(names(&selected), vec!["kept.txt", "noise.log"]);
    }

    #[test]
    fn test_missing_input_passes_through() {
        let dir = TempDir::new().unwrap();
        let ghost = dir.path().join("ghost.txt");

        let selected = collect_files(&[ghost.clone()], &SelectOptions::default()).unwrap();
        assert_eq!(selected, vec![ghost]);
    }
}
