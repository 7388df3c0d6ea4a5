//! `?insert` — inline a file or a directory tree into the document.

use std::path::{Path, PathBuf};
use tracing::warn;

use super::DirectiveContext;

/// Footer appended after each inserted file body.
const SEPARATOR: &str = "----------";

/// Inserts the file or directory named by the resolved instruction.
///
/// Each file is wrapped as:
///
/// ```text
/// [relative/path]
/// <file contents>
/// ----------
/// ```
///
/// Directories are walked recursively with entries in sorted order so
/// the output is deterministic. A missing or unreadable path yields an
/// inline error string; insertion never aborts the pipeline.
#[must_use]
pub fn execute_insert(ctx: &DirectiveContext<'_>, instruction: &str) -> String {
    let given = instruction.trim();
    if given.is_empty() {
        return "The insert directive needs a file or directory path.".to_string();
    }

    let path = ctx.base_dir.join(given);
    if path.is_dir() {
        let mut files = Vec::new();
        collect_files(&path, &mut files);
        files.sort();
        if files.is_empty() {
            return format!("The directory {given} contains no files.");
        }
        files
            .iter()
            .map(|file| render_file(file, &display_path(ctx.base_dir, file)))
            .collect::<Vec<_>>()
            .join("\n\n")
    } else if path.is_file() {
        render_file(&path, given)
    } else {
        warn!(path = %path.display(), "insert target missing");
        format!("The file {given} does not exist.")
    }
}

fn render_file(path: &Path, shown: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => format!("[{shown}]\n{}\n{SEPARATOR}", content.trim_end()),
        Err(e) => format!("[{shown}]\nCould not read file: {e}\n{SEPARATOR}"),
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        warn!(dir = %dir.display(), "unreadable directory during insert walk");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else if path.is_file() {
            out.push(path);
        }
    }
}

fn display_path(base: &Path, file: &Path) -> String {
    file.strip_prefix(base)
        .unwrap_or(file)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeftConfig;
    use crate::fetch::{FetchError, PageFetcher};
    use crate::query::{ModelSpec, QueryError, QueryService};
    use tempfile::TempDir;
    use weft_store::World;

    struct NoQuery;
    impl QueryService for NoQuery {
        fn query(&self, _: &str, _: &ModelSpec) -> Result<String, QueryError> {
            panic!("insert must not query the model");
        }
    }

    struct NoFetch;
    impl PageFetcher for NoFetch {
        fn fetch(&self, _: &str) -> Result<String, FetchError> {
            panic!("insert must not fetch pages");
        }
    }

    fn ctx<'a>(world: &'a World, config: &'a WeftConfig, base: &'a Path) -> DirectiveContext<'a> {
        DirectiveContext {
            world,
            config,
            query: &NoQuery,
            fetcher: &NoFetch,
            base_dir: base,
        }
    }

    #[test]
    fn single_file_wrapped_with_header_and_separator() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::write(temp.path().join("note.txt"), "line one\nline two\n").expect("fixture");

        let world = World::new();
        let config = WeftConfig::default();
        let out = execute_insert(&ctx(&world, &config, temp.path()), "note.txt");
        assert_eq!(out, "[note.txt]\nline one\nline two\n----------");
    }

    #[test]
    fn directory_walk_is_sorted_and_recursive() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::create_dir(temp.path().join("sub")).expect("mkdir");
        std::fs::write(temp.path().join("b.txt"), "B").expect("fixture");
        std::fs::write(temp.path().join("a.txt"), "A").expect("fixture");
        std::fs::write(temp.path().join("sub").join("c.txt"), "C").expect("fixture");

        let world = World::new();
        let config = WeftConfig::default();
        let out = execute_insert(&ctx(&world, &config, temp.path()), ".");
        let headers: Vec<&str> = out
            .lines()
            .filter(|l| l.starts_with('['))
            .collect();
        assert_eq!(headers, vec!["[a.txt]", "[b.txt]", "[sub/c.txt]"]);
        assert_eq!(out.matches(SEPARATOR).count(), 3);
    }

    #[test]
    fn missing_path_reports_inline() {
        let temp = TempDir::new().expect("tempdir");
        let world = World::new();
        let config = WeftConfig::default();
        let out = execute_insert(&ctx(&world, &config, temp.path()), "ghost.txt");
        assert!(out.contains("does not exist"));
    }

    #[test]
    fn empty_instruction_reports_inline() {
        let temp = TempDir::new().expect("tempdir");
        let world = World::new();
        let config = WeftConfig::default();
        let out = execute_insert(&ctx(&world, &config, temp.path()), "   ");
        assert!(out.contains("needs a file or directory path"));
    }
}
