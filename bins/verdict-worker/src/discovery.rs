// Test corpus discovery
use anyhow::{bail, Context, Result};
use glob::{glob, Pattern};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// One program file of the corpus and where its oracle lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSource {
    /// Path relative to the corpus root, `/`-separated
    pub identity: String,
    pub source_path: PathBuf,
    pub oracle_path: PathBuf,
}

/// `foo.stella` + `.out` → `foo.stella.out`
pub fn oracle_path(source: &Path, oracle_suffix: &str) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(oracle_suffix);
    PathBuf::from(name)
}

/// Every `*.<extension>` file below `root`, sorted by path
pub fn discover(root: &Path, extension: &str, oracle_suffix: &str) -> Result<Vec<TestSource>> {
    let sources = find_files(root, &format!("*.{}", extension))?;

    sources
        .into_iter()
        .map(|source_path| {
            Ok(TestSource {
                identity: identity(root, &source_path)?,
                oracle_path: oracle_path(&source_path, oracle_suffix),
                source_path,
            })
        })
        .collect()
}

/// Every oracle file below `root`
pub fn find_oracles(root: &Path, oracle_suffix: &str) -> Result<Vec<PathBuf>> {
    find_files(root, &format!("*{}", Pattern::escape(oracle_suffix)))
}

fn find_files(root: &Path, file_pattern: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Test directory not found: {}", root.display());
    }

    let root_pattern = Pattern::escape(&root.to_string_lossy().replace('\\', "/"));
    let pattern = format!("{}/**/{}", root_pattern.trim_end_matches('/'), file_pattern);

    let mut files: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("Invalid discovery pattern {}", pattern))?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Error reading path");
                None
            }
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Glob drops `.` components, so both sides lose them before stripping
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn identity(root: &Path, path: &Path) -> Result<String> {
    let root = without_cur_dir(root);
    let path = without_cur_dir(path);
    let relative = path.strip_prefix(&root).with_context(|| {
        format!("{} is not below test directory {}", path.display(), root.display())
    })?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_oracle_path_appends_suffix() {
        assert_eq!(
            oracle_path(Path::new("tests/ok.stella"), ".out"),
            PathBuf::from("tests/ok.stella.out")
        );
    }

    #[test]
    fn test_discover_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("well-typed/b.stella"));
        touch(&root.join("well-typed/a.stella"));
        touch(&root.join("ill-typed/missing-main/c.stella"));
        touch(&root.join("ill-typed/missing-main/c.stella.out"));
        touch(&root.join("notes.txt"));

        let tests = discover(root, "stella", ".out").unwrap();
        let identities: Vec<_> = tests.iter().map(|t| t.identity.as_str()).collect();

        assert_eq!(
            identities,
            vec!["ill-typed/missing-main/c.stella", "well-typed/a.stella", "well-typed/b.stella"]
        );
        assert_eq!(tests[0].oracle_path, root.join("ill-typed/missing-main/c.stella.out"));
    }

    #[test]
    fn test_find_oracles() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.stella"));
        touch(&root.join("a.stella.out"));
        touch(&root.join("deep/b.stella.out"));

        let oracles = find_oracles(root, ".out").unwrap();
        assert_eq!(oracles, vec![root.join("a.stella.out"), root.join("deep/b.stella.out")]);
    }

    #[test]
    fn test_identity_ignores_cur_dir_prefix() {
        assert_eq!(
            identity(Path::new("./tests"), Path::new("tests/sub/a.stella")).unwrap(),
            "sub/a.stella"
        );
        assert_eq!(
            identity(Path::new("tests"), Path::new("./tests/sub/a.stella")).unwrap(),
            "sub/a.stella"
        );
        assert!(identity(Path::new("tests"), Path::new("other/a.stella")).is_err());
    }

    #[test]
    fn test_discover_relative_root_with_cur_dir() {
        // Relative to the working directory without changing it
        let dir = tempfile::Builder::new()
            .prefix("discovery-")
            .tempdir_in(".")
            .unwrap();
        let name = dir.path().file_name().unwrap();
        touch(&dir.path().join("sub/a.stella"));

        let root = Path::new(".").join(name);
        let tests = discover(&root, "stella", ".out").unwrap();

        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].identity, "sub/a.stella");
        assert!(tests[0].source_path.is_file());
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(&dir.path().join("nope"), "stella", ".out").is_err());
    }
}
