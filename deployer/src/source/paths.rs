//! Source path resolution

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::DeployError;

/// `/c/Users/...` (MSYS, Git Bash) or `C:\Users\...` (Windows)
static FOREIGN_DRIVE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:/([a-zA-Z])/|([a-zA-Z]):[\\/])(.*)$").expect("valid drive path pattern")
});

/// Rewrite a drive-letter path to its location under `mount_root`
///
/// `/c/work/app` and `C:\work\app` both become `<mount_root>/c/work/app`.
pub fn rewrite_foreign_path(raw: &str, mount_root: &Path) -> Option<PathBuf> {
    let captures = FOREIGN_DRIVE_PATH.captures(raw)?;
    let drive = captures
        .get(1)
        .or_else(|| captures.get(2))?
        .as_str()
        .to_ascii_lowercase();
    let rest = captures.get(3).map(|m| m.as_str()).unwrap_or("");

    let mut path = mount_root.join(drive);
    for part in rest.split(['/', '\\']).filter(|p| !p.is_empty()) {
        path.push(part);
    }
    Some(path)
}

/// Resolve a caller-supplied path to an existing absolute native path
pub fn resolve_path(raw: &str, mount_root: &Path) -> Result<PathBuf, DeployError> {
    let native = PathBuf::from(raw);
    if native.exists() {
        return Ok(std::path::absolute(&native)?);
    }

    if let Some(rewritten) = rewrite_foreign_path(raw, mount_root) {
        if rewritten.exists() {
            return Ok(std::path::absolute(&rewritten)?);
        }
    }

    Err(DeployError::SourceNotFound(native))
}

/// Deepest directory containing every path in `paths`
pub fn lowest_common_ancestor(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut iter = paths.iter();
    let mut common: Vec<Component> = iter.next()?.components().collect();

    for path in iter {
        let shared = common
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }

    if common.is_empty() {
        return None;
    }
    Some(common.iter().collect())
}

/// Archive entry name of `path` below `base`, `/`-separated
pub fn entry_name(path: &Path, base: &Path) -> Result<String, DeployError> {
    let relative = path.strip_prefix(base).map_err(|_| {
        DeployError::Packaging(format!(
            "{} is not below the source base {}",
            path.display(),
            base.display()
        ))
    })?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Normalize the file name of an inline file to a relative `/`-separated name
pub fn inline_entry_name(filename: &str) -> Result<String, DeployError> {
    let normalized = filename.replace('\\', "/");
    let mut parts = Vec::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(DeployError::Validation(format!(
                    "File name {} escapes the source root",
                    filename
                )))
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() || normalized.starts_with('/') {
        return Err(DeployError::Validation(format!(
            "Invalid file name {:?}: must be a relative path",
            filename
        )));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_foreign_path() {
        let mount = Path::new("/mnt");
        assert_eq!(
            rewrite_foreign_path("/c/work/app", mount),
            Some(PathBuf::from("/mnt/c/work/app"))
        );
        assert_eq!(
            rewrite_foreign_path(r"D:\work\app", mount),
            Some(PathBuf::from("/mnt/d/work/app"))
        );
        assert_eq!(rewrite_foreign_path("/home/me/app", mount), None);
        assert_eq!(rewrite_foreign_path("relative/app", mount), None);
    }

    #[test]
    fn test_resolve_path_uses_mount_root() {
        let mount = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(mount.path().join("q/work")).unwrap();

        let resolved = resolve_path("/q/work", mount.path()).unwrap();
        assert_eq!(resolved, mount.path().join("q/work"));

        let missing = resolve_path("/q/nothing-here", mount.path());
        assert!(matches!(missing, Err(DeployError::SourceNotFound(_))));
    }

    #[test]
    fn test_lowest_common_ancestor() {
        let paths = vec![
            PathBuf::from("/proj/src/lib"),
            PathBuf::from("/proj/src"),
            PathBuf::from("/proj/docs"),
        ];
        assert_eq!(lowest_common_ancestor(&paths), Some(PathBuf::from("/proj")));
        assert_eq!(
            lowest_common_ancestor(&[PathBuf::from("/proj/src")]),
            Some(PathBuf::from("/proj/src"))
        );
        assert_eq!(lowest_common_ancestor(&[]), None);
    }

    #[test]
    fn test_inline_entry_name() {
        assert_eq!(inline_entry_name("./src\\index.js").unwrap(), "src/index.js");
        assert!(inline_entry_name("../secret").is_err());
        assert!(inline_entry_name("/etc/passwd").is_err());
        assert!(inline_entry_name("").is_err());
    }
}
