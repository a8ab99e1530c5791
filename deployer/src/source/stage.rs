//! Staging directory for the direct-source path

use std::path::Path;
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::DeployError;
use crate::source::detect::{Runtime, PYTHON_PACKAGES_DIR};
use crate::source::{EntryOrigin, SourceSet};

/// A temporary copy of the sources, removed when dropped
pub struct StagedSource {
    dir: TempDir,
}

impl StagedSource {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// Copy every entry of `sources` into a fresh temporary directory under `root`
pub async fn stage_sources(
    sources: &SourceSet,
    root: Option<&Path>,
) -> Result<StagedSource, DeployError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("rundeploy-");
    let dir = match root {
        Some(root) => builder.tempdir_in(root)?,
        None => builder.tempdir()?,
    };

    for entry in sources.entries() {
        let target = dir.path().join(&entry.name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match &entry.origin {
            EntryOrigin::Disk(path) => {
                tokio::fs::copy(path, &target).await?;
            }
            EntryOrigin::Inline(bytes) => tokio::fs::write(&target, bytes).await?,
        }
    }

    Ok(StagedSource { dir })
}

/// Dependency install command for `runtime` in `dir`, if one is needed
pub fn install_command(dir: &Path, runtime: Runtime) -> Option<(&'static str, Vec<String>)> {
    match runtime {
        Runtime::Nodejs => {
            if !dir.join("package.json").is_file() || dir.join("node_modules").exists() {
                return None;
            }
            let has_lockfile =
                dir.join("package-lock.json").is_file() || dir.join("npm-shrinkwrap.json").is_file();
            let verb = if has_lockfile { "ci" } else { "install" };
            Some((
                "npm",
                [verb, "--omit=dev", "--no-audit", "--no-fund"]
                    .map(String::from)
                    .to_vec(),
            ))
        }
        Runtime::Python => {
            if !dir.join("requirements.txt").is_file() || dir.join(PYTHON_PACKAGES_DIR).exists() {
                return None;
            }
            Some((
                "python3",
                [
                    "-m",
                    "pip",
                    "install",
                    "--quiet",
                    "--target",
                    PYTHON_PACKAGES_DIR,
                    "-r",
                    "requirements.txt",
                ]
                .map(String::from)
                .to_vec(),
            ))
        }
    }
}

/// Vendor dependencies into `dir`; failures are logged, never returned
pub async fn install_dependencies(dir: &Path, runtime: Runtime) {
    let Some((program, args)) = install_command(dir, runtime) else {
        return;
    };

    info!("Installing dependencies: {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(&args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                "{} exited with {}, deploying without vendored dependencies: {}",
                program,
                output.status,
                stderr.trim()
            );
        }
        Err(e) => warn!("Could not run {}: {}", program, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceFile;
    use crate::source::resolve_sources;

    #[tokio::test]
    async fn test_staging_dir_is_removed_on_drop() {
        let sources = resolve_sources(
            &[SourceFile::content("src/app.py", "print(1)")],
            Path::new("/mnt"),
        )
        .unwrap();

        let staged = stage_sources(&sources, None).await.unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(path.join("src/app.py")).unwrap(), "print(1)");

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_install_command_selection() {
        let dir = tempfile::tempdir().unwrap();
        assert!(install_command(dir.path(), Runtime::Nodejs).is_none());

        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let (program, args) = install_command(dir.path(), Runtime::Nodejs).unwrap();
        assert_eq!(program, "npm");
        assert_eq!(args[0], "install");

        std::fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
        assert_eq!(install_command(dir.path(), Runtime::Nodejs).unwrap().1[0], "ci");

        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        assert!(install_command(dir.path(), Runtime::Nodejs).is_none());

        std::fs::write(dir.path().join("requirements.txt"), "flask").unwrap();
        let (program, args) = install_command(dir.path(), Runtime::Python).unwrap();
        assert_eq!(program, "python3");
        assert!(args.contains(&"--target".to_string()));
    }
}
