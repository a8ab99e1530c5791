//! Gzip-compressed tarballs

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::task::spawn_blocking;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::DeployError;
use crate::source::paths::entry_name;
use crate::source::{EntryOrigin, SourceEntry};

/// Pack `entries` under their entry names
pub async fn archive_entries(entries: Vec<SourceEntry>) -> Result<Vec<u8>, DeployError> {
    spawn_blocking(move || archive_entries_sync(&entries)).await?
}

/// Pack every file below `dir`, named relative to it
pub async fn archive_directory(dir: PathBuf) -> Result<Vec<u8>, DeployError> {
    spawn_blocking(move || archive_directory_sync(&dir)).await?
}

fn archive_entries_sync(entries: &[SourceEntry]) -> Result<Vec<u8>, DeployError> {
    let mtime = chrono::Utc::now().timestamp().max(0) as u64;
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for entry in entries {
        match &entry.origin {
            EntryOrigin::Disk(path) => builder.append_path_with_name(path, &entry.name)?,
            EntryOrigin::Inline(bytes) => {
                let mut header = tar::Header::new_gnu();
                header.set_size(bytes.len() as u64);
                header.set_mode(0o644);
                header.set_mtime(mtime);
                builder.append_data(&mut header, &entry.name, bytes.as_slice())?;
            }
        }
    }

    finish(builder, entries.len())
}

fn archive_directory_sync(dir: &Path) -> Result<Vec<u8>, DeployError> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut count = 0;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry_name(entry.path(), dir)?;
        builder.append_path_with_name(entry.path(), &name)?;
        count += 1;
    }

    finish(builder, count)
}

fn finish(builder: tar::Builder<GzEncoder<Vec<u8>>>, count: usize) -> Result<Vec<u8>, DeployError> {
    let bytes = builder.into_inner()?.finish()?;
    debug!(entries = count, compressed_size = bytes.len(), "created source archive");
    Ok(bytes)
}

/// Entry names of a gzip-compressed tarball, in archive order
pub fn list_entries(archive: &[u8]) -> Result<Vec<String>, DeployError> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let mut names = Vec::new();
    for entry in tar.entries()? {
        let entry = entry?;
        names.push(entry.path()?.to_string_lossy().replace('\\', "/"));
    }
    Ok(names)
}

/// Contents of the entry named `name`
pub fn read_entry(archive: &[u8], name: &str) -> Result<Option<Vec<u8>>, DeployError> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    for entry in tar.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_string_lossy() == name {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            return Ok(Some(bytes));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_archive_mixes_disk_and_inline_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("server.js"), "listen()").unwrap();

        let entries = vec![
            SourceEntry {
                name: "lib/server.js".to_string(),
                origin: EntryOrigin::Disk(dir.path().join("server.js")),
            },
            SourceEntry {
                name: "package.json".to_string(),
                origin: EntryOrigin::Inline(b"{}".to_vec()),
            },
        ];

        let archive = archive_entries(entries).await.unwrap();
        assert_eq!(list_entries(&archive).unwrap(), vec!["lib/server.js", "package.json"]);
        assert_eq!(
            read_entry(&archive, "lib/server.js").unwrap().unwrap(),
            b"listen()".to_vec()
        );
    }

    #[tokio::test]
    async fn test_archive_directory_uses_relative_names() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/c.txt"), "c").unwrap();
        std::fs::write(dir.path().join("root.txt"), "r").unwrap();

        let archive = archive_directory(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(list_entries(&archive).unwrap(), vec!["a/b/c.txt", "root.txt"]);
    }
}
