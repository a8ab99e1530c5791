//! Source packaging
//!
//! Turns a heterogeneous list of paths and inline files into a [`SourceSet`]
//! with `/`-separated entry names relative to one base directory, and packs
//! it into a gzip-compressed tarball. The direct-source path additionally
//! stages the files in a throwaway directory and vendors dependencies there.

pub mod archive;
pub mod detect;
pub mod paths;
pub mod stage;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::DeployError;
use crate::models::SourceFile;
use crate::source::detect::DeploymentAttributes;
use crate::source::paths::{entry_name, inline_entry_name, lowest_common_ancestor, resolve_path};

/// Packager options
#[derive(Debug, Clone)]
pub struct PackagerOptions {
    /// Mount point of foreign drive letters, e.g. `/mnt` for `/mnt/c`
    pub mount_root: PathBuf,

    /// Largest archive accepted by the direct-source path
    pub max_archive_bytes: u64,

    /// Vendor dependencies into the staged directory
    pub install_dependencies: bool,

    /// Parent of staging directories; the system temp dir when unset
    pub staging_root: Option<PathBuf>,
}

impl Default for PackagerOptions {
    fn default() -> Self {
        Self {
            mount_root: PathBuf::from("/mnt"),
            max_archive_bytes: 250 * 1024 * 1024,
            install_dependencies: true,
            staging_root: None,
        }
    }
}

/// Where the bytes of an entry come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOrigin {
    Disk(PathBuf),
    Inline(Vec<u8>),
}

/// A file in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub origin: EntryOrigin,
}

impl SourceEntry {
    pub async fn read(&self) -> Result<Vec<u8>, DeployError> {
        match &self.origin {
            EntryOrigin::Disk(path) => Ok(tokio::fs::read(path).await?),
            EntryOrigin::Inline(bytes) => Ok(bytes.clone()),
        }
    }
}

/// A top-level item as given by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    Directory(PathBuf),
    File(PathBuf),
    Inline(String),
}

/// Resolved sources of one request
#[derive(Debug, Clone)]
pub struct SourceSet {
    base: Option<PathBuf>,
    items: Vec<SourceItem>,
    entries: Vec<SourceEntry>,
}

impl SourceSet {
    /// Directory every disk entry is named relative to
    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    pub fn items(&self) -> &[SourceItem] {
        &self.items
    }

    /// Entries sorted by name
    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn entry_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Entry named `name` at the root of the set
    pub fn root_entry(&self, name: &str) -> Option<&SourceEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Whether a Dockerfile sits at a directory input's root or is a top-level item
    pub fn has_dockerfile(&self) -> bool {
        self.items.iter().any(|item| match item {
            SourceItem::Directory(dir) => self.entries.iter().any(|entry| match &entry.origin {
                EntryOrigin::Disk(path) => {
                    path.parent() == Some(dir.as_path()) && is_dockerfile(path)
                }
                EntryOrigin::Inline(_) => false,
            }),
            SourceItem::File(path) => is_dockerfile(path),
            SourceItem::Inline(name) => is_dockerfile(Path::new(name)),
        })
    }
}

fn is_dockerfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.eq_ignore_ascii_case("dockerfile"))
}

/// See [`SourceSet::has_dockerfile`]
pub fn check_if_dockerfile_exists(sources: &SourceSet) -> bool {
    sources.has_dockerfile()
}

/// Archive encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "application/gzip",
        }
    }
}

/// An archive ready for upload
#[derive(Debug, Clone)]
pub struct PackagedArtifact {
    pub archive_bytes: Vec<u8>,
    pub archive_format: ArchiveFormat,
    pub has_dockerfile: bool,
}

/// Resolve caller-supplied files into a [`SourceSet`]
///
/// Blocks on filesystem access.
pub fn resolve_sources(files: &[SourceFile], mount_root: &Path) -> Result<SourceSet, DeployError> {
    if files.is_empty() {
        return Err(DeployError::Validation("No source files given".to_string()));
    }

    let mut items = Vec::with_capacity(files.len());
    let mut inline = Vec::new();
    for file in files {
        match file {
            SourceFile::Path(raw) => {
                let path = resolve_path(raw, mount_root)?;
                if path.is_dir() {
                    items.push(SourceItem::Directory(path));
                } else {
                    items.push(SourceItem::File(path));
                }
            }
            SourceFile::Content { filename, content } => {
                let name = inline_entry_name(filename)?;
                items.push(SourceItem::Inline(name.clone()));
                inline.push((name, content.as_bytes().to_vec()));
            }
        }
    }

    let anchors: Vec<PathBuf> = items
        .iter()
        .filter_map(|item| match item {
            SourceItem::Directory(dir) => Some(dir.clone()),
            SourceItem::File(path) => path.parent().map(Path::to_path_buf),
            SourceItem::Inline(_) => None,
        })
        .collect();

    let base = if anchors.is_empty() {
        None
    } else {
        Some(lowest_common_ancestor(&anchors).ok_or_else(|| {
            DeployError::Validation("Source paths share no common directory".to_string())
        })?)
    };

    let mut entries: BTreeMap<String, EntryOrigin> = BTreeMap::new();
    for item in &items {
        match (item, base.as_deref()) {
            (SourceItem::Directory(dir), Some(base)) => {
                for entry in WalkDir::new(dir).follow_links(true) {
                    let entry = entry?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.into_path();
                    insert_entry(&mut entries, entry_name(&path, base)?, EntryOrigin::Disk(path));
                }
            }
            (SourceItem::File(path), Some(base)) => {
                insert_entry(
                    &mut entries,
                    entry_name(path, base)?,
                    EntryOrigin::Disk(path.clone()),
                );
            }
            _ => {}
        }
    }
    for (name, bytes) in inline {
        insert_entry(&mut entries, name, EntryOrigin::Inline(bytes));
    }

    if entries.is_empty() {
        return Err(DeployError::Validation(
            "Source contains no files to deploy".to_string(),
        ));
    }

    debug!("Resolved {} source entries under {:?}", entries.len(), base);
    Ok(SourceSet {
        base,
        items,
        entries: entries
            .into_iter()
            .map(|(name, origin)| SourceEntry { name, origin })
            .collect(),
    })
}

fn insert_entry(entries: &mut BTreeMap<String, EntryOrigin>, name: String, origin: EntryOrigin) {
    if let Some(previous) = entries.insert(name.clone(), origin) {
        debug!("Source entry {} given twice, replacing {:?}", name, previous);
    }
}

/// Pack every given file as-is, for a remote build
pub async fn package_sources(sources: &SourceSet) -> Result<PackagedArtifact, DeployError> {
    let archive_bytes = archive::archive_entries(sources.entries().to_vec()).await?;
    Ok(PackagedArtifact {
        archive_bytes,
        archive_format: ArchiveFormat::TarGz,
        has_dockerfile: sources.has_dockerfile(),
    })
}

/// Stage, vendor dependencies and pack, for the direct-source path
pub async fn package_direct_source(
    sources: &SourceSet,
    attributes: &DeploymentAttributes,
    options: &PackagerOptions,
) -> Result<PackagedArtifact, DeployError> {
    let staged = stage::stage_sources(sources, options.staging_root.as_deref()).await?;

    let result = async {
        if options.install_dependencies {
            if let Some(runtime) = attributes.runtime {
                stage::install_dependencies(staged.path(), runtime).await;
            }
        }
        archive::archive_directory(staged.path().to_path_buf()).await
    }
    .await;

    if let Err(e) = staged.close() {
        warn!("Failed to remove staging directory: {}", e);
    }

    let archive_bytes = result?;
    if archive_bytes.len() as u64 > options.max_archive_bytes {
        return Err(DeployError::Packaging(format!(
            "Source archive is {} bytes, above the {} byte limit for direct source deploys",
            archive_bytes.len(),
            options.max_archive_bytes
        )));
    }

    Ok(PackagedArtifact {
        archive_bytes,
        archive_format: ArchiveFormat::TarGz,
        has_dockerfile: sources.has_dockerfile(),
    })
}
