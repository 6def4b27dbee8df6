//! Archive cache and extraction
//!
//! Downloaded snapshots are written to the cache directory as
//! `{project}-{version}.{ext}` and unpacked into a caller-provided
//! directory. Both `.zip` and `.tar.gz` snapshots are supported.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Archive format requested from the remote directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    /// File extension, also used as the remote archive suffix
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            other => Err(format!("Unsupported archive format: {other}")),
        }
    }
}

/// Ref names as they appear in file and directory names (`feature/x` -> `feature-x`)
pub fn ref_label(version_name: &str) -> String {
    version_name.replace('/', "-")
}

/// Cache of downloaded archives
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    cache_dir: PathBuf,
}

impl ArchiveStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache location for a project snapshot
    pub fn cache_path(
        &self,
        project_name: &str,
        version_name: &str,
        format: ArchiveFormat,
    ) -> PathBuf {
        self.cache_dir.join(format!(
            "{}-{}.{}",
            project_name,
            ref_label(version_name),
            format.extension()
        ))
    }

    /// Write downloaded bytes to the cache, replacing any earlier copy
    pub fn persist(
        &self,
        project_name: &str,
        version_name: &str,
        format: ArchiveFormat,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", self.cache_dir.display())
        })?;

        let path = self.cache_path(project_name, version_name, format);
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write archive: {}", path.display()))?;

        tracing::debug!("Cached {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Unpack an archive into `dest`
    pub async fn extract(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<()> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();

        // zip and tar are blocking readers
        tokio::task::spawn_blocking(move || extract_to_dir(&archive, format, &dest))
            .await
            .context("Extraction task panicked")?
    }
}

/// Unpack an archive file into `dest` synchronously
pub fn extract_to_dir(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::TarGz => extract_targz(archive, dest),
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file).context("Failed to read zip archive")?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {i}"))?;

        // Entries escaping the destination are skipped
        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)
            .with_context(|| format!("Failed to create {}", outpath.display()))?;
        std::io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

fn extract_targz(archive: &Path, dest: &Path) -> Result<()> {
    let bytes = fs::read(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    let decoder = flate2::read::GzDecoder::new(Cursor::new(bytes));
    let mut tarball = tar::Archive::new(decoder);

    tarball.unpack(dest).context("Failed to extract tarball")?;
    Ok(())
}
