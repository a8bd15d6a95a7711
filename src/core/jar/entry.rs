use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, trace};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::core::digest::sha256_hex;
use crate::core::error::{EngineError, EngineResult};

/// Which side an archive entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OriginTag {
    ClientOnly,
    ServerOnly,
    Common,
}

impl OriginTag {
    pub fn in_client(self) -> bool {
        matches!(self, OriginTag::ClientOnly | OriginTag::Common)
    }

    pub fn in_server(self) -> bool {
        matches!(self, OriginTag::ServerOnly | OriginTag::Common)
    }
}

/// One entry of a zip-format archive, fully loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalized path; directories end in `/`.
    pub path: String,
    pub data: Vec<u8>,
    /// SHA-256 of `data`, hex.
    pub checksum: String,
    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn file(path: &str, data: Vec<u8>) -> Self {
        Self {
            path: normalize_path(path, false),
            checksum: sha256_hex(&data),
            data,
            is_dir: false,
        }
    }

    pub fn directory(path: &str) -> Self {
        Self {
            path: normalize_path(path, true),
            checksum: sha256_hex(&[]),
            data: Vec::new(),
            is_dir: true,
        }
    }

    pub fn same_content(&self, other: &ArchiveEntry) -> bool {
        self.is_dir == other.is_dir && self.checksum == other.checksum
    }
}

/// `/` separators, no leading `/`, and a trailing `/` for directories.
pub fn normalize_path(raw: &str, is_dir: bool) -> String {
    let unified = raw.replace('\\', "/");
    let trimmed = unified.trim_start_matches('/');
    let mut path = trimmed
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/");
    if is_dir && !path.is_empty() {
        path.push('/');
    }
    path
}

/// Read every entry of `archive`. Repeated directory entries collapse into
/// one; a repeated file path is an error.
pub fn read_archive(archive: &Path) -> EngineResult<Vec<ArchiveEntry>> {
    let file = File::open(archive).map_err(|e| EngineError::io(archive, e))?;
    let mut zip = ZipArchive::new(file)?;

    let mut entries: BTreeMap<String, ArchiveEntry> = BTreeMap::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let is_dir = file.is_dir();
        let path = normalize_path(file.name(), is_dir);
        if path.is_empty() {
            continue;
        }

        let entry = if is_dir {
            ArchiveEntry::directory(&path)
        } else {
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut data)
                .map_err(|e| EngineError::io(archive, e))?;
            ArchiveEntry::file(&path, data)
        };

        if entries.contains_key(&path) {
            if is_dir {
                continue;
            }
            return Err(EngineError::DuplicateEntry {
                archive: archive.to_path_buf(),
                path,
            });
        }
        entries.insert(path, entry);
    }

    debug!(archive = %archive.display(), entries = entries.len(), "read archive");
    Ok(entries.into_values().collect())
}

/// Write `entries` to `output` reproducibly: sorted by path, fixed
/// timestamps and permissions, deflate compression. The file is assembled
/// beside `output` and renamed into place once complete.
pub fn write_archive<'a, I>(output: &Path, entries: I) -> EngineResult<PathBuf>
where
    I: IntoIterator<Item = &'a ArchiveEntry>,
{
    let mut sorted: Vec<&ArchiveEntry> = entries.into_iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&parent).map_err(|e| EngineError::io(&parent, e))?;

    let temp = NamedTempFile::new_in(&parent).map_err(|e| EngineError::io(&parent, e))?;
    let mut zip = ZipWriter::new(temp);

    for entry in &sorted {
        trace!(path = %entry.path, "writing entry");
        if entry.is_dir {
            zip.add_directory(entry.path.as_str(), entry_options(0o755))?;
        } else {
            zip.start_file(entry.path.as_str(), entry_options(0o644))?;
            zip.write_all(&entry.data)
                .map_err(|e| EngineError::io(output, e))?;
        }
    }

    let temp = zip.finish()?;
    temp.as_file()
        .sync_all()
        .map_err(|e| EngineError::io(output, e))?;
    temp.persist(output)
        .map_err(|e| EngineError::io(output, e.error))?;

    debug!(archive = %output.display(), entries = sorted.len(), "wrote archive");
    Ok(output.to_path_buf())
}

/// Fixed metadata for every written entry: the zip epoch as timestamp.
fn entry_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(mode)
}
