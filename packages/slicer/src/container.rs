use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use thiserror::Error;

/// Maximum decompressed size per entry inside a 3MF container (64 MB).
const MAX_ENTRY_SIZE: u64 = 64 * 1024 * 1024;

/// Maximum total decompressed size across all entries (256 MB).
const MAX_TOTAL_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("invalid 3MF container: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to read '{name}': {source}")]
    Entry {
        name: String,
        source: std::io::Error,
    },
    #[error("entry '{0}' exceeds the decompressed size limit")]
    EntryTooLarge(String),
    #[error("total decompressed content exceeds the size limit")]
    TooLarge,
}

/// Decompressed name-to-bytes view of a 3MF container.
///
/// Entries with path-traversal names are skipped rather than rejected;
/// nothing in a print profile legitimately lives outside the archive root.
pub struct Archive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Archive {
    pub fn from_zip_bytes(data: &[u8]) -> Result<Self, ContainerError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(data))?;
        let mut entries = BTreeMap::new();
        let mut total: u64 = 0;

        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = match file.enclosed_name() {
                Some(path) => path.to_string_lossy().to_string(),
                None => continue,
            };

            let mut buf = Vec::new();
            file.take(MAX_ENTRY_SIZE + 1)
                .read_to_end(&mut buf)
                .map_err(|source| ContainerError::Entry {
                    name: name.clone(),
                    source,
                })?;
            if buf.len() as u64 > MAX_ENTRY_SIZE {
                return Err(ContainerError::EntryTooLarge(name));
            }

            total += buf.len() as u64;
            if total > MAX_TOTAL_SIZE {
                return Err(ContainerError::TooLarge);
            }

            entries.insert(name, buf);
        }

        Ok(Self { entries })
    }

    /// Build an archive from an already-decompressed entry map.
    pub fn from_entries(entries: BTreeMap<String, Vec<u8>>) -> Self {
        Self { entries }
    }

    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Entry contents decoded as UTF-8, replacing invalid sequences.
    pub fn entry_utf8(&self, name: &str) -> Option<String> {
        self.entries
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The largest entry whose name starts with `prefix` and ends with
    /// `suffix`. Used for thumbnail conventions that embed dimensions in
    /// the filename.
    pub fn largest_matching(&self, prefix: &str, suffix: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .filter(|(name, _)| name.starts_with(prefix) && name.ends_with(suffix))
            .max_by_key(|(_, bytes)| bytes.len())
            .map(|(_, bytes)| bytes.as_slice())
    }
}
