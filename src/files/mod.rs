// ABOUTME: Streaming access to uploaded MTA archives.
// ABOUTME: File service contract, a directory-backed store, digests, and URL fetch.

pub mod archive;
pub mod url;

use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::{ArchiveId, SpaceId};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("archive {archive} not found in space {space}")]
    NotFound { space: String, archive: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive has no entry matching {entry}")]
    EntryNotFound { entry: String },

    #[error("content of {entry} exceeds the maximum size of {max} bytes")]
    TooLarge { entry: String, max: u64 },

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("fetching {url} failed: {reason}")]
    Fetch { url: String, reason: String },
}

impl FileError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> FileError {
        let path = path.into();
        move |source| FileError::Io { path, source }
    }

    /// Local I/O trouble that may go away on retry.
    pub fn is_io(&self) -> bool {
        matches!(self, FileError::Io { .. } | FileError::Fetch { .. })
    }
}

/// Read access to archives uploaded into a space.
pub trait FileService: Send + Sync {
    fn open(&self, space: &SpaceId, archive: &ArchiveId)
    -> Result<Box<dyn Read + Send>, FileError>;
}

/// Stream an archive through `processor` without loading it into memory.
pub fn process_file_content<S, T, F>(
    service: &S,
    space: &SpaceId,
    archive: &ArchiveId,
    processor: F,
) -> Result<T, FileError>
where
    S: FileService + ?Sized,
    F: FnOnce(&mut dyn Read) -> Result<T, FileError>,
{
    let mut reader = service.open(space, archive)?;
    processor(&mut reader)
}

/// Archives kept as plain files under `<root>/<space>/<archive-id>`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, space: &SpaceId, archive: &ArchiveId) -> PathBuf {
        self.root.join(space.as_str()).join(archive.as_str())
    }

    /// Copy `reader` into the store under a fresh archive id.
    pub fn store(&self, space: &SpaceId, reader: &mut dyn Read) -> Result<ArchiveId, FileError> {
        let dir = self.root.join(space.as_str());
        std::fs::create_dir_all(&dir).map_err(FileError::io(&dir))?;

        let mut staging = tempfile::NamedTempFile::new_in(&dir).map_err(FileError::io(&dir))?;
        let bytes = std::io::copy(reader, &mut staging).map_err(FileError::io(staging.path()))?;

        let id = ArchiveId::random();
        let target = self.path_of(space, &id);
        staging
            .persist(&target)
            .map_err(|e| FileError::io(&target)(e.error))?;
        tracing::debug!(archive = %id, bytes, "stored archive");
        Ok(id)
    }

    /// Store a local file, e.g. the archive named in the configuration.
    pub fn store_file(
        &self,
        space: &SpaceId,
        path: &std::path::Path,
    ) -> Result<ArchiveId, FileError> {
        let mut file = std::fs::File::open(path).map_err(FileError::io(path))?;
        self.store(space, &mut file)
    }
}

impl FileService for LocalFileStore {
    fn open(
        &self,
        space: &SpaceId,
        archive: &ArchiveId,
    ) -> Result<Box<dyn Read + Send>, FileError> {
        let path = self.path_of(space, archive);
        match std::fs::File::open(&path) {
            Ok(file) => Ok(Box::new(std::io::BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FileError::NotFound {
                space: space.to_string(),
                archive: archive.to_string(),
            }),
            Err(e) => Err(FileError::Io { path, source: e }),
        }
    }
}
