use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::session::TransferSession;
use crate::{StoreError, validate_file_name};

/// Name of the subdirectory of the storage root that holds working markers.
pub const WORK_DIR_NAME: &str = ".workdir";

/// Produces a fresh transfer identity.
pub type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Owns every open transfer and its durable working marker.
///
/// A zero-byte marker `<storage>/.workdir/<id>` exists exactly while the
/// transfer with that id is open. After a restart, markers with no open
/// transfer identify partial uploads; [`SessionRegistry::sweep_orphans`]
/// removes them.
pub struct SessionRegistry {
    storage_dir: PathBuf,
    work_dir: PathBuf,
    sessions: Mutex<HashMap<String, Arc<TransferSession>>>,
    id_generator: IdGenerator,
    /// Hands sessions a read-only handle so every append fails.
    #[cfg(test)]
    read_only_files: bool,
}

impl SessionRegistry {
    /// Opens a registry rooted at `storage_dir`, creating the storage and
    /// working directories if needed.
    pub fn open(storage_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.into();
        let work_dir = storage_dir.join(WORK_DIR_NAME);
        std::fs::create_dir_all(&work_dir)?;

        Ok(Self {
            storage_dir,
            work_dir,
            sessions: Mutex::new(HashMap::new()),
            id_generator: Box::new(|| uuid::Uuid::new_v4().to_string()),
            #[cfg(test)]
            read_only_files: false,
        })
    }

    /// Replaces the identity generator (lowercase UUID v4 by default).
    pub fn with_id_generator(mut self, id_generator: IdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Opens a new transfer for `name`.
    ///
    /// Creates the marker, the data directory and the empty target file.
    /// An identity that is already open, already has a marker or already has
    /// a data directory is never reused: that fails with
    /// [`StoreError::DuplicateIdentity`].
    pub fn create_session(&self, name: &str) -> Result<Arc<TransferSession>, StoreError> {
        validate_file_name(name)?;

        let mut sessions = self.sessions();
        let id = (self.id_generator)();
        validate_file_name(&id).map_err(|_| StoreError::DuplicateIdentity(id.clone()))?;

        let marker = self.marker_path(&id);
        let data_dir = self.storage_dir.join(&id);
        if sessions.contains_key(&id) || marker.exists() || data_dir.exists() {
            tracing::error!(file_id = %id, "generated transfer identity already in use");
            return Err(StoreError::DuplicateIdentity(id));
        }

        let file = create_transfer_files(&marker, &data_dir, name).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                StoreError::DuplicateIdentity(id.clone())
            } else {
                StoreError::Io(e)
            }
        })?;
        #[cfg(test)]
        let file = if self.read_only_files {
            File::open(data_dir.join(name))?
        } else {
            file
        };

        let session = Arc::new(TransferSession::new(
            id.clone(),
            name.to_string(),
            data_dir,
            file,
        ));
        sessions.insert(id.clone(), Arc::clone(&session));
        tracing::info!(file_id = %id, name, "transfer opened");
        Ok(session)
    }

    /// Returns the open transfer with the given id.
    pub fn lookup_session(&self, id: &str) -> Result<Arc<TransferSession>, StoreError> {
        self.sessions()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTransfer(id.to_string()))
    }

    /// Closes the books on a transfer: drops it and deletes its marker.
    ///
    /// The data directory is left alone.
    pub fn remove_session(&self, id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions();
        sessions.remove(id);
        match std::fs::remove_file(self.marker_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Purges transfers interrupted by a previous run.
    ///
    /// Every marker with no open transfer has its data directory and the
    /// marker itself deleted. Returns the purged ids. Must run before any
    /// segment is accepted.
    pub fn sweep_orphans(&self) -> Result<Vec<String>, StoreError> {
        let sessions = self.sessions();
        let mut purged = Vec::new();

        for entry in std::fs::read_dir(&self.work_dir)? {
            let entry = entry?;
            let id = entry.file_name().to_string_lossy().into_owned();
            if sessions.contains_key(&id) {
                continue;
            }
            if id == WORK_DIR_NAME || validate_file_name(&id).is_err() {
                tracing::warn!(marker = %entry.path().display(), "skipping unexpected marker");
                continue;
            }

            let data_dir = self.storage_dir.join(&id);
            match std::fs::remove_dir_all(&data_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            std::fs::remove_file(entry.path())?;
            tracing::info!(file_id = %id, "purged orphaned transfer");
            purged.push(id);
        }

        purged.sort();
        Ok(purged)
    }

    /// Ids of all open transfers, sorted.
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn active_count(&self) -> usize {
        self.sessions().len()
    }

    fn marker_path(&self, id: &str) -> PathBuf {
        self.work_dir.join(id)
    }

    #[cfg(test)]
    pub(crate) fn with_read_only_files(mut self) -> Self {
        self.read_only_files = true;
        self
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<TransferSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates marker, data directory and target file, in that order.
///
/// On failure, only the steps this call completed are undone; anything that
/// already existed is left in place.
fn create_transfer_files(marker: &Path, data_dir: &Path, name: &str) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(marker)?;

    if let Err(e) = std::fs::create_dir(data_dir) {
        let _ = std::fs::remove_file(marker);
        return Err(e);
    }

    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(data_dir.join(name))
    {
        Ok(file) => Ok(file),
        Err(e) => {
            let _ = std::fs::remove_dir_all(data_dir);
            let _ = std::fs::remove_file(marker);
            Err(e)
        }
    }
}
