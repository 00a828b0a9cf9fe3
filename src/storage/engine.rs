use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;

use crate::foundation::error::{CarError, CarResult};
use crate::foundation::hash::checksum;
use crate::key::{KeyFormat, RenditionKey};
use crate::storage::blob::AssetBytes;
use crate::storage::format::{Manifest, ManifestEntry, Provenance, SegmentBuilder, scan};
use crate::storage::{OpenMode, StorageOpts, StorageStats};

const MAX_FACET_NAME_BYTES: usize = u16::MAX as usize;

#[derive(Clone, Debug)]
enum Blob {
    /// Bytes already in the committed image.
    Stored { offset: u64, len: u64, checksum: u64 },
    /// Bytes set since the last write.
    Pending(Arc<[u8]>),
}

#[derive(Clone, Debug)]
struct Slot {
    key: RenditionKey,
    blob: Blob,
}

#[derive(Clone, Debug, Default)]
struct StorageState {
    image: Arc<[u8]>,
    committed_len: u64,
    generation: u64,
    segments: usize,
    live_overhead: u64,
    key_format: KeyFormat,
    provenance: Provenance,
    facets: BTreeMap<String, u16>,
    entries: BTreeMap<Vec<u8>, Slot>,
    dirty: bool,
}

impl StorageState {
    fn from_image(path: &Path, image: Vec<u8>) -> CarResult<Self> {
        if image.is_empty() {
            return Err(CarError::corrupt(path, "container is empty"));
        }
        let scanned = scan(&image).map_err(|e| CarError::corrupt(path, e.0))?;
        let Some(live) = scanned.live else {
            let reason = scanned
                .torn_tail
                .map_or_else(|| "no segments".to_string(), |(_, r)| r);
            return Err(CarError::corrupt(
                path,
                format!("no complete generation: {reason}"),
            ));
        };
        if let Some((at, reason)) = &scanned.torn_tail {
            tracing::warn!(
                path = %path.display(),
                offset = at,
                reason = %reason,
                generation = live.generation,
                "ignoring incomplete tail of container"
            );
        }

        let overhead = live.overhead();
        let manifest = live.manifest;
        let entries = manifest
            .entries
            .into_iter()
            .map(|e| {
                (
                    e.key_bytes,
                    Slot {
                        key: e.key,
                        blob: Blob::Stored {
                            offset: e.offset,
                            len: e.len,
                            checksum: e.checksum,
                        },
                    },
                )
            })
            .collect();

        let mut image = image;
        image.truncate(scanned.committed_len as usize);

        Ok(Self {
            image: Arc::from(image),
            committed_len: scanned.committed_len,
            generation: live.generation,
            segments: scanned.segments,
            live_overhead: overhead,
            key_format: KeyFormat {
                max_attributes: manifest.max_key_attributes,
            },
            provenance: manifest.provenance,
            facets: manifest.facets,
            entries,
            dirty: false,
        })
    }

    fn bytes_of(&self, path: &Path, slot: &Slot, verify: bool) -> CarResult<AssetBytes> {
        blob_bytes(&self.image, path, slot, verify)
    }
}

fn blob_bytes(image: &Arc<[u8]>, path: &Path, slot: &Slot, verify: bool) -> CarResult<AssetBytes> {
    match &slot.blob {
        Blob::Pending(bytes) => Ok(AssetBytes::whole(bytes.clone())),
        Blob::Stored {
            offset,
            len,
            checksum: expected,
        } => {
            let start = *offset as usize;
            let end = start.saturating_add(*len as usize);
            if end > image.len() {
                return Err(CarError::corrupt(
                    path,
                    format!("blob for {} runs past end of container", slot.key),
                ));
            }
            let out = AssetBytes::slice(image.clone(), start, end);
            if verify && checksum(&out) != *expected {
                return Err(CarError::corrupt(
                    path,
                    format!("checksum mismatch for blob of {}", slot.key),
                ));
            }
            Ok(out)
        }
    }
}

/// Read/write access to a compiled asset container.
///
/// Readers share an `RwLock`; mutations are serialized by a writer gate and only take the write
/// lock to swap in new state, so readers keep seeing the previous state while a write is built.
pub struct AssetStorage {
    path: PathBuf,
    mode: OpenMode,
    opts: StorageOpts,
    state: RwLock<StorageState>,
    write_gate: Mutex<()>,
}

impl std::fmt::Debug for AssetStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("AssetStorage")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("generation", &state.generation)
            .field("entries", &state.entries.len())
            .finish_non_exhaustive()
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".staging");
    PathBuf::from(s)
}

impl AssetStorage {
    /// Open a container with default options.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> CarResult<Self> {
        Self::open_with_opts(path, mode, StorageOpts::default())
    }

    /// Open a container.
    ///
    /// A missing file is [`CarError::NotFound`] in read-only mode and an empty container in
    /// read-write mode. Bytes after the last complete segment are ignored.
    #[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open_with_opts(
        path: impl AsRef<Path>,
        mode: OpenMode,
        opts: StorageOpts,
    ) -> CarResult<Self> {
        let path = path.as_ref().to_path_buf();

        let staging = staging_path(&path);
        if staging.exists() {
            tracing::warn!(staging = %staging.display(), "ignoring stale staging file");
        }

        let state = match fs::read(&path) {
            Ok(image) => StorageState::from_image(&path, image)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => match mode {
                OpenMode::ReadOnly => return Err(CarError::NotFound { path }),
                OpenMode::ReadWrite => StorageState::default(),
            },
            Err(err) => return Err(CarError::io(&path, err)),
        };

        tracing::debug!(
            generation = state.generation,
            entries = state.entries.len(),
            "storage opened"
        );

        Ok(Self {
            path,
            mode,
            opts,
            state: RwLock::new(state),
            write_gate: Mutex::new(()),
        })
    }

    /// Write a new, empty container at `path`, replacing any existing file.
    pub fn create(
        path: impl AsRef<Path>,
        provenance: Provenance,
        key_format: KeyFormat,
    ) -> CarResult<Self> {
        Self::create_with_opts(path, provenance, key_format, StorageOpts::default())
    }

    /// [`create`](Self::create) with explicit options.
    pub fn create_with_opts(
        path: impl AsRef<Path>,
        provenance: Provenance,
        key_format: KeyFormat,
        opts: StorageOpts,
    ) -> CarResult<Self> {
        let storage = Self {
            path: path.as_ref().to_path_buf(),
            mode: OpenMode::ReadWrite,
            opts,
            state: RwLock::new(StorageState {
                key_format,
                provenance,
                dirty: true,
                ..StorageState::default()
            }),
            write_gate: Mutex::new(()),
        };
        storage.write_to_disk(true)?;
        Ok(storage)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StorageState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StorageState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_writable(&self) -> CarResult<()> {
        match self.mode {
            OpenMode::ReadOnly => Err(CarError::ReadOnly {
                path: self.path.clone(),
            }),
            OpenMode::ReadWrite => Ok(()),
        }
    }

    /// Path of the container file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the container was opened in.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Attribute limit for keys in this container.
    pub fn key_format(&self) -> KeyFormat {
        self.read_state().key_format
    }

    /// Thinning and authoring-tool information.
    pub fn provenance(&self) -> Provenance {
        self.read_state().provenance.clone()
    }

    /// Number of stored keys, including unsaved ones.
    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    /// Whether the container holds no keys.
    pub fn is_empty(&self) -> bool {
        self.read_state().entries.is_empty()
    }

    /// Whether there are mutations not yet written to disk.
    pub fn has_pending_changes(&self) -> bool {
        self.read_state().dirty
    }

    /// Every stored key, ordered by canonical encoding.
    pub fn all_keys(&self) -> Vec<RenditionKey> {
        self.read_state()
            .entries
            .values()
            .map(|s| s.key.clone())
            .collect()
    }

    /// Whether `key` is stored.
    pub fn contains(&self, key: &RenditionKey) -> bool {
        self.read_state().entries.contains_key(&key.to_bytes())
    }

    /// Bytes stored under `key`.
    pub fn asset_for(&self, key: &RenditionKey) -> CarResult<AssetBytes> {
        let state = self.read_state();
        let slot = state
            .entries
            .get(&key.to_bytes())
            .ok_or_else(|| CarError::KeyNotFound(key.to_string()))?;
        state.bytes_of(&self.path, slot, self.opts.verify_checksums)
    }

    /// Lazy iterator over a snapshot of every entry, ordered by canonical key encoding.
    pub fn iter(&self) -> StorageIter {
        let state = self.read_state();
        StorageIter {
            path: self.path.clone(),
            verify: self.opts.verify_checksums,
            image: state.image.clone(),
            slots: state.entries.values().cloned().collect::<Vec<_>>().into_iter(),
        }
    }

    /// Visit every entry in the order of [`iter`](Self::iter); stops at the first error.
    pub fn for_each(&self, mut visit: impl FnMut(&RenditionKey, &AssetBytes)) -> CarResult<()> {
        for item in self.iter() {
            let (key, bytes) = item?;
            visit(&key, &bytes);
        }
        Ok(())
    }

    /// Insert or overwrite; returns `true` when an existing entry was replaced.
    pub fn set(&self, bytes: impl Into<Arc<[u8]>>, key: &RenditionKey) -> CarResult<bool> {
        self.ensure_writable()?;
        let _gate = self.gate();
        let key_bytes = {
            let state = self.read_state();
            state.key_format.encode_key(key)?
        };
        let slot = Slot {
            key: key.clone(),
            blob: Blob::Pending(bytes.into()),
        };
        let mut state = self.write_state();
        let replaced = state.entries.insert(key_bytes, slot).is_some();
        state.dirty = true;
        Ok(replaced)
    }

    /// Delete `key`; an absent key is a no-op. Returns whether something was removed.
    pub fn remove(&self, key: &RenditionKey) -> CarResult<bool> {
        self.ensure_writable()?;
        let _gate = self.gate();
        let mut state = self.write_state();
        let removed = state.entries.remove(&key.to_bytes()).is_some();
        if removed {
            state.dirty = true;
        }
        Ok(removed)
    }

    /// Names in the facet table, sorted.
    pub fn rendition_names(&self) -> Vec<String> {
        self.read_state().facets.keys().cloned().collect()
    }

    /// Identifier registered for `name`.
    pub fn identifier_for_name(&self, name: &str) -> Option<u16> {
        self.read_state().facets.get(name).copied()
    }

    /// Name registered for `identifier`; the smallest one when several share it.
    pub fn name_for_identifier(&self, identifier: u16) -> Option<String> {
        self.read_state()
            .facets
            .iter()
            .find(|(_, id)| **id == identifier)
            .map(|(name, _)| name.clone())
    }

    /// Name-by-identifier table for every facet.
    pub fn facet_table(&self) -> BTreeMap<u16, String> {
        let state = self.read_state();
        let mut out = BTreeMap::new();
        for (name, id) in &state.facets {
            out.entry(*id).or_insert_with(|| name.clone());
        }
        out
    }

    /// Identifier for `name`, registering the next free one if the name is new.
    pub fn register_name(&self, name: &str) -> CarResult<u16> {
        self.ensure_writable()?;
        if name.is_empty() || name.len() > MAX_FACET_NAME_BYTES {
            return Err(CarError::invalid_metadata(format!(
                "facet name must be 1..={MAX_FACET_NAME_BYTES} bytes"
            )));
        }
        let _gate = self.gate();
        let mut state = self.write_state();
        if let Some(id) = state.facets.get(name) {
            return Ok(*id);
        }
        let next = state
            .facets
            .values()
            .copied()
            .max()
            .map_or(Some(1), |m| m.checked_add(1))
            .ok_or_else(|| CarError::invalid_metadata("facet identifiers exhausted"))?;
        state.facets.insert(name.to_string(), next);
        state.dirty = true;
        Ok(next)
    }

    /// Size and space accounting for the committed container.
    pub fn stats(&self) -> StorageStats {
        let state = self.read_state();
        let mut live_bytes = 0u64;
        let mut stored_bytes = 0u64;
        let mut pending = 0usize;
        for slot in state.entries.values() {
            match &slot.blob {
                Blob::Stored { len, .. } => {
                    live_bytes += len;
                    stored_bytes += len;
                }
                Blob::Pending(b) => {
                    live_bytes += b.len() as u64;
                    pending += 1;
                }
            }
        }
        StorageStats {
            generation: state.generation,
            segments: state.segments,
            file_len: state.committed_len,
            entries: state.entries.len(),
            pending_entries: pending,
            live_bytes,
            reclaimable_bytes: state
                .committed_len
                .saturating_sub(state.live_overhead)
                .saturating_sub(stored_bytes),
        }
    }

    /// Persist pending mutations.
    ///
    /// With `compact` the whole live set is rewritten into `<path>.staging`, synced and renamed
    /// over the container. Otherwise a segment holding only new blobs plus a full manifest is
    /// appended. On error the in-memory state is left as it was.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn write_to_disk(&self, compact: bool) -> CarResult<()> {
        self.ensure_writable()?;
        let _gate = self.gate();
        let snapshot = self.read_state().clone();

        if !snapshot.dirty && !compact {
            tracing::debug!("nothing to write");
            return Ok(());
        }

        let generation = snapshot.generation + 1;
        let image = if compact || snapshot.committed_len == 0 {
            self.write_compacted(&snapshot, generation)?
        } else {
            self.write_appended(&snapshot, generation)?
        };

        let next = StorageState::from_image(&self.path, image)?;
        *self.write_state() = next;
        tracing::debug!(generation, compact, "container written");
        Ok(())
    }

    /// Run [`write_to_disk`](Self::write_to_disk) on a named worker thread.
    pub fn write_to_disk_in_background(
        self: &Arc<Self>,
        compact: bool,
    ) -> CarResult<JoinHandle<CarResult<()>>> {
        let storage = Arc::clone(self);
        std::thread::Builder::new()
            .name("carkit-storage-writer".to_string())
            .spawn(move || storage.write_to_disk(compact))
            .map_err(|e| CarError::io(&self.path, e))
    }

    fn manifest_with<'s>(
        snapshot: &'s StorageState,
        mut place: impl FnMut(&'s Slot) -> CarResult<(u64, u64, u64)>,
    ) -> CarResult<Manifest> {
        let mut entries = Vec::with_capacity(snapshot.entries.len());
        for (key_bytes, slot) in &snapshot.entries {
            let (offset, len, sum) = place(slot)?;
            entries.push(ManifestEntry {
                key: slot.key.clone(),
                key_bytes: key_bytes.clone(),
                offset,
                len,
                checksum: sum,
            });
        }
        Ok(Manifest {
            max_key_attributes: snapshot.key_format.max_attributes,
            provenance: snapshot.provenance.clone(),
            facets: snapshot.facets.clone(),
            entries,
        })
    }

    fn write_compacted(&self, snapshot: &StorageState, generation: u64) -> CarResult<Vec<u8>> {
        let mut seg = SegmentBuilder::new(0, generation);
        let manifest = Self::manifest_with(snapshot, |slot| {
            let bytes = snapshot.bytes_of(&self.path, slot, self.opts.verify_checksums)?;
            let offset = seg.push_blob(&bytes);
            Ok((offset, bytes.len() as u64, checksum(&bytes)))
        })?;
        let image = seg.finish(&manifest);

        let staging = staging_path(&self.path);
        tracing::debug!(staging = %staging.display(), bytes = image.len(), "compacting");
        {
            let mut f = File::create(&staging).map_err(|e| CarError::io(&staging, e))?;
            f.write_all(&image).map_err(|e| CarError::io(&staging, e))?;
            if self.opts.fsync {
                f.sync_all().map_err(|e| CarError::io(&staging, e))?;
            }
        }
        fs::rename(&staging, &self.path).map_err(|e| CarError::io(&self.path, e))?;
        if self.opts.fsync {
            sync_parent_dir(&self.path);
        }
        Ok(image)
    }

    fn write_appended(&self, snapshot: &StorageState, generation: u64) -> CarResult<Vec<u8>> {
        let base = snapshot.committed_len;
        let mut seg = SegmentBuilder::new(base, generation);
        let manifest = Self::manifest_with(snapshot, |slot| match &slot.blob {
            Blob::Stored {
                offset,
                len,
                checksum: sum,
            } => Ok((*offset, *len, *sum)),
            Blob::Pending(bytes) => {
                let offset = seg.push_blob(bytes);
                Ok((offset, bytes.len() as u64, checksum(bytes)))
            }
        })?;
        let segment = seg.finish(&manifest);

        tracing::debug!(base, bytes = segment.len(), "appending segment");
        let mut f = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| CarError::io(&self.path, e))?;
        f.set_len(base).map_err(|e| CarError::io(&self.path, e))?;
        f.seek(SeekFrom::Start(base))
            .map_err(|e| CarError::io(&self.path, e))?;
        f.write_all(&segment)
            .map_err(|e| CarError::io(&self.path, e))?;
        if self.opts.fsync {
            f.sync_all().map_err(|e| CarError::io(&self.path, e))?;
        }

        let mut image = Vec::with_capacity(snapshot.image.len() + segment.len());
        image.extend_from_slice(&snapshot.image);
        image.extend_from_slice(&segment);
        Ok(image)
    }
}

fn sync_parent_dir(path: &Path) {
    let Some(dir) = path.parent() else { return };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(dir = %dir.display(), error = %err, "directory fsync skipped");
    }
}

/// Lazy iterator returned by [`AssetStorage::iter`].
pub struct StorageIter {
    path: PathBuf,
    verify: bool,
    image: Arc<[u8]>,
    slots: std::vec::IntoIter<Slot>,
}

impl Iterator for StorageIter {
    type Item = CarResult<(RenditionKey, AssetBytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slots.next()?;
        Some(blob_bytes(&self.image, &self.path, &slot, self.verify).map(|bytes| (slot.key, bytes)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for StorageIter {}

#[cfg(test)]
#[path = "../../tests/unit/storage/engine.rs"]
mod tests;
