use crate::GraphId;
use crate::graph_tile::{GraphTileDecodingError, GraphTileHandle};
use crate::tile_provider::{GraphTileProvider, GraphTileProviderError, LockTable};
use flate2::read::GzDecoder;
use lru::LruCache;
use std::fs;
use std::io::{ErrorKind, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Magic bytes at the start of any gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Default bound on the number of parsed tiles held in memory.
///
/// A parsed local-level tile is tens to low-hundreds of KB, so 100 tiles
/// keeps steady state comfortably inside a small device's memory budget.
pub const DEFAULT_TILE_CACHE_SIZE: usize = 100;

/// A tile provider reading `.gph` / `.gph.gz` files from a directory tree
/// laid out by hierarchy level (`2/AAA/BBB/CCC.gph` and friends).
///
/// Parsed tiles are memoized in a bounded LRU. Concurrent requests for the
/// same missing tile coalesce onto a single read+parse via a per-key lock;
/// the cache mutex itself is never held across I/O.
pub struct DirectoryTileProvider {
    base_directory: PathBuf,
    /// If set, inflated bytes of gzip sources are mirrored here so later
    /// process runs skip decompression. Entries are only trusted while
    /// their mtime is at least the source's.
    scratch_directory: Option<PathBuf>,
    lru_cache: Mutex<LruCache<GraphId, Arc<GraphTileHandle>>>,
    inflight: LockTable<GraphId>,
}

impl DirectoryTileProvider {
    pub fn new(base_directory: PathBuf, num_cached_tiles: NonZeroUsize) -> Self {
        DirectoryTileProvider {
            base_directory,
            scratch_directory: None,
            lru_cache: Mutex::new(LruCache::new(num_cached_tiles)),
            inflight: LockTable::new(),
        }
    }

    /// Mirrors inflated tiles into the given directory, skipping
    /// decompression across process restarts.
    #[must_use]
    pub fn with_scratch_directory(mut self, scratch_directory: PathBuf) -> Self {
        self.scratch_directory = Some(scratch_directory);
        self
    }

    fn cached(&self, base_id: GraphId) -> Result<Option<Arc<GraphTileHandle>>, GraphTileProviderError> {
        let mut cache = self
            .lru_cache
            .lock()
            .map_err(|e| GraphTileProviderError::PoisonedCacheLock(e.to_string()))?;
        Ok(cache.get(&base_id).cloned())
    }

    /// Reads (and, if necessary, inflates) the bytes for a tile.
    fn read_tile_bytes(&self, base_id: GraphId) -> Result<Vec<u8>, GraphTileProviderError> {
        let relative_path = base_id.file_path("gph")?;
        let plain_path = self.base_directory.join(&relative_path);
        match fs::read(&plain_path) {
            Ok(data) => inflate_if_gzip(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.read_compressed_tile_bytes(base_id, &relative_path)
            }
            Err(e) => Err(GraphTileProviderError::IoError(e)),
        }
    }

    fn read_compressed_tile_bytes(
        &self,
        base_id: GraphId,
        relative_path: &Path,
    ) -> Result<Vec<u8>, GraphTileProviderError> {
        let gz_path = self.base_directory.join(base_id.file_path("gph.gz")?);

        let scratch_path = self
            .scratch_directory
            .as_ref()
            .map(|dir| dir.join(relative_path));
        if let Some(scratch_path) = &scratch_path
            && scratch_is_current(scratch_path, &gz_path)
            && let Ok(data) = fs::read(scratch_path)
        {
            return Ok(data);
        }

        let data = match fs::read(&gz_path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(GraphTileProviderError::TileDoesNotExist);
            }
            Err(e) => return Err(GraphTileProviderError::IoError(e)),
        };
        let data = inflate_if_gzip(data)?;

        // Mirror to the scratch cache. Failure here is not an error;
        // the next run just decompresses again.
        if let Some(scratch_path) = &scratch_path {
            if let Err(e) = write_scratch(scratch_path, &data) {
                debug!(tile = %base_id, error = %e, "Unable to write scratch cache entry");
            }
        }

        Ok(data)
    }
}

impl GraphTileProvider for DirectoryTileProvider {
    fn get_tile(&self, graph_id: GraphId) -> Result<Arc<GraphTileHandle>, GraphTileProviderError> {
        let base_id = graph_id.tile_base_id();

        // Fast path: already parsed.
        if let Some(tile) = self.cached(base_id)? {
            return Ok(tile);
        }

        // Coalesce concurrent misses for the same tile onto one parse.
        // Unrelated tiles proceed in parallel; the LRU mutex is only taken
        // for map operations, never across I/O.
        let gate = self.inflight.lock_for(base_id);
        let _guard = gate
            .lock()
            .map_err(|e| GraphTileProviderError::PoisonedCacheLock(e.to_string()))?;

        // Somebody else may have finished while we waited on the gate.
        if let Some(tile) = self.cached(base_id)? {
            return Ok(tile);
        }

        let data = self.read_tile_bytes(base_id)?;
        let tile = Arc::new(GraphTileHandle::try_from(data)?);

        let mut cache = self
            .lru_cache
            .lock()
            .map_err(|e| GraphTileProviderError::PoisonedCacheLock(e.to_string()))?;
        cache.put(base_id, tile.clone());

        Ok(tile)
    }
}

/// Inflates the buffer if it starts with the gzip magic; otherwise returns
/// it unchanged. Some tile sets gzip without the `.gz` suffix (and vice
/// versa), so sniffing the content is more reliable than the extension.
fn inflate_if_gzip(data: Vec<u8>) -> Result<Vec<u8>, GraphTileProviderError> {
    if data.len() < 2 || data[0..2] != GZIP_MAGIC {
        return Ok(data);
    }

    let mut inflated = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(data.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| {
            GraphTileProviderError::DecodingError(GraphTileDecodingError::BadMagic(format!(
                "corrupt gzip stream: {e}"
            )))
        })?;
    Ok(inflated)
}

fn scratch_is_current(scratch_path: &Path, source_path: &Path) -> bool {
    let Ok(scratch_modified) = fs::metadata(scratch_path).and_then(|m| m.modified()) else {
        return false;
    };
    let Ok(source_modified) = fs::metadata(source_path).and_then(|m| m.modified()) else {
        return false;
    };
    scratch_modified >= source_modified
}

fn write_scratch(scratch_path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = scratch_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(scratch_path, data)
}
