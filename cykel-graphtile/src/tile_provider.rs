//! # Graph tile providers
//!
//! Resolution of graph IDs to parsed tiles. The directory provider is the
//! only cross-request shared state in a router process: it memoizes parsed
//! tiles in a bounded LRU and hands out `Arc` references, so eviction can
//! never invalidate a tile an active query is holding.

use crate::GraphId;
use crate::graph_id::InvalidGraphIdError;
use crate::graph_tile::{GraphTileDecodingError, GraphTileHandle};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

mod directory;

pub use directory::{DEFAULT_TILE_CACHE_SIZE, DirectoryTileProvider};

#[derive(Debug, Error)]
pub enum GraphTileProviderError {
    #[error("This tile does not exist (ex: in your extract)")]
    TileDoesNotExist,
    #[error("Invalid graph ID: {0}")]
    InvalidGraphId(#[from] InvalidGraphIdError),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Decoding error: {0}")]
    DecodingError(#[from] GraphTileDecodingError),
    #[error("Cache lock is poisoned: {0}")]
    PoisonedCacheLock(String),
}

pub trait GraphTileProvider {
    /// Gets the tile containing the given graph ID.
    ///
    /// The result is a shared handle: the tile stays alive for as long as
    /// the caller holds it, regardless of cache eviction.
    ///
    /// # Errors
    ///
    /// This operation may fail for several reasons,
    /// including the tile not existing, I/O errors, and corrupt data.
    /// Refer to [`GraphTileProviderError`] for details.
    fn get_tile(&self, graph_id: GraphId) -> Result<Arc<GraphTileHandle>, GraphTileProviderError>;
}

impl<T: GraphTileProvider + ?Sized> GraphTileProvider for Arc<T> {
    fn get_tile(&self, graph_id: GraphId) -> Result<Arc<GraphTileHandle>, GraphTileProviderError> {
        (**self).get_tile(graph_id)
    }
}

/// A keyed lock.
///
/// This enables more granular locking than over an entire data structure;
/// the directory provider uses it to coalesce concurrent parses of the
/// same tile without blocking unrelated fetches.
pub(crate) struct LockTable<K>(DashMap<K, Arc<Mutex<()>>>);

impl<K: std::hash::Hash + Eq + Clone> LockTable<K> {
    pub fn new() -> Self {
        Self(DashMap::new())
    }

    pub fn lock_for(&self, k: K) -> Arc<Mutex<()>> {
        self.0
            .entry(k)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
