//! Content-addressed blob storage.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::{DatasetError, Result};

/// Prefix for paths handed out by [`MemStore`].
pub const MEM_PREFIX: &str = "/map/";

/// Content-addressed byte storage.
pub trait Store: Send + Sync {
    /// Store `data`, returning its address. Storing identical bytes twice
    /// returns the same address.
    fn put(&mut self, data: Vec<u8>) -> Result<String>;

    /// Fetch the bytes at `path`.
    fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Whether anything lives at `path`.
    fn has(&self, path: &str) -> bool;

    /// Remove the bytes at `path`. Missing paths are an error.
    fn delete(&mut self, path: &str) -> Result<()>;

    /// Number of stored blobs.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`Store`] keyed by the SHA-256 of the content.
#[derive(Debug, Default)]
pub struct MemStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The address `data` would be stored under.
    pub fn address_of(data: &[u8]) -> String {
        format!("{MEM_PREFIX}{}", hex::encode(Sha256::digest(data)))
    }
}

impl Store for MemStore {
    fn put(&mut self, data: Vec<u8>) -> Result<String> {
        let path = Self::address_of(&data);
        self.blobs.entry(path.clone()).or_insert(data);
        Ok(path)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(path)
            .cloned()
            .ok_or_else(|| DatasetError::NotFound(path.to_string()))
    }

    fn has(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.blobs
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| DatasetError::NotFound(path.to_string()))
    }

    fn len(&self) -> usize {
        self.blobs.len()
    }
}
