use image::GrayImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Fixed-capacity cache of decoded reference images, keyed by path.
/// When full, the least recently used entry is evicted.
#[derive(Debug)]
pub struct ImageCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<PathBuf, Entry>,
}

#[derive(Debug)]
struct Entry {
    image: Arc<GrayImage>,
    last_used: u64,
}

impl ImageCache {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Look up an image, marking it as most recently used.
    pub fn get(&mut self, path: &Path) -> Option<Arc<GrayImage>> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(path).map(|entry| {
            entry.last_used = tick;
            Arc::clone(&entry.image)
        })
    }

    /// Insert (or replace) an image, evicting the least recently used entry if needed.
    pub fn insert(&mut self, path: PathBuf, image: Arc<GrayImage>) {
        self.tick += 1;
        if !self.entries.contains_key(&path) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(p, _)| p.clone())
            {
                trace!(
                    target: "atlas::locator",
                    path = %oldest.display(),
                    "Evicting cached reference"
                );
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            path,
            Entry {
                image,
                last_used: self.tick,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
