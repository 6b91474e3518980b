use std::num::NonZeroUsize;
use std::sync::Arc;

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;

use crate::images::RemoteImage;

pub const DEFAULT_CAPACITY: usize = 100;

/// In-memory cache of decoded images keyed by the URL string they were
/// requested with.
///
/// Bounded LRU: once `capacity` entries are held, storing a new URL evicts
/// the least recently read or written one. Lookups go through a mutex since
/// a read refreshes recency.
pub struct ImageCache {
    images: Mutex<LruCache<String, Arc<RemoteImage>>>,
}

impl ImageCache {
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            images: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_image(&self, url: &str) -> Option<Arc<RemoteImage>> {
        let mut images = self.images.lock();
        let image = images.get(url).cloned();
        debug!(
            "Image cache {}: {}",
            if image.is_some() { "hit" } else { "miss" },
            url
        );
        image
    }

    /// Overwrites any previous entry for `url`.
    pub fn store_image(&self, url: &str, image: Arc<RemoteImage>) {
        let mut images = self.images.lock();
        if let Some((evicted, _)) = images.push(url.to_string(), image) {
            if evicted != url {
                debug!("Image cache full, evicted {}", evicted);
            }
        }
    }

    pub fn remove(&self, url: &str) -> Option<Arc<RemoteImage>> {
        self.images.lock().pop(url)
    }

    /// Does not touch recency.
    pub fn contains(&self, url: &str) -> bool {
        self.images.lock().contains(url)
    }

    pub fn clear(&self) {
        self.images.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.images.lock().cap().get()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn image(width: u32) -> Arc<RemoteImage> {
        Arc::new(RemoteImage::from_dynamic(
            DynamicImage::new_rgba8(width, 1),
            1.0,
        ))
    }

    #[test]
    fn store_then_get_returns_same_image() {
        let cache = ImageCache::new(4);
        let img = image(3);
        cache.store_image("https://x/a.png", img.clone());

        let cached = cache.get_image("https://x/a.png").unwrap();
        assert!(Arc::ptr_eq(&cached, &img));
        assert!(cache.get_image("https://x/b.png").is_none());
    }

    #[test]
    fn store_overwrites_existing_key() {
        let cache = ImageCache::new(4);
        cache.store_image("k", image(1));
        cache.store_image("k", image(2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_image("k").unwrap().width(), 2);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ImageCache::new(2);
        cache.store_image("a", image(1));
        cache.store_image("b", image(2));

        // touching "a" makes "b" the eviction candidate
        assert!(cache.get_image("a").is_some());
        cache.store_image("c", image(3));

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache = ImageCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.store_image("a", image(1));
        cache.store_image("b", image(1));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b"));
    }

    #[test]
    fn remove_and_clear() {
        let cache = ImageCache::default();
        cache.store_image("a", image(1));
        cache.store_image("b", image(1));

        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        cache.clear();
        assert!(cache.is_empty());
    }
}
