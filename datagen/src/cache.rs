//! The in-memory cache of decoded images.

use crate::{common::*, ndimage};

/// Decoded images keyed by path and grayscale flag.
///
/// The cache lives as long as the operators holding it. Nothing is evicted
/// until [ImageCache::clear] is called.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: DashMap<(PathBuf, bool), Arc<Array3<f32>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the decoded image, decoding the file on a cache miss.
    pub fn get_or_load(&self, path: &Path, grayscale: bool) -> Result<Arc<Array3<f32>>> {
        let key = (path.to_owned(), grayscale);

        if let Some(image) = self.images.get(&key) {
            return Ok(image.value().clone());
        }

        let image = Arc::new(ndimage::load(path, grayscale)?);
        self.images.insert(key, image.clone());
        Ok(image)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&self) {
        self.images.clear();
    }
}
