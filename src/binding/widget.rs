use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::images::RemoteImage;

static NEXT_WIDGET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

impl WidgetId {
    /// Allocates an id no other call in this process returns.
    pub fn next() -> Self {
        Self(NEXT_WIDGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget#{}", self.0)
    }
}

/// A widget that can display an image.
///
/// Implementations must keep `widget_id` stable for the widget's lifetime.
/// `set_image` may be called from a runtime worker thread.
pub trait ImageWidget: Send + Sync + 'static {
    fn widget_id(&self) -> WidgetId;

    fn set_image(&self, image: Arc<RemoteImage>);
}

/// Headless widget that just remembers what it displays.
#[derive(Debug)]
pub struct ImageSlot {
    id: WidgetId,
    image: RwLock<Option<Arc<RemoteImage>>>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self {
            id: WidgetId::next(),
            image: RwLock::new(None),
        }
    }

    pub fn image(&self) -> Option<Arc<RemoteImage>> {
        self.image.read().clone()
    }
}

impl Default for ImageSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWidget for ImageSlot {
    fn widget_id(&self) -> WidgetId {
        self.id
    }

    fn set_image(&self, image: Arc<RemoteImage>) {
        *self.image.write() = Some(image);
    }
}
