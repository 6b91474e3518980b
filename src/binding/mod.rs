use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::images::{
    FetchHandle, ImageFetchError, ImageFetcher, ImageTransport, RemoteImage, ReqwestTransport,
};

pub mod widget;

pub use widget::{ImageSlot, ImageWidget, WidgetId};

pub type SuccessCallback<W> = Arc<dyn Fn(&W, Arc<RemoteImage>) + Send + Sync>;
pub type FailureCallback<W> = Arc<dyn Fn(&W, ImageFetchError) + Send + Sync>;

/// Per-bind settings. By default there is no placeholder, a fetched image is
/// set on the widget and failures are ignored.
pub struct BindOptions<W: ImageWidget> {
    pub placeholder: Option<Arc<RemoteImage>>,
    pub on_success: SuccessCallback<W>,
    pub on_failure: FailureCallback<W>,
}

impl<W: ImageWidget> Default for BindOptions<W> {
    fn default() -> Self {
        Self {
            placeholder: None,
            on_success: Arc::new(|widget: &W, image: Arc<RemoteImage>| widget.set_image(image)),
            on_failure: Arc::new(|_: &W, _: ImageFetchError| {}),
        }
    }
}

impl<W: ImageWidget> Clone for BindOptions<W> {
    fn clone(&self) -> Self {
        Self {
            placeholder: self.placeholder.clone(),
            on_success: self.on_success.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<W: ImageWidget> BindOptions<W> {
    pub fn with_placeholder(mut self, placeholder: Arc<RemoteImage>) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    /// Replaces the default, so the callback decides whether to display the image.
    pub fn on_success(mut self, f: impl Fn(&W, Arc<RemoteImage>) + Send + Sync + 'static) -> Self {
        self.on_success = Arc::new(f);
        self
    }

    pub fn on_failure(mut self, f: impl Fn(&W, ImageFetchError) + Send + Sync + 'static) -> Self {
        self.on_failure = Arc::new(f);
        self
    }
}

type Bindings = Arc<Mutex<HashMap<WidgetId, FetchHandle>>>;

/// Keeps at most one in-flight fetch per widget.
pub struct BindingAdapter<W: ImageWidget, T: ImageTransport = ReqwestTransport> {
    fetcher: ImageFetcher<T>,
    bindings: Bindings,
    _widget: std::marker::PhantomData<fn(&W)>,
}

impl<W: ImageWidget, T: ImageTransport> BindingAdapter<W, T> {
    pub fn new(fetcher: ImageFetcher<T>) -> Self {
        Self {
            fetcher,
            bindings: Arc::new(Mutex::new(HashMap::new())),
            _widget: std::marker::PhantomData,
        }
    }

    pub fn fetcher(&self) -> &ImageFetcher<T> {
        &self.fetcher
    }

    /// Shows the placeholder, cancels the widget's previous fetch and starts
    /// one for `url`.
    pub fn bind(&self, widget: &Arc<W>, url: impl AsRef<str>, options: BindOptions<W>) {
        let id = widget.widget_id();

        if let Some(placeholder) = &options.placeholder {
            widget.set_image(placeholder.clone());
        }

        self.cancel(id);

        let on_success = {
            let widget = widget.clone();
            let bindings = self.bindings.clone();
            let callback = options.on_success;
            move |image: Arc<RemoteImage>| {
                release_finished(&bindings, id);
                callback(widget.as_ref(), image);
            }
        };
        let on_failure = {
            let widget = widget.clone();
            let bindings = self.bindings.clone();
            let callback = options.on_failure;
            move |error: ImageFetchError| {
                release_finished(&bindings, id);
                callback(widget.as_ref(), error);
            }
        };

        if let Some(handle) = self.fetcher.fetch(url, on_success, on_failure) {
            let mut bindings = self.bindings.lock();
            // The request may already be done on another worker
            if !handle.is_finished() {
                debug!("Bound {} to image request {}", id, handle.id());
                bindings.insert(id, handle);
            }
        }
    }

    /// Cancels the widget's in-flight fetch, if any. Returns whether one was
    /// associated.
    pub fn cancel(&self, widget_id: WidgetId) -> bool {
        let previous = self.bindings.lock().remove(&widget_id);
        match previous {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn current_handle(&self, widget_id: WidgetId) -> Option<FetchHandle> {
        self.bindings.lock().get(&widget_id).cloned()
    }

    pub fn is_bound(&self, widget_id: WidgetId) -> bool {
        self.bindings.lock().contains_key(&widget_id)
    }

    pub fn bound_count(&self) -> usize {
        self.bindings.lock().len()
    }
}

// Only drops the entry when it belongs to a completed request, so a newer
// binding for the same widget survives
fn release_finished(bindings: &Bindings, id: WidgetId) {
    let mut bindings = bindings.lock();
    if bindings.get(&id).is_some_and(FetchHandle::is_finished) {
        bindings.remove(&id);
    }
}
