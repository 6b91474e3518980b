use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use futures::future::{AbortHandle, Abortable};
use log::{debug, info};
use parking_lot::RwLock;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::cache::ImageCache;
use crate::config::FetcherConfig;
use crate::images::decode::image_from_response;
use crate::images::transport::{ImageTransport, ReqwestTransport};
use crate::images::{sanitize_scale, ImageFetchError, RemoteImage};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const DROPPED: u8 = 2;

/// Cancellable reference to an in-flight fetch.
///
/// Clones refer to the same request. Cancelling is best-effort: a callback
/// that is already running is not interrupted.
#[derive(Debug, Clone)]
pub struct FetchHandle {
    id: u64,
    url: Arc<str>,
    abort: AbortHandle,
    state: Arc<AtomicU8>,
}

impl FetchHandle {
    fn new(url: &str, abort: AbortHandle) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            url: Arc::from(url),
            abort,
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cancel(&self) {
        if !self.is_finished() {
            debug!("Cancelling image request {} for {}", self.id, self.url);
        }
        self.abort.abort();
    }

    /// True when a cancel reached the request before it produced a result.
    /// Cancelling a completed request is a no-op and leaves this false.
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted() && !self.is_completed()
    }

    /// Set once the request has produced a result or was dropped after a
    /// cancel.
    pub fn is_finished(&self) -> bool {
        self.state.load(Ordering::SeqCst) != PENDING
    }

    /// Set once the request produced a result and its callback was invoked.
    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == COMPLETED
    }

    fn mark(&self, state: u8) {
        // a completed request stays completed
        let _ = self
            .state
            .compare_exchange(PENDING, state, Ordering::SeqCst, Ordering::SeqCst);
    }
}

impl PartialEq for FetchHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FetchHandle {}

struct FetcherInner<T> {
    transport: T,
    cache: Arc<ImageCache>,
    display_scale: RwLock<f32>,
    runtime: Option<Handle>,
}

/// Fetches images through `T`, serving repeats from the shared cache.
///
/// Cheap to clone; clones share the transport, cache and display scale.
pub struct ImageFetcher<T: ImageTransport = ReqwestTransport> {
    inner: Arc<FetcherInner<T>>,
}

impl<T: ImageTransport> Clone for ImageFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl ImageFetcher<ReqwestTransport> {
    pub fn from_config(config: &FetcherConfig) -> Result<Self, ImageFetchError> {
        let transport = ReqwestTransport::from_config(config)?;
        let cache = Arc::new(ImageCache::new(config.cache_capacity));
        Ok(Self::new(transport, cache, config.display_scale))
    }
}

impl<T: ImageTransport> ImageFetcher<T> {
    /// Requests run on the Tokio runtime current at construction. Built off a
    /// runtime, they run on a shared background runtime instead.
    pub fn new(transport: T, cache: Arc<ImageCache>, display_scale: f32) -> Self {
        Self::build(transport, cache, display_scale, Handle::try_current().ok())
    }

    /// Runs every request on `runtime`.
    pub fn with_runtime(
        transport: T,
        cache: Arc<ImageCache>,
        display_scale: f32,
        runtime: Handle,
    ) -> Self {
        Self::build(transport, cache, display_scale, Some(runtime))
    }

    fn build(
        transport: T,
        cache: Arc<ImageCache>,
        display_scale: f32,
        runtime: Option<Handle>,
    ) -> Self {
        Self {
            inner: Arc::new(FetcherInner {
                transport,
                cache,
                display_scale: RwLock::new(sanitize_scale(display_scale)),
                runtime,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.inner.cache
    }

    pub fn display_scale(&self) -> f32 {
        *self.inner.display_scale.read()
    }

    /// Applies to images decoded from now on; cached images keep their scale.
    pub fn set_display_scale(&self, scale: f32) {
        *self.inner.display_scale.write() = sanitize_scale(scale);
    }

    /// Returns the image for `url`, from the cache or from the network.
    pub async fn fetch_async(
        &self,
        url: impl AsRef<str>,
    ) -> Result<Arc<RemoteImage>, ImageFetchError> {
        let url = url.as_ref();
        if let Some(image) = self.inner.cache.get_image(url) {
            return Ok(image);
        }
        self.download(url).await
    }

    /// Callback form of [`fetch_async`](Self::fetch_async).
    ///
    /// A cache hit calls `on_success` before returning and yields no handle.
    /// Otherwise the request runs on the fetcher's runtime, so this may be
    /// called from any thread. If no runtime can be started, `on_failure`
    /// gets a `RuntimeError` before this returns.
    pub fn fetch<U, S, F>(&self, url: U, on_success: S, on_failure: F) -> Option<FetchHandle>
    where
        U: AsRef<str>,
        S: FnOnce(Arc<RemoteImage>) + Send + 'static,
        F: FnOnce(ImageFetchError) + Send + 'static,
    {
        let url = url.as_ref();
        if let Some(image) = self.inner.cache.get_image(url) {
            on_success(image);
            return None;
        }

        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                on_failure(e);
                return None;
            }
        };

        let (abort, registration) = AbortHandle::new_pair();
        let handle = FetchHandle::new(url, abort);

        let fetcher = self.clone();
        let task_handle = handle.clone();
        let request = Abortable::new(
            async move {
                let result = fetcher.download(task_handle.url()).await;
                task_handle.mark(COMPLETED);
                match result {
                    Ok(image) => on_success(image),
                    Err(e) => on_failure(e),
                }
            },
            registration,
        );

        let task_handle = handle.clone();
        runtime.spawn(async move {
            if request.await.is_err() {
                task_handle.mark(DROPPED);
                debug!(
                    "Image request {} for {} was cancelled",
                    task_handle.id(),
                    task_handle.url()
                );
            }
        });

        Some(handle)
    }

    /// `fetch` with failures ignored.
    pub fn fetch_then<U, S>(&self, url: U, on_success: S) -> Option<FetchHandle>
    where
        U: AsRef<str>,
        S: FnOnce(Arc<RemoteImage>) + Send + 'static,
    {
        self.fetch(url, on_success, |_| {})
    }

    async fn download(&self, url: &str) -> Result<Arc<RemoteImage>, ImageFetchError> {
        let response = self.inner.transport.get(url).await?;
        let image = Arc::new(image_from_response(response, self.display_scale())?);

        info!(
            "Fetched image {} ({}x{}, {})",
            url,
            image.width(),
            image.height(),
            image.content_type()
        );
        self.inner.cache.store_image(url, image.clone());
        Ok(image)
    }

    fn runtime(&self) -> Result<Handle, ImageFetchError> {
        if let Some(runtime) = &self.inner.runtime {
            return Ok(runtime.clone());
        }
        if let Ok(runtime) = Handle::try_current() {
            return Ok(runtime);
        }
        background_runtime()
    }
}

// Shared by fetchers that were built outside any Tokio runtime
fn background_runtime() -> Result<Handle, ImageFetchError> {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();

    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime.handle().clone());
    }

    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("remote-image")
        .enable_all()
        .build()
        .map_err(|e| ImageFetchError::RuntimeError(format!("Failed to start runtime: {}", e)))?;
    info!("Started background runtime for image requests");

    Ok(RUNTIME.get_or_init(|| runtime).handle().clone())
}
