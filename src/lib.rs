pub mod binding;
pub mod cache;
pub mod config;
pub mod images;

pub use binding::{BindOptions, BindingAdapter, ImageSlot, ImageWidget, WidgetId};
pub use cache::ImageCache;
pub use config::FetcherConfig;
pub use images::{
    FetchHandle, ImageFetchError, ImageFetcher, ImageTransport, RemoteImage, ReqwestTransport,
    TransportResponse,
};
