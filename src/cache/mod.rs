pub mod image;

pub use self::image::ImageCache;
