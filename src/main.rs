use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use tokio::sync::mpsc;

use remote_image::{
    BindOptions, BindingAdapter, FetcherConfig, ImageFetcher, ImageSlot, ImageWidget,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let urls: Vec<String> = env::args().skip(1).collect();
    if urls.is_empty() {
        eprintln!("usage: remote-image <url>...");
        return ExitCode::FAILURE;
    }

    // Load config
    let config_path = env::var("REMOTE_IMAGE_CONFIG").unwrap_or_else(|_| "App.toml".to_string());
    let config = match FetcherConfig::load(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Configuration loaded successfully");

    let fetcher = match ImageFetcher::from_config(&config) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create image fetcher: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Image cache initialized (capacity {}, display scale {})",
        fetcher.cache().capacity(),
        fetcher.display_scale()
    );

    let adapter: BindingAdapter<ImageSlot> = BindingAdapter::new(fetcher.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let slots: Vec<Arc<ImageSlot>> = urls.iter().map(|_| Arc::new(ImageSlot::new())).collect();
    for (slot, url) in slots.iter().zip(&urls) {
        let done = tx.clone();
        let failed = tx.clone();
        let url_for_error = url.clone();
        let options = BindOptions::default()
            .on_success(move |slot: &ImageSlot, image| {
                slot.set_image(image);
                let _ = done.send(slot.widget_id());
            })
            .on_failure(move |slot: &ImageSlot, e| {
                error!("Failed to fetch {}: {}", url_for_error, e);
                let _ = failed.send(slot.widget_id());
            });
        adapter.bind(slot, url, options);
    }
    drop(tx);

    for _ in 0..slots.len() {
        if rx.recv().await.is_none() {
            break;
        }
    }

    let mut failures = 0;
    for (slot, url) in slots.iter().zip(&urls) {
        match slot.image() {
            Some(image) => {
                let (width, height) = image.point_size();
                println!(
                    "{}\t{}x{} px\t{}x{} pt\t{}",
                    url,
                    image.width(),
                    image.height(),
                    width,
                    height,
                    image.content_type()
                );
            }
            None => {
                println!("{}\tfailed", url);
                failures += 1;
            }
        }
    }

    // Repeats are served from memory
    for url in &urls {
        if fetcher.cache().contains(url) && fetcher.fetch_async(url).await.is_ok() {
            info!("Served {} from cache", url);
        }
    }

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
