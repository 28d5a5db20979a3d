use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app_config::AppConfig;
use crate::errors::UpstreamError;
use crate::models::{SlideImage, SlideRecord};

// One search phrase per slide topic, in deck order
pub const SLIDE_PHRASES: [&str; 13] = [
    "minimalist yoga aesthetic modern",
    "yoga alignment professional detailed",
    "breathing meditation peaceful serene",
    "yoga flexibility artistic beautiful",
    "mental wellness meditation calm",
    "beginner yoga gentle supportive",
    "advanced yoga challenging achievement",
    "yoga safety careful mindful",
    "daily routine morning yoga fresh",
    "yoga teaching instructor guidance",
    "spiritual yoga philosophy deep",
    "modern yoga lifestyle balanced",
    "yoga celebration achievement success",
];

// Used when no search result is available
pub const CURATED_IMAGES: [&str; 13] = [
    "https://images.unsplash.com/photo-1544367567-0f2fcb009e0b?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1506126613408-eca07ce68773?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1575052814086-f385e2e2ad1b?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1518611012118-696072aa579a?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1545389336-cf090694435e?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1599901854545-de86350faf80?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1549576490-b0b4831ef60a?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1599447292183-5dc08a0a9763?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1500462918059-b1a0cb512f1d?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1575052814086-f385e2e2ad1b?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1518611012118-696072aa579a?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1545389336-cf090694435e?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
    "https://images.unsplash.com/photo-1599901854545-de86350faf80?ixlib=rb-4.0.3&w=800&fit=crop&q=80",
];

const RESULTS_PER_PAGE: u32 = 15;

pub fn phrase_for_slide(index: usize) -> &'static str {
    SLIDE_PHRASES[index % SLIDE_PHRASES.len()]
}

pub fn curated_image(index: usize) -> SlideImage {
    SlideImage {
        url: CURATED_IMAGES[index % CURATED_IMAGES.len()].to_string(),
        alt: format!("Professional yoga - {}", phrase_for_slide(index)),
        photographer: "Wellness Photography Collective".to_string(),
        source: "curated".to_string(),
    }
}

/// Finds a photograph for one slide of a deck.
#[async_trait]
pub trait ImageSearcher: Send + Sync {
    /// `Ok(None)` means the search had nothing to offer; callers substitute
    /// a curated image. `Err` drops the image altogether.
    async fn search(&self, query: &str, slide_index: usize) -> Result<Option<SlideImage>, UpstreamError>;
}

/// Downloads image bytes for embedding into an exported deck.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchPhoto>,
}

#[derive(Debug, Deserialize)]
struct SearchPhoto {
    urls: PhotoUrls,
    alt_description: Option<String>,
    user: PhotoUser,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct PhotoUser {
    name: String,
}

/// Photo search against the Unsplash search API.
pub struct UnsplashSearcher {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl UnsplashSearcher {
    pub fn new(config: &AppConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(config.image_timeout()).build()?;

        Ok(Self {
            client,
            url: config.image_search_url.clone(),
            api_key: config.unsplash_api_key.clone(),
        })
    }
}

#[async_trait]
impl ImageSearcher for UnsplashSearcher {
    async fn search(&self, query: &str, slide_index: usize) -> Result<Option<SlideImage>, UpstreamError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(None);
        };

        let full_query = format!("{} wellness minimalist professional", query);
        let per_page = RESULTS_PER_PAGE.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("query", full_query.as_str()),
                ("client_id", api_key),
                ("per_page", per_page.as_str()),
                ("orientation", "landscape"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("Photo search returned {} for slide {}", response.status(), slide_index);
            return Ok(None);
        }

        let body = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        if body.results.is_empty() {
            return Ok(None);
        }

        let count = body.results.len();
        let Some(photo) = body.results.into_iter().nth(slide_index % count) else {
            return Ok(None);
        };
        Ok(Some(SlideImage {
            url: photo.urls.regular,
            alt: photo
                .alt_description
                .filter(|alt| !alt.is_empty())
                .unwrap_or_else(|| format!("Professional {}", query)),
            photographer: photo.user.name,
            source: "unsplash".to_string(),
        }))
    }
}

pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(config.image_timeout()).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                service: "image host",
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Look up the image for one slide, degrading to the curated list or to none.
pub async fn image_for_slide(searcher: &dyn ImageSearcher, slide_index: usize) -> Option<SlideImage> {
    let phrase = phrase_for_slide(slide_index);
    match searcher.search(phrase, slide_index).await {
        Ok(Some(image)) => Some(image),
        Ok(None) => Some(curated_image(slide_index)),
        Err(e) => {
            warn!("Image lookup failed for slide {}: {}", slide_index + 1, e);
            None
        }
    }
}

/// Attach an image to every slide; lookups run concurrently.
pub async fn attach_images(searcher: Arc<dyn ImageSearcher>, slides: Vec<SlideRecord>) -> Vec<SlideRecord> {
    let lookups = (0..slides.len()).map(|index| {
        let searcher = searcher.clone();
        async move { image_for_slide(searcher.as_ref(), index).await }
    });
    let images = join_all(lookups).await;

    slides
        .into_iter()
        .zip(images)
        .map(|(slide, image)| slide.with_image(image))
        .collect()
}

/// Download the image of every slide that has one; failures yield `None`.
pub async fn download_images(fetcher: Arc<dyn ImageFetcher>, slides: &[SlideRecord]) -> Vec<Option<Vec<u8>>> {
    let downloads = slides.iter().enumerate().map(|(index, slide)| {
        let fetcher = fetcher.clone();
        let url = slide.image.as_ref().map(|image| image.url.clone());
        async move {
            let url = url?;
            match fetcher.fetch(&url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Slide {} image download failed: {}", index + 1, e);
                    None
                }
            }
        }
    });
    join_all(downloads).await
}
