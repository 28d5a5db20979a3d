use actix_cors::Cors;
use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, ContentType, DispositionParam, DispositionType};
use actix_web::http::Method;
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use tracing::{error, info};

use crate::app_config::AppConfig;
use crate::deck_theme::ThemeSelector;
use crate::errors::{DeckError, DeckResult, UpstreamError};
use crate::image_handler::{attach_images, download_images, HttpImageFetcher, ImageFetcher, ImageSearcher, UnsplashSearcher};
use crate::llm_handler::{ContentProvider, OpenRouterGenerator};
use crate::models::{
    AsanaCatalogResponse, DownloadRequest, GenerateRequest, HealthResponse, Presentation, YOGA_ASANAS,
};
use crate::pptx_writer::{CoverInfo, DeckWriter, PPTX_MIME};

// Define the application state shared by all handlers
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub provider: ContentProvider,
    pub images: Arc<dyn ImageSearcher>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub theme: ThemeSelector,
}

impl AppState {
    /// State wired to the real text-generation and photo services.
    pub fn from_config(config: AppConfig) -> Result<Self, UpstreamError> {
        let generator = Arc::new(OpenRouterGenerator::new(&config)?);
        let images = Arc::new(UnsplashSearcher::new(&config)?);
        let fetcher = Arc::new(HttpImageFetcher::new(&config)?);
        let theme = ThemeSelector::new(config.theme_seed);
        let config = Arc::new(config);

        Ok(Self {
            provider: ContentProvider::new(generator, config.clone()),
            config,
            images,
            fetcher,
            theme,
        })
    }
}

/// Cross-origin policy for the browser front end: any origin, method and header.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

/// Register every route, plus the JSON extractor settings.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(index_handler))
        .route("/asanas", web::get().to(asanas_handler))
        .route("/generate", web::post().to(generate_handler))
        .route("/generate", web::method(Method::OPTIONS).to(options_handler))
        .route("/download-pptx", web::post().to(download_pptx_handler))
        .route("/health", web::get().to(health_handler));
}

// Malformed bodies get the same error shape as every other 400
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(4 * 1024 * 1024)
        .error_handler(|err, _req| DeckError::InvalidRequest(format!("Invalid request body: {}", err)).into())
}

// Index handler to serve the frontend
pub async fn index_handler(data: web::Data<AppState>) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open_async(data.config.static_dir.join("index.html")).await?)
}

pub async fn asanas_handler() -> impl Responder {
    HttpResponse::Ok().json(AsanaCatalogResponse {
        asanas: YOGA_ASANAS.to_vec(),
        total: YOGA_ASANAS.len(),
        message: "Premium comprehensive yoga presentations",
    })
}

pub async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "comprehensive! 🎨",
        message: "Enhanced Yoga Generator Running!",
        features: vec![
            "5-6 Detailed Bullet Points Per Slide",
            "Enhanced Canva Styling & Typography",
            "Professional Image Placement",
            "Comprehensive Content Coverage",
            "Geometric Design Elements",
        ],
    })
}

pub async fn options_handler() -> impl Responder {
    HttpResponse::Ok().finish()
}

pub async fn generate_handler(data: web::Data<AppState>, req: web::Json<GenerateRequest>) -> DeckResult<HttpResponse> {
    let req = req.into_inner();
    let Some(asana) = req.asanas.first() else {
        return Err(DeckError::InvalidRequest("Please select one asana".to_string()));
    };
    let student_name = req.student_name.as_deref().unwrap_or_default().trim();

    info!(
        "Generating presentation for {} (images: {}, extra poses ignored: {})",
        asana,
        req.include_images,
        req.asanas.len() - 1
    );

    let mut records = data.provider.provide(asana, student_name).await;
    if req.include_images {
        records = attach_images(data.images.clone(), records).await;
    }

    let mut presentation = Presentation::new(asana, student_name);
    presentation.push_records(records, data.config.slide_rules.char_budget);

    let body = serde_json::to_vec(&presentation).map_err(|e| DeckError::Generation(e.to_string()))?;

    info!("Presentation {} ready with {} slides", presentation.id, presentation.slides.len());
    Ok(HttpResponse::Ok().content_type(ContentType::json()).body(body))
}

pub async fn download_pptx_handler(data: web::Data<AppState>, req: web::Json<DownloadRequest>) -> DeckResult<HttpResponse> {
    let Some(presentation) = req.into_inner().presentation.filter(|p| !p.is_empty()) else {
        return Err(DeckError::InvalidRequest("No presentation data".to_string()));
    };
    let asana = presentation
        .asanas
        .first()
        .cloned()
        .ok_or_else(|| DeckError::Render("presentation lists no asana".to_string()))?;

    let rules = &data.config.slide_rules;
    let records = presentation.records(rules);
    let images = download_images(data.fetcher.clone(), &records).await;

    let palette = data.theme.pick();
    let display_title_len = rules.display_title_len;
    let cover = CoverInfo {
        asana,
        student_name: presentation.student_name.clone(),
    };
    info!(
        "Exporting presentation {} ({} slides, palette {})",
        presentation.id,
        records.len(),
        palette.name
    );

    let bytes = web::block(move || DeckWriter::new(palette, display_title_len).write(&cover, &records, &images))
        .await
        .map_err(|e| DeckError::Render(e.to_string()))?
        .inspect_err(|e| error!("Deck rendering failed: {}", e))?;

    Ok(HttpResponse::Ok()
        .content_type(PPTX_MIME)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(presentation.file_name())],
        })
        .body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_handler::TextGenerator;
    use crate::models::SlideImage;
    use actix_web::http::header;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::io::Cursor;
    use tempfile::TempDir;

    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    struct OfflineGenerator;

    #[async_trait]
    impl TextGenerator for OfflineGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
            Err(UpstreamError::MissingCredential("OPENROUTER_API_KEY"))
        }
    }

    struct StubSearcher;

    #[async_trait]
    impl ImageSearcher for StubSearcher {
        async fn search(&self, query: &str, slide_index: usize) -> Result<Option<SlideImage>, UpstreamError> {
            if slide_index == 0 {
                Ok(Some(SlideImage {
                    url: "https://img.test/0".to_string(),
                    alt: query.to_string(),
                    photographer: "Ana Lens".to_string(),
                    source: "unsplash".to_string(),
                }))
            } else {
                Ok(None)
            }
        }
    }

    struct PngFetcher;

    #[async_trait]
    impl ImageFetcher for PngFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, UpstreamError> {
            Ok(PNG_BYTES.to_vec())
        }
    }

    fn test_state(static_dir: Option<&std::path::Path>) -> web::Data<AppState> {
        let mut config = AppConfig::default();
        if let Some(dir) = static_dir {
            config.static_dir = dir.to_path_buf();
        }
        let config = Arc::new(config);

        web::Data::new(AppState {
            provider: ContentProvider::new(Arc::new(OfflineGenerator), config.clone()),
            config,
            images: Arc::new(StubSearcher),
            fetcher: Arc::new(PngFetcher),
            theme: ThemeSelector::seeded(1),
        })
    }

    #[actix_web::test]
    async fn test_generate_rejects_empty_selection() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .set_json(json!({"asanas": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Please select one asana");
    }

    #[actix_web::test]
    async fn test_generate_malformed_body_is_bad_request() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .insert_header(ContentType::json())
            .set_payload("{\"asanas\": [")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
    }

    #[actix_web::test]
    async fn test_generate_returns_thirteen_slides() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .set_json(json!({"asanas": ["Tadasana", "Padmasana"], "student_name": "  Mira Sen "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["asanas"], json!(["Tadasana"]));
        assert_eq!(body["student_name"], "Mira Sen");
        assert_eq!(body["title"], "Tadasana - Comprehensive Yoga Guide");

        let slides = body["slides"].as_array().unwrap();
        assert_eq!(slides.len(), 13);
        assert_eq!(slides[0]["title"], "Slide 1");
        assert!(slides[0]["content"].as_str().unwrap().starts_with("MASTERING TADASANA"));
        assert_eq!(slides[0]["image"]["source"], "unsplash");
        assert_eq!(slides[5]["image"]["source"], "curated");
        for slide in slides {
            assert!(slide["content"].as_str().unwrap().chars().count() <= 500);
        }

        let id = body["id"].as_u64().unwrap();
        assert!((1000..=9999).contains(&id));
    }

    #[actix_web::test]
    async fn test_generate_without_images() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .set_json(json!({"asanas": ["Shavasana"], "include_images": false}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert!(body["slides"].as_array().unwrap().iter().all(|s| s["image"].is_null()));
    }

    #[actix_web::test]
    async fn test_download_requires_presentation() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/download-pptx")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "No presentation data");
    }

    #[actix_web::test]
    async fn test_download_treats_empty_presentation_as_missing() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/download-pptx")
            .set_json(json!({"presentation": {}}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "No presentation data");
    }

    #[actix_web::test]
    async fn test_generated_presentation_exports_as_pptx() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .set_json(json!({"asanas": ["Setu Bandhasana"], "student_name": "Mira Sen"}))
            .to_request();
        let presentation: Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/download-pptx")
            .set_json(json!({"presentation": presentation}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let headers = resp.headers();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), PPTX_MIME);
        let disposition = headers.get(header::CONTENT_DISPOSITION).unwrap().to_str().unwrap();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("comprehensive_yoga_setu_bandhasana_mira_sen.pptx"));

        let bytes = test::read_body(resp).await;
        let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let slides = archive
            .file_names()
            .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
            .count();
        assert_eq!(slides, 14);
        assert!(archive.file_names().any(|name| name.starts_with("ppt/media/image")));
    }

    #[actix_web::test]
    async fn test_asanas_and_health() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::get().uri("/asanas").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 19);
        assert_eq!(body["asanas"][0], "Tadasana");

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["features"].as_array().unwrap().len(), 5);
    }

    #[actix_web::test]
    async fn test_options_generate_is_empty_ok() {
        let app = test::init_service(App::new().app_data(test_state(None)).configure(configure)).await;

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/generate")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(test::read_body(resp).await.is_empty());
    }

    #[actix_web::test]
    async fn test_cross_origin_preflight_and_simple_requests() {
        let app = test::init_service(
            App::new()
                .wrap(cors())
                .app_data(test_state(None))
                .configure(configure),
        )
        .await;
        let origin = "http://localhost:3000";

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/generate")
            .insert_header((header::ORIGIN, origin))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let req = test::TestRequest::get()
            .uri("/asanas")
            .insert_header((header::ORIGIN, origin))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let req = test::TestRequest::post()
            .uri("/generate")
            .insert_header((header::ORIGIN, origin))
            .set_json(json!({"asanas": ["Tadasana"], "include_images": false}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[actix_web::test]
    async fn test_index_serves_static_page() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("index.html"), "<h1>decks</h1>").unwrap();
        let app = test::init_service(App::new().app_data(test_state(Some(temp_dir.path()))).configure(configure)).await;

        let req = test::TestRequest::get().uri("/").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "<h1>decks</h1>");
    }
}
