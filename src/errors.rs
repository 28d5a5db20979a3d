use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

/// Result alias used by the HTTP handlers and the deck writer
pub type DeckResult<T> = Result<T, DeckError>;

/// Errors that reach an endpoint boundary
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Failed to generate: {0}")]
    Generation(String),

    #[error("Download failed: {0}")]
    Render(String),

    #[error("Download failed: zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Download failed: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Failures of the external text-generation and photo-search services.
///
/// These never reach a client: callers log them and substitute fallback
/// content or drop the image.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{0} credential not configured")]
    MissingCredential(&'static str),

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("{0} returned an empty response")]
    Empty(&'static str),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

impl ResponseError for DeckError {
    fn status_code(&self) -> StatusCode {
        match self {
            DeckError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::new(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DeckError::InvalidRequest("Please select one asana".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DeckError::Render("bad slide".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_carry_endpoint_prefix() {
        assert_eq!(
            DeckError::Generation("boom".to_string()).to_string(),
            "Failed to generate: boom"
        );
        assert_eq!(
            DeckError::Render("boom".to_string()).to_string(),
            "Download failed: boom"
        );
        assert_eq!(
            DeckError::InvalidRequest("No presentation data".to_string()).to_string(),
            "No presentation data"
        );
    }

    #[actix_web::test]
    async fn test_generation_error_renders_json_body() {
        let resp = DeckError::Generation("encoder failed".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Failed to generate: encoder failed");
    }

    #[test]
    fn test_xml_failures_are_download_errors() {
        let err: DeckError = quick_xml::Error::UnexpectedEof("p:sld".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Download failed: XML error:"));
    }
}
