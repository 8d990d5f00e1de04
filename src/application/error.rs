use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    application::{detail::DetailError, sitemap::SitemapError},
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Error rendered as `{"error": <public message>}`; the detailed report rides
/// along in the response extensions for the logging middleware.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: String,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.public_message }));
        let mut response = (self.status, body).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<DetailError> for HttpError {
    fn from(error: DetailError) -> Self {
        const SOURCE: &str = "infra::http::detail_error_to_http_error";
        match &error {
            DetailError::Domain(DomainError::NotFound { .. })
            | DetailError::Domain(DomainError::SlugMismatch { .. }) => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            DetailError::Domain(DomainError::Validation { .. }) => {
                HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid request", &error)
            }
            DetailError::Backend(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_GATEWAY,
                "Upstream service unavailable",
                &error,
            ),
        }
    }
}

impl From<SitemapError> for HttpError {
    fn from(error: SitemapError) -> Self {
        HttpError::from_error(
            "infra::http::sitemap_error_to_http_error",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate sitemap",
            &error,
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Sitemap(#[from] SitemapError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. })
            | AppError::Domain(DomainError::SlugMismatch { .. })
            | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Infra(InfraError::HttpClient { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Infra(_) | AppError::Sitemap(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(DomainError::NotFound { .. })
            | AppError::Domain(DomainError::SlugMismatch { .. })
            | AppError::NotFound => "Resource not found",
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                "Request could not be processed"
            }
            AppError::Infra(InfraError::HttpClient { .. }) => "Upstream service unavailable",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Sitemap(_) => "Failed to generate sitemap",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(json!({ "error": message }))).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ListingKind;

    #[test]
    fn slug_mismatch_is_a_404_with_the_chain_reported() {
        let error = HttpError::from(DetailError::Domain(DomainError::SlugMismatch {
            requested: "old".into(),
            canonical: "new".into(),
        }));
        assert_eq!(error.status(), StatusCode::NOT_FOUND);

        let response = error.into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert!(report.messages[0].contains("`old`"));
    }

    #[test]
    fn app_errors_map_to_statuses() {
        let missing = AppError::from(DomainError::not_found(ListingKind::Jobs, 4));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        let invalid = AppError::validation("bad");
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(InfraError::http_client("down")).presentation_message(),
            "Upstream service unavailable"
        );
    }
}
