//! Error handling for catalog API operations.

use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::TokenStoreError;

/// Common error type for catalog API operations.
///
/// Covers the three failure classes of the API: the request never completed
/// (transport), the server answered with a non-2xx status, or the body could
/// not be interpreted (shape).
#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error("could not reach the storefront API")]
    Transport(#[source] reqwest::Error),
    #[error("{}", fmt_status(*.status, .detail.as_deref()))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },
    #[error("not logged in or session expired")]
    Unauthorized,
    #[error("unexpected response from the storefront API: {0}")]
    Shape(String),
    #[error("invalid API url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
    #[error("{}", .0)]
    Other(String),
}

impl CatalogClientError {
    /// The HTTP status carried by this error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CatalogClientError::Status { status, .. } => Some(*status),
            CatalogClientError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }
}

/// Body of the error responses returned by the API.
///
/// Django REST framework answers most failures with `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Convert a non-2xx response into a [CatalogClientError::Status].
///
/// The body is only kept if it is the well-known `detail` object,
/// other bodies may contain HTML garbage and are dropped.
pub(crate) async fn error_from_response(resp: reqwest::Response) -> CatalogClientError {
    let status = resp.status();
    let detail = match resp.bytes().await {
        Ok(body) => serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .map(|body| body.detail),
        Err(_) => None,
    };
    CatalogClientError::Status { status, detail }
}

fn fmt_status(status: StatusCode, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("{status}: {detail}"),
        None => format!("{status}"),
    }
}

/// Error returned when no products could be produced for a query.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Both the direct and the service request failed for a category page.
    ///
    /// Sample products are never substituted for a category,
    /// so there is nothing to show.
    #[error("could not load products for category '{category}'")]
    Exhausted {
        category: String,
        #[source]
        source: CatalogClientError,
    },
}
