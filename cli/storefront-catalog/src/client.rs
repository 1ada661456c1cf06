//! HTTP client for the storefront REST API.

use std::fmt::Debug;
use std::future::Future;
use std::num::NonZeroU32;
use std::str::FromStr;

use async_stream::try_stream;
use futures::stream::Stream;
use reqwest::header::{self, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{bearer_header, SharedTokenStore};
use crate::config::CatalogClientConfig;
use crate::error::{error_from_response, CatalogClientError};
use crate::facets::default_filter_options;
use crate::mock::MockGuard;
use crate::normalize::{self, ProductList};
use crate::query::CatalogQuery;
use crate::types::*;
use crate::vendor::VendorProfile;

#[cfg(any(test, feature = "tests"))]
pub const EMPTY_PRODUCTS_RESPONSE: &str = r#"{"count": 0, "next": null, "previous": null, "results": []}"#;

const REFRESH_PATH: &str = "auth/token/refresh/";
const BRANDS_PATH: &str = "brands/";
const CATEGORIES_PATH: &str = "categories/";
const FILTER_OPTIONS_PATH: &str = "products/filter-options/";
const SEARCH_CLICK_PATH: &str = "products/search/click/";
const VENDOR_PROFILE_PATH: &str = "vendors/me/";

/// A client for the storefront REST API.
///
/// Handles:
/// - HTTP client configuration with timeouts
/// - Bearer token authentication, read from the token store before every request
/// - A single token refresh and retry when the API answers `401`
/// - Mock server recording/replay for testing
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    config: CatalogClientConfig,
    tokens: SharedTokenStore,

    _mock_guard: Option<MockGuard>,
}

impl Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("api_url", &self.config.api_url)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a new catalog client from configuration.
    pub fn new(
        config: CatalogClientConfig,
        tokens: SharedTokenStore,
    ) -> Result<Self, CatalogClientError> {
        // create a mock server if configured
        let mock_guard = MockGuard::new(&config);
        let effective_url = match mock_guard {
            Some(ref mock) => mock.url(),
            None => config.api_url.clone(),
        };

        let base_url = parse_base_url(&effective_url)?;
        let http = build_http_client(&config)?;

        Ok(Self {
            http,
            base_url,
            config,
            tokens,
            _mock_guard: mock_guard,
        })
    }

    /// Send a request and decode the JSON body.
    ///
    /// The access token is read right before sending. If the API answers
    /// `401`, the refresh token is exchanged once and the request retried.
    /// If the refresh fails as well, stored credentials are cleared.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, CatalogClientError> {
        let url = self.endpoint_url(path)?;
        let access_token = self.tokens.load()?.access_token;

        let resp = self
            .send_once(method.clone(), url.clone(), query, body, access_token.as_deref())
            .await?;

        let resp = if resp.status() == StatusCode::UNAUTHORIZED {
            debug!(%url, "request unauthorized, refreshing access token");
            let Some(new_token) = self.refresh_access_token().await? else {
                return Err(CatalogClientError::Unauthorized);
            };
            let retried = self
                .send_once(method, url, query, body, Some(&new_token))
                .await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                self.tokens.clear_credentials()?;
                return Err(CatalogClientError::Unauthorized);
            }
            retried
        } else {
            resp
        };

        decode_response(resp).await
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        query: &[(String, String)],
        body: Option<&Value>,
        access_token: Option<&str>,
    ) -> Result<reqwest::Response, CatalogClientError> {
        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(value) = access_token.and_then(bearer_header) {
            request = request.header(header::AUTHORIZATION, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(CatalogClientError::Transport)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns [None] and clears the stored credentials if there is no
    /// refresh token or the API rejects it.
    async fn refresh_access_token(&self) -> Result<Option<String>, CatalogClientError> {
        #[derive(Deserialize)]
        struct RefreshResponse {
            access: String,
        }

        let Some(refresh_token) = self.tokens.load()?.refresh_token else {
            debug!("no refresh token available");
            self.tokens.clear_credentials()?;
            return Ok(None);
        };

        let url = self.endpoint_url(REFRESH_PATH)?;
        let body = json!({ "refresh": refresh_token });
        let resp = self.send_once(Method::POST, url, &[], Some(&body), None).await?;

        let refreshed = match decode_response(resp).await {
            Ok(value) => serde_json::from_value::<RefreshResponse>(value).ok(),
            Err(e) => {
                debug!(error = %e, "token refresh rejected");
                None
            },
        };

        match refreshed {
            Some(RefreshResponse { access }) => {
                self.tokens.set_access_token(access.clone())?;
                debug!("refreshed access token");
                Ok(Some(access))
            },
            None => {
                warn!("could not refresh access token, logging out");
                self.tokens.clear_credentials()?;
                Ok(None)
            },
        }
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, CatalogClientError> {
        self.base_url
            .join(path)
            .map_err(|source| CatalogClientError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                source,
            })
    }

    /// Stream every product matching `query`, starting at its page.
    pub fn stream_products<'a>(
        &'a self,
        query: &'a CatalogQuery,
    ) -> impl Stream<Item = Result<StreamItem<Product>, CatalogClientError>> + 'a {
        make_depaging_stream(
            move |page| async move { self.products(&query.with_page(page)).await },
            query.page(),
            query.page_size(),
        )
    }
}

// ---------------------------------------------------------------------------
// Catalog trait
// ---------------------------------------------------------------------------

/// The catalog API interface.
///
/// This trait enables alternate implementations:
/// - **HTTP**: REST calls via [`CatalogClient`]
/// - **Mock** (tests): canned responses without HTTP via `MockClient`
#[allow(async_fn_in_trait)]
pub trait ClientTrait {
    /// Request `query` from the known-good listing endpoint.
    async fn products_direct(&self, query: &CatalogQuery)
        -> Result<ProductList, CatalogClientError>;

    /// Request `query` from the endpoint it was built for.
    async fn products(&self, query: &CatalogQuery) -> Result<ProductList, CatalogClientError>;

    /// Get brand, color, price and specification metadata for a category.
    async fn filter_options(
        &self,
        category: Option<&str>,
    ) -> Result<FilterOptions, CatalogClientError>;

    /// Get all categories with their product counts.
    async fn categories(&self) -> Result<Vec<Category>, CatalogClientError>;

    /// Get all brands.
    async fn brands(&self) -> Result<Vec<Brand>, CatalogClientError>;

    /// Report that a product was opened from a search result.
    async fn record_search_click(
        &self,
        search_id: &str,
        product_id: u64,
    ) -> Result<(), CatalogClientError>;

    /// Mark a product as featured or not.
    async fn set_featured(&self, product_id: u64, featured: bool)
        -> Result<(), CatalogClientError>;

    /// Get the profile of the logged in vendor.
    async fn vendor_profile(&self) -> Result<VendorProfile, CatalogClientError>;
}

impl ClientTrait for CatalogClient {
    #[instrument(skip_all, fields(endpoint = "products/", page = %query.page()))]
    async fn products_direct(
        &self,
        query: &CatalogQuery,
    ) -> Result<ProductList, CatalogClientError> {
        let params = query.direct_params();
        debug!(?params, "sending direct product request");
        let value = self
            .send(Method::GET, crate::query::Endpoint::Listing.path(), &params, None)
            .await?;
        let list = normalize::product_list(value)?;
        debug!(n_products = list.products.len(), count = ?list.count, "received products");
        Ok(list)
    }

    #[instrument(skip_all, fields(endpoint = %query.endpoint(), page = %query.page()))]
    async fn products(&self, query: &CatalogQuery) -> Result<ProductList, CatalogClientError> {
        let params = query.params();
        debug!(?params, "sending product request");
        let value = self
            .send(Method::GET, query.endpoint().path(), &params, None)
            .await?;
        let list = normalize::product_list(value)?;
        debug!(n_products = list.products.len(), count = ?list.count, "received products");
        Ok(list)
    }

    #[instrument(skip(self))]
    async fn filter_options(
        &self,
        category: Option<&str>,
    ) -> Result<FilterOptions, CatalogClientError> {
        let params = category
            .map(|slug| vec![("category_slug".to_string(), slug.to_string())])
            .unwrap_or_default();
        let value = self
            .send(Method::GET, FILTER_OPTIONS_PATH, &params, None)
            .await?;
        normalize::filter_options(value, &default_filter_options())
    }

    #[instrument(skip_all)]
    async fn categories(&self) -> Result<Vec<Category>, CatalogClientError> {
        let value = self.send(Method::GET, CATEGORIES_PATH, &[], None).await?;
        normalize::category_list(value)
    }

    #[instrument(skip_all)]
    async fn brands(&self) -> Result<Vec<Brand>, CatalogClientError> {
        let value = self.send(Method::GET, BRANDS_PATH, &[], None).await?;
        normalize::brand_list(value)
    }

    #[instrument(skip(self))]
    async fn record_search_click(
        &self,
        search_id: &str,
        product_id: u64,
    ) -> Result<(), CatalogClientError> {
        let body = json!({ "search_id": search_id, "product_id": product_id });
        self.send(Method::POST, SEARCH_CLICK_PATH, &[], Some(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_featured(
        &self,
        product_id: u64,
        featured: bool,
    ) -> Result<(), CatalogClientError> {
        let body = json!({ "is_featured": featured });
        self.send(
            Method::PATCH,
            &format!("products/{product_id}/"),
            &[],
            Some(&body),
        )
        .await?;
        debug!("updated featured flag");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn vendor_profile(&self) -> Result<VendorProfile, CatalogClientError> {
        let value = self.send(Method::GET, VENDOR_PROFILE_PATH, &[], None).await?;
        normalize::vendor_profile(value)
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Parse the API base URL, making sure relative paths join below it.
fn parse_base_url(url: &str) -> Result<Url, CatalogClientError> {
    let with_slash = if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    };
    Url::parse(&with_slash).map_err(|source| CatalogClientError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// Turn a response into JSON or the matching [CatalogClientError].
async fn decode_response(resp: reqwest::Response) -> Result<Value, CatalogClientError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(CatalogClientError::Unauthorized);
    }
    if !status.is_success() {
        return Err(error_from_response(resp).await);
    }
    let body = resp.bytes().await.map_err(CatalogClientError::Transport)?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&body)
        .map_err(|e| CatalogClientError::Shape(format!("response is not valid JSON: {e}")))
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem<T> {
    TotalCount(u64),
    Result(T),
}

impl<T> From<T> for StreamItem<T> {
    fn from(value: T) -> Self {
        Self::Result(value)
    }
}

/// Create a depaging stream from a page-fetching function.
///
/// Yields `TotalCount` once (if the API reports one) followed by all
/// products from `first_page` onwards. Stops after a page without a `next`
/// link, an empty page, or when the reported total has been reached.
/// The total counts the pages before `first_page` as full.
fn make_depaging_stream<Fut>(
    generator: impl Fn(NonZeroU32) -> Fut,
    first_page: NonZeroU32,
    page_size: u64,
) -> impl Stream<Item = Result<StreamItem<Product>, CatalogClientError>>
where
    Fut: Future<Output = Result<ProductList, CatalogClientError>>,
{
    try_stream! {
        let mut page = first_page;
        let mut total_count_yielded = false;
        let mut seen = u64::from(first_page.get() - 1).saturating_mul(page_size);

        loop {
            let list = generator(page).await?;

            if !total_count_yielded {
                if let Some(count) = list.count {
                    yield StreamItem::TotalCount(count);
                }
                total_count_yielded = true;
            }

            let items_on_page = list.products.len() as u64;
            seen += items_on_page;
            for product in list.products {
                yield StreamItem::Result(product)
            }

            if items_on_page == 0 || !list.has_next {
                break;
            }
            if list.count.is_some_and(|count| seen >= count) {
                break;
            }
            let Some(next) = page.checked_add(1) else {
                break;
            };
            page = next;
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP client builder
// ---------------------------------------------------------------------------

/// Build the HTTP client with default headers and timeouts.
///
/// Authorization is not part of the default headers, it is attached per
/// request from the token store.
fn build_http_client(config: &CatalogClientConfig) -> Result<reqwest::Client, CatalogClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );

    // Extra headers (device ids, CI markers etc.)
    for (key, value) in &config.extra_headers {
        headers.insert(
            header::HeaderName::from_str(key).map_err(
                |e: reqwest::header::InvalidHeaderName| CatalogClientError::Other(e.to_string()),
            )?,
            header::HeaderValue::from_str(value).map_err(
                |e: reqwest::header::InvalidHeaderValue| CatalogClientError::Other(e.to_string()),
            )?,
        );
    }

    debug!(
        api_url = %config.api_url,
        extra_headers = config.extra_headers.len(),
        "building catalog HTTP client"
    );

    let client_builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout);

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    client_builder
        .build()
        .map_err(|e| CatalogClientError::Other(e.to_string()))
}
