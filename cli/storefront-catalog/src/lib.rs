//! HTTP client and catalog query pipeline for the storefront REST API.
//!
//! This crate provides:
//! - HTTP client construction with read-before-send bearer token authentication
//!   and a single refresh-and-retry on `401`
//! - Translation of a [`FilterState`] into a catalog query
//! - Layered product fetching (direct listing, service call, fallback samples)
//! - Normalization of the API's varying response shapes into one canonical
//!   [`Product`] model
//! - Facet metadata fetching with independent fallbacks
//! - A view-state machine that discards out-of-order responses
//! - Mock server infrastructure for recording and replaying API interactions
//!
//! ## Usage
//!
//! ```ignore
//! use storefront_catalog::{CatalogClient, CatalogClientConfig, CatalogSession, FilterState};
//!
//! let config = CatalogClientConfig::new("https://shop.example.com/api/");
//! let client = CatalogClient::new(config, token_store)?;
//!
//! let mut session = CatalogSession::new(client, FilterState::for_category("mobiles"));
//! let state = session.mount().await;
//! ```

mod auth;
mod client;
mod config;
mod error;
mod facets;
mod fallback;
mod fetch;
mod mock;
#[cfg(any(test, feature = "tests"))]
mod mock_client;
mod normalize;
mod query;
mod session;
mod types;
mod vendor;

pub use auth::{
    FileTokenStore,
    MemoryTokenStore,
    SharedTokenStore,
    TokenStore,
    TokenStoreError,
    Tokens,
};
pub use client::{CatalogClient, ClientTrait, StreamItem};
pub use config::{CatalogClientConfig, CatalogMockMode};
pub use error::{CatalogClientError, FetchError};
pub use facets::{fetch_facets, Facets, DEFAULT_COLORS, DEFAULT_PRICE_RANGE};
pub use fallback::sample_products;
pub use fetch::fetch_products;
pub use normalize::ProductList;
pub use query::{display_price, CatalogQuery, Endpoint, FilterState, FilterTag, SortKey, PAGE_SIZE};
pub use session::{CatalogSession, RequestSequencer, RequestTicket, ViewState};
pub use types::*;
pub use vendor::{VendorProfile, VendorStatus};

#[cfg(any(test, feature = "tests"))]
pub use client::EMPTY_PRODUCTS_RESPONSE;
#[cfg(any(test, feature = "tests"))]
pub use mock_client::{MockClient, MockResponses, MockResult};
