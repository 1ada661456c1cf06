//! View state of a catalog page.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::client::ClientTrait;
use crate::error::{CatalogClientError, FetchError};
use crate::facets::DEFAULT_PRICE_RANGE;
use crate::fetch::fetch_products;
use crate::query::{CatalogQuery, FilterState, PAGE_SIZE};
use crate::types::{PriceRange, ProductsPage};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum ViewState {
    Loading,
    /// A category page for which no request succeeded.
    Error(String),
    Ready(ProductsPage),
}

impl ViewState {
    pub fn page(&self) -> Option<&ProductsPage> {
        match self {
            ViewState::Ready(page) => Some(page),
            _ => None,
        }
    }
}

/// Identifies a request issued by a [RequestSequencer].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

/// Hands out increasing request numbers.
///
/// Only the completion of the most recently issued request may change
/// the view, older responses that arrive late are discarded.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn issue(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

/// A catalog page: the user's filters, and what is shown for them.
///
/// Every trigger (mount, filter change, page change, retry) moves the view
/// to [ViewState::Loading] and issues a new request. Callers that run
/// requests concurrently use [CatalogSession::begin] and
/// [CatalogSession::complete] directly.
#[derive(Debug)]
pub struct CatalogSession<C> {
    client: C,
    filters: FilterState,
    price_defaults: PriceRange,
    page_size: u64,
    sequencer: RequestSequencer,
    state: ViewState,
}

impl<C: ClientTrait> CatalogSession<C> {
    pub fn new(client: C, filters: FilterState) -> Self {
        Self {
            client,
            filters,
            price_defaults: DEFAULT_PRICE_RANGE,
            page_size: PAGE_SIZE,
            sequencer: RequestSequencer::default(),
            state: ViewState::Loading,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Set the price bounds of the active category.
    ///
    /// Price filters equal to these bounds are not sent.
    pub fn set_price_defaults(&mut self, range: PriceRange) {
        self.price_defaults = range;
    }

    /// The query for the current filters.
    pub fn query(&self) -> CatalogQuery {
        CatalogQuery::build(&self.filters, &self.price_defaults).with_page_size(self.page_size)
    }

    /// Enter the loading state and issue a request for the current filters.
    pub fn begin(&mut self) -> (RequestTicket, CatalogQuery) {
        self.state = ViewState::Loading;
        let ticket = self.sequencer.issue();
        debug!(?ticket, "issued catalog request");
        (ticket, self.query())
    }

    /// Apply the result of the request identified by `ticket`.
    ///
    /// Returns `false` and leaves the view untouched if a newer request
    /// has been issued in the meantime.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        result: Result<ProductsPage, FetchError>,
    ) -> bool {
        if !self.sequencer.is_current(ticket) {
            debug!(?ticket, "discarding stale catalog response");
            return false;
        }
        self.state = match result {
            Ok(page) => ViewState::Ready(page),
            Err(e) => {
                warn!(error = %e, "catalog request failed");
                ViewState::Error(e.to_string())
            },
        };
        true
    }

    async fn load(&mut self) -> &ViewState {
        let (ticket, query) = self.begin();
        let result = fetch_products(&self.client, &query).await;
        self.complete(ticket, result);
        &self.state
    }

    pub async fn mount(&mut self) -> &ViewState {
        self.load().await
    }

    /// Modify the filters and go back to the first page.
    pub async fn change_filters(&mut self, f: impl FnOnce(&mut FilterState)) -> &ViewState {
        f(&mut self.filters);
        self.filters.reset_page();
        self.load().await
    }

    pub async fn set_page(&mut self, page: NonZeroU32) -> &ViewState {
        self.filters.page = page;
        self.load().await
    }

    pub async fn retry(&mut self) -> &ViewState {
        self.load().await
    }

    /// Search for the suggested term of the current page.
    ///
    /// Returns [None] if there is no suggestion to accept.
    pub async fn accept_suggestion(&mut self) -> Option<&ViewState> {
        let suggestion = self.state.page()?.did_you_mean.clone()?;
        debug!(%suggestion, "accepting search suggestion");
        Some(
            self.change_filters(|filters| filters.set_search(suggestion))
                .await,
        )
    }

    /// Flip the featured flag of a product on the current page.
    ///
    /// The page is updated before the API call and reverted if it fails.
    #[instrument(skip(self))]
    pub async fn toggle_featured(&mut self, product_id: u64) -> Result<bool, CatalogClientError> {
        let featured = {
            let product = self.product_mut(product_id)?;
            product.is_featured = !product.is_featured;
            product.is_featured
        };

        if let Err(e) = self.client.set_featured(product_id, featured).await {
            warn!(error = %e, "reverting featured flag");
            if let Ok(product) = self.product_mut(product_id) {
                product.is_featured = !featured;
            }
            return Err(e);
        }
        Ok(featured)
    }

    fn product_mut(
        &mut self,
        product_id: u64,
    ) -> Result<&mut crate::types::Product, CatalogClientError> {
        let ViewState::Ready(page) = &mut self.state else {
            return Err(CatalogClientError::Other(
                "no products are loaded".to_string(),
            ));
        };
        page.products
            .iter_mut()
            .find(|product| product.id == product_id)
            .ok_or_else(|| {
                CatalogClientError::Other(format!("product {product_id} is not on this page"))
            })
    }

    /// Report that `product_id` was opened from the current search results.
    ///
    /// Nothing is reported outside of a search, failures are only logged.
    #[instrument(skip(self))]
    pub async fn record_click(&self, product_id: u64) {
        let Some(search_id) = self
            .state
            .page()
            .and_then(|page| page.search_id.as_deref())
        else {
            debug!("no search session to report the click to");
            return;
        };
        if let Err(e) = self.client.record_search_click(search_id, product_id).await {
            warn!(error = %e, "failed to record search click");
        }
    }
}
