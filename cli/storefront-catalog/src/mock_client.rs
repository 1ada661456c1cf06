//! A [ClientTrait] implementation answering from canned responses.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use http::StatusCode;

use crate::client::ClientTrait;
use crate::error::CatalogClientError;
use crate::normalize::ProductList;
use crate::query::CatalogQuery;
use crate::types::{Brand, Category, FilterOptions};
use crate::vendor::VendorProfile;

/// A canned response: the value or the HTTP status to fail with.
pub type MockResult<T> = Result<T, u16>;

/// Queued responses of a [MockClient], one queue per operation.
#[derive(Debug, Default)]
pub struct MockResponses {
    pub direct: VecDeque<MockResult<ProductList>>,
    pub service: VecDeque<MockResult<ProductList>>,
    pub filter_options: VecDeque<MockResult<FilterOptions>>,
    pub categories: VecDeque<MockResult<Vec<Category>>>,
    pub brands: VecDeque<MockResult<Vec<Brand>>>,
    pub set_featured: VecDeque<MockResult<()>>,
    pub vendor_profile: VecDeque<MockResult<VendorProfile>>,
    /// Operations called so far, with the parameters they were called with.
    pub calls: Vec<(&'static str, Vec<(String, String)>)>,
}

/// A client answering from queues of canned responses.
///
/// An operation without a queued response fails with `503`.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    // A Mutex so responses can be queued through a shared reference
    pub responses: Arc<Mutex<MockResponses>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses through `f`.
    pub fn push(&self, f: impl FnOnce(&mut MockResponses)) {
        f(&mut self.responses.lock().expect("couldn't acquire mock lock"));
    }

    /// Names of the operations called so far.
    pub fn called(&self) -> Vec<&'static str> {
        self.responses
            .lock()
            .expect("couldn't acquire mock lock")
            .calls
            .iter()
            .map(|(name, _)| *name)
            .collect()
    }

    fn pop<T>(
        &self,
        name: &'static str,
        params: Vec<(String, String)>,
        queue: impl FnOnce(&mut MockResponses) -> &mut VecDeque<MockResult<T>>,
    ) -> Result<T, CatalogClientError> {
        let mut responses = self.responses.lock().expect("couldn't acquire mock lock");
        responses.calls.push((name, params));
        let next = queue(&mut responses).pop_front().unwrap_or(Err(503));
        next.map_err(|status| CatalogClientError::Status {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            detail: None,
        })
    }
}

impl ClientTrait for MockClient {
    async fn products_direct(
        &self,
        query: &CatalogQuery,
    ) -> Result<ProductList, CatalogClientError> {
        self.pop("products_direct", query.direct_params(), |r| &mut r.direct)
    }

    async fn products(&self, query: &CatalogQuery) -> Result<ProductList, CatalogClientError> {
        self.pop("products", query.params(), |r| &mut r.service)
    }

    async fn filter_options(
        &self,
        category: Option<&str>,
    ) -> Result<FilterOptions, CatalogClientError> {
        let params = category
            .map(|slug| vec![("category_slug".to_string(), slug.to_string())])
            .unwrap_or_default();
        self.pop("filter_options", params, |r| &mut r.filter_options)
    }

    async fn categories(&self) -> Result<Vec<Category>, CatalogClientError> {
        self.pop("categories", vec![], |r| &mut r.categories)
    }

    async fn brands(&self) -> Result<Vec<Brand>, CatalogClientError> {
        self.pop("brands", vec![], |r| &mut r.brands)
    }

    async fn record_search_click(
        &self,
        search_id: &str,
        product_id: u64,
    ) -> Result<(), CatalogClientError> {
        let mut responses = self.responses.lock().expect("couldn't acquire mock lock");
        responses.calls.push(("record_search_click", vec![
            ("search_id".to_string(), search_id.to_string()),
            ("product_id".to_string(), product_id.to_string()),
        ]));
        Ok(())
    }

    async fn set_featured(
        &self,
        product_id: u64,
        featured: bool,
    ) -> Result<(), CatalogClientError> {
        let params = vec![
            ("product_id".to_string(), product_id.to_string()),
            ("is_featured".to_string(), featured.to_string()),
        ];
        self.pop("set_featured", params, |r| &mut r.set_featured)
    }

    async fn vendor_profile(&self) -> Result<VendorProfile, CatalogClientError> {
        self.pop("vendor_profile", vec![], |r| &mut r.vendor_profile)
    }
}
