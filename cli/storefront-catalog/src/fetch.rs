use derive_more::Display;
use tracing::{debug, instrument, warn};

use crate::client::ClientTrait;
use crate::error::{CatalogClientError, FetchError};
use crate::fallback::sample_products;
use crate::normalize::ProductList;
use crate::query::CatalogQuery;
use crate::types::{ProductsPage, ResultSource};

/// Outcome of a single layer of the fetch.
enum Attempt {
    Found(ProductList),
    Empty(ProductList),
    Failed(CatalogClientError),
}

impl Attempt {
    fn new(result: Result<ProductList, CatalogClientError>) -> Self {
        match result {
            Ok(list) if list.is_empty() => Attempt::Empty(list),
            Ok(list) => Attempt::Found(list),
            Err(e) => Attempt::Failed(e),
        }
    }

    fn list(&self) -> Option<&ProductList> {
        match self {
            Attempt::Found(list) | Attempt::Empty(list) => Some(list),
            Attempt::Failed(_) => None,
        }
    }
}

/// The two requests a fetch may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum Layer {
    #[display("direct")]
    Direct,
    #[display("service")]
    Service,
}

impl Layer {
    /// Searches go to the search endpoint first, since only it reports
    /// spelling suggestions and search ids.
    fn order(query: &CatalogQuery) -> [Layer; 2] {
        match query.search() {
            Some(_) => [Layer::Service, Layer::Direct],
            None => [Layer::Direct, Layer::Service],
        }
    }

    async fn request<C: ClientTrait>(
        self,
        client: &C,
        query: &CatalogQuery,
    ) -> Result<ProductList, CatalogClientError> {
        match self {
            Layer::Direct => client.products_direct(query).await,
            Layer::Service => client.products(query).await,
        }
    }

    fn source(self) -> ResultSource {
        match self {
            Layer::Direct => ResultSource::Direct,
            Layer::Service => ResultSource::Service,
        }
    }
}

/// Fetch one page of products for `query`.
///
/// A listing is first requested from the listing endpoint directly, then
/// from the endpoint the query was built for. A search asks the search
/// endpoint first and the listing endpoint second. If neither yields
/// products, a page without a category falls back to the built-in
/// samples, while a category page is reported as empty. A category page
/// only fails if both requests failed.
#[instrument(skip_all, fields(
    endpoint = %query.endpoint(),
    category = query.category(),
    search = query.search(),
    page = %query.page(),
))]
pub async fn fetch_products<C: ClientTrait>(
    client: &C,
    query: &CatalogQuery,
) -> Result<ProductsPage, FetchError> {
    let mut attempts = Vec::with_capacity(2);
    for layer in Layer::order(query) {
        match Attempt::new(layer.request(client, query).await) {
            Attempt::Found(list) => {
                debug!(%layer, n_products = list.products.len(), "request returned products");
                let mut page = products_page(list, query, layer.source());
                // an earlier empty search may still have carried metadata
                let earlier = attempts.iter().filter_map(Attempt::list);
                for list in earlier {
                    page.did_you_mean = page.did_you_mean.or_else(|| list.did_you_mean.clone());
                    page.search_id = page.search_id.or_else(|| list.search_id.clone());
                }
                return Ok(page);
            },
            attempt @ Attempt::Empty(_) => {
                debug!(%layer, "request returned no products");
                attempts.push(attempt);
            },
            Attempt::Failed(e) => {
                warn!(%layer, error = %e, "request failed");
                attempts.push(Attempt::Failed(e));
            },
        }
    }

    // Search metadata is kept from whichever response carried it
    let did_you_mean = attempts
        .iter()
        .filter_map(Attempt::list)
        .find_map(|list| list.did_you_mean.clone());
    let search_id = attempts
        .iter()
        .filter_map(Attempt::list)
        .find_map(|list| list.search_id.clone());

    let Some(category) = query.category() else {
        let products = sample_products();
        debug!(n_products = products.len(), "using sample products");
        return Ok(ProductsPage {
            count: products.len() as u64,
            products,
            page: 1,
            total_pages: 1,
            source: ResultSource::Fallback,
            empty_category: None,
            did_you_mean,
            search_id,
        });
    };

    let all_failed = attempts
        .iter()
        .all(|attempt| matches!(attempt, Attempt::Failed(_)));
    if let Some(Attempt::Failed(source)) = attempts.pop().filter(|_| all_failed) {
        return Err(FetchError::Exhausted {
            category: category.to_string(),
            source,
        });
    }

    debug!(category, "category has no products");
    Ok(ProductsPage {
        products: Vec::new(),
        count: 0,
        page: query.page().get(),
        total_pages: 0,
        source: ResultSource::Service,
        empty_category: Some(category.to_string()),
        did_you_mean,
        search_id,
    })
}

fn products_page(list: ProductList, query: &CatalogQuery, source: ResultSource) -> ProductsPage {
    let page = query.page().get();
    let page_size = query.page_size();
    let count = list
        .count
        .unwrap_or_else(|| u64::from(page - 1) * page_size + list.products.len() as u64);

    let total_pages = match list.count {
        Some(count) => u32::try_from(count.div_ceil(page_size)).unwrap_or(u32::MAX),
        None if list.has_next => page.saturating_add(1),
        None => page,
    };

    ProductsPage {
        products: list.products,
        count,
        page,
        total_pages,
        source,
        empty_category: None,
        did_you_mean: list.did_you_mean,
        search_id: list.search_id,
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use pretty_assertions::assert_eq;
    use storefront_test_utils::fixtures;

    use super::*;
    use crate::facets::DEFAULT_PRICE_RANGE;
    use crate::mock_client::MockClient;
    use crate::normalize::product_list;
    use crate::normalize::tests::products;
    use crate::query::FilterState;

    fn query(state: &FilterState) -> CatalogQuery {
        CatalogQuery::build(state, &DEFAULT_PRICE_RANGE)
    }

    fn list(ids: std::ops::RangeInclusive<u64>, count: u64) -> ProductList {
        ProductList {
            products: products(ids),
            count: Some(count),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn direct_results_are_used_first() {
        let client = MockClient::new();
        client.push(|r| r.direct.push_back(Ok(list(1..=12, 30))));

        let page = fetch_products(&client, &query(&FilterState::for_category("mobiles")))
            .await
            .unwrap();

        assert_eq!(page.source, ResultSource::Direct);
        assert_eq!(page.products.len(), 12);
        assert_eq!(page.count, 30);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next_page());
        assert_eq!(client.called(), vec!["products_direct"]);
    }

    #[tokio::test]
    async fn empty_direct_falls_through_to_service() {
        let client = MockClient::new();
        client.push(|r| {
            r.direct.push_back(Ok(ProductList::default()));
            r.service.push_back(Ok(list(1..=3, 3)));
        });

        let page = fetch_products(&client, &query(&FilterState::for_category("mobiles")))
            .await
            .unwrap();

        assert_eq!(page.source, ResultSource::Service);
        assert_eq!(page.products.len(), 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(client.called(), vec!["products_direct", "products"]);
    }

    #[tokio::test]
    async fn search_asks_search_endpoint_first() {
        let client = MockClient::new();
        client.push(|r| {
            r.service.push_back(Ok(ProductList {
                search_id: Some("s-4".to_string()),
                ..list(1..=3, 3)
            }))
        });

        let page = fetch_products(&client, &query(&FilterState::for_search("phone")))
            .await
            .unwrap();

        assert_eq!(page.source, ResultSource::Service);
        assert_eq!(page.search_id.as_deref(), Some("s-4"));
        assert_eq!(client.called(), vec!["products"]);
    }

    #[tokio::test]
    async fn empty_search_falls_back_to_listing_search() {
        let client = MockClient::new();
        client.push(|r| {
            r.service.push_back(Ok(ProductList {
                did_you_mean: Some("phone".to_string()),
                search_id: Some("s-5".to_string()),
                count: Some(0),
                ..Default::default()
            }));
            r.direct.push_back(Ok(list(1..=2, 2)));
        });

        let page = fetch_products(&client, &query(&FilterState::for_search("phnoe")))
            .await
            .unwrap();

        assert_eq!(page.source, ResultSource::Direct);
        assert_eq!(page.products.len(), 2);
        assert_eq!(page.did_you_mean.as_deref(), Some("phone"));
        assert_eq!(page.search_id.as_deref(), Some("s-5"));
        assert_eq!(client.called(), vec!["products", "products_direct"]);
    }

    #[tokio::test]
    async fn failed_direct_falls_through_to_service() {
        let client = MockClient::new();
        client.push(|r| {
            r.direct.push_back(Err(500));
            r.service.push_back(Ok(list(1..=2, 2)));
        });

        let page = fetch_products(&client, &query(&FilterState::for_category("mobiles")))
            .await
            .unwrap();
        assert_eq!(page.source, ResultSource::Service);
        assert_eq!(page.products.len(), 2);
    }

    #[tokio::test]
    async fn samples_without_category() {
        let client = MockClient::new();
        client.push(|r| {
            r.direct.push_back(Err(500));
            r.service.push_back(Err(502));
        });

        let page = fetch_products(&client, &query(&FilterState::default()))
            .await
            .unwrap();

        assert_eq!(page.source, ResultSource::Fallback);
        assert_eq!(page.products, sample_products());
        assert_eq!(page.empty_category, None);
    }

    #[tokio::test]
    async fn empty_category_never_shows_samples() {
        let client = MockClient::new();
        client.push(|r| {
            r.direct.push_back(Ok(ProductList::default()));
            r.service.push_back(Err(500));
        });

        let page = fetch_products(&client, &query(&FilterState::for_category("tablets")))
            .await
            .unwrap();

        assert!(page.is_empty());
        assert_eq!(page.empty_category.as_deref(), Some("tablets"));
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn category_fails_when_both_requests_fail() {
        let client = MockClient::new();
        client.push(|r| {
            r.direct.push_back(Err(500));
            r.service.push_back(Err(503));
        });

        let result = fetch_products(&client, &query(&FilterState::for_category("mobiles"))).await;
        match result {
            Err(FetchError::Exhausted { category, source }) => {
                assert_eq!(category, "mobiles");
                assert_eq!(source.status().map(|s| s.as_u16()), Some(503));
            },
            other => panic!("expected Exhausted error, found: {other:?}"),
        }
    }

    #[tokio::test]
    async fn suggestion_survives_empty_search() {
        let client = MockClient::new();
        client.push(|r| {
            r.service.push_back(Ok(ProductList {
                did_you_mean: Some("samsung".to_string()),
                search_id: Some("s-9".to_string()),
                count: Some(0),
                ..Default::default()
            }));
            r.direct.push_back(Ok(ProductList::default()));
        });

        let page = fetch_products(&client, &query(&FilterState::for_search("samsng")))
            .await
            .unwrap();

        assert_eq!(page.source, ResultSource::Fallback);
        assert_eq!(page.did_you_mean.as_deref(), Some("samsung"));
        assert_eq!(page.search_id.as_deref(), Some("s-9"));
    }

    #[tokio::test]
    async fn page_count_without_total() {
        let client = MockClient::new();
        client.push(|r| {
            r.direct.push_back(Ok(ProductList {
                products: products(13..=24),
                count: None,
                has_next: true,
                ..Default::default()
            }))
        });

        let state = FilterState {
            page: NonZeroU32::new(2).unwrap(),
            ..FilterState::for_category("mobiles")
        };
        let page = fetch_products(&client, &query(&state)).await.unwrap();

        assert_eq!(page.page, 2);
        assert_eq!(page.count, 24);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn bare_list_on_later_page_counts_earlier_pages() {
        let items = (13..=20).map(fixtures::product).collect();
        let bare = product_list(serde_json::Value::Array(items)).unwrap();
        let client = MockClient::new();
        client.push(|r| r.direct.push_back(Ok(bare)));

        let state = FilterState {
            page: NonZeroU32::new(2).unwrap(),
            ..FilterState::for_category("mobiles")
        };
        let page = fetch_products(&client, &query(&state)).await.unwrap();

        assert_eq!(page.page, 2);
        assert_eq!(page.products.len(), 8);
        assert_eq!(page.count, 20);
        assert_eq!(page.total_pages, 2);
        assert!(!page.has_next_page());
    }

    #[tokio::test]
    async fn custom_page_size_counts_pages() {
        let client = MockClient::new();
        client.push(|r| r.direct.push_back(Ok(list(1..=20, 45))));

        let query = query(&FilterState::default()).with_page_size(20);
        let page = fetch_products(&client, &query).await.unwrap();
        assert_eq!(page.total_pages, 3);
    }
}
