use anyhow::Result;
use bpaf::Bpaf;
use storefront_catalog::ClientTrait;
use tracing::instrument;

use crate::utils::message;

// Report that a search result was opened
#[derive(Debug, Bpaf, Clone)]
pub struct Click {
    /// Id of the search session, as printed by 'storefront search'
    #[bpaf(long("search-id"), argument("ID"))]
    pub search_id: String,

    /// Id of the product that was opened
    #[bpaf(positional("product-id"))]
    pub product_id: u64,
}

impl Click {
    /// Click-throughs are analytics only, failing to report one is not an error.
    #[instrument(name = "click", skip_all, fields(search_id = self.search_id, product_id = self.product_id))]
    pub async fn handle<C: ClientTrait>(self, client: C) -> Result<()> {
        match client
            .record_search_click(&self.search_id, self.product_id)
            .await
        {
            Ok(()) => message::updated(format!("Recorded click on product {}", self.product_id)),
            Err(e) => message::warning(format!("Could not record click: {e}")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use storefront_catalog::MockClient;

    use super::*;

    #[tokio::test]
    async fn click_is_reported() {
        let client = MockClient::new();
        Click {
            search_id: "s-1".to_string(),
            product_id: 42,
        }
        .handle(client.clone())
        .await
        .unwrap();

        let calls = client.responses.lock().unwrap().calls.clone();
        assert_eq!(calls, vec![("record_search_click", vec![
            ("search_id".to_string(), "s-1".to_string()),
            ("product_id".to_string(), "42".to_string()),
        ])]);
    }
}
