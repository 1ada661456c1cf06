use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use futures::TryStreamExt;
use log::debug;
use storefront_catalog::{
    CatalogClient,
    CatalogQuery,
    CatalogSession,
    ClientTrait,
    FilterState,
    Product,
    ProductsPage,
    ResultSource,
    StreamItem,
    ViewState,
};
use tracing::instrument;

use super::{FilterArgs, filter_args, price_defaults};
use crate::config::Config;
use crate::utils::display::{DisplayPage, DisplayProduct, describe_tags};
use crate::utils::message;

const FALLBACK_NOTICE: &str = "No products could be loaded, showing sample products instead.";

// List the products of a category
#[derive(Debug, Bpaf, Clone)]
pub struct Browse {
    /// Display the products as JSON
    #[bpaf(long)]
    pub json: bool,

    /// Print the products of all pages, starting at '--page'
    #[bpaf(short, long)]
    pub all: bool,

    #[bpaf(external(filter_args))]
    pub filters: FilterArgs,

    /// Slug of the category to list, all products if omitted
    #[bpaf(positional("category"))]
    pub category: Option<String>,
}

impl Browse {
    #[instrument(name = "browse", skip_all, fields(category = self.category, json = self.json, all = self.all))]
    pub async fn handle(self, config: Config, client: CatalogClient) -> Result<()> {
        let state = match &self.category {
            Some(category) => FilterState::for_category(category),
            None => FilterState::default(),
        };
        let filters = self.filters.apply_to(state)?;

        if self.all {
            return print_all(&client, &filters, config.storefront.page_size(), self.json)
                .await;
        }

        let session = load_session(client, filters, config.storefront.page_size()).await;
        render_state(session.filters(), session.state(), self.json)
    }
}

/// Create a session for `filters` and load its first view.
pub(super) async fn load_session<C: ClientTrait>(
    client: C,
    filters: FilterState,
    page_size: u64,
) -> CatalogSession<C> {
    let defaults = price_defaults(&client, filters.category.as_deref()).await;
    let mut session = CatalogSession::new(client, filters).with_page_size(page_size);
    session.set_price_defaults(defaults);
    session.mount().await;
    session
}

/// Print a loaded view, or fail if it could not be loaded.
pub(super) fn render_state(filters: &FilterState, state: &ViewState, json: bool) -> Result<()> {
    let page = match state {
        ViewState::Ready(page) => page,
        ViewState::Error(e) => bail!("{e}"),
        ViewState::Loading => bail!("The catalog did not finish loading"),
    };

    if json {
        debug!("printing products as JSON");
        return print_json(page);
    }

    if let Some(tags) = describe_tags(&filters.tags()) {
        message::info(tags);
    }
    if page.source == ResultSource::Fallback {
        message::warning(FALLBACK_NOTICE);
    }
    println!("{}", DisplayPage { page });
    Ok(())
}

fn print_json(page: &ProductsPage) -> Result<()> {
    let json = serde_json::to_string_pretty(page).context("Could not serialize products")?;
    println!("{json}");
    Ok(())
}

/// Print every product from the query's page onwards.
async fn print_all(
    client: &CatalogClient,
    filters: &FilterState,
    page_size: u64,
    json: bool,
) -> Result<()> {
    let defaults = price_defaults(client, filters.category.as_deref()).await;
    let query = CatalogQuery::build(filters, &defaults).with_page_size(page_size);

    let items: Vec<StreamItem<Product>> = client.stream_products(&query).try_collect().await?;
    let mut total = None;
    let mut products = Vec::new();
    for item in items {
        match item {
            StreamItem::TotalCount(count) => total = Some(count),
            StreamItem::Result(product) => products.push(product),
        }
    }
    debug!(n_products = products.len(), ?total, "streamed products");

    if json {
        let json =
            serde_json::to_string_pretty(&products).context("Could not serialize products")?;
        println!("{json}");
        return Ok(());
    }

    if let Some(tags) = describe_tags(&filters.tags()) {
        message::info(tags);
    }
    if products.is_empty() {
        match &filters.category {
            Some(category) => message::plain(format!(
                "There are no products in category '{category}' yet."
            )),
            None => message::plain("No products found."),
        }
        return Ok(());
    }
    for product in &products {
        println!("{}", DisplayProduct(product));
    }
    Ok(())
}
