use anyhow::{Result, bail};
use bpaf::Bpaf;
use log::debug;
use storefront_catalog::{CatalogSession, ClientTrait, FilterState};
use tracing::instrument;

use super::browse::{load_session, render_state};
use super::{FilterArgs, filter_args};
use crate::config::Config;
use crate::utils::didyoumean::DidYouMean;
use crate::utils::message;

// Search the catalog
#[derive(Debug, Bpaf, Clone)]
pub struct Search {
    /// Display search results as JSON
    #[bpaf(long)]
    pub json: bool,

    /// Search for the suggested spelling if the API offers one
    #[bpaf(long("accept-suggestion"))]
    pub accept_suggestion: bool,

    /// Only search within this category
    #[bpaf(long("category"), argument("SLUG"))]
    pub category: Option<String>,

    #[bpaf(external(filter_args))]
    pub filters: FilterArgs,

    /// The term to search for
    #[bpaf(positional("search-term"))]
    pub search_term: String,
}

impl Search {
    #[instrument(name = "search", skip_all, fields(search_term = self.search_term, json = self.json))]
    pub async fn handle<C: ClientTrait>(self, config: Config, client: C) -> Result<()> {
        if self.search_term.trim().is_empty() {
            bail!("Search term must not be empty");
        }

        let mut state = FilterState::for_search(&self.search_term);
        state.category = self.category.clone();
        let filters = self.filters.apply_to(state)?;

        let mut session = load_session(client, filters, config.storefront.page_size()).await;
        if self.accept_suggestion {
            accept_suggestion(&mut session).await;
        }

        render_state(session.filters(), session.state(), self.json)?;
        if self.json {
            return Ok(());
        }

        let Some(page) = session.state().page() else {
            return Ok(());
        };
        let searched = session.filters().search.as_deref().unwrap_or_default();
        let hint = DidYouMean::new(searched, page.did_you_mean.as_deref());
        if hint.has_suggestions() {
            message::plain(hint);
        }
        if let Some(search_id) = &page.search_id {
            message::plain(format!(
                "Use 'storefront click --search-id {search_id} <product-id>' to report an opened result."
            ));
        }
        Ok(())
    }
}

async fn accept_suggestion<C: ClientTrait>(session: &mut CatalogSession<C>) {
    let searched = session.filters().search.clone().unwrap_or_default();
    match session.accept_suggestion().await {
        Some(_) => {
            let accepted = session.filters().search.as_deref().unwrap_or_default();
            message::info(format!("Showing results for '{accepted}' instead of '{searched}'"));
        },
        None => debug!("no suggestion to accept"),
    }
}
