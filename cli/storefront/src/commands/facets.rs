use anyhow::{Context, Result};
use bpaf::Bpaf;
use storefront_catalog::{ClientTrait, fetch_facets};
use tracing::instrument;

use crate::utils::display::DisplayFacets;
use crate::utils::message;

// Show the filters available for a category
#[derive(Debug, Bpaf, Clone)]
pub struct Facets {
    /// Display the filters as JSON
    #[bpaf(long)]
    pub json: bool,

    /// Slug of the category, filters of all products if omitted
    #[bpaf(positional("category"))]
    pub category: Option<String>,
}

impl Facets {
    #[instrument(name = "facets", skip_all, fields(category = self.category))]
    pub async fn handle<C: ClientTrait>(self, client: C) -> Result<()> {
        let facets = fetch_facets(&client, self.category.as_deref()).await;

        if self.json {
            let json =
                serde_json::to_string_pretty(&facets).context("Could not serialize filters")?;
            println!("{json}");
            return Ok(());
        }

        if facets.options_defaulted {
            message::warning("Could not load the filters of this category, showing defaults.");
        }
        println!("{}", DisplayFacets(&facets));
        Ok(())
    }
}
