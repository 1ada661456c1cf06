//! Facet metadata for the filter controls.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::client::ClientTrait;
use crate::types::{Brand, Category, ColorFacet, FilterOptions, PriceRange};

/// Price bounds assumed when the API does not report any.
pub const DEFAULT_PRICE_RANGE: PriceRange = PriceRange {
    min: 0.0,
    max: 100000.0,
};

/// Colors offered when the API does not report any.
pub const DEFAULT_COLORS: [(&str, &str); 8] = [
    ("Black", "#000000"),
    ("White", "#FFFFFF"),
    ("Silver", "#C0C0C0"),
    ("Gray", "#808080"),
    ("Red", "#FF0000"),
    ("Blue", "#0000FF"),
    ("Green", "#008000"),
    ("Gold", "#FFD700"),
];

pub(crate) fn default_filter_options() -> FilterOptions {
    FilterOptions {
        brands: Vec::new(),
        colors: DEFAULT_COLORS
            .iter()
            .map(|(name, hex)| ColorFacet::new(name, hex))
            .collect(),
        price_range: DEFAULT_PRICE_RANGE,
        specification_fields: Vec::new(),
    }
}

/// Everything needed to render the filter sidebar of a catalog page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    pub brands: Vec<Brand>,
    /// Categories that contain products.
    pub categories: Vec<Category>,
    pub options: FilterOptions,
    /// Whether `options` are the built-in defaults because the API failed.
    pub options_defaulted: bool,
}

impl Facets {
    /// Brands to offer: the category specific ones if known, all brands otherwise.
    pub fn selectable_brands(&self) -> &[Brand] {
        if self.options.brands.is_empty() {
            &self.brands
        } else {
            &self.options.brands
        }
    }
}

/// Fetch brands, categories and filter options for `category`.
///
/// The three requests run concurrently and fail independently,
/// a failure never prevents the other facets from being shown.
#[instrument(skip(client))]
pub async fn fetch_facets<C: ClientTrait>(client: &C, category: Option<&str>) -> Facets {
    let (brands, categories, options) = futures::join!(
        client.brands(),
        client.categories(),
        client.filter_options(category)
    );

    let brands = brands.unwrap_or_else(|e| {
        warn!(error = %e, "failed to fetch brands");
        Vec::new()
    });

    let categories = categories
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to fetch categories");
            Vec::new()
        })
        .into_iter()
        .filter(Category::has_products)
        .collect::<Vec<_>>();

    let (options, options_defaulted) = match options {
        Ok(options) => (options, false),
        Err(e) => {
            warn!(error = %e, "failed to fetch filter options, using defaults");
            (default_filter_options(), true)
        },
    };

    debug!(
        n_brands = brands.len(),
        n_categories = categories.len(),
        n_spec_fields = options.specification_fields.len(),
        options_defaulted,
        "fetched facets"
    );

    Facets {
        brands,
        categories,
        options,
        options_defaulted,
    }
}
