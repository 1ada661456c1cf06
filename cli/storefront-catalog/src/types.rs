//! Catalog domain types.
//!
//! These are the canonical shapes produced by the normalization layer.
//! Nothing downstream of the client ever sees the raw API responses.

use std::collections::BTreeMap;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Name used for relations the API did not describe.
pub const UNKNOWN_NAME: &str = "Unknown";

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// A reference to a category or brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl NamedRef {
    /// Placeholder for a missing relation.
    pub fn unknown() -> Self {
        Self::unnamed(0)
    }

    /// A relation of which only the id is known.
    pub fn unnamed(id: u64) -> Self {
        Self {
            id,
            name: UNKNOWN_NAME.to_string(),
            slug: None,
        }
    }
}

impl Default for NamedRef {
    fn default() -> Self {
        Self::unknown()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImages {
    pub primary: Option<String>,
    pub additional: Vec<String>,
}

/// A product as consumed by frontends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub category: NamedRef,
    pub brand: NamedRef,
    pub price: f64,
    pub sale_price: Option<f64>,
    pub stock_quantity: i64,
    pub is_available: bool,
    pub is_active: bool,
    pub is_featured: bool,
    pub images: ProductImages,
    pub rating: f64,
    pub review_count: u64,
    pub specifications: BTreeMap<String, serde_json::Value>,
}

impl Product {
    /// The price a customer pays right now.
    pub fn effective_price(&self) -> f64 {
        match self.sale_price {
            Some(sale) if sale > 0.0 && sale < self.price => sale,
            _ => self.price,
        }
    }

    pub fn is_on_sale(&self) -> bool {
        self.effective_price() < self.price
    }

    pub fn in_stock(&self) -> bool {
        self.is_available && self.stock_quantity > 0
    }
}

/// Where the products of a page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// The direct request to the listing endpoint.
    #[display("direct")]
    Direct,
    /// The endpoint selected for the query (search or listing).
    #[display("service")]
    Service,
    /// Built-in sample products.
    #[display("fallback")]
    Fallback,
}

/// One page of products ready to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductsPage {
    pub products: Vec<Product>,
    /// Total number of matching products across all pages.
    pub count: u64,
    pub page: u32,
    pub total_pages: u32,
    pub source: ResultSource,
    /// Set to the category slug when a category page has no products.
    pub empty_category: Option<String>,
    pub did_you_mean: Option<String>,
    /// Opaque id of the search session, used to report click-throughs.
    pub search_id: Option<String>,
}

impl ProductsPage {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }
}

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: u64,
    pub name: String,
    pub slug: Option<String>,
    pub product_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub parent: Option<u64>,
    pub product_count: Option<u64>,
}

impl Category {
    /// Categories without products are hidden from navigation.
    ///
    /// A missing count is treated as non-empty.
    pub fn has_products(&self) -> bool {
        self.product_count.is_none_or(|count| count > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorFacet {
    pub name: String,
    pub hex: String,
}

impl ColorFacet {
    pub fn new(name: &str, hex: &str) -> Self {
        Self {
            name: name.to_string(),
            hex: hex.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecField {
    pub name: String,
    pub field_type: String,
    pub options: Vec<String>,
}

/// Server supplied metadata that drives which filter controls are shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub brands: Vec<Brand>,
    pub colors: Vec<ColorFacet>,
    pub price_range: PriceRange,
    pub specification_fields: Vec<SpecField>,
}
