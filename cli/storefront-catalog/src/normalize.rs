//! Normalization of API responses into the canonical catalog types.
//!
//! The API answers collection endpoints either with a bare JSON array or
//! with a `{count, next, previous, results}` envelope, and embeds relations
//! either as objects or as bare ids. Numbers may arrive as JSON numbers or
//! as decimal strings. All of that is resolved here, once.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use tracing::debug;

use crate::error::CatalogClientError;
use crate::types::*;
use crate::vendor::VendorProfile;

// ---------------------------------------------------------------------------
// Collection envelopes
// ---------------------------------------------------------------------------

/// A collection response with its envelope removed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Envelope {
    pub items: Vec<Value>,
    /// Total count as reported by the server, if any.
    pub count: Option<u64>,
    pub has_next: bool,
    /// Remaining top level fields of an enveloped response.
    pub extra: Map<String, Value>,
}

/// Keys under which collection endpoints place their items.
const ITEM_KEYS: [&str; 3] = ["results", "products", "items"];

pub(crate) fn split_envelope(value: Value) -> Result<Envelope, CatalogClientError> {
    match value {
        // a bare list says nothing about other pages
        Value::Array(items) => Ok(Envelope {
            items,
            ..Default::default()
        }),
        Value::Object(mut object) => {
            let items = ITEM_KEYS
                .iter()
                .find_map(|key| match object.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| {
                    CatalogClientError::Shape(format!(
                        "expected a list or a paginated object, found keys {:?}",
                        object.keys().collect::<Vec<_>>()
                    ))
                })?;
            let count = object.remove("count").and_then(|count| lenient_u64(&count));
            let has_next = matches!(object.remove("next"), Some(Value::String(_)));
            object.remove("previous");
            Ok(Envelope {
                items,
                count,
                has_next,
                extra: object,
            })
        },
        other => Err(CatalogClientError::Shape(format!(
            "expected a list or a paginated object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Decode every item of a collection, skipping items that are not objects.
fn decode_items<Raw: DeserializeOwned>(items: Vec<Value>) -> Vec<Raw> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Raw>(item) {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(error = %e, "skipping undecodable item");
                None
            },
        })
        .collect()
}

fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Products decoded from a listing or search response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub count: Option<u64>,
    pub has_next: bool,
    pub did_you_mean: Option<String>,
    pub search_id: Option<String>,
}

impl ProductList {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

pub(crate) fn product_list(value: Value) -> Result<ProductList, CatalogClientError> {
    let Envelope {
        items,
        count,
        has_next,
        extra,
    } = split_envelope(value)?;

    let products = decode_items::<RawProduct>(items)
        .into_iter()
        .map(Product::from)
        .collect();

    let did_you_mean = extra
        .get("did_you_mean")
        .or_else(|| extra.get("suggestion"))
        .and_then(lenient_string);
    let search_id = extra
        .get("search_id")
        .or_else(|| extra.get("search_session_id"))
        .and_then(lenient_string);

    Ok(ProductList {
        products,
        count,
        has_next,
        did_you_mean,
        search_id,
    })
}

/// A relation as the API sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawRelation {
    Id(u64),
    Object(RawNamed),
    Text(String),
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawNamed {
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    id: u64,
    #[serde(alias = "title")]
    name: Option<String>,
    slug: Option<String>,
}

impl From<Option<RawRelation>> for NamedRef {
    fn from(relation: Option<RawRelation>) -> Self {
        match relation {
            None => NamedRef::unknown(),
            Some(RawRelation::Id(id)) => NamedRef::unnamed(id),
            Some(RawRelation::Text(text)) => match text.trim().parse::<u64>() {
                Ok(id) => NamedRef::unnamed(id),
                Err(_) if text.trim().is_empty() => NamedRef::unknown(),
                Err(_) => NamedRef {
                    id: 0,
                    name: text.trim().to_string(),
                    slug: None,
                },
            },
            Some(RawRelation::Object(named)) => NamedRef {
                id: named.id,
                name: named
                    .name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
                slug: named.slug,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawImage {
    Url(String),
    Object {
        #[serde(alias = "url", alias = "image_url")]
        image: Option<String>,
        #[serde(default)]
        is_primary: bool,
    },
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    id: u64,
    #[serde(alias = "title")]
    name: Option<String>,
    slug: Option<String>,
    #[serde_as(as = "DefaultOnError")]
    category: Option<RawRelation>,
    #[serde_as(as = "DefaultOnError")]
    brand: Option<RawRelation>,
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    price: f64,
    #[serde(alias = "discount_price")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    sale_price: Option<f64>,
    #[serde(alias = "stock", alias = "quantity")]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    stock_quantity: i64,
    #[serde_as(as = "DefaultOnError")]
    is_available: Option<bool>,
    #[serde_as(as = "DefaultOnError")]
    is_active: Option<bool>,
    #[serde_as(as = "DefaultOnError")]
    is_featured: bool,
    #[serde(alias = "image", alias = "main_image")]
    #[serde_as(as = "DefaultOnError")]
    primary_image: Option<String>,
    #[serde_as(as = "DefaultOnError")]
    images: Vec<RawImage>,
    #[serde(alias = "average_rating")]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    rating: f64,
    #[serde(alias = "reviews_count", alias = "num_reviews")]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    review_count: u64,
    #[serde(alias = "specs")]
    #[serde_as(as = "DefaultOnError")]
    specifications: BTreeMap<String, Value>,
}

impl From<RawProduct> for Product {
    fn from(raw: RawProduct) -> Self {
        let images = product_images(raw.primary_image, raw.images);
        let name = raw
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Product #{}", raw.id));
        let slug = raw.slug.unwrap_or_else(|| raw.id.to_string());
        let is_active = raw.is_active.unwrap_or(true);

        Product {
            id: raw.id,
            name,
            slug,
            category: raw.category.into(),
            brand: raw.brand.into(),
            price: finite_or_zero(raw.price),
            sale_price: raw.sale_price.filter(|price| price.is_finite()),
            stock_quantity: raw.stock_quantity,
            is_available: raw.is_available.unwrap_or(is_active && raw.stock_quantity > 0),
            is_active,
            is_featured: raw.is_featured,
            images,
            rating: finite_or_zero(raw.rating),
            review_count: raw.review_count,
            specifications: raw.specifications,
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Pick the primary image and collect the remaining ones without duplicates.
fn product_images(primary_image: Option<String>, images: Vec<RawImage>) -> ProductImages {
    let mut flagged_primary = None;
    let mut urls = Vec::new();
    for image in images {
        match image {
            RawImage::Url(url) => urls.push(url),
            RawImage::Object {
                image: Some(url),
                is_primary,
            } => {
                if is_primary && flagged_primary.is_none() {
                    flagged_primary = Some(url.clone());
                }
                urls.push(url);
            },
            RawImage::Object { image: None, .. } => {},
        }
    }
    urls.retain(|url| !url.trim().is_empty());

    let primary = primary_image
        .filter(|url| !url.trim().is_empty())
        .or(flagged_primary)
        .or_else(|| urls.first().cloned());

    let mut additional: Vec<String> = Vec::new();
    for url in urls {
        if Some(&url) != primary.as_ref() && !additional.contains(&url) {
            additional.push(url);
        }
    }

    ProductImages {
        primary,
        additional,
    }
}

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawBrand {
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    id: u64,
    name: Option<String>,
    slug: Option<String>,
    #[serde(alias = "count", alias = "products_count")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    product_count: Option<u64>,
}

impl From<RawBrand> for Brand {
    fn from(raw: RawBrand) -> Self {
        Brand {
            id: raw.id,
            name: raw.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            slug: raw.slug,
            product_count: raw.product_count,
        }
    }
}

pub(crate) fn brand_list(value: Value) -> Result<Vec<Brand>, CatalogClientError> {
    let envelope = split_envelope(value)?;
    Ok(decode_items::<RawBrand>(envelope.items)
        .into_iter()
        .map(Brand::from)
        .collect())
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawCategory {
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    id: u64,
    name: Option<String>,
    slug: Option<String>,
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    parent: Option<u64>,
    #[serde(alias = "products_count", alias = "count")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    product_count: Option<u64>,
}

pub(crate) fn category_list(value: Value) -> Result<Vec<Category>, CatalogClientError> {
    let envelope = split_envelope(value)?;
    Ok(decode_items::<RawCategory>(envelope.items)
        .into_iter()
        .filter_map(|raw| {
            // a category without a slug can't be navigated to
            let slug = raw.slug.filter(|slug| !slug.is_empty())?;
            Some(Category {
                id: raw.id,
                name: raw.name.unwrap_or_else(|| slug.clone()),
                slug,
                parent: raw.parent,
                product_count: raw.product_count,
            })
        })
        .collect())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawColor {
    Name(String),
    Object {
        name: String,
        #[serde(default, alias = "hex_code", alias = "code")]
        hex: Option<String>,
    },
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawPriceRange {
    #[serde(alias = "min_price")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    min: Option<f64>,
    #[serde(alias = "max_price")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    max: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSpecField {
    #[serde(alias = "field_name", alias = "key")]
    name: Option<String>,
    #[serde(alias = "type")]
    field_type: Option<String>,
    #[serde(alias = "values", alias = "choices")]
    options: Vec<Value>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawFilterOptions {
    #[serde_as(as = "DefaultOnError")]
    brands: Vec<Value>,
    #[serde_as(as = "DefaultOnError")]
    colors: Vec<RawColor>,
    #[serde_as(as = "DefaultOnError")]
    price_range: Option<RawPriceRange>,
    #[serde(alias = "custom_fields", alias = "specifications")]
    #[serde_as(as = "DefaultOnError")]
    specification_fields: Vec<RawSpecField>,
}

/// Decode filter options, filling gaps from `defaults`.
pub(crate) fn filter_options(
    value: Value,
    defaults: &FilterOptions,
) -> Result<FilterOptions, CatalogClientError> {
    if !value.is_object() {
        return Err(CatalogClientError::Shape(format!(
            "expected filter options object, found {}",
            json_kind(&value)
        )));
    }
    let raw: RawFilterOptions = serde_json::from_value(value)
        .map_err(|e| CatalogClientError::Shape(format!("invalid filter options: {e}")))?;

    let brands = decode_items::<RawBrand>(raw.brands)
        .into_iter()
        .map(Brand::from)
        .collect();

    let colors = if raw.colors.is_empty() {
        defaults.colors.clone()
    } else {
        raw.colors
            .into_iter()
            .map(|color| match color {
                RawColor::Name(name) => ColorFacet { name, hex: String::new() },
                RawColor::Object { name, hex } => ColorFacet {
                    name,
                    hex: hex.unwrap_or_default(),
                },
            })
            .collect()
    };

    let price_range = match raw.price_range {
        Some(RawPriceRange { min, max }) => PriceRange {
            min: min.filter(|v| v.is_finite()).unwrap_or(defaults.price_range.min),
            max: max.filter(|v| v.is_finite()).unwrap_or(defaults.price_range.max),
        },
        None => defaults.price_range,
    };

    let specification_fields = raw
        .specification_fields
        .into_iter()
        .filter_map(|field| {
            Some(SpecField {
                name: field.name.filter(|name| !name.is_empty())?,
                field_type: field.field_type.unwrap_or_else(|| "select".to_string()),
                options: field.options.iter().filter_map(lenient_string).collect(),
            })
        })
        .collect();

    Ok(FilterOptions {
        brands,
        colors,
        price_range,
        specification_fields,
    })
}

// ---------------------------------------------------------------------------
// Vendor
// ---------------------------------------------------------------------------

pub(crate) fn vendor_profile(value: Value) -> Result<VendorProfile, CatalogClientError> {
    // Some deployments return the profile wrapped in a single element list.
    let value = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        Value::Object(mut object) if object.contains_key("results") => {
            match object.remove("results") {
                Some(Value::Array(mut items)) if !items.is_empty() => items.remove(0),
                _ => return Err(CatalogClientError::Shape("no vendor profile found".into())),
            }
        },
        other => other,
    };
    serde_json::from_value(value)
        .map_err(|e| CatalogClientError::Shape(format!("invalid vendor profile: {e}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use storefront_test_utils::fixtures;

    use super::*;
    use crate::facets::default_filter_options;

    /// Normalized fixture products with the given ids.
    pub(crate) fn products(ids: impl IntoIterator<Item = u64>) -> Vec<Product> {
        let items = ids.into_iter().map(fixtures::product).collect::<Vec<_>>();
        product_list(Value::Array(items))
            .expect("fixture products should normalize")
            .products
    }

    #[test]
    fn bare_array_and_envelope_are_equivalent() {
        let item = json!({"id": 1, "name": "Phone", "slug": "phone", "price": 10});
        let bare = product_list(json!([item.clone()])).unwrap();
        let enveloped = product_list(json!({
            "count": 1,
            "next": null,
            "previous": null,
            "results": [item],
        }))
        .unwrap();

        assert_eq!(bare.products, enveloped.products);
        assert_eq!(bare.count, None);
        assert!(!bare.has_next);
        assert_eq!(enveloped.count, Some(1));
        assert!(!enveloped.has_next);
    }

    #[test]
    fn envelope_with_next_page() {
        let list = product_list(json!({
            "count": 30,
            "next": "https://shop.example.com/api/products/?page=2",
            "previous": null,
            "results": [],
        }))
        .unwrap();
        assert_eq!(list.count, Some(30));
        assert!(list.has_next);
    }

    #[test]
    fn unexpected_shapes_are_errors() {
        assert!(matches!(
            product_list(json!({"detail": "nope"})),
            Err(CatalogClientError::Shape(_))
        ));
        assert!(matches!(
            product_list(json!("products")),
            Err(CatalogClientError::Shape(_))
        ));
    }

    #[test]
    fn missing_fields_default_to_placeholders() {
        let list = product_list(json!([{"id": 7, "name": "Bare"}])).unwrap();
        let product = &list.products[0];

        assert_eq!(product.price, 0.0);
        assert_eq!(product.rating, 0.0);
        assert_eq!(product.review_count, 0);
        assert_eq!(product.category, NamedRef::unknown());
        assert_eq!(product.category.name, "Unknown");
        assert_eq!(product.brand, NamedRef::unknown());
        assert_eq!(product.slug, "7");
    }

    #[test]
    fn null_and_malformed_numbers_default_to_zero() {
        let list = product_list(json!([{
            "id": 1,
            "name": "Odd",
            "price": null,
            "rating": "n/a",
            "review_count": {"total": 3},
        }]))
        .unwrap();
        let product = &list.products[0];
        assert_eq!(product.price, 0.0);
        assert_eq!(product.rating, 0.0);
        assert_eq!(product.review_count, 0);
    }

    #[test]
    fn decimal_strings_are_numbers() {
        let list = product_list(json!([{
            "id": "3",
            "name": "Laptop",
            "price": "54999.00",
            "sale_price": "49999.50",
            "rating": "4.5",
            "reviews_count": 12,
            "stock": "4",
        }]))
        .unwrap();
        let product = &list.products[0];
        assert_eq!(product.id, 3);
        assert_eq!(product.price, 54999.0);
        assert_eq!(product.sale_price, Some(49999.5));
        assert_eq!(product.rating, 4.5);
        assert_eq!(product.review_count, 12);
        assert_eq!(product.stock_quantity, 4);
        assert!(product.is_on_sale());
    }

    #[test]
    fn relations_accept_objects_and_ids() {
        let list = product_list(json!([
            {"id": 1, "category": {"id": 4, "name": "Mobiles", "slug": "mobiles"}, "brand": 9},
            {"id": 2, "category": "4", "brand": {"id": 9}},
            {"id": 3, "category": null, "brand": "Acme"},
        ]))
        .unwrap();

        assert_eq!(list.products[0].category, NamedRef {
            id: 4,
            name: "Mobiles".to_string(),
            slug: Some("mobiles".to_string()),
        });
        assert_eq!(list.products[0].brand, NamedRef::unnamed(9));
        assert_eq!(list.products[1].category, NamedRef::unnamed(4));
        assert_eq!(list.products[1].brand, NamedRef::unnamed(9));
        assert_eq!(list.products[2].category, NamedRef::unknown());
        assert_eq!(list.products[2].brand.name, "Acme");
    }

    #[test]
    fn images_pick_primary_and_dedupe() {
        let list = product_list(json!([{
            "id": 1,
            "images": [
                {"image": "b.jpg", "is_primary": false},
                {"image": "a.jpg", "is_primary": true},
                "b.jpg",
                "c.jpg",
            ],
        }]))
        .unwrap();
        assert_eq!(list.products[0].images, ProductImages {
            primary: Some("a.jpg".to_string()),
            additional: vec!["b.jpg".to_string(), "c.jpg".to_string()],
        });

        let list = product_list(json!([{"id": 1, "image": "main.jpg", "images": ["x.jpg"]}])).unwrap();
        assert_eq!(list.products[0].images.primary.as_deref(), Some("main.jpg"));
        assert_eq!(list.products[0].images.additional, vec!["x.jpg".to_string()]);
    }

    #[test]
    fn non_object_items_are_skipped() {
        let list = product_list(json!([{"id": 1, "name": "Kept"}, 42, "junk"])).unwrap();
        assert_eq!(list.products.len(), 1);
        assert_eq!(list.products[0].name, "Kept");
    }

    #[test]
    fn search_metadata_is_extracted() {
        let list = product_list(json!({
            "count": 0,
            "results": [],
            "did_you_mean": "samsung",
            "search_id": 991,
        }))
        .unwrap();
        assert_eq!(list.did_you_mean.as_deref(), Some("samsung"));
        assert_eq!(list.search_id.as_deref(), Some("991"));

        let list = product_list(json!({"results": [], "did_you_mean": ""})).unwrap();
        assert_eq!(list.did_you_mean, None);
    }

    #[test]
    fn categories_without_slug_are_dropped() {
        let categories = category_list(json!([
            {"id": 1, "name": "Mobiles", "slug": "mobiles", "product_count": 3},
            {"id": 2, "name": "Broken"},
        ]))
        .unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].slug, "mobiles");
        assert_eq!(categories[0].product_count, Some(3));
    }

    #[test]
    fn filter_options_fill_gaps_from_defaults() {
        let defaults = default_filter_options();
        let options = filter_options(
            json!({
                "brands": [{"id": 1, "name": "Acme", "product_count": 4}],
                "price_range": {"min_price": "100.00"},
                "specification_fields": [
                    {"name": "ram", "type": "select", "options": ["4GB", "8GB", 16]},
                    {"type": "text"},
                ],
            }),
            &defaults,
        )
        .unwrap();

        assert_eq!(options.brands, vec![Brand {
            id: 1,
            name: "Acme".to_string(),
            slug: None,
            product_count: Some(4),
        }]);
        assert_eq!(options.colors, defaults.colors);
        assert_eq!(options.price_range, PriceRange {
            min: 100.0,
            max: defaults.price_range.max,
        });
        assert_eq!(options.specification_fields, vec![SpecField {
            name: "ram".to_string(),
            field_type: "select".to_string(),
            options: vec!["4GB".to_string(), "8GB".to_string(), "16".to_string()],
        }]);
    }
}
