//! Filter state and catalog query construction.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;
use std::str::FromStr;

use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PriceRange;

/// Number of products the API returns per page.
pub const PAGE_SIZE: u64 = 12;

/// Prefix of the query parameters carrying custom specification filters.
pub const SPEC_PARAM_PREFIX: &str = "spec_";

const FIRST_PAGE: NonZeroU32 = NonZeroU32::MIN;

// ---------------------------------------------------------------------------
// Sort key
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    #[display("popularity")]
    Popularity,
    #[display("newest")]
    Newest,
    #[display("price-asc")]
    #[serde(rename = "price-asc")]
    PriceAscending,
    #[display("price-desc")]
    #[serde(rename = "price-desc")]
    PriceDescending,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Popularity,
        SortKey::Newest,
        SortKey::PriceAscending,
        SortKey::PriceDescending,
    ];

    /// The backend `ordering` parameter for this sort key.
    pub fn ordering(self) -> &'static str {
        match self {
            SortKey::Popularity => "-popularity_score",
            SortKey::Newest => "-created_at",
            SortKey::PriceAscending => "price",
            SortKey::PriceDescending => "-price",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown sort order '{0}', expected one of: popularity, newest, price-asc, price-desc")]
pub struct ParseSortKeyError(String);

impl FromStr for SortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "popularity" | "popular" => SortKey::Popularity,
            "newest" | "new" => SortKey::Newest,
            "price-asc" | "price-ascending" | "price-low" => SortKey::PriceAscending,
            "price-desc" | "price-descending" | "price-high" => SortKey::PriceDescending,
            _ => return Err(ParseSortKeyError(s.to_string())),
        };
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// Filter state
// ---------------------------------------------------------------------------

/// The user's current catalog selection.
///
/// Multi-valued selections are sets, so the order in which values were
/// picked never changes the state or the resulting query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub category: Option<String>,
    pub brands: BTreeSet<u64>,
    pub colors: BTreeSet<String>,
    pub specs: BTreeMap<String, BTreeSet<String>>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    pub sort: SortKey,
    pub page: NonZeroU32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            category: None,
            brands: BTreeSet::new(),
            colors: BTreeSet::new(),
            specs: BTreeMap::new(),
            min_price: None,
            max_price: None,
            search: None,
            sort: SortKey::default(),
            page: FIRST_PAGE,
        }
    }
}

/// A single removable selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterTag {
    Brand(u64),
    Color(String),
    Spec { field: String, value: String },
    MinPrice(f64),
    MaxPrice(f64),
    Search(String),
}

impl std::fmt::Display for FilterTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterTag::Brand(id) => write!(f, "brand #{id}"),
            FilterTag::Color(color) => write!(f, "color: {color}"),
            FilterTag::Spec { field, value } => write!(f, "{field}: {value}"),
            FilterTag::MinPrice(price) => write!(f, "from {}", display_price(*price)),
            FilterTag::MaxPrice(price) => write!(f, "up to {}", display_price(*price)),
            FilterTag::Search(term) => write!(f, "\"{term}\""),
        }
    }
}

impl FilterState {
    pub fn for_category(slug: impl Into<String>) -> Self {
        Self {
            category: Some(slug.into()),
            ..Default::default()
        }
    }

    pub fn for_search(term: impl AsRef<str>) -> Self {
        let mut state = Self::default();
        state.set_search(term);
        state
    }

    /// Set the search term; blank terms clear the search.
    pub fn set_search(&mut self, term: impl AsRef<str>) {
        let term = term.as_ref().trim();
        self.search = (!term.is_empty()).then(|| term.to_string());
    }

    /// Add a selection. Returns `false` if it was already active.
    pub fn apply(&mut self, tag: FilterTag) -> bool {
        match tag {
            FilterTag::Brand(id) => self.brands.insert(id),
            FilterTag::Color(color) => self.colors.insert(color),
            FilterTag::Spec { field, value } => self.specs.entry(field).or_default().insert(value),
            FilterTag::MinPrice(price) => self.min_price.replace(price) != Some(price),
            FilterTag::MaxPrice(price) => self.max_price.replace(price) != Some(price),
            FilterTag::Search(term) => {
                let previous = self.search.clone();
                self.set_search(term);
                previous != self.search
            },
        }
    }

    /// Remove a selection. Returns `false` if it was not active.
    pub fn remove(&mut self, tag: &FilterTag) -> bool {
        match tag {
            FilterTag::Brand(id) => self.brands.remove(id),
            FilterTag::Color(color) => self.colors.remove(color),
            FilterTag::Spec { field, value } => {
                let Some(values) = self.specs.get_mut(field) else {
                    return false;
                };
                let removed = values.remove(value);
                if values.is_empty() {
                    self.specs.remove(field);
                }
                removed
            },
            FilterTag::MinPrice(_) => self.min_price.take().is_some(),
            FilterTag::MaxPrice(_) => self.max_price.take().is_some(),
            FilterTag::Search(_) => self.search.take().is_some(),
        }
    }

    /// Flip a selection on or off.
    pub fn toggle(&mut self, tag: FilterTag) {
        if !self.remove(&tag) {
            self.apply(tag);
        }
    }

    /// All active selections, in a stable order.
    pub fn tags(&self) -> Vec<FilterTag> {
        let mut tags = Vec::new();
        tags.extend(self.search.iter().cloned().map(FilterTag::Search));
        tags.extend(self.brands.iter().copied().map(FilterTag::Brand));
        tags.extend(self.colors.iter().cloned().map(FilterTag::Color));
        for (field, values) in &self.specs {
            tags.extend(values.iter().map(|value| FilterTag::Spec {
                field: field.clone(),
                value: value.clone(),
            }));
        }
        tags.extend(self.min_price.map(FilterTag::MinPrice));
        tags.extend(self.max_price.map(FilterTag::MaxPrice));
        tags
    }

    /// Remove every selection except category and sort order.
    pub fn clear(&mut self) {
        *self = Self {
            category: self.category.take(),
            sort: self.sort,
            ..Default::default()
        };
    }

    pub fn reset_page(&mut self) {
        self.page = FIRST_PAGE;
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// The endpoint a query is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Endpoint {
    #[display("products/")]
    Listing,
    #[display("products/search/")]
    Search,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Listing => "products/",
            Endpoint::Search => "products/search/",
        }
    }
}

/// A fully constructed catalog request.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    endpoint: Endpoint,
    /// Parameters shared by every endpoint, in construction order.
    filters: Vec<(String, String)>,
    category: Option<String>,
    search: Option<String>,
    page: NonZeroU32,
    /// Products the API serves per page, used to derive the page count.
    page_size: u64,
}

impl CatalogQuery {
    /// Build the query for `state`.
    ///
    /// `defaults` are the price bounds of the active category;
    /// price filters equal to them are left out.
    pub fn build(state: &FilterState, defaults: &PriceRange) -> Self {
        let mut filters = Vec::new();
        let mut push = |key: &str, value: String| filters.push((key.to_string(), value));

        push("page", state.page.to_string());
        push("ordering", state.sort.ordering().to_string());

        if !state.brands.is_empty() {
            push("brand", state.brands.iter().join(","));
        }

        if let Some(min) = state.min_price.filter(|min| differs(*min, defaults.min)) {
            push("min_price", price_param(min));
        }
        if let Some(max) = state.max_price.filter(|max| differs(*max, defaults.max)) {
            push("max_price", price_param(max));
        }

        for (field, values) in &state.specs {
            if values.is_empty() {
                continue;
            }
            push(&format!("{SPEC_PARAM_PREFIX}{field}"), values.iter().join(","));
        }

        if !state.colors.is_empty() {
            push("color", state.colors.iter().join(","));
        }

        let endpoint = if state.search.is_some() {
            Endpoint::Search
        } else {
            Endpoint::Listing
        };

        Self {
            endpoint,
            filters,
            category: state.category.clone(),
            search: state.search.clone(),
            page: state.page,
            page_size: PAGE_SIZE,
        }
    }

    /// Use a page size other than [PAGE_SIZE] to count pages.
    ///
    /// The API decides how many products a page holds, this has to match it.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn page(&self) -> NonZeroU32 {
        self.page
    }

    /// The same query for another page.
    pub fn with_page(&self, page: NonZeroU32) -> Self {
        let mut query = self.clone();
        query.page = page;
        for (key, value) in query.filters.iter_mut() {
            if key == "page" {
                *value = page.to_string();
            }
        }
        query
    }

    /// Parameters for the endpoint selected by [Self::endpoint].
    ///
    /// A search sends the term as `q`, a category listing as `category_slug`.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = self.filters.clone();
        match (&self.search, &self.category) {
            (Some(term), _) => params.push(("q".to_string(), term.clone())),
            (None, Some(slug)) => params.push(("category_slug".to_string(), slug.clone())),
            (None, None) => {},
        }
        params
    }

    /// Parameters for the direct request to the listing endpoint.
    ///
    /// The listing endpoint takes the search term as `search`.
    pub fn direct_params(&self) -> Vec<(String, String)> {
        let mut params = self.filters.clone();
        if let Some(slug) = &self.category {
            params.push(("category_slug".to_string(), slug.clone()));
        }
        if let Some(term) = &self.search {
            params.push(("search".to_string(), term.clone()));
        }
        params
    }

    /// Look up a parameter of [Self::params].
    pub fn param(&self, key: &str) -> Option<String> {
        self.params()
            .into_iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }
}

fn differs(value: f64, default: f64) -> bool {
    (value - default).abs() > f64::EPSILON
}

/// Format a price the way the API expects it, without a trailing `.0`.
fn price_param(price: f64) -> String {
    if price.fract() == 0.0 && price.abs() < 1e15 {
        format!("{}", price as i64)
    } else {
        format!("{price}")
    }
}

/// Format a price for display: whole amounts without decimals,
/// anything else with two.
pub fn display_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use proptest::strategy::Union;
    use storefront_test_utils::proptest::{alphanum_string, btree_set, optional_string};

    use super::*;

    /// Filter states as built from the UI: trimmed search terms,
    /// no spec fields without values, whole-number prices.
    fn filter_state_strategy() -> impl Strategy<Value = FilterState> {
        (
            optional_string(8),
            prop::collection::btree_set(1..100_u64, 0..4),
            btree_set(6, 3),
            prop::collection::btree_map(
                alphanum_string(6),
                prop::collection::btree_set(alphanum_string(6), 1..3),
                0..3,
            ),
            prop::option::of(0..1000_u32),
            prop::option::of(1000..100000_u32),
            optional_string(10),
            prop::sample::select(SortKey::ALL.to_vec()),
        )
            .prop_map(
                |(category, brands, colors, specs, min_price, max_price, search, sort)| {
                    FilterState {
                        category,
                        brands,
                        colors,
                        specs,
                        min_price: min_price.map(f64::from),
                        max_price: max_price.map(f64::from),
                        search,
                        sort,
                        page: FIRST_PAGE,
                    }
                },
            )
    }

    /// Tags that are not active in `state`.
    ///
    /// Generated brand ids and values are outside the ranges
    /// [filter_state_strategy] draws from, so they never collide.
    fn unselected_tag_strategy(state: &FilterState) -> BoxedStrategy<FilterTag> {
        let mut options = vec![
            (100..200_u64).prop_map(FilterTag::Brand).boxed(),
            "[a-z]{7,9}".prop_map(FilterTag::Color).boxed(),
            (alphanum_string(6), "[a-z]{7,9}")
                .prop_map(|(field, value)| FilterTag::Spec { field, value })
                .boxed(),
        ];
        if state.min_price.is_none() {
            options.push(
                (0..1000_u32)
                    .prop_map(|price| FilterTag::MinPrice(price.into()))
                    .boxed(),
            );
        }
        if state.max_price.is_none() {
            options.push(
                (1000..100000_u32)
                    .prop_map(|price| FilterTag::MaxPrice(price.into()))
                    .boxed(),
            );
        }
        if state.search.is_none() {
            options.push(alphanum_string(10).prop_map(FilterTag::Search).boxed());
        }
        Union::new(options).boxed()
    }

    const DEFAULTS: PriceRange = PriceRange {
        min: 0.0,
        max: 100000.0,
    };

    fn pairs(params: &[(&str, &str)]) -> Vec<(String, String)> {
        params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn sort_keys_map_to_ordering() {
        let expected = [
            (SortKey::Popularity, "-popularity_score"),
            (SortKey::Newest, "-created_at"),
            (SortKey::PriceAscending, "price"),
            (SortKey::PriceDescending, "-price"),
        ];
        for (key, ordering) in expected {
            let state = FilterState {
                sort: key,
                ..Default::default()
            };
            let query = CatalogQuery::build(&state, &DEFAULTS);
            assert_eq!(query.param("ordering").as_deref(), Some(ordering));
        }
        assert_eq!(SortKey::default().ordering(), "-popularity_score");
    }

    #[test]
    fn sort_key_parses_display() {
        for key in SortKey::ALL {
            assert_eq!(key.to_string().parse::<SortKey>().unwrap(), key);
        }
        assert_eq!("price_desc".parse::<SortKey>().unwrap(), SortKey::PriceDescending);
        assert!("cheapest".parse::<SortKey>().is_err());
    }

    #[test]
    fn category_page_without_filters() {
        let query = CatalogQuery::build(&FilterState::for_category("mobiles"), &DEFAULTS);

        assert_eq!(query.endpoint(), Endpoint::Listing);
        assert_eq!(
            query.params(),
            pairs(&[
                ("page", "1"),
                ("ordering", "-popularity_score"),
                ("category_slug", "mobiles"),
            ])
        );
    }

    #[test]
    fn search_goes_to_search_endpoint() {
        let query = CatalogQuery::build(&FilterState::for_search("samsung"), &DEFAULTS);

        assert_eq!(query.endpoint(), Endpoint::Search);
        assert_eq!(query.param("q").as_deref(), Some("samsung"));
        assert_eq!(query.param("category_slug"), None);
        assert_eq!(
            query.direct_params(),
            pairs(&[
                ("page", "1"),
                ("ordering", "-popularity_score"),
                ("search", "samsung"),
            ])
        );
    }

    #[test]
    fn search_within_category_keeps_category_for_direct_request() {
        let mut state = FilterState::for_category("mobiles");
        state.set_search("  galaxy ");
        let query = CatalogQuery::build(&state, &DEFAULTS);

        assert_eq!(query.param("q").as_deref(), Some("galaxy"));
        assert!(query
            .direct_params()
            .contains(&("category_slug".to_string(), "mobiles".to_string())));
    }

    #[test]
    fn blank_search_is_no_search() {
        let query = CatalogQuery::build(&FilterState::for_search("   "), &DEFAULTS);
        assert_eq!(query.endpoint(), Endpoint::Listing);
        assert_eq!(query.param("q"), None);
    }

    #[test]
    fn all_filters_in_order() {
        let mut state = FilterState::for_category("laptops");
        state.page = NonZeroU32::new(3).unwrap();
        state.sort = SortKey::PriceAscending;
        state.apply(FilterTag::Brand(7));
        state.apply(FilterTag::Brand(2));
        state.apply(FilterTag::MinPrice(500.0));
        state.apply(FilterTag::MaxPrice(1999.99));
        state.apply(FilterTag::Spec {
            field: "ram".to_string(),
            value: "8GB".to_string(),
        });
        state.apply(FilterTag::Spec {
            field: "ram".to_string(),
            value: "16GB".to_string(),
        });
        state.apply(FilterTag::Color("red".to_string()));
        state.apply(FilterTag::Color("black".to_string()));

        let query = CatalogQuery::build(&state, &DEFAULTS);
        assert_eq!(
            query.params(),
            pairs(&[
                ("page", "3"),
                ("ordering", "price"),
                ("brand", "2,7"),
                ("min_price", "500"),
                ("max_price", "1999.99"),
                ("spec_ram", "16GB,8GB"),
                ("color", "black,red"),
                ("category_slug", "laptops"),
            ])
        );
    }

    #[test]
    fn price_bounds_equal_to_defaults_are_omitted() {
        let state = FilterState {
            min_price: Some(DEFAULTS.min),
            max_price: Some(DEFAULTS.max),
            ..Default::default()
        };
        let query = CatalogQuery::build(&state, &DEFAULTS);
        assert_eq!(query.param("min_price"), None);
        assert_eq!(query.param("max_price"), None);

        let state = FilterState {
            min_price: Some(DEFAULTS.min),
            max_price: Some(2500.0),
            ..Default::default()
        };
        let query = CatalogQuery::build(&state, &DEFAULTS);
        assert_eq!(query.param("min_price"), None);
        assert_eq!(query.param("max_price").as_deref(), Some("2500"));
    }

    #[test]
    fn with_page_rewrites_page_param() {
        let query = CatalogQuery::build(&FilterState::for_category("mobiles"), &DEFAULTS);
        let next = query.with_page(NonZeroU32::new(2).unwrap());
        assert_eq!(next.param("page").as_deref(), Some("2"));
        assert_eq!(next.param("category_slug").as_deref(), Some("mobiles"));
        assert_eq!(next.page().get(), 2);
    }

    #[test]
    fn prices_are_displayed_and_sent_differently() {
        assert_eq!(display_price(19999.0), "19999");
        assert_eq!(display_price(9.5), "9.50");
        assert_eq!(price_param(9.5), "9.5");
        assert_eq!(price_param(500.0), "500");
    }

    #[test]
    fn tags_list_active_selections() {
        let mut state = FilterState::for_search("phone");
        state.apply(FilterTag::Brand(1));
        state.apply(FilterTag::MaxPrice(300.0));
        assert_eq!(state.tags(), vec![
            FilterTag::Search("phone".to_string()),
            FilterTag::Brand(1),
            FilterTag::MaxPrice(300.0),
        ]);
        assert_eq!(FilterTag::MaxPrice(300.0).to_string(), "up to 300");
        assert_eq!(FilterTag::MinPrice(9.5).to_string(), "from 9.50");
    }

    #[test]
    fn clear_keeps_category_and_sort() {
        let mut state = FilterState::for_category("mobiles");
        state.sort = SortKey::Newest;
        state.apply(FilterTag::Color("red".to_string()));
        state.page = NonZeroU32::new(4).unwrap();
        state.clear();

        assert_eq!(state, FilterState {
            category: Some("mobiles".to_string()),
            sort: SortKey::Newest,
            ..Default::default()
        });
    }

    #[test]
    fn removing_last_spec_value_drops_field() {
        let mut state = FilterState::default();
        let tag = FilterTag::Spec {
            field: "storage".to_string(),
            value: "128GB".to_string(),
        };
        state.toggle(tag.clone());
        assert_eq!(state.specs.len(), 1);
        state.toggle(tag);
        assert!(state.specs.is_empty());
    }

    proptest! {
        #[test]
        fn apply_then_remove_restores_state(
            (state, tag) in filter_state_strategy().prop_flat_map(|state| {
                let tags = unselected_tag_strategy(&state);
                (Just(state), tags)
            })
        ) {
            let mut modified = state.clone();
            prop_assert!(modified.apply(tag.clone()));
            prop_assert!(modified.remove(&tag));
            prop_assert_eq!(modified, state);
        }

        #[test]
        fn selection_order_does_not_change_query(
            brands in proptest::collection::vec(1..50_u64, 0..6),
            colors in proptest::collection::vec("[a-z]{3,6}", 0..4),
        ) {
            let mut forward = FilterState::default();
            let mut backward = FilterState::default();
            for brand in &brands {
                forward.apply(FilterTag::Brand(*brand));
            }
            for brand in brands.iter().rev() {
                backward.apply(FilterTag::Brand(*brand));
            }
            for color in &colors {
                forward.apply(FilterTag::Color(color.clone()));
            }
            for color in colors.iter().rev() {
                backward.apply(FilterTag::Color(color.clone()));
            }
            prop_assert_eq!(
                CatalogQuery::build(&forward, &DEFAULTS),
                CatalogQuery::build(&backward, &DEFAULTS)
            );
        }
    }
}
