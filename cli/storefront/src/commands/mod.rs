mod auth;
mod browse;
mod click;
mod facets;
mod search;
mod vendor;

use std::fmt;

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use indoc::indoc;
use storefront_catalog::{FilterState, FilterTag, PriceRange, SortKey};
use tracing::debug;

use crate::config::Config;
use crate::utils::init::init_catalog_client;

static STOREFRONT_DESCRIPTION: &'_ str = indoc! {"
    Browse and search the product catalog of a storefront from the command line."
};

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, version, descr(STOREFRONT_DESCRIPTION))]
pub struct StorefrontCli(#[bpaf(external(storefront_args))] pub StorefrontArgs);

/// Main storefront args parser
///
/// To parse the storefront CLI, use [`StorefrontCli`] via [`storefront_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)]
pub struct StorefrontArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    #[bpaf(external(commands))]
    command: Commands,
}

impl StorefrontArgs {
    pub async fn handle(self, config: Config) -> Result<()> {
        tokio::fs::create_dir_all(&config.storefront.data_dir)
            .await
            .with_context(|| {
                format!(
                    "Could not create data directory {:?}",
                    config.storefront.data_dir
                )
            })?;

        debug!(command = ?self.command, "running command");
        match self.command {
            Commands::Browse(args) => {
                let client = init_catalog_client(&config)?;
                args.handle(config, client).await
            },
            Commands::Search(args) => {
                let client = init_catalog_client(&config)?;
                args.handle(config, client).await
            },
            Commands::Facets(args) => args.handle(init_catalog_client(&config)?).await,
            Commands::Click(args) => args.handle(init_catalog_client(&config)?).await,
            Commands::Vendor(args) => args.handle(init_catalog_client(&config)?).await,
            Commands::Auth(args) => args.handle(config),
        }
    }
}

#[derive(Bpaf, Clone)]
enum Commands {
    /// List the products of a category
    #[bpaf(command)]
    Browse(#[bpaf(external(browse::browse))] browse::Browse),

    /// Search the catalog
    #[bpaf(command)]
    Search(#[bpaf(external(search::search))] search::Search),

    /// Show the filters available for a category
    #[bpaf(command)]
    Facets(#[bpaf(external(facets::facets))] facets::Facets),

    /// Report that a search result was opened
    #[bpaf(command)]
    Click(#[bpaf(external(click::click))] click::Click),

    /// Manage the logged in vendor's store
    #[bpaf(command)]
    Vendor(#[bpaf(external(vendor::vendor_commands))] vendor::VendorCommands),

    /// Manage API credentials
    #[bpaf(command)]
    Auth(#[bpaf(external(auth::auth))] auth::Auth),
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Commands::Browse(_) => "browse",
            Commands::Search(_) => "search",
            Commands::Facets(_) => "facets",
            Commands::Click(_) => "click",
            Commands::Vendor(_) => "vendor",
            Commands::Auth(_) => "auth",
        };
        write!(f, "{name}")
    }
}

/// Filter options shared by `browse` and `search`
#[derive(Debug, Bpaf, Clone, Default)]
pub struct FilterArgs {
    /// Only show products of this brand id (repeatable)
    #[bpaf(long("brand"), argument("ID"), many)]
    pub brands: Vec<u64>,

    /// Only show products in this color (repeatable)
    #[bpaf(long("color"), argument("COLOR"), many)]
    pub colors: Vec<String>,

    /// Only show products with this specification value (repeatable)
    #[bpaf(long("spec"), argument("FIELD=VALUE"), many)]
    pub specs: Vec<String>,

    /// Lowest price to show
    #[bpaf(long("min-price"), argument("PRICE"))]
    pub min_price: Option<f64>,

    /// Highest price to show
    #[bpaf(long("max-price"), argument("PRICE"))]
    pub max_price: Option<f64>,

    /// Sort order: popularity, newest, price-asc or price-desc
    #[bpaf(long("sort"), argument("ORDER"), fallback(SortKey::default()))]
    pub sort: SortKey,

    /// Page to show
    #[bpaf(long("page"), argument("PAGE"), fallback(1))]
    pub page: u32,
}

impl FilterArgs {
    /// Apply these options on top of `state`.
    pub fn apply_to(self, mut state: FilterState) -> Result<FilterState> {
        for brand in self.brands {
            state.apply(FilterTag::Brand(brand));
        }
        for color in self.colors {
            state.apply(FilterTag::Color(color));
        }
        for spec in self.specs {
            let Some((field, value)) = spec.split_once('=') else {
                bail!("Invalid specification filter '{spec}', expected FIELD=VALUE");
            };
            state.apply(FilterTag::Spec {
                field: field.trim().to_string(),
                value: value.trim().to_string(),
            });
        }
        if let Some(price) = self.min_price {
            state.apply(FilterTag::MinPrice(price));
        }
        if let Some(price) = self.max_price {
            state.apply(FilterTag::MaxPrice(price));
        }
        if let (Some(min), Some(max)) = (state.min_price, state.max_price) {
            if min > max {
                bail!("--min-price must not be larger than --max-price");
            }
        }
        state.sort = self.sort;
        state.page = self.page.try_into().context("Pages are numbered from 1")?;
        Ok(state)
    }
}

/// Price bounds of `category`, falling back to the defaults.
pub(crate) async fn price_defaults<C: storefront_catalog::ClientTrait>(
    client: &C,
    category: Option<&str>,
) -> PriceRange {
    match client.filter_options(category).await {
        Ok(options) => options.price_range,
        Err(e) => {
            debug!(error = %e, "could not fetch price bounds, using defaults");
            storefront_catalog::DEFAULT_PRICE_RANGE
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> StorefrontArgs {
        let StorefrontCli(args) = storefront_cli().run_inner(args).unwrap();
        args
    }

    #[test]
    fn filter_args_build_state() {
        let args = FilterArgs {
            brands: vec![3, 1, 3],
            colors: vec!["Black".to_string()],
            specs: vec!["ram = 8GB".to_string(), "ram=12GB".to_string()],
            min_price: Some(100.0),
            max_price: None,
            sort: SortKey::PriceAscending,
            page: 2,
        };
        let state = args.apply_to(FilterState::for_category("mobiles")).unwrap();

        assert_eq!(state.brands.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(state.specs["ram"].len(), 2);
        assert_eq!(state.min_price, Some(100.0));
        assert_eq!(state.sort, SortKey::PriceAscending);
        assert_eq!(state.page.get(), 2);
        assert_eq!(state.category.as_deref(), Some("mobiles"));
    }

    #[test]
    fn invalid_filter_args() {
        let bad_spec = FilterArgs {
            specs: vec!["ram".to_string()],
            page: 1,
            ..Default::default()
        };
        assert!(bad_spec.apply_to(FilterState::default()).is_err());

        let zero_page = FilterArgs {
            page: 0,
            ..Default::default()
        };
        assert!(zero_page.apply_to(FilterState::default()).is_err());

        let inverted = FilterArgs {
            min_price: Some(10.0),
            max_price: Some(5.0),
            page: 1,
            ..Default::default()
        };
        assert!(inverted.apply_to(FilterState::default()).is_err());
    }

    #[test]
    fn parse_verbosity_and_command() {
        let args = parse(&["-vv", "browse", "--sort", "newest", "mobiles"]);
        assert!(matches!(args.verbosity, Verbosity::Verbose(2)));
        assert!(matches!(args.command, Commands::Browse(_)));
    }

    #[test]
    fn unknown_sort_is_rejected() {
        assert!(
            storefront_cli()
                .run_inner(&["browse", "--sort", "cheapest"][..])
                .is_err()
        );
    }
}
