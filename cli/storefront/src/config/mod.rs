use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::{Context, Result};
use config::{Config as HierarchicalConfig, Environment};
use log::debug;
use serde::{Deserialize, Serialize};
use storefront_catalog::PAGE_SIZE;
use xdg::BaseDirectories;

/// Name of storefront managed directories (config, data, cache)
pub const STOREFRONT_DIR_NAME: &str = "storefront";
pub const STOREFRONT_CONFIG_DIR_VAR: &str = "STOREFRONT_CONFIG_DIR";
pub const STOREFRONT_CONFIG_FILE: &str = "storefront.toml";
const ENV_PREFIX: &str = "STOREFRONT";

#[derive(Clone, Debug, Deserialize, Default, Serialize)]
pub struct Config {
    /// storefront configuration options
    #[serde(default, flatten)]
    pub storefront: StorefrontConfig,
}

/// Describes the configuration of the storefront CLI
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct StorefrontConfig {
    /// Base URL of the storefront REST API
    pub api_url: Option<String>,
    /// Number of products the API serves per page
    pub page_size: Option<u64>,
    /// Timeout for a whole request in seconds
    pub request_timeout_secs: Option<u64>,
    /// Timeout for establishing a connection in seconds
    pub connect_timeout_secs: Option<u64>,
    /// User agent sent with every request
    pub user_agent: Option<String>,
    /// Additional headers sent with every request
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,

    /// Directory where storefront should store ephemeral data (default:
    /// `$XDG_CACHE_HOME/storefront`)
    pub cache_dir: PathBuf,
    /// Directory where storefront should store persistent data, e.g. tokens
    /// (default: `$XDG_DATA_HOME/storefront`)
    pub data_dir: PathBuf,
    /// Directory where storefront should load its configuration file (default:
    /// `$XDG_CONFIG_HOME/storefront`)
    pub config_dir: PathBuf,
}

impl StorefrontConfig {
    pub fn page_size(&self) -> u64 {
        self.page_size.filter(|size| *size > 0).unwrap_or(PAGE_SIZE)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Creates a [Config] from the environment and config files
    ///
    /// Sources are layered, later ones override earlier ones:
    /// `/etc/storefront/storefront.toml`, files in the XDG config locations,
    /// `$STOREFRONT_CONFIG_DIR/storefront.toml` and `STOREFRONT_*` variables.
    pub fn parse() -> Result<Config> {
        let raw_config = Self::raw_config()?;
        let config: Config = raw_config
            .try_deserialize()
            .context("Could not parse config")?;
        debug!("parsed config: {config:?}");
        Ok(config)
    }

    fn raw_config() -> Result<HierarchicalConfig> {
        let storefront_dirs = BaseDirectories::with_prefix(STOREFRONT_DIR_NAME);

        let cache_dir = storefront_dirs
            .get_cache_home()
            .context("Could not determine cache directory")?;
        let data_dir = storefront_dirs
            .get_data_home()
            .context("Could not determine data directory")?;

        let config_dir = match env::var(STOREFRONT_CONFIG_DIR_VAR) {
            Ok(v) => {
                debug!("`${STOREFRONT_CONFIG_DIR_VAR}` set: {v}");
                PathBuf::from(v)
            },
            Err(_) => {
                let config_dir = storefront_dirs
                    .get_config_home()
                    .context("Could not determine config directory")?;
                debug!("`${STOREFRONT_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
                config_dir
            },
        };
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Could not create config directory: {config_dir:?}"))?;

        let mut builder = HierarchicalConfig::builder()
            .set_default("cache_dir", path_str(&cache_dir)?)?
            .set_default("data_dir", path_str(&data_dir)?)?
            // Config dir is added to the config for completeness;
            // the config file cannot change the config dir.
            .set_override("config_dir", path_str(&config_dir)?)?;

        // read from /etc
        builder = builder.add_source(
            config::File::from(
                PathBuf::from("/etc")
                    .join(STOREFRONT_DIR_NAME)
                    .join(STOREFRONT_CONFIG_FILE),
            )
            .format(config::FileFormat::Toml)
            .required(false),
        );

        // look for files in XDG_CONFIG_DIRS locations
        for file in storefront_dirs.find_config_files(STOREFRONT_CONFIG_FILE) {
            builder = builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
        }

        // Add explicit STOREFRONT_CONFIG_DIR file last
        builder = builder.add_source(
            config::File::from(config_dir.join(STOREFRONT_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // override via env variables
        let storefront_envs = env::vars()
            .filter(|(k, _)| k.starts_with(&format!("{ENV_PREFIX}_")))
            .filter(|(k, _)| k != STOREFRONT_CONFIG_DIR_VAR)
            .collect::<HashMap<_, _>>();

        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(Some(storefront_envs))
                .try_parsing(true),
        );

        Ok(builder.build()?)
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Path is not valid unicode: {path:?}"))
}
