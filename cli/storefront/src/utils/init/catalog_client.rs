use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use storefront_catalog::{
    CatalogClient,
    CatalogClientConfig,
    CatalogMockMode,
    FileTokenStore,
    SharedTokenStore,
};
use tracing::debug;

use crate::config::Config;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
/// Record all API interactions to the given path
pub const STOREFRONT_MOCK_RECORD_VAR: &str = "_STOREFRONT_MOCK_RECORD";
/// Replay API interactions from the given path
pub const STOREFRONT_MOCK_REPLAY_VAR: &str = "_STOREFRONT_MOCK_REPLAY";

/// The token store in the configured data directory.
pub fn init_token_store(config: &Config) -> SharedTokenStore {
    Arc::new(FileTokenStore::in_dir(&config.storefront.data_dir))
}

/// Initialize the catalog API client
///
/// - Record or replay API traffic if `_STOREFRONT_MOCK_RECORD` or
///   `_STOREFRONT_MOCK_REPLAY` point to a file
/// - Talk to the configured API otherwise
pub fn init_catalog_client(config: &Config) -> Result<CatalogClient, anyhow::Error> {
    let client_config = catalog_client_config(config)?;
    debug!(
        api_url = %client_config.api_url,
        mock_mode = ?client_config.mock_mode,
        "using catalog client"
    );
    CatalogClient::new(client_config, init_token_store(config))
        .context("Could not create catalog client")
}

fn catalog_client_config(config: &Config) -> Result<CatalogClientConfig, anyhow::Error> {
    let api_url = config
        .storefront
        .api_url
        .clone()
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let mut client_config = CatalogClientConfig::new(api_url);
    client_config.extra_headers = config.storefront.extra_headers.clone();

    // Pass in a bool if we are running in CI, so requests can reflect this in the headers
    if std::env::var("CI").is_ok() {
        client_config
            .extra_headers
            .insert("storefront-ci".to_string(), "true".to_string());
    };

    client_config.user_agent = Some(
        config
            .storefront
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("storefront-cli/{}", env!("CARGO_PKG_VERSION"))),
    );

    if let Some(timeout) = config.storefront.request_timeout() {
        client_config.request_timeout = timeout;
    }
    if let Some(timeout) = config.storefront.connect_timeout() {
        client_config.connect_timeout = timeout;
    }

    client_config.mock_mode = mock_mode()?;
    Ok(client_config)
}

fn mock_mode() -> Result<CatalogMockMode, anyhow::Error> {
    if let Ok(path) = std::env::var(STOREFRONT_MOCK_RECORD_VAR) {
        return Ok(CatalogMockMode::Record(PathBuf::from(path)));
    }
    if let Ok(path_str) = std::env::var(STOREFRONT_MOCK_REPLAY_VAR) {
        let path = PathBuf::from(path_str);
        if !path.exists() {
            bail!("path to mock data file doesn't exist: {}", path.display());
        }
        return Ok(CatalogMockMode::Replay(path));
    }
    Ok(CatalogMockMode::None)
}
