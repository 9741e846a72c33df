//! Command implementations.
//!
//! Every command opens one tab onto the profile file named by
//! `CARTWRIGHT_STORAGE_PATH`, so separate invocations behave like separate
//! page loads of the same browser profile.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod session;

use cartwright_core::ProductId;
use cartwright_engine::api::{ApiError, CatalogApi, HttpApi, TokenSource};
use cartwright_engine::auth::AuthError;
use cartwright_engine::catalog::{CatalogProduct, CatalogQuery};
use cartwright_engine::config::ConfigError;
use cartwright_engine::storage::{FileBackend, Profile};
use cartwright_engine::{CartError, EngineConfig, Tab};
use thiserror::Error;
use tracing::debug;

/// Catalog pages scanned when looking a product up by id.
const MAX_LOOKUP_PAGES: u32 = 50;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("{}", .0.user_message())]
    Cart(#[from] CartError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Product not found in catalog: {0}")]
    ProductNotFound(ProductId),
}

/// One tab plus the configuration it was opened with.
pub struct Context {
    pub config: EngineConfig,
    pub tab: Tab,
}

impl Context {
    /// Open a tab onto the configured profile file.
    #[must_use]
    pub fn open(config: EngineConfig) -> Self {
        let profile = Profile::new(
            FileBackend::new(&config.storage_path),
            config.event_capacity,
        );
        let tab = Tab::open(&profile, &config);
        debug!(path = %config.storage_path.display(), tab = %tab.id(), "Opened profile");
        Self { config, tab }
    }

    /// HTTP client sending the stored session token, or the configured
    /// static token when signed out.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no API URL is configured.
    pub fn api(&self) -> Result<HttpApi, ConfigError> {
        let tokens = TokenSource::Session {
            storage: self.tab.storage().clone(),
            key: self.config.keys.token.clone(),
            fallback: self.config.api_token.clone(),
        };
        HttpApi::from_config(&self.config, tokens)
    }

    /// Find a product by id, scanning catalog pages in order.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` if no scanned page lists the product.
    pub async fn find_product(
        &self,
        api: &HttpApi,
        product_id: &ProductId,
    ) -> Result<CatalogProduct, CommandError> {
        let mut query = CatalogQuery::first_page(self.config.catalog_page_size);
        while query.page_number <= MAX_LOOKUP_PAGES {
            let page = api.list_products(&query).await?;
            if page.is_empty() {
                break;
            }
            if let Some(product) = page.into_iter().find(|p| p.id().as_ref() == Some(product_id)) {
                return Ok(product);
            }
            query.page_number += 1;
        }
        Err(CommandError::ProductNotFound(product_id.clone()))
    }
}

/// Parse a product id typed on the command line.
///
/// Integers are numeric ids; anything else is a text id.
#[must_use]
pub fn parse_product_id(raw: &str) -> ProductId {
    raw.trim()
        .parse::<i64>()
        .map_or_else(|_| ProductId::from(raw.trim()), ProductId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_id() {
        assert_eq!(parse_product_id("42"), ProductId::from(42_i64));
        assert_eq!(parse_product_id(" p1 "), ProductId::from("p1"));
        assert_eq!(parse_product_id("4x"), ProductId::from("4x"));
    }
}
