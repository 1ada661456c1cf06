use anyhow::{Context, Result};
use bpaf::Bpaf;
use storefront_catalog::{SharedTokenStore, TokenStore, Tokens};
use tracing::instrument;

use crate::config::Config;
use crate::utils::init::init_token_store;
use crate::utils::message;

// Storefront API credentials
#[derive(Clone, Debug, Bpaf)]
pub enum Auth {
    /// Store API tokens obtained from the storefront
    #[bpaf(command("set-token"))]
    SetToken {
        /// Access token sent with every request
        #[bpaf(long, argument("TOKEN"))]
        access: String,

        /// Refresh token used to renew an expired access token
        #[bpaf(long, argument("TOKEN"))]
        refresh: Option<String>,
    },

    /// Forget the stored tokens
    #[bpaf(command)]
    Logout,

    /// Print your current login status
    #[bpaf(command)]
    Status,
}

impl Auth {
    #[instrument(name = "auth", skip_all)]
    pub fn handle(self, config: Config) -> Result<()> {
        self.run(init_token_store(&config))
    }

    fn run(self, store: SharedTokenStore) -> Result<()> {
        let tokens = store.load().context("Could not read stored tokens")?;

        match self {
            Auth::SetToken { access, refresh } => {
                store
                    .save(&Tokens {
                        access_token: Some(access),
                        refresh_token: refresh,
                        ..tokens
                    })
                    .context("Could not store tokens")?;
                message::updated("Tokens stored");
            },
            Auth::Logout => {
                if tokens.access_token.is_none() && tokens.refresh_token.is_none() {
                    message::warning("You are not logged in");
                    return Ok(());
                }
                store
                    .clear_credentials()
                    .context("Could not remove stored tokens")?;
                message::updated("Logout successful");
            },
            Auth::Status => match (&tokens.access_token, &tokens.refresh_token) {
                (Some(_), Some(_)) => message::plain("You are logged in."),
                (Some(_), None) => message::plain(
                    "You are logged in. Without a refresh token you will have to log in again once the session expires.",
                ),
                (None, Some(_)) => message::plain(
                    "Your session expired, it will be renewed with the next request.",
                ),
                (None, None) => message::warning("You are not logged in."),
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use storefront_catalog::MemoryTokenStore;

    use super::*;
    use crate::utils::message::history::History;

    fn store(tokens: Tokens) -> SharedTokenStore {
        Arc::new(MemoryTokenStore::new(tokens))
    }

    #[test]
    fn set_token_keeps_promo_code() {
        let store = store(Tokens {
            guest_promo_code: Some("WELCOME".to_string()),
            ..Default::default()
        });

        Auth::SetToken {
            access: "a".to_string(),
            refresh: Some("r".to_string()),
        }
        .run(store.clone())
        .unwrap();

        assert_eq!(store.load().unwrap(), Tokens {
            access_token: Some("a".to_string()),
            refresh_token: Some("r".to_string()),
            guest_promo_code: Some("WELCOME".to_string()),
        });
    }

    #[test]
    fn logout_clears_credentials() {
        let history = History::global();
        history.clear();

        let store = store(Tokens {
            access_token: Some("a".to_string()),
            refresh_token: Some("r".to_string()),
            guest_promo_code: None,
        });
        Auth::Logout.run(store.clone()).unwrap();

        assert_eq!(store.load().unwrap(), Tokens::default());
        assert_eq!(&history.messages(), &["✅ Logout successful"]);
    }

    #[test]
    fn status_without_tokens() {
        let history = History::global();
        history.clear();

        Auth::Status.run(store(Tokens::default())).unwrap();
        assert_eq!(&history.messages(), &["⚠️  You are not logged in."]);
    }
}
