use anyhow::{Result, bail};
use bpaf::Bpaf;
use storefront_catalog::ClientTrait;
use tracing::instrument;

use crate::utils::message;

// Manage the logged in vendor's store
#[derive(Clone, Debug, Bpaf)]
pub enum VendorCommands {
    /// Show the store profile and its approval status
    #[bpaf(command)]
    Status,

    /// Mark a product as featured
    #[bpaf(command)]
    Feature {
        /// Remove the featured mark instead
        #[bpaf(long)]
        unset: bool,

        /// Id of the product
        #[bpaf(positional("product-id"))]
        product_id: u64,
    },
}

impl VendorCommands {
    #[instrument(name = "vendor", skip_all)]
    pub async fn handle<C: ClientTrait>(self, client: C) -> Result<()> {
        let profile = client.vendor_profile().await?;

        match self {
            VendorCommands::Status => {
                message::plain(format!(
                    "Store '{}' (#{}) is {}",
                    profile.store_name, profile.id, profile.status
                ));
                if let Some(email) = &profile.email {
                    message::plain(format!("Contact: {email}"));
                }
                Ok(())
            },
            VendorCommands::Feature { unset, product_id } => {
                if !profile.is_approved() {
                    bail!(
                        "Store '{}' is {}, products can only be featured once it is approved",
                        profile.store_name,
                        profile.status
                    );
                }
                let featured = !unset;
                client.set_featured(product_id, featured).await?;
                if featured {
                    message::updated(format!("Product {product_id} is now featured"));
                } else {
                    message::updated(format!("Product {product_id} is no longer featured"));
                }
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use storefront_catalog::{MockClient, VendorProfile, VendorStatus};

    use super::*;
    use crate::utils::message::history::History;

    fn profile(status: VendorStatus) -> VendorProfile {
        VendorProfile {
            id: 7,
            store_name: "Phone Hub".to_string(),
            email: None,
            status,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn status_is_printed() {
        let history = History::global();
        history.clear();

        let client = MockClient::new();
        client.push(|r| r.vendor_profile.push_back(Ok(profile(VendorStatus::Approved))));
        VendorCommands::Status.handle(client).await.unwrap();

        assert_eq!(&history.messages(), &["Store 'Phone Hub' (#7) is approved"]);
    }

    #[tokio::test]
    async fn pending_store_cannot_feature() {
        let client = MockClient::new();
        client.push(|r| r.vendor_profile.push_back(Ok(profile(VendorStatus::Pending))));

        let err = VendorCommands::Feature {
            unset: false,
            product_id: 3,
        }
        .handle(client.clone())
        .await
        .unwrap_err();

        assert!(err.to_string().contains("is pending"), "{err}");
        assert_eq!(client.called(), vec!["vendor_profile"]);
    }

    #[tokio::test]
    async fn feature_is_unset() {
        let client = MockClient::new();
        client.push(|r| {
            r.vendor_profile.push_back(Ok(profile(VendorStatus::Approved)));
            r.set_featured.push_back(Ok(()));
        });

        VendorCommands::Feature {
            unset: true,
            product_id: 3,
        }
        .handle(client.clone())
        .await
        .unwrap();

        let calls = client.responses.lock().unwrap().calls.clone();
        assert_eq!(calls[1], ("set_featured", vec![
            ("product_id".to_string(), "3".to_string()),
            ("is_featured".to_string(), "false".to_string()),
        ]));
    }
}
