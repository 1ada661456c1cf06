//! Vendor profile and approval status.
//!
//! The API is inconsistent about the casing of the approval status
//! (`"Approved"`, `"approved"`, `"APPROVED"`). It is normalized here so
//! callers only ever match on [VendorStatus].

use std::convert::Infallible;
use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};

#[derive(Debug, Clone, PartialEq, Eq, Display, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VendorStatus {
    #[default]
    #[display("pending")]
    Pending,
    #[display("approved")]
    Approved,
    #[display("rejected")]
    Rejected,
    #[display("suspended")]
    Suspended,
    /// A status this client does not know, kept verbatim.
    #[display("{_0}")]
    Other(String),
}

impl FromStr for VendorStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "" => VendorStatus::Pending,
            "approved" | "active" => VendorStatus::Approved,
            "rejected" | "declined" => VendorStatus::Rejected,
            "suspended" | "blocked" => VendorStatus::Suspended,
            _ => VendorStatus::Other(s.trim().to_string()),
        };
        Ok(status)
    }
}

impl From<String> for VendorStatus {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<VendorStatus> for String {
    fn from(value: VendorStatus) -> Self {
        value.to_string()
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorProfile {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,
    #[serde(alias = "business_name", alias = "shop_name", alias = "name")]
    pub store_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "approval_status", alias = "vendor_status")]
    #[serde_as(as = "DefaultOnError")]
    pub status: VendorStatus,
}

impl VendorProfile {
    pub fn is_approved(&self) -> bool {
        self.status == VendorStatus::Approved
    }
}
