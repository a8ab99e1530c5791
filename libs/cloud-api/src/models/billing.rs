//! Cloud Billing API v1

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAccount {
    /// `billingAccounts/012345-567890-ABCDEF`
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub open: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBillingAccountsResponse {
    #[serde(default)]
    pub billing_accounts: Vec<BillingAccount>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBillingInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_account_name: Option<String>,

    #[serde(default)]
    pub billing_enabled: bool,
}
