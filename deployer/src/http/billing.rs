//! Cloud Billing API client

use std::sync::Arc;

use async_trait::async_trait;
use cloud_api::billing::{BillingAccount, ListBillingAccountsResponse, ProjectBillingInfo};

use crate::api::BillingApi;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::http::encode;

pub struct BillingClient {
    http: Arc<HttpClient>,
}

impl BillingClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl BillingApi for BillingClient {
    async fn list_billing_accounts(&self) -> Result<Vec<BillingAccount>, DeployError> {
        let mut accounts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let path = match &page_token {
                Some(token) => format!("billingAccounts?pageToken={}", encode(token)),
                None => "billingAccounts".to_string(),
            };
            let page: ListBillingAccountsResponse = self.http.get(&path).await?;
            accounts.extend(page.billing_accounts);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(accounts)
    }

    async fn get_billing_info(&self, project_id: &str) -> Result<ProjectBillingInfo, DeployError> {
        self.http
            .get(&format!("projects/{}/billingInfo", project_id))
            .await
    }

    async fn update_billing_info(
        &self,
        project_id: &str,
        billing_account_name: &str,
    ) -> Result<ProjectBillingInfo, DeployError> {
        let body = ProjectBillingInfo {
            billing_account_name: Some(billing_account_name.to_string()),
            ..Default::default()
        };
        self.http
            .put(&format!("projects/{}/billingInfo", project_id), &body)
            .await
    }
}
