//! Billing attachment

use cloud_api::billing::BillingAccount;

use crate::api::CloudClients;
use crate::errors::DeployError;
use crate::progress::Progress;
use crate::retry::{retry_on_permission_denied, RetryOptions};

/// Why billing could not be attached automatically
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingProblem {
    NoAccounts,
    MultipleAccounts(usize),
    AccountClosed(String),
}

impl std::fmt::Display for BillingProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingProblem::NoAccounts => write!(
                f,
                "billing is not enabled and no billing accounts are available; create one and link it to the project"
            ),
            BillingProblem::MultipleAccounts(count) => write!(
                f,
                "billing is not enabled and multiple billing accounts ({}) are available; link one to the project manually",
                count
            ),
            BillingProblem::AccountClosed(name) => write!(
                f,
                "billing is not enabled and the only billing account {} is not open",
                name
            ),
        }
    }
}

/// Pick the account to attach, if exactly one open account exists
pub fn select_billing_account(
    accounts: &[BillingAccount],
) -> Result<&BillingAccount, BillingProblem> {
    match accounts {
        [] => Err(BillingProblem::NoAccounts),
        [account] if account.open => Ok(account),
        [account] => Err(BillingProblem::AccountClosed(account.name.clone())),
        _ => Err(BillingProblem::MultipleAccounts(accounts.len())),
    }
}

/// Attach the sole open billing account when billing is disabled
pub async fn ensure_billing(
    clients: &CloudClients,
    project_id: &str,
    retry: &RetryOptions,
    progress: &Progress<'_>,
) -> Result<(), DeployError> {
    let info = retry_on_permission_denied("get billing info", retry, || {
        clients.billing.get_billing_info(project_id)
    })
    .await
    .map_err(|e| DeployError::Preflight(format!("Failed to read billing info: {}", e)))?;

    if info.billing_enabled {
        progress.debug(format!("Billing enabled for project {}", project_id));
        return Ok(());
    }

    progress.warn(format!(
        "Billing is not enabled for project {}, looking for a billing account...",
        project_id
    ));
    let accounts = retry_on_permission_denied("list billing accounts", retry, || {
        clients.billing.list_billing_accounts()
    })
    .await
    .map_err(|e| DeployError::Preflight(format!("Failed to list billing accounts: {}", e)))?;

    let account = select_billing_account(&accounts)
        .map_err(|problem| DeployError::Preflight(format!("Project {}: {}", project_id, problem)))?;

    progress.info(format!(
        "Linking billing account {} ({}) to project {}...",
        account.display_name, account.name, project_id
    ));
    let updated = retry_on_permission_denied("link billing account", retry, || {
        clients.billing.update_billing_info(project_id, &account.name)
    })
    .await
    .map_err(|e| DeployError::Preflight(format!("Failed to link billing account: {}", e)))?;

    if !updated.billing_enabled {
        return Err(DeployError::Preflight(format!(
            "Linked billing account {} but billing is still not enabled for project {}",
            account.name, project_id
        )));
    }

    progress.info(format!("Billing enabled for project {}", project_id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str, open: bool) -> BillingAccount {
        BillingAccount {
            name: name.to_string(),
            display_name: name.to_string(),
            open,
        }
    }

    #[test]
    fn test_select_billing_account() {
        assert_eq!(select_billing_account(&[]), Err(BillingProblem::NoAccounts));
        assert_eq!(
            select_billing_account(&[account("a", true), account("b", true)]),
            Err(BillingProblem::MultipleAccounts(2))
        );
        assert_eq!(
            select_billing_account(&[account("a", false)]),
            Err(BillingProblem::AccountClosed("a".to_string()))
        );
        assert_eq!(
            select_billing_account(&[account("a", true)]).unwrap().name,
            "a"
        );
    }

    #[test]
    fn test_problem_messages_are_distinct() {
        let messages = [
            BillingProblem::NoAccounts.to_string(),
            BillingProblem::MultipleAccounts(2).to_string(),
            BillingProblem::AccountClosed("x".to_string()).to_string(),
        ];
        assert!(messages[0].contains("no billing accounts"));
        assert!(messages[1].contains("multiple billing accounts"));
        assert!(messages[2].contains("not open"));
    }
}
