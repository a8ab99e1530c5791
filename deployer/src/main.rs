//! rundeploy - Entry Point
//!
//! ```text
//! rundeploy deploy --project=<id> --service=<name> [--region=<r>] [--source=<path>,<path>] [--allow-unauthenticated]
//! rundeploy deploy-image --project=<id> --service=<name> --image=<ref> [--region=<r>] [--allow-unauthenticated]
//! rundeploy --version
//! ```

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use tracing::{error, info};

use rundeploy::app::options::DeployerOptions;
use rundeploy::authn::token::{GcloudToken, StaticToken, TokenProvider};
use rundeploy::deploy::Deployer;
use rundeploy::errors::DeployError;
use rundeploy::http::registry::ClientRegistry;
use rundeploy::logs::{init_logging, LogLevel, LogOptions};
use rundeploy::models::{DeployOutcome, DeploymentRequest, SourceFile, SourceSpecification};
use rundeploy::progress::NoProgress;
use rundeploy::storage::layout::StorageLayout;
use rundeploy::storage::settings::Settings;
use rundeploy::utils::version_info;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();
    let mut command = None;

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        } else if command.is_none() {
            command = Some(arg.clone());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {}", e),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file, if there is one
    let layout = StorageLayout::default();
    let settings_file = layout.settings_file();
    let settings = if settings_file.exists().await {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        Settings::default()
    };

    // Initialize logging
    let log_level = match cli_args.get("log-level").map(|level| level.parse::<LogLevel>()) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
        None => settings.log_level,
    };
    let log_options = LogOptions {
        log_level,
        json_format: settings.json_logs || cli_args.contains_key("json-logs"),
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = match command.as_deref() {
        Some("deploy") => run(&cli_args, &settings, false).await,
        Some("deploy-image") => run(&cli_args, &settings, true).await,
        Some(other) => Err(DeployError::Validation(format!("Unknown command {:?}", other))),
        None => Err(DeployError::Validation(
            "Usage: rundeploy <deploy|deploy-image> --project=<id> --service=<name> [...]"
                .to_string(),
        )),
    };

    match result {
        Ok(outcome) => {
            println!(
                "{} {} ({} revision {})",
                "Deployed".green().bold(),
                outcome.uri.bold(),
                outcome.path.as_str(),
                outcome.revision_label
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Deployment failed: {}", e);
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cli_args: &HashMap<String, String>,
    settings: &Settings,
    image_only: bool,
) -> Result<DeployOutcome, DeployError> {
    let required = |key: &str| {
        cli_args
            .get(key)
            .cloned()
            .ok_or_else(|| DeployError::Validation(format!("Missing --{}=<value>", key)))
    };
    let project_id = required("project")?;
    let service_name = required("service")?;

    let source = if image_only {
        SourceSpecification::Image(required("image")?)
    } else {
        let paths = cli_args.get("source").map(String::as_str).unwrap_or(".");
        SourceSpecification::Files(
            paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(SourceFile::path)
                .collect(),
        )
    };

    let region = cli_args
        .get("region")
        .cloned()
        .unwrap_or_else(|| settings.default_region.clone());
    let request = DeploymentRequest::new(project_id, service_name, source)
        .with_region(region)
        .with_skip_invoker_check(cli_args.contains_key("allow-unauthenticated"));

    let token: Arc<dyn TokenProvider> = match StaticToken::from_env() {
        Some(token) => Arc::new(token),
        None => Arc::new(GcloudToken::new(
            cli_args.get("account").cloned().or_else(|| settings.account.clone()),
        )),
    };

    let registry = ClientRegistry::new(settings.endpoints.clone());
    let clients = registry.cloud_clients(&request.project_id, &token)?;
    let deployer = Deployer::new(clients, DeployerOptions::from_settings(settings));

    info!(
        "Deploying {} to project {} in {}",
        request.service_name, request.project_id, request.region
    );
    if image_only {
        deployer.deploy_image(&request, &NoProgress).await
    } else {
        deployer.deploy(&request, &NoProgress).await
    }
}
