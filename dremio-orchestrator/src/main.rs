use anyhow::Result;
use clap::Parser;
use dremio_common::config::{
    AwsSettings, ConfigFile, CustomProjectConfig, DescribeConfig, GatewaySettings,
    StackDeployConfig,
};
use dremio_orchestrator::cli::{Cli, Command};
use dremio_orchestrator::workflows::{deploy, describe, project, upgrade};
use dremio_orchestrator::{GatewayClient, Pacing, Session};
use dremio_providers::aws::AwsProvider;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Upgrade { use_cf, config } => {
            let conf = load(&config)?;
            // Validate before touching AWS.
            let plan = upgrade::UpgradePlan::from_config(use_cf, &conf)?;
            let (provider, gateway) = connect(&conf).await?;
            let session = Session::new(&provider, &gateway, Pacing::default());
            print_json(&upgrade::upgrade(&session, &plan).await?)
        }
        Command::Describe { config } => {
            let conf = load(&config)?;
            let cfg = DescribeConfig::from_config(&conf)?;
            let (provider, gateway) = connect(&conf).await?;
            let session = Session::new(&provider, &gateway, Pacing::default());
            print_json(&describe::describe(&session, &cfg).await?)
        }
        Command::Deploy { config } => {
            let conf = load(&config)?;
            let cfg = StackDeployConfig::from_config(&conf)?;
            let (provider, gateway) = connect(&conf).await?;
            let session = Session::new(&provider, &gateway, Pacing::default());
            print_json(&deploy::deploy(&session, &cfg).await?)
        }
        Command::CreateProject { config } => {
            let conf = load(&config)?;
            let cfg = CustomProjectConfig::from_config(&conf)?;
            let (provider, gateway) = connect(&conf).await?;
            let session = Session::new(&provider, &gateway, Pacing::default());
            let outcome = project::create_custom_project(&session, &cfg).await?;
            print_json(&outcome)?;
            match outcome.status {
                dremio_orchestrator::ProjectStatus::Succeeded => Ok(()),
                other => anyhow::bail!("Project was not created: {:?}", other),
            }
        }
    }
}

fn load(path: &Path) -> Result<ConfigFile> {
    tracing::info!("Reading config from {}", path.display());
    Ok(ConfigFile::load(path)?)
}

async fn connect(conf: &ConfigFile) -> Result<(AwsProvider, GatewayClient)> {
    let provider = AwsProvider::connect(&AwsSettings::from_config(conf)?).await?;
    let gateway = GatewayClient::new(&GatewaySettings::from_config(conf)?)?;
    Ok((provider, gateway))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
