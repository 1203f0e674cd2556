use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_DESCRIBE_CONFIG: &str = "aws_client.conf";

#[derive(Parser, Debug)]
#[command(name = "dremio-aws", version, about = "Lifecycle automation for Dremio AWS Edition")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Provision a new gateway/coordinator and restart the project on it
    Upgrade {
        /// Provision through CloudFormation (true) or launch an AMI directly (false)
        #[arg(value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
        use_cf: bool,
        config: PathBuf,
    },
    /// Print coordinator, auth type and engines of a running cluster as JSON
    Describe {
        #[arg(default_value = DEFAULT_DESCRIBE_CONFIG)]
        config: PathBuf,
    },
    /// Create a gateway stack and wait until it answers
    Deploy { config: PathBuf },
    /// Create project storage and register a custom project on a gateway
    CreateProject { config: PathBuf },
}
