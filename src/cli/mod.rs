//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod model_list;
pub mod provider_list;
pub mod render;
pub mod settings;


use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::cli::chat::{read_piped_stdin, run_one_shot, ChatSession};
use crate::cli::model_list::{list_all_models, list_models};
use crate::cli::provider_list::list_providers;
use crate::cli::render::print_error;
use crate::cli::settings::{run_set, run_unset};
use crate::core::cancellation::{install_signal_handler, CancellationCoordinator};
use crate::core::capability::CapabilityClassifier;
use crate::core::config::data::Config;
use crate::core::discovery::DiscoveryResult;
use crate::core::dispatch::Dispatcher;
use crate::core::error::ConfigurationError;
use crate::core::providers::{ClientBinding, EnvCredentials, ProviderRegistry};
use crate::utils::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Chat with LLM providers from the terminal")]
#[command(
    long_about = "Parley sends conversations to OpenAI-compatible LLM providers and renders the \
reply in the terminal as it arrives.\n\n\
With prompt words or piped input, asks once and exits; otherwise starts an \
interactive session.\n\n\
Credentials are read from each provider's environment variable (for example \
OPENAI_API_KEY or GROQ_API_KEY). Run 'parley -p' to see which are set.\n\n\
Interactive commands:\n\
  !q                  Quit\n\
  !c                  Clear the conversation\n\
  !m [model]          List models, or switch model\n\
  !o [provider|model] List every provider's models, or switch\n\
  !x <command>        Run a shell command and keep its output as context\n\
  Ctrl+C              Cancel the running request or command"
)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Ask this question and exit
    #[arg(trailing_var_arg = true, value_name = "PROMPT")]
    pub prompt: Vec<String>,

    /// Provider to use, or list providers if no provider specified
    #[arg(short = 'p', long, value_name = "PROVIDER", num_args = 0..=1, default_missing_value = "")]
    pub provider: Option<String>,

    /// Model to use, or list the provider's models if no model specified
    #[arg(short = 'm', long, value_name = "MODEL", num_args = 0..=1, default_missing_value = "")]
    pub model: Option<String>,

    /// Use provider|model, or list every provider's models if none specified
    #[arg(
        short = 'o',
        long = "all-models",
        value_name = "PROVIDER|MODEL",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub all_models: Option<String>,

    /// Regional endpoint for providers that offer several
    #[arg(long, value_name = "URL")]
    pub region: Option<String>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key (may be several words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

/// Which provider, model and endpoint a run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Flags win over the config file. A stored region only applies to the
/// provider it was chosen for.
pub fn resolve_selection(args: &Args, config: &Config) -> Result<Selection, String> {
    let (provider, model) = match non_empty(&args.all_models) {
        Some(pair) => {
            let parsed = DiscoveryResult::parse(pair)
                .ok_or_else(|| format!("expected provider|model, got '{pair}'"))?;
            (parsed.provider, parsed.model)
        }
        None => (
            non_empty(&args.provider)
                .unwrap_or(config.provider())
                .to_string(),
            non_empty(&args.model).unwrap_or(config.model()).to_string(),
        ),
    };

    let base_url = match non_empty(&args.region) {
        Some(region) => Some(region.to_string()),
        None if provider.eq_ignore_ascii_case(config.provider()) => config.base_url.clone(),
        None => None,
    };

    Ok(Selection {
        provider,
        model,
        base_url,
    })
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main(args))
}

fn exit_with_configuration_error(err: &ConfigurationError) -> ! {
    print_error(&format!("❌ {err}"));
    std::process::exit(err.exit_code());
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match &args.command {
        Some(Commands::Set { key, value }) => {
            if let Err(err) = run_set(key, value) {
                err.print();
                std::process::exit(err.exit_code());
            }
            return Ok(());
        }
        Some(Commands::Unset { key }) => {
            if let Err(err) = run_unset(key) {
                err.print();
                std::process::exit(err.exit_code());
            }
            return Ok(());
        }
        None => {}
    }

    let config = Config::load()?;
    let registry = ProviderRegistry::from_config(&config);
    if let Err(err) = registry.validate() {
        exit_with_configuration_error(&err);
    }
    let classifier = match CapabilityClassifier::from_config(&config.capability_rules) {
        Ok(classifier) => Arc::new(classifier),
        Err(err) => exit_with_configuration_error(&err),
    };

    let client = reqwest::Client::new();
    let selection = resolve_selection(&args, &config)?;

    if args.provider.as_deref() == Some("") {
        list_providers(&registry, &EnvCredentials, config.provider());
        return Ok(());
    }
    if args.all_models.as_deref() == Some("") {
        return list_all_models(&client, &registry, &EnvCredentials).await;
    }
    if args.model.as_deref() == Some("") {
        return list_models(
            &client,
            &registry,
            &EnvCredentials,
            &selection.provider,
            &selection.model,
        )
        .await;
    }

    let binding = registry
        .require(&selection.provider)
        .and_then(|descriptor| {
            ClientBinding::bind(descriptor, &EnvCredentials, selection.base_url.as_deref())
        })
        .unwrap_or_else(|err| exit_with_configuration_error(&err));

    let coordinator = Arc::new(CancellationCoordinator::new());
    install_signal_handler(Arc::clone(&coordinator));

    let dispatcher = Dispatcher::new(client, classifier, coordinator);
    let mut session = ChatSession::new(
        dispatcher,
        registry,
        binding,
        selection.model,
        config.system_prompt(),
    );

    let prompt = args.prompt.join(" ");
    let piped = read_piped_stdin().await?;
    if !prompt.trim().is_empty() || piped.is_some() {
        return run_one_shot(&mut session, &prompt, piped).await;
    }
    session.run_interactive().await
}
