//! Federation Synth - Standalone Binary
//!
//! Synthesizes a stack definition into a provisioning plan, and exposes the
//! trust policy and name builders for inspection.
//!
//! ## Usage
//!
//! ```bash
//! # Synthesize a stack definition to stdout
//! federation-synth synth --config stack.json
//!
//! # Write the plan for another account
//! AWS_ACCOUNT_ID=123456789012 federation-synth synth --config stack.json --out plan.json
//!
//! # Print the trust policy for a service account
//! federation-synth trust-policy --issuer https://oidc.eks.us-east-1.amazonaws.com/id/ABC \
//!     --account-id 123456789012 --namespace kube-system --service-account external-dns
//!
//! # Budget a role name
//! federation-synth name prod external-dns role
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use federation_engine::federation::naming::{NameBudgeter, MAX_NAME_LENGTH};
use federation_engine::federation::{
    ResolvedIssuer, SubjectBinding, TrustPolicyBuilder, DEFAULT_AUDIENCE,
};
use federation_engine::graph::Expr;
use federation_engine::{compose, StackConfig};

/// Federation Synth - OIDC workload identity federation as a provisioning plan
#[derive(Parser, Debug)]
#[command(name = "federation-synth", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "FEDERATION_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize a stack definition into a plan
    Synth {
        /// Stack definition (JSON)
        #[arg(long, short = 'c', env = "FEDERATION_CONFIG")]
        config: PathBuf,

        /// Write the plan here instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Print the trust policy for one subject
    TrustPolicy {
        /// OIDC issuer URL
        #[arg(long)]
        issuer: String,

        /// Account the provider lives in
        #[arg(long, env = "AWS_ACCOUNT_ID")]
        account_id: String,

        /// Service account namespace
        #[arg(long, default_value = "default")]
        namespace: String,

        /// Service account name
        #[arg(long, conflicts_with = "repository")]
        service_account: Option<String>,

        /// GitHub repository (e.g., "Org/Repo")
        #[arg(long)]
        repository: Option<String>,

        /// Token audience
        #[arg(long, default_value = DEFAULT_AUDIENCE)]
        audience: String,
    },

    /// Budget a name built from components
    Name {
        /// Components joined with '-'
        #[arg(required = true)]
        components: Vec<String>,

        /// Maximum length
        #[arg(long, default_value_t = MAX_NAME_LENGTH)]
        limit: usize,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match cli.command {
        Command::Synth { config, out } => synth(&config, out.as_deref()).await,
        Command::TrustPolicy {
            issuer,
            account_id,
            namespace,
            service_account,
            repository,
            audience,
        } => {
            let subject = match (service_account, repository) {
                (Some(name), None) => SubjectBinding::service_account(namespace, name),
                (None, Some(repo)) => {
                    let (owner, name) = repo
                        .split_once('/')
                        .context("Repository must be given as <owner>/<name>")?;
                    SubjectBinding::repository(owner, name)
                }
                _ => bail!("Pass exactly one of --service-account or --repository"),
            };

            let issuer = ResolvedIssuer::resolve(issuer);
            let provider_arn = issuer.provider_arn(&Expr::literal(account_id));
            let document = TrustPolicyBuilder::new(issuer, audience).build(provider_arn, &subject);

            println!(
                "{}",
                serde_json::to_string_pretty(&document).context("Failed to render trust policy")?
            );
            Ok(())
        }
        Command::Name { components, limit } => {
            println!("{}", NameBudgeter::new(limit).name(&components));
            Ok(())
        }
    }
}

async fn synth(config_path: &Path, out: Option<&Path>) -> Result<()> {
    info!(config = %config_path.display(), "🚀 Synthesizing federation stack");

    let mut config = StackConfig::from_file(config_path)?;
    config.apply_env();

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let composition = compose(&config, base_dir)?;
    let plan = composition.synthesize()?;
    let rendered = plan.to_json_pretty().context("Failed to serialize plan")?;

    match out {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                path = %path.display(),
                resources = plan.apply_order.len(),
                "✅ Plan written"
            );
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
