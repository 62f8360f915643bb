mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wizard_core::platform::{InstalledObject, ObjectType};
use wizard_core::prelude::*;
use wizard_core::session::{InstallOutcome, UnavailableReason};

use prompt::{PrefilledSetup, SetupFlow, parse_granularity, parse_sync_time};

/// Output format for list-style commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Table,
    /// JSON output
    Json,
}

#[derive(Parser)]
#[command(name = "wizard")]
#[command(about = "Install the premium app into a Genesys Cloud org", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to wizard.toml (defaults to ./wizard.toml, then the global config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Platform environment, e.g. mypurecloud.com (remembered for later steps)
    #[arg(long, global = true)]
    environment: Option<String>,

    /// UI language tag, e.g. en-us (remembered for later steps)
    #[arg(long, global = true)]
    language: Option<String>,

    /// OAuth access token for the platform API
    #[arg(long, env = "WIZARD_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    /// Run against in-memory doubles instead of the real services
    #[arg(long, global = true)]
    dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the app can be installed or already is
    Status,

    /// Create the backend account (custom setup step)
    Setup(SetupArgs),

    /// Provision every object in the manifest
    Install,

    /// Remove every object the wizard created
    Uninstall,

    /// Print the portal address to open once installation is complete
    Finish,

    /// Show the effective manifest
    Manifest,
}

#[derive(Args)]
struct SetupArgs {
    /// Primary login provider
    #[arg(long)]
    primary_auth: Option<String>,

    /// Secondary login providers (can be specified multiple times)
    #[arg(long = "secondary-auth")]
    secondary_auth: Vec<String>,

    /// Start of the first data sync (YYYY-MM-DDTHH:MM)
    #[arg(long, value_parser = parse_sync_time)]
    sync_time: Option<chrono::NaiveDateTime>,

    /// Minutes between fetches
    #[arg(long)]
    fetch_interval: Option<u32>,

    /// Sync granularity such as 12H or 30M
    #[arg(long)]
    granularity: Option<String>,

    /// Prompt for values not given as flags
    #[arg(short, long)]
    interactive: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wizard=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest => cmd_manifest(&cli.global),
        Commands::Status => cmd_status(&build_session(&cli.global)?, cli.global.format).await,
        Commands::Setup(args) => cmd_setup(&build_session(&cli.global)?, args).await,
        Commands::Install => cmd_install(&build_session(&cli.global)?, &cli.global).await,
        Commands::Uninstall => {
            cmd_uninstall(&build_session(&cli.global)?, cli.global.format).await
        }
        Commands::Finish => cmd_finish(&build_session(&cli.global)?),
    }
}

fn load_config(global: &GlobalArgs) -> Result<(WizardConfig, Manifest)> {
    let store = ConfigStore::discover(global.config.as_deref())?;
    if let Some(path) = store.config_path() {
        tracing::debug!(path = %path.display(), "using config");
    }
    let config = store.load()?;
    let manifest = config.load_manifest()?;
    Ok((config, manifest))
}

fn build_session(global: &GlobalArgs) -> Result<WizardSession> {
    let (config, manifest) = load_config(global)?;

    let store = if global.dry_run {
        SessionStore::in_memory(&config.app_name)
    } else {
        let state_dir = config.resolve_state_dir()?;
        SessionStore::new(Arc::new(FileStore::in_dir(&state_dir)), &config.app_name)
    };

    let locale = Locale::resolve(
        &config,
        &store,
        global.language.as_deref(),
        global.environment.as_deref(),
    )?;

    let (platform, backend, token): (Arc<dyn PlatformApi>, Arc<dyn AccountBackend>, String) =
        if global.dry_run {
            (
                Arc::new(dry_run_platform(&config.app_name)),
                Arc::new(MemoryBackend::new()),
                "dry-run".to_string(),
            )
        } else {
            let Some(token) = global.access_token.clone() else {
                bail!("An access token is required; pass --access-token or set WIZARD_ACCESS_TOKEN");
            };
            let platform = HttpPlatformClient::new(&locale.base_path(), token.clone())
                .context("Failed to create platform client")?;
            let backend = HttpBackend::new(config.backend_url()?)
                .context("Failed to create backend client")?;
            (Arc::new(platform), Arc::new(backend), token)
        };

    Ok(WizardSession::new(
        config,
        locale,
        Arc::new(manifest),
        platform,
        backend,
        store,
        token,
    ))
}

/// An org with the premium app enabled and nothing installed yet.
fn dry_run_platform(app_name: &str) -> MemoryPlatform {
    let platform = MemoryPlatform::default();
    platform.seed(
        ObjectType::IntegrationType,
        InstalledObject::new(app_name, app_name),
    );
    platform.seed(
        ObjectType::Integration,
        InstalledObject::new("premium-app", app_name)
            .with_field("integrationType", json!({ "id": app_name })),
    );
    platform
}

fn print_progress(message: &str) {
    println!("  {}", console::style(message).dim());
}

fn cmd_manifest(global: &GlobalArgs) -> Result<()> {
    let (_, manifest) = load_config(global)?;

    let unknown = manifest.unknown_keys();
    for key in &unknown {
        eprintln!("warning: manifest key '{key}' has no provisioning module and will be ignored");
    }

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        OutputFormat::Table => {
            for (kind, items) in manifest.known_entries() {
                println!("{} ({})", kind.label(), kind.key());
                for item in items {
                    match &item.finalize {
                        Some(strategy) => println!("  - {} [finally: {strategy:?}]", item.name),
                        None => println!("  - {}", item.name),
                    }
                }
            }
            if !unknown.is_empty() {
                println!();
                println!("Ignored keys: {}", unknown.join(", "));
            }
        }
    }
    Ok(())
}

async fn cmd_status(session: &WizardSession, format: OutputFormat) -> Result<()> {
    let status = session.status().await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Table => {
            println!("Signed in as {}", status.user.name);
            println!(
                "Environment: {} ({})",
                session.locale().environment,
                session.locale().language
            );
            match &status.state {
                EntryState::AlreadyInstalled { url } => {
                    println!("✓ Already installed");
                    println!("  Open {url}");
                }
                EntryState::ReadyToInstall {
                    previous_attempt_failed,
                } => {
                    println!("Ready to install");
                    if *previous_attempt_failed {
                        println!("  The previous attempt failed; run `wizard install` to retry.");
                    }
                }
                EntryState::ProductUnavailable { reason } => match reason {
                    UnavailableReason::NotEnabled => {
                        println!("✗ The premium app is not enabled for this org");
                    }
                    UnavailableReason::MissingRole => {
                        println!("✗ You need the employee role to install the premium app");
                    }
                },
            }
        }
    }
    Ok(())
}

async fn cmd_setup(session: &WizardSession, args: SetupArgs) -> Result<()> {
    let granularity = args
        .granularity
        .as_deref()
        .map(parse_granularity)
        .transpose()?;

    let prefilled = PrefilledSetup {
        primary_auth_method: args.primary_auth,
        secondary_auth_methods: (!args.secondary_auth.is_empty()).then_some(args.secondary_auth),
        sync_time: args.sync_time,
        fetch_interval: args.fetch_interval,
        granularity,
        yes: args.yes,
    };

    let form = if args.interactive {
        let result = SetupFlow::new(prefilled).collect()?;
        if !result.confirmed {
            println!("Cancelled.");
            return Ok(());
        }
        result.form
    } else {
        prefilled.into_form()
    };

    let provisioning = session.custom_setup(&form).await?;
    println!("✓ Account created");
    println!("  Portal: https://{}", provisioning.portal_address);
    Ok(())
}

async fn cmd_install(session: &WizardSession, global: &GlobalArgs) -> Result<()> {
    // A dry run starts from an empty store, so do the setup step first.
    if global.dry_run && session.store().get(StorageKey::SessionKey)?.is_none() {
        session.custom_setup(&SetupForm::default()).await?;
    }

    let progress: &dyn ProgressReporter = match global.format {
        OutputFormat::Table => &print_progress,
        OutputFormat::Json => &TracingProgress,
    };
    let outcome = session.install(progress).await?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OutputFormat::Table => print_install_outcome(&outcome),
    }
    Ok(())
}

fn print_install_outcome(outcome: &InstallOutcome) {
    println!("✓ Installation complete");
    for kind in ObjectKind::ALL {
        let Some(items) = outcome.installed.get(kind) else {
            continue;
        };
        for (name, summary) in items {
            println!("  {} {} ({})", kind.label(), name, summary.id);
        }
    }
    if outcome.finalized > 0 {
        println!("  Final steps run: {}", outcome.finalized);
    }
    match &outcome.portal_address {
        Some(portal) if outcome.integration_updated => {
            println!("  Premium app now opens {portal}");
        }
        Some(portal) => println!("  Portal: {portal}"),
        None => println!("  No portal address; run `wizard setup` first."),
    }
}

async fn cmd_uninstall(session: &WizardSession, format: OutputFormat) -> Result<()> {
    let progress: &dyn ProgressReporter = match format {
        OutputFormat::Table => &print_progress,
        OutputFormat::Json => &TracingProgress,
    };
    let report = session.uninstall(progress).await?;

    match format {
        OutputFormat::Json => {
            let removed: Vec<&str> = report.removed.iter().map(ObjectKind::key).collect();
            let failures: Vec<String> = report.failures.iter().map(ToString::to_string).collect();
            let value = json!({ "removed": removed, "failures": failures });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            for kind in &report.removed {
                println!("✓ Removed {}", kind.label());
            }
            for failure in &report.failures {
                println!("✗ {failure}");
            }
        }
    }

    if !report.is_clean() {
        bail!("{} module(s) could not be removed", report.failures.len());
    }
    Ok(())
}

fn cmd_finish(session: &WizardSession) -> Result<()> {
    let portal = session.finish()?;
    println!("✓ Installation finished");
    println!("  Open {portal}");
    Ok(())
}
