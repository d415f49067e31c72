use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use packvault::backends::Registries;
use packvault::config::{self, Config};
use packvault::managers::logging::{self, LoggingConfig};
use packvault::managers::model::PipelineManager;
use packvault::managers::notification::format_duration;
use packvault::managers::scheduler;
use packvault::stages::encryptor;
use packvault::utils::{self, RealExecutor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "packvault")]
#[command(about = "Dump, archive, compress, encrypt and upload backups", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "packvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one model now, or every enabled model one after another
    Perform {
        /// Model to run (defaults to all enabled models)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List configured models
    List,

    /// Show the registered backend types
    Types,

    /// Validate configuration file and backend types
    Validate,

    /// Show the retention ledger of a model's storage
    Packages {
        #[arg(short, long)]
        model: String,

        /// Storage entry name
        #[arg(short, long)]
        storage: String,
    },

    /// List remote files on a model's storage
    Files {
        #[arg(short, long)]
        model: String,

        #[arg(short, long)]
        storage: String,

        /// Only keys starting with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,
    },

    /// Print where a remote file can be downloaded from
    Download {
        #[arg(short, long)]
        model: String,

        #[arg(short, long)]
        storage: String,

        /// Remote key
        #[arg(short, long)]
        key: String,
    },

    /// Install crontab entries for models with a cron schedule
    Setup {
        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Run models with an `every` schedule until interrupted
    Start,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Refuse to start on a broken registration
    let registries = Arc::new(Registries::builtin().context("Failed to register backends")?);

    if let Some(Commands::Types) = cli.command {
        logging::init_console_logging();
        print_types(&registries);
        return Ok(());
    }

    let config = config::load_config(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let _log_guard = logging::init_logging(&LoggingConfig::from_global(&config.global))?;

    let manager = PipelineManager::from_config(
        &config,
        Arc::clone(&registries),
        Arc::new(RealExecutor::new()),
    );

    match cli.command.unwrap_or(Commands::List) {
        Commands::Perform { model: Some(name) } => {
            println!("Running model: {}", name);
            let report = manager.perform(&name)?;
            println!(
                "✓ Uploaded {} to {} in {}",
                report.key,
                report.storages.join(", "),
                format_duration(report.duration.as_secs())
            );
        }

        Commands::Perform { model: None } => {
            println!("Running all enabled models...");
            let results = manager.perform_all();
            let failed: Vec<&String> = results
                .iter()
                .filter(|(_, result)| result.is_err())
                .map(|(name, _)| name)
                .collect();

            for (name, result) in &results {
                match result {
                    Ok(report) => println!("  ✓ {} ({})", name, report.key),
                    Err(e) => println!("  ✗ {}: {}", name, e),
                }
            }

            if !failed.is_empty() {
                bail!(
                    "{} of {} models failed: {}",
                    failed.len(),
                    results.len(),
                    failed.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                );
            }
            println!("✓ All models completed successfully");
        }

        Commands::List => {
            println!("Configured models:");
            for (name, model) in manager.list_models() {
                println!("  {}", name);
                if !model.description.is_empty() {
                    println!("    Description: {}", model.description);
                }
                println!("    Enabled: {}", model.enabled);
                println!("    Schedule: {}", model.schedule);
                let databases: Vec<&str> = model.databases.iter().map(|d| d.label()).collect();
                if !databases.is_empty() {
                    println!("    Databases: {}", databases.join(", "));
                }
                let storages: Vec<&str> = model.storages.iter().map(|s| s.label()).collect();
                println!("    Storages: {}", storages.join(", "));
                println!();
            }
        }

        Commands::Types => unreachable!("handled before config loading"),

        Commands::Validate => validate(&config, &manager)?,

        Commands::Packages { model, storage } => {
            let packages = manager.packages(&model, &storage)?;
            if packages.is_empty() {
                println!("No packages recorded for {} on {}", model, storage);
            }
            for package in &packages {
                println!(
                    "{}  {}",
                    package.created_at.format("%Y-%m-%d %H:%M:%S"),
                    package.file_key
                );
                for key in &package.file_keys {
                    println!("    {}", key);
                }
            }
        }

        Commands::Files {
            model,
            storage,
            prefix,
        } => {
            let files = manager.with_storage(&model, &storage, |s| s.list(&prefix))?;
            for file in &files {
                let modified = file
                    .modified
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:>12}  {}  {}", file.size, modified, file.name);
            }
            println!("Total: {} files", files.len());
        }

        Commands::Download {
            model,
            storage,
            key,
        } => {
            let locator = manager.with_storage(&model, &storage, |s| s.download(&key))?;
            println!("{}", locator);
        }

        Commands::Setup { dry_run } => setup(&cli.config, &config, &manager, dry_run)?,

        Commands::Start => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(scheduler::start(Arc::new(manager)))?;
        }
    }

    Ok(())
}

fn print_types(registries: &Registries) {
    println!("Databases: {}", registries.databases.list_types().join(", "));
    println!("Storages: {}", registries.storages.list_types().join(", "));
    println!("Notifiers: {}", registries.notifiers.list_types().join(", "));
    println!("Encryptors: {}", encryptor::supported_types().join(", "));
}

fn validate(config: &Config, manager: &PipelineManager) -> Result<()> {
    let mut problems = Vec::new();

    for model in manager.list_models().values() {
        for (section, name, kind) in manager.registries().unknown_types(model) {
            problems.push(format!(
                "{}: {} '{}' has unknown type '{}'",
                model.name, section, name, kind
            ));
        }
        if let Some(encrypt) = &model.encrypt_with {
            if !encryptor::supported_types().contains(&encrypt.kind.as_str()) {
                problems.push(format!(
                    "{}: encrypt_with has unknown type '{}'",
                    model.name, encrypt.kind
                ));
            }
        }
    }

    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  ✗ {}", problem);
        }
        bail!("Configuration has {} problem(s)", problems.len());
    }

    println!("Configuration is valid!");
    println!("Models: {}", config.models.len());
    println!(
        "Enabled: {}",
        manager.list_models().values().filter(|m| m.enabled).count()
    );
    Ok(())
}

fn setup(config_path: &Path, config: &Config, manager: &PipelineManager, dry_run: bool) -> Result<()> {
    println!("=== Setting up packvault ===\n");
    if dry_run {
        println!("DRY RUN MODE - No changes will be made\n");
    }

    println!("[1/2] Creating directories...");
    let directories = [
        config::expand_tilde(&config.global.state_directory),
        config::expand_tilde(&config.global.log_directory),
        config::expand_tilde(&config.global.workspace),
    ];
    for dir in &directories {
        if dry_run {
            println!("  [DRY RUN] Would create: {}", dir.display());
        } else {
            match std::fs::create_dir_all(dir) {
                Ok(()) => println!("  ✓ {}", dir.display()),
                Err(e) => eprintln!("  ✗ Failed to create {}: {}", dir.display(), e),
            }
        }
    }
    println!();

    println!("[2/2] Installing cron jobs...");
    let config_path = std::fs::canonicalize(config_path).unwrap_or_else(|_| config_path.to_path_buf());
    let log_directory = config::expand_tilde(&config.global.log_directory);

    for (name, model) in manager.list_models() {
        let cron = model.schedule.cron.as_deref().filter(|_| model.enabled);
        let Some(schedule) = cron else {
            if dry_run {
                println!("  - Skipping {} (no cron schedule)", name);
            } else if let Err(e) = utils::cron::remove_cron_job(name) {
                eprintln!("  ✗ Failed to clean up job for {}: {:#}", name, e);
            }
            continue;
        };

        if !utils::cron::validate_cron_schedule(schedule) {
            eprintln!("  ✗ Invalid cron schedule for {}: {}", name, schedule);
            continue;
        }

        match utils::cron::add_cron_job(name, schedule, &config_path, &log_directory, dry_run) {
            Ok(()) => println!("  ✓ Added job for '{}' ({})", name, schedule),
            Err(e) => eprintln!("  ✗ Failed to add job for {}: {:#}", name, e),
        }
    }

    println!("\n=== Setup complete ===");
    Ok(())
}
