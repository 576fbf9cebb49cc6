//! Canopy - build and deploy orchestrator for wasm modules
//!
//! Usage:
//!   canopy build [--check]
//!   canopy install (<module> | --all) [--mode install|reinstall|upgrade]
//!   canopy deploy [<module>] [--mode reinstall]
//!   canopy status [--network <name>]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canopy_core::commands::{
    BuildCommand, BuildOptions, CommandContext, DeployCommand, DeployOptions, InstallCommand,
    InstallOptions, StatusCommand, StatusOptions, StatusReport,
};
use canopy_core::network::LOCAL_NETWORK;
use canopy_core::orchestration::{BatchReport, ModuleStatus};
use canopy_core::report::NoticeLevel;
use canopy_core::types::InstallMode;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Build and deploy wasm modules", long_about = None)]
struct Cli {
    /// Project directory containing canopy.toml (default: current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and install modules with an explicit lifecycle mode
    Install(InstallArgs),

    /// Build all modules
    Build {
        /// Compile and audit without writing artifacts
        #[arg(long)]
        check: bool,
    },

    /// Build, then install new modules and upgrade changed ones
    Deploy(DeployArgs),

    /// Show recorded module state on a network
    Status {
        /// Network to inspect
        #[arg(long, default_value = LOCAL_NETWORK)]
        network: String,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Install,
    Reinstall,
    Upgrade,
}

impl From<ModeArg> for InstallMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Install => InstallMode::Install,
            ModeArg::Reinstall => InstallMode::Reinstall,
            ModeArg::Upgrade => InstallMode::Upgrade,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DeployModeArg {
    Reinstall,
}

#[derive(Args)]
struct InstallArgs {
    /// Module to install
    #[arg(conflicts_with = "all")]
    module: Option<String>,
    /// Install every module in canopy.toml
    #[arg(long)]
    all: bool,
    /// Lifecycle action
    #[arg(long, value_enum, default_value = "install")]
    mode: ModeArg,
    /// Upgrade even if the module hash did not change
    #[arg(long)]
    upgrade_unchanged: bool,
    /// Target network name or provider URL
    #[arg(long, default_value = LOCAL_NETWORK)]
    network: String,
}

#[derive(Args)]
struct DeployArgs {
    /// Module to deploy (default: all modules)
    module: Option<String>,
    /// Force a reinstall (single module only)
    #[arg(long, value_enum)]
    mode: Option<DeployModeArg>,
    /// Upgrade even if the module hash did not change
    #[arg(long)]
    upgrade_unchanged: bool,
    /// Target network name or provider URL
    #[arg(long, default_value = LOCAL_NETWORK)]
    network: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "canopy=debug,info"
    } else {
        "canopy=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = match &cli.project_root {
        Some(root) => CommandContext::with_project_root(root)?,
        None => CommandContext::with_defaults()?,
    };

    let failed = match cli.command {
        Commands::Install(args) => run_install(ctx, args, cli.format)?,
        Commands::Build { check } => run_build(ctx, check, cli.format)?,
        Commands::Deploy(args) => run_deploy(ctx, args, cli.format)?,
        Commands::Status { network } => run_status(ctx, network, cli.format)?,
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn run_install(ctx: CommandContext, args: InstallArgs, format: OutputFormat) -> Result<bool> {
    let options = InstallOptions {
        module: args.module,
        all: args.all,
        mode: args.mode.into(),
        upgrade_unchanged: args.upgrade_unchanged,
        network: args.network,
    };
    let report = InstallCommand::new(ctx).execute(&options)?;
    print_batch(&report, format)?;
    Ok(report.has_failures())
}

fn run_build(ctx: CommandContext, check: bool, format: OutputFormat) -> Result<bool> {
    let report = BuildCommand::new(ctx).execute(&BuildOptions::default().with_check(check))?;
    print_batch(&report, format)?;
    Ok(report.has_failures())
}

fn run_deploy(ctx: CommandContext, args: DeployArgs, format: OutputFormat) -> Result<bool> {
    let options = DeployOptions {
        module: args.module,
        mode: args.mode.map(|DeployModeArg::Reinstall| InstallMode::Reinstall),
        upgrade_unchanged: args.upgrade_unchanged,
        network: args.network,
    };
    let report = DeployCommand::new(ctx).execute(&options)?;
    print_batch(&report, format)?;
    Ok(report.has_failures())
}

fn run_status(ctx: CommandContext, network: String, format: OutputFormat) -> Result<bool> {
    let report = StatusCommand::new(ctx).execute(&StatusOptions::default().with_network(network))?;
    match format {
        OutputFormat::Table => print_status_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(false)
}

fn print_batch(report: &BatchReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_batch_table(report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn print_batch_table(report: &BatchReport) {
    if let Some(network) = &report.network {
        println!("Network: {}", style(network).bold());
    }
    if report.modules.is_empty() {
        println!("No modules configured.");
        println!("Add one to canopy.toml under [modules.<name>]");
        return;
    }

    for module in &report.modules {
        let marker = if module.failed() {
            style("✗").red()
        } else {
            style("✓").green()
        };
        println!(
            "{} {:<20} {}",
            marker,
            module.name,
            status_detail(&module.status)
        );

        for notice in &module.notices {
            match notice.level {
                NoticeLevel::Info => println!("  {}", notice.message),
                NoticeLevel::Warning => println!("  {} {}", style("⚠").yellow(), notice.message),
                NoticeLevel::Error => {
                    for line in notice.message.lines() {
                        println!("  {}", style(line).red());
                    }
                }
            }
        }
    }

    let failed = report.failed().count();
    if failed > 0 {
        println!();
        println!(
            "{}",
            style(format!("{} of {} modules failed", failed, report.modules.len())).red()
        );
    }
}

fn status_detail(status: &ModuleStatus) -> String {
    match status {
        ModuleStatus::Built { hash } => format!("{} {}", status.label(), hash),
        ModuleStatus::Installed { action, hash, .. } => {
            format!("{} ({}) {}", status.label(), action, hash)
        }
        ModuleStatus::Unchanged { hash, .. } => format!("{} {}", status.label(), hash),
        ModuleStatus::BuildFailed { .. }
        | ModuleStatus::Rejected { .. }
        | ModuleStatus::InstallFailed { .. } => status.label().to_string(),
    }
}

fn print_status_table(report: &StatusReport) {
    println!("Network: {}", style(&report.network).bold());
    if report.modules.is_empty() {
        println!("No modules configured or recorded.");
        return;
    }

    println!(
        "{:<20} {:<30} {:<12} {:<10} Installed at",
        "Module", "Module id", "Hash", "Mode"
    );
    println!("{}", "-".repeat(96));
    for entry in &report.modules {
        let name = if entry.declared {
            entry.name.clone()
        } else {
            format!("{} (orphaned)", entry.name)
        };
        match &entry.record {
            Some(record) => println!(
                "{:<20} {:<30} {:<12} {:<10} {}",
                name,
                record.module_id,
                &record.installed_hash.as_str()[..12],
                record.mode,
                record.installed_at.format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!("{:<20} {}", name, style("not installed").dim()),
        }
    }
}
