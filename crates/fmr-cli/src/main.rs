use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fmr")]
#[command(about = "FortiManager firewall policy reconciler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Firewall policy and ADOM object reconciliation
    Policy {
        #[command(subcommand)]
        cmd: PolicyCmd,
    },

    /// Policy package operations
    Package {
        #[command(subcommand)]
        cmd: PackageCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> task...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PolicyCmd {
    /// Converge one object to the task file's desired state. Prints the
    /// outcome (or failure) as JSON on stdout.
    Apply {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Report what would be sent without writing anything
        #[arg(long, default_value_t = false)]
        check: bool,

        /// present | absent | param-absent (overrides reconcile.state)
        #[arg(long)]
        state: Option<String>,

        /// Skip the workspace lock/commit/unlock bracket
        #[arg(long, default_value_t = false)]
        no_lock: bool,
    },
}

#[derive(Subcommand)]
enum PackageCmd {
    /// Install the target package onto a device and wait for the task.
    Install {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Managed device name
        #[arg(long)]
        device: String,

        /// VDOM on the device
        #[arg(long)]
        vdom: Option<String>,

        /// Wall-clock budget for the install task
        #[arg(long, default_value_t = 10)]
        wait_minutes: u64,
    },
}

fn init_tracing() {
    // stdout carries the JSON result; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    // Load .env.local for dev-time credentials. Missing file is fine.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = fmr_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Policy { cmd } => match cmd {
            PolicyCmd::Apply {
                config_paths,
                check,
                state,
                no_lock,
            } => commands::policy::apply(commands::policy::ApplyArgs {
                config_paths,
                check,
                state,
                no_lock,
            }),
        },

        Commands::Package { cmd } => match cmd {
            PackageCmd::Install {
                config_paths,
                device,
                vdom,
                wait_minutes,
            } => commands::package::install(commands::package::InstallArgs {
                config_paths,
                device,
                vdom,
                wait_minutes,
            }),
        },
    }
}
