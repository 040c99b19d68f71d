//! gardener-extension-runtime-gvisor - installs gVisor on Gardener shoot worker pools

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod error;
mod exit_codes;
mod logging;

use logging::LogFormat;

#[derive(Parser)]
#[command(name = "gardener-extension-runtime-gvisor")]
#[command(version)]
#[command(about = "Gardener extension installing the gVisor container runtime", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ContainerRuntime, health check and heartbeat controllers
    Run {
        /// Controller configuration file
        #[arg(short, long, env = "CONTROLLER_CONFIG")]
        config: Option<PathBuf>,

        /// Maximum number of concurrent reconciles
        #[arg(long, env = "MAX_CONCURRENT_RECONCILES")]
        max_concurrent_reconciles: Option<u16>,

        /// Only reconcile on request via the operation annotation
        #[arg(long)]
        respect_operation_annotation: bool,

        /// Namespace of the heartbeat lease; enables the heartbeat
        #[arg(long, env = "LEADER_ELECTION_NAMESPACE")]
        heartbeat_namespace: Option<String>,

        /// Interval between heartbeat renewals (e.g. 30s)
        #[arg(long, value_parser = humantime_duration)]
        heartbeat_renew_interval: Option<Duration>,

        /// Directory holding `charts/internal/...` instead of the built-in charts
        #[arg(long)]
        chart_root: Option<PathBuf>,
    },

    /// Render the gVisor charts for one worker pool locally
    Template {
        /// Worker pool name
        #[arg(short, long)]
        worker_pool: String,

        /// Kubernetes version of the shoot
        #[arg(short = 'k', long, default_value = "1.31.0")]
        kubernetes_version: String,

        /// Folder the runtime binaries are installed into
        #[arg(long, default_value = "/var/bin/containerruntimes")]
        binary_path: String,

        /// Worker pool selector labels (key=value)
        #[arg(short = 'l', long = "match-label")]
        match_labels: Vec<String>,

        /// File holding a GVisorConfiguration provider config
        #[arg(short = 'p', long)]
        provider_config: Option<PathBuf>,

        /// Installation image instead of the one from the image vector
        #[arg(long)]
        image: Option<String>,

        /// Directory holding `charts/internal/...` instead of the built-in charts
        #[arg(long)]
        chart_root: Option<PathBuf>,
    },
}

fn humantime_duration(s: &str) -> std::result::Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.log_format);

    let result = match cli.command {
        Commands::Run {
            config,
            max_concurrent_reconciles,
            respect_operation_annotation,
            heartbeat_namespace,
            heartbeat_renew_interval,
            chart_root,
        } => commands::run::run(commands::run::RunArgs {
            config,
            max_concurrent_reconciles,
            respect_operation_annotation,
            heartbeat_namespace,
            heartbeat_renew_interval,
            chart_root,
        }),

        Commands::Template {
            worker_pool,
            kubernetes_version,
            binary_path,
            match_labels,
            provider_config,
            image,
            chart_root,
        } => commands::template::run(&commands::template::TemplateArgs {
            worker_pool,
            kubernetes_version,
            binary_path,
            match_labels,
            provider_config,
            image,
            chart_root,
        }),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
