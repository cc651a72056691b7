//! Program Dashboard
//! A desktop dashboard showing live status and logs of supervisor-managed programs.

mod gui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use program_dashboard::{
    ClientSettings, DashboardClient, DashboardConfig, DeliveryMode, HttpBackend, Locale,
};

#[derive(Debug, Parser)]
#[command(name = "program-dashboard", version, about)]
struct Cli {
    /// Config file (defaults to dashboard.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Supervisor base URL, overriding the config file
    #[arg(long)]
    base_url: Option<String>,

    /// Log delivery mode
    #[arg(long, value_enum)]
    delivery: Option<DeliveryMode>,

    #[arg(long, value_enum)]
    locale: Option<Locale>,

    /// Refresh once, print the page as HTML and exit
    #[arg(long)]
    snapshot: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("dashboard-io")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let backend = match HttpBackend::new(&config.base_url) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "Failed to create HTTP client");
            return ExitCode::FAILURE;
        }
    };
    info!(base_url = %config.base_url, delivery = %config.delivery, "connecting to supervisor");

    let client = DashboardClient::new(
        backend,
        ClientSettings::from(&config),
        runtime.handle().clone(),
    );

    if cli.snapshot {
        let refreshed = runtime.block_on(client.refresh_all());
        println!("{}", client.page().read(|doc| doc.render_html()));
        client.teardown();
        return if refreshed {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    match gui::run(&config, client, runtime.handle().clone()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Window failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "program_dashboard=debug"
    } else {
        "program_dashboard=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn load_config(cli: &Cli) -> Result<DashboardConfig, program_dashboard::ConfigError> {
    let path = cli.config.clone().unwrap_or_else(DashboardConfig::config_path);
    let mut config = DashboardConfig::load(&path)?;

    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(delivery) = cli.delivery {
        config.delivery = delivery;
    }
    if let Some(locale) = cli.locale {
        config.locale = locale;
    }
    config.validate()?;
    Ok(config)
}
