use anyhow::Result;
use burn_load::domain::ProfileKind;
use burn_load::driver::ReqwestProbe;
use burn_load::{config, runner, server, telemetry};
use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use telemetry::init_tracing;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "burn-load")]
#[command(about = "Ramp virtual users against a CPU burn endpoint to exercise autoscaling", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (missing file means built-in defaults)
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a load profile against the burn endpoint
    Run {
        /// Profile to run (defaults to profile.name from the configuration)
        #[arg(long, value_enum)]
        profile: Option<ProfileKind>,

        /// Full request URL, overriding the profile default
        #[arg(long, env = config::TARGET_ENV)]
        target: Option<String>,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Serve the burn endpoint
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;

    match cli.command {
        Command::Run {
            profile,
            target,
            json,
        } => {
            let plan = cfg.run_plan(profile, target.as_deref())?;
            let probe = Arc::new(ReqwestProbe::new(cfg.http.timeout(), &cfg.http.user_agent)?);

            let summary = runner::execute(plan, probe, telemetry::shutdown_token()).await?;
            summary.log();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary.report())?);
            }

            let code = summary.exit_code();
            if code != 0 {
                info!(exit_code = code, "thresholds crossed");
                std::process::exit(code);
            }
        }
        Command::Serve => server::serve(&cfg.server, telemetry::shutdown_token()).await?,
    }

    Ok(())
}
