use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use sheet_sync::{dispatch, extract, sample, telemetry};

#[derive(Parser)]
#[command(name = "sheetsync", about = "Spreadsheet → record store sync CLI")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Extract(extract::ExtractCmd),
    Validate(extract::ValidateCmd),
    Apply(dispatch::ApplyCmd),
    Sample(sample::SampleCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // logs go to stderr. Respect RUST_LOG and SHEETSYNC_LOG_FORMAT
    telemetry::config::init_tracing();

    match cli.command {
        Commands::Extract(args) => extract::run(args).await?,
        Commands::Validate(args) => extract::run_validate(args).await?,
        Commands::Apply(args) => dispatch::run(args).await?,
        Commands::Sample(args) => sample::run(args)?,
    }

    Ok(())
}
