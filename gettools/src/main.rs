use anyhow::{Context, Result};
use clap::Parser;
use gettools::{Config, Outcome, Pipeline};

/// Downloads the darwin guest tools from the latest fusion release into a
/// `tools` folder next to this executable.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {}

fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;
    tracing_log::LogTracer::init().ok();
    let env = std::env::var("GETTOOLS_LOG").unwrap_or_else(|_| "error".into());
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(env))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    log_panics::init();
    let _args = Args::parse();

    let config = Config::new().context("failed to locate the tools directory")?;
    let mut pipeline = Pipeline::new(config);
    match pipeline.run().context("failed to fetch the darwin tools")? {
        Outcome::Primary | Outcome::Fallback => Ok(()),
        Outcome::ToolsNotFound => std::process::exit(1),
    }
}
