use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod core;
mod counting;
mod matching;
mod parsing;
mod utils;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("tfseq=debug,info")
    } else {
        EnvFilter::new("tfseq=info")
    };

    // Logs go to stderr so that summaries on stdout stay machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Count(args) => {
            cli::count::run(args, cli.format)?;
        }
    }

    Ok(())
}
