use anyhow::Result;
use clap::Parser;
use consent::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging before anything else logs. The config level is
    // applied later, once config.yaml has been read.
    consent::debug::init_log_bridge(cli.log_level.map(Into::into));
    log::info!("Starting consent scenario host");

    // The negotiation session is single-threaded; a current-thread runtime
    // keeps it and its handlers on one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let code = runtime.block_on(consent::cli::execute(&cli));

    match code {
        Ok(0) => Ok(()),
        Ok(code) => {
            log::info!("Exiting with code {code}");
            std::process::exit(code);
        }
        Err(e) => {
            log::error!("consent failed: {e:#}");
            Err(e)
        }
    }
}
