//! Tandem demo binary
//!
//! Usage: `tandem-demo [run.json]`. Prints the run report as JSON.

use tandem_cli::RunConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tandem_logging::init(tandem_logging::DEFAULT_DIRECTIVES);

    let config = match std::env::args().nth(1) {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    tracing::info!("Starting Tandem demo");
    let report = tandem_cli::run(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
