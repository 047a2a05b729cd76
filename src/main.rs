//! Entry point: initialize config and logging, then hand off to the CLI.

mod cli;

use mogzi_agent::config::Config;

#[tokio::main]
async fn main() {
    if let Err(e) = Config::init() {
        eprintln!("failed to load configuration: {e}");
        std::process::exit(1);
    }

    mogzi_agent::utils::logging::init_logging(&Config::get().logging);

    if let Err(e) = cli::run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
