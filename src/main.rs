use clap::Parser;
use tracing_subscriber::EnvFilter;

use parsagon::cli::commands::dispatch;
use parsagon::cli::config::{Cli, apply_env_overrides, load_config};

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Environment overrides the config file
    let config = apply_env_overrides(
        load_config(cli.config.as_deref()),
        std::env::var("API_BASE").ok(),
        std::env::var("PARSAGON_API_KEY").ok(),
    );
    let verbose = cli.verbose > 0;

    match dispatch(cli, &config) {
        Ok(Some(output)) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Ok(None) => {}
        Err(e) if e.is_domain() => {
            eprintln!("{}", e.to_user_string(verbose));
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
