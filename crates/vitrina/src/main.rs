// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vitrina - multi-tenant commerce backend.
//!
//! Binary entry point: parses the CLI, loads and validates configuration,
//! then hands off to the `serve` wiring.

mod serve;

use clap::{Parser, Subcommand};

/// Vitrina - payments, wallets and WhatsApp conversations for Colombian
/// commerce.
#[derive(Parser, Debug)]
#[command(name = "vitrina", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the backend: HTTP gateway, broker consumers, retry scheduler.
    Serve,
    /// Load the configuration, report problems, and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (config, relaxed) = match vitrina_config::load_and_validate() {
        Ok(loaded) => loaded,
        Err(issues) => {
            vitrina_config::render_issues(&issues);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) | None => {
            if let Err(e) = serve::run_serve(config, relaxed).await {
                eprintln!("vitrina: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            for issue in &relaxed {
                eprintln!("vitrina: relaxed: {issue}");
            }
            println!("vitrina: configuration ok");
        }
    }
}
