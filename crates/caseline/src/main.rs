// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caseline -- a conversational legal-intake engine with durable lead
//! delivery.
//!
//! Binary entry point: loads and validates configuration, then dispatches
//! to the serve/worker/ops subcommands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;

/// Caseline -- conversational legal-intake engine.
#[derive(Parser, Debug)]
#[command(name = "caseline", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the intake gateway and the lead delivery worker.
    Serve,
    /// Run only the lead delivery worker.
    Worker,
    /// Print the resolved configuration.
    Config,
    /// Delete sessions past their TTL.
    Purge,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match caseline_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            caseline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) | None => serve::run_serve(config).await,
        Some(Commands::Worker) => serve::run_worker(config).await,
        Some(Commands::Config) => print_config(config),
        Some(Commands::Purge) => serve::run_purge(config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Print the resolved configuration as TOML with secrets masked.
fn print_config(
    mut config: caseline_config::CaselineConfig,
) -> Result<(), caseline_core::CaselineError> {
    mask_secrets(&mut config);
    let rendered = toml::to_string_pretty(&config).map_err(|e| {
        caseline_core::CaselineError::Config(format!("cannot render configuration: {e}"))
    })?;
    print!("{rendered}");
    Ok(())
}

fn mask_secrets(config: &mut caseline_config::CaselineConfig) {
    for secret in [
        &mut config.anthropic.api_key,
        &mut config.leadprosper.api_key,
        &mut config.gateway.bearer_token,
    ] {
        if secret.is_some() {
            *secret = Some("[redacted]".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this -- the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = caseline_config::load_and_validate()
            .expect("default config should be valid");
        assert_eq!(config.agent.name, "caseline");
        assert_eq!(config.worker.queue_name, "lead-delivery");
    }

    #[test]
    fn secrets_are_masked_in_config_output() {
        let mut config = caseline_config::CaselineConfig::default();
        config.leadprosper.api_key = Some("lp-secret".to_string());
        config.gateway.bearer_token = Some("gw-token".to_string());

        super::mask_secrets(&mut config);
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("lp-secret"));
        assert!(!rendered.contains("gw-token"));
        assert!(rendered.contains("[redacted]"));
        // Unset secrets stay unset rather than gaining a placeholder.
        assert!(config.anthropic.api_key.is_none());
    }
}
