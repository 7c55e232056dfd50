//! Browse an OpenChirp location tree as a read-only filesystem.
use std::path::PathBuf;

use clap::Parser;
use secrecy::SecretString;
use tracing::error;

mod app_config;
mod daemon;
mod remote;
mod trc;

use crate::app_config::{Config, Overrides};
use crate::trc::Trc;

#[derive(Parser)]
#[command(
    version,
    about = "Mount the OpenChirp location tree as a read-only filesystem."
)]
struct Args {
    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to a chirp-fs config TOML."
    )]
    config_path: Option<PathBuf>,

    #[arg(short, long, help = "Directory to mount the filesystem on.")]
    mount_point: Option<PathBuf>,

    #[arg(short, long, help = "OpenChirp user id.")]
    user_id: Option<String>,

    #[arg(
        long,
        env = "OPENCHIRP_USER_TOKEN",
        hide_env_values = true,
        help = "OpenChirp user token."
    )]
    user_token: Option<String>,
}

/// Main entry point for the application.
fn main() {
    let args = Args::parse();

    // Errors use eprintln since tracing isn't initialized yet.
    let config = Config::load(args.config_path.as_deref())
        .unwrap_or_else(|e| {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        })
        .with_overrides(Overrides {
            mount_point: args.mount_point,
            user_id: args.user_id,
            user_token: args.user_token.map(SecretString::from),
        });
    if let Err(error_messages) = config.validate() {
        eprintln!("Configuration is invalid.");
        for msg in &error_messages {
            eprintln!(" - {msg}");
        }
        std::process::exit(1);
    }

    if let Err(e) = Trc::default().init() {
        eprintln!(
            "Failed to initialize logging. Without logging, we can't provide any useful error \
             messages, so we have to exit: {e}"
        );
        std::process::exit(1);
    }

    if let Err(e) = daemon::spawn(config) {
        error!("chirp-fs failed: {e}");
        std::process::exit(1);
    }
}
