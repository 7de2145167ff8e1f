//! Git remote helper for repositories on the local filesystem.
//!
//! git runs this helper for `local::<path>` and `local://<path>` URLs and
//! talks to it over stdin/stdout. The helper hands each connection to
//! `git upload-pack` or `git receive-pack` running against the target
//! repository.
//!
//! ## Installation
//!
//! ```bash
//! cargo install --path tools/git-remote-local
//! git clone local::/srv/git/project.git
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` or pass `-v` to see them.

use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod helper;

use helper::LocalHelper;

/// Git remote helper for local repositories
#[derive(Parser, Debug)]
#[command(name = "git-remote-local")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the remote, or its URL when git was given a URL directly
    remote: String,

    /// URL of the remote
    url: Option<String>,

    /// Git directory of the local repository
    #[arg(long, env = "GIT_DIR", default_value = ".git")]
    git_dir: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries the protocol
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("gitremote={log_level},git_remote_local={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = gitremote::Config::new(args.remote, args.url).with_dir(args.git_dir);

    tracing::info!(
        remote = %config.remote,
        url = %config.url,
        git_dir = %config.dir.display(),
        "Starting remote helper"
    );

    let helper = match LocalHelper::from_url(&config.url) {
        Ok(helper) => helper,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted");
                cancel.cancel();
            }
        }
    });

    let result = gitremote::run_stdio(config, helper, cancel).await;

    // A pending read on stdin would keep the runtime from shutting down.
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
