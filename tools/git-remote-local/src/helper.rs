//! Helper implementation backed by local git processes.

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use gitremote::{
    BStr, BoxError, Capabilities, Capability, ConnectCommand, Helper, OptionError, Streams,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// URL scheme git uses when the remote is written as `local://<path>`.
const URL_SCHEME: &str = "local://";

/// Services a `connect` may ask for, and the git subcommand serving each.
const SERVICES: [(&str, &str); 3] = [
    ("git-upload-pack", "upload-pack"),
    ("git-receive-pack", "receive-pack"),
    ("git-upload-archive", "upload-archive"),
];

/// Transport options git set through `option`.
///
/// `progress` is accepted and recorded only: the service programs negotiate
/// progress output with git inside the pack protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    verbosity: u32,
    progress: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbosity: 1,
            progress: false,
        }
    }
}

/// Serves `connect` by running git's own service programs on a local path.
#[derive(Debug)]
pub struct LocalHelper {
    repo: PathBuf,
    options: Mutex<Options>,
}

impl LocalHelper {
    /// Creates a helper for the repository the URL points at.
    pub fn from_url(url: &str) -> anyhow::Result<Self> {
        let path = url.strip_prefix(URL_SCHEME).unwrap_or(url);
        if path.is_empty() {
            bail!("no repository path in URL {url:?}");
        }
        Ok(Self::new(path))
    }

    /// Creates a helper for the repository at `repo`.
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            options: Mutex::new(Options::default()),
        }
    }

    /// Returns the repository path.
    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Builds the child process for `subcommand`.
    ///
    /// At verbosity 0 the child's diagnostics are discarded instead of passed
    /// through to git's stderr.
    fn service_command(&self, subcommand: &str) -> Command {
        let options = self.options.lock().clone();
        debug!(
            subcommand,
            verbosity = options.verbosity,
            progress = options.progress,
            "Starting git service"
        );

        let stderr = if options.verbosity == 0 {
            Stdio::null()
        } else {
            Stdio::inherit()
        };

        let mut command = Command::new("git");
        command
            .arg(subcommand)
            .arg(&self.repo)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true);
        command
    }
}

/// Maps a `connect` service name to the git subcommand that serves it.
fn service_subcommand(service: &str) -> Option<&'static str> {
    SERVICES
        .iter()
        .find(|(name, _)| *name == service)
        .map(|(_, subcommand)| *subcommand)
}

#[async_trait]
impl Helper for LocalHelper {
    fn capabilities(&self) -> Capabilities {
        Capabilities::new().optional(Capability::Connect | Capability::Option)
    }

    async fn set_option(&self, key: &str, value: &BStr) -> Result<(), OptionError> {
        let value = value.to_string();
        let mut options = self.options.lock();
        match key {
            "verbosity" => {
                options.verbosity = value
                    .parse()
                    .map_err(|_| OptionError::Invalid(format!("invalid verbosity {value:?}")))?;
            }
            "progress" => {
                options.progress = match value.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(OptionError::Invalid(format!("invalid progress {value:?}"))),
                };
            }
            _ => return Err(OptionError::Unsupported),
        }
        debug!(key, value = %value, "Option set");
        Ok(())
    }

    async fn connect(&self, cmd: &ConnectCommand, streams: Streams<'_>) -> Result<(), BoxError> {
        let subcommand = service_subcommand(&cmd.service)
            .ok_or_else(|| anyhow!("unsupported service {:?}", cmd.service))?;

        let mut child = self
            .service_command(subcommand)
            .spawn()
            .with_context(|| format!("failed to start git {subcommand}"))?;
        let mut child_in = child.stdin.take().context("child stdin not captured")?;
        let mut child_out = child.stdout.take().context("child stdout not captured")?;

        let Streams { reader, writer } = streams;

        // An empty line tells git the connection is established.
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        info!(service = %cmd.service, repo = %self.repo().display(), "Connected");

        let received = {
            let upstream = async {
                let sent = tokio::io::copy_buf(reader, &mut child_in).await?;
                child_in.shutdown().await?;
                Ok::<u64, std::io::Error>(sent)
            };
            let downstream = tokio::io::copy(&mut child_out, &mut *writer);
            tokio::pin!(upstream, downstream);

            // The service ends the conversation by closing its output.
            tokio::select! {
                received = &mut downstream => received?,
                sent = &mut upstream => {
                    debug!(bytes = sent?, "git closed its side of the connection");
                    downstream.await?
                }
            }
        };
        writer.flush().await?;
        drop(child_in);

        let status = child.wait().await?;
        debug!(bytes = received, %status, "Service finished");
        if !status.success() {
            return Err(anyhow!("git {subcommand} failed: {status}").into());
        }
        Ok(())
    }
}
