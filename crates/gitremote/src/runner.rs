//! Session runner.
//!
//! A spawned task decodes commands ahead of execution while the calling task
//! executes them one at a time, flushing the reply to each before starting
//! the next. The first error recorded by either side ends the session.

use crate::command::Command;
use crate::config::Config;
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::helper::Helper;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Number of decoded commands that may wait for execution.
const COMMAND_BACKLOG: usize = 1;

/// Write-once slot for the session's first error.
#[derive(Debug, Default)]
struct ErrorLatch {
    slot: Mutex<Option<Error>>,
}

impl ErrorLatch {
    /// Records the error of `result` unless one is already recorded.
    ///
    /// Returns true once the latch holds an error.
    fn record(&self, result: Result<()>) -> bool {
        let mut slot = self.slot.lock();
        if let Err(err) = result {
            if slot.is_none() {
                *slot = Some(err);
            } else {
                debug!(error = %err, "Discarding error after session failure");
            }
        }
        slot.is_some()
    }

    fn take(&self) -> Option<Error> {
        self.slot.lock().take()
    }
}

/// Runs remote helper sessions against a [`Helper`].
#[derive(Clone)]
pub struct Runner {
    config: Arc<Config>,
    helper: Arc<dyn Helper>,
}

impl Runner {
    /// Creates a runner.
    pub fn new<H>(config: Config, helper: H) -> Self
    where
        H: Helper + 'static,
    {
        Self::from_shared(Arc::new(config), Arc::new(helper))
    }

    /// Creates a runner from an already shared configuration and helper.
    pub fn from_shared(config: Arc<Config>, helper: Arc<dyn Helper>) -> Self {
        Self { config, helper }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serves git's commands from `input`, writing replies to `output`, until
    /// the command stream ends, an error occurs or `cancel` fires.
    ///
    /// Returns the first error of the session. Cancellation is reported as
    /// [`Error::Cancelled`] unless an earlier error was already recorded.
    pub async fn run<R, W>(&self, input: R, output: W, cancel: CancellationToken) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin,
    {
        let session = cancel.child_token();
        let latch = Arc::new(ErrorLatch::default());
        let (tx, mut rx) = mpsc::channel(COMMAND_BACKLOG);

        let producer = tokio::spawn(read_commands(
            Decoder::new(input),
            tx,
            Arc::clone(&latch),
            session.clone(),
        ));

        let mut output = BufWriter::new(output);

        loop {
            tokio::select! {
                biased;

                () = session.cancelled() => {
                    latch.record(Err(Error::Cancelled));
                    break;
                }

                next = rx.recv() => {
                    // Every queued command precedes any decode error, so it
                    // still runs; the channel closes once the reader stops.
                    let Some(mut cmd) = next else {
                        break;
                    };

                    cmd.attach(&self.config);
                    let result = tokio::select! {
                        biased;
                        () = session.cancelled() => Err(Error::Cancelled),
                        result = self.run_command(cmd, &mut output) => result,
                    };
                    if result.is_err() {
                        latch.record(result);
                        break;
                    }
                }
            }
        }

        session.cancel();
        drop(rx);
        if let Err(err) = producer.await {
            warn!(error = %err, "Command reader task failed");
        }

        match latch.take() {
            Some(err) => {
                warn!(remote = %self.config.remote, error = %err, "Session ended with error");
                Err(err)
            }
            None => {
                debug!(remote = %self.config.remote, "Session finished");
                Ok(())
            }
        }
    }

    async fn run_command<W>(&self, cmd: Command, output: &mut BufWriter<W>) -> Result<()>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let name = cmd.name();
        debug!(command = name, "Executing command");

        let result = cmd.execute(self.helper.as_ref(), output).await;
        let flushed = output.flush().await;

        result?;
        flushed?;
        Ok(())
    }
}

/// Decodes commands and hands them to the executing side one at a time.
async fn read_commands(
    mut decoder: Decoder,
    tx: mpsc::Sender<Command>,
    latch: Arc<ErrorLatch>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            next = decoder.next_command() => next,
        };

        let cmd = match next {
            Ok(Some(cmd)) => cmd,
            Ok(None) => {
                debug!("Command stream ended");
                return;
            }
            Err(err) => {
                latch.record(Err(err));
                return;
            }
        };
        debug!(command = cmd.name(), "Decoded command");

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            sent = tx.send(cmd) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

/// Runs a session over the process's stdin and stdout.
///
/// Reads from stdin happen on a blocking thread that cancellation cannot
/// interrupt. After a cancelled session that read stays pending, so shutting
/// the runtime down waits until stdin yields data or closes. Binaries that
/// stop on cancellation should exit the process rather than return from
/// `main`.
pub async fn run_stdio<H>(config: Config, helper: H, cancel: CancellationToken) -> Result<()>
where
    H: Helper + 'static,
{
    Runner::new(config, helper)
        .run(tokio::io::stdin(), tokio::io::stdout(), cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_keeps_first_error() {
        let latch = ErrorLatch::default();
        assert!(!latch.record(Ok(())));

        assert!(latch.record(Err(Error::UnexpectedEof)));
        assert!(latch.record(Err(Error::Cancelled)));
        assert!(latch.record(Ok(())));

        assert!(matches!(latch.take(), Some(Error::UnexpectedEof)));
        assert!(latch.take().is_none());
    }

    #[test]
    fn test_latch_concurrent_records() {
        let latch = Arc::new(ErrorLatch::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || {
                    latch.record(Err(Error::InvalidCommand(i.to_string())));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(matches!(latch.take(), Some(Error::InvalidCommand(_))));
        assert!(latch.take().is_none());
    }
}
