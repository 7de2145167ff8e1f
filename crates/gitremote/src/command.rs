//! Decoded remote helper commands and their replies.

use crate::config::Config;
use crate::error::{Error, OptionError, Result};
use crate::helper::Helper;
use crate::refs::{encode_list, encode_push_report, PushRef};
use bstr::BString;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::OwnedMutexGuard;

/// The buffered command stream shared by the decoder and streaming commands.
pub(crate) type Input = Box<dyn AsyncBufRead + Send + Unpin>;

/// Exclusive access to the command stream, held by a streaming command.
///
/// While a lease is alive the decoder cannot read ahead; it resumes once the
/// command holding the lease has been executed and dropped.
pub struct InputLease(OwnedMutexGuard<Input>);

impl InputLease {
    pub(crate) fn new(guard: OwnedMutexGuard<Input>) -> Self {
        Self(guard)
    }

    fn reader(&mut self) -> &mut (dyn AsyncBufRead + Send + Unpin) {
        &mut **self.0
    }
}

impl fmt::Debug for InputLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputLease").finish_non_exhaustive()
    }
}

/// Raw session streams handed to `import`, `export` and `connect`.
///
/// Everything the helper writes goes straight to git; the runner adds no
/// framing and flushes once the helper returns.
pub struct Streams<'a> {
    /// The remainder of git's command stream.
    pub reader: &'a mut (dyn AsyncBufRead + Send + Unpin),
    /// The stream git reads replies from.
    pub writer: &'a mut (dyn AsyncWrite + Send + Unpin),
}

/// A line the decoder did not recognize.
#[derive(Debug, Clone, Default)]
pub struct UnknownCommand {
    /// The raw line, without its newline.
    pub line: BString,
    config: Option<Arc<Config>>,
}

/// `capabilities`
#[derive(Debug, Clone, Default)]
pub struct CapabilitiesCommand {
    config: Option<Arc<Config>>,
}

/// `list` or `list for-push`
#[derive(Debug, Clone, Default)]
pub struct ListCommand {
    /// True for `list for-push`.
    pub for_push: bool,
    config: Option<Arc<Config>>,
}

/// `option <key> <value>`
#[derive(Debug, Clone, Default)]
pub struct OptionCommand {
    /// Option name. Bytes that are not UTF-8 are replaced, so such a name
    /// never matches a known option.
    pub key: String,
    /// Option value, as sent; may contain spaces.
    pub value: BString,
    config: Option<Arc<Config>>,
}

/// A batch of `fetch <id> <name>` lines.
#[derive(Debug, Clone, Default)]
pub struct FetchCommand {
    /// Object id to ref name. A repeated id keeps its last name.
    pub objects: HashMap<String, BString>,
    config: Option<Arc<Config>>,
}

/// A batch of `push [+]<src>:<dst>` lines.
#[derive(Debug, Clone, Default)]
pub struct PushCommand {
    /// Requested updates, in the order git sent them.
    pub refs: Vec<PushRef>,
    /// Other lines git sent inside the batch, verbatim.
    pub options: Vec<BString>,
    config: Option<Arc<Config>>,
}

/// A batch of `import <name>` lines.
#[derive(Debug, Clone, Default)]
pub struct ImportCommand {
    /// Requested ref names, in order.
    pub names: Vec<BString>,
    config: Option<Arc<Config>>,
}

/// `export`
#[derive(Debug, Clone, Default)]
pub struct ExportCommand {
    config: Option<Arc<Config>>,
}

/// `connect <service>`
#[derive(Debug, Clone, Default)]
pub struct ConnectCommand {
    /// Requested service, e.g. `git-upload-pack`. Bytes that are not UTF-8
    /// are replaced.
    pub service: String,
    config: Option<Arc<Config>>,
}

macro_rules! session_config {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// Returns the session configuration, once the runner has attached it.
                pub fn config(&self) -> Option<&Config> {
                    self.config.as_deref()
                }
            }
        )*
    };
}

session_config!(
    UnknownCommand,
    CapabilitiesCommand,
    ListCommand,
    OptionCommand,
    FetchCommand,
    PushCommand,
    ImportCommand,
    ExportCommand,
    ConnectCommand,
);

impl UnknownCommand {
    pub(crate) fn new(line: impl Into<BString>) -> Self {
        Self {
            line: line.into(),
            config: None,
        }
    }
}

impl ListCommand {
    pub(crate) fn new(for_push: bool) -> Self {
        Self {
            for_push,
            config: None,
        }
    }
}

impl OptionCommand {
    pub(crate) fn new(key: impl Into<String>, value: impl Into<BString>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            config: None,
        }
    }
}

impl FetchCommand {
    pub(crate) fn new(id: impl Into<String>, name: impl Into<BString>) -> Self {
        let mut cmd = Self::default();
        cmd.insert(id, name);
        cmd
    }

    pub(crate) fn insert(&mut self, id: impl Into<String>, name: impl Into<BString>) {
        self.objects.insert(id.into(), name.into());
    }
}

impl PushCommand {
    pub(crate) fn new(first: PushRef) -> Self {
        Self {
            refs: vec![first],
            ..Self::default()
        }
    }
}

impl ImportCommand {
    pub(crate) fn new(name: impl Into<BString>) -> Self {
        Self {
            names: vec![name.into()],
            config: None,
        }
    }
}

impl ConnectCommand {
    pub(crate) fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            config: None,
        }
    }
}

/// A fully decoded command.
///
/// Streaming commands carry an [`InputLease`] on the command stream so the
/// helper can read from it directly.
#[derive(Debug)]
pub enum Command {
    /// Unrecognized line.
    Unknown(UnknownCommand),
    /// `capabilities`
    Capabilities(CapabilitiesCommand),
    /// `list [for-push]`
    List(ListCommand),
    /// `option <key> <value>`
    Option(OptionCommand),
    /// `fetch` batch.
    Fetch(FetchCommand),
    /// `push` batch.
    Push(PushCommand),
    /// `import` batch.
    Import(ImportCommand, InputLease),
    /// `export`
    Export(ExportCommand, InputLease),
    /// `connect <service>`
    Connect(ConnectCommand, InputLease),
}

impl Command {
    /// Returns the command's name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Unknown(_) => "unknown",
            Command::Capabilities(_) => "capabilities",
            Command::List(_) => "list",
            Command::Option(_) => "option",
            Command::Fetch(_) => "fetch",
            Command::Push(_) => "push",
            Command::Import(..) => "import",
            Command::Export(..) => "export",
            Command::Connect(..) => "connect",
        }
    }

    /// Attaches the session configuration.
    pub(crate) fn attach(&mut self, config: &Arc<Config>) {
        let slot = match self {
            Command::Unknown(cmd) => &mut cmd.config,
            Command::Capabilities(cmd) => &mut cmd.config,
            Command::List(cmd) => &mut cmd.config,
            Command::Option(cmd) => &mut cmd.config,
            Command::Fetch(cmd) => &mut cmd.config,
            Command::Push(cmd) => &mut cmd.config,
            Command::Import(cmd, _) => &mut cmd.config,
            Command::Export(cmd, _) => &mut cmd.config,
            Command::Connect(cmd, _) => &mut cmd.config,
        };
        *slot = Some(Arc::clone(config));
    }

    /// Runs the command against `helper` and writes its reply to `out`.
    ///
    /// The caller flushes `out`.
    pub(crate) async fn execute<W>(self, helper: &dyn Helper, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Send + Unpin,
    {
        match self {
            Command::Unknown(cmd) => helper.unknown(&cmd).await.map_err(Error::Helper),

            Command::Capabilities(_) => {
                let caps = helper.capabilities();
                out.write_all(caps.encode().as_bytes()).await?;
                Ok(())
            }

            Command::List(cmd) => {
                let refs = helper.list(&cmd).await.map_err(Error::Helper)?;
                out.write_all(&encode_list(&refs)).await?;
                Ok(())
            }

            Command::Option(cmd) => {
                let reply = match helper.set_option(&cmd.key, cmd.value.as_ref()).await {
                    Ok(()) => "ok\n".to_string(),
                    Err(OptionError::Unsupported) => "unsupported\n".to_string(),
                    Err(OptionError::Invalid(message)) => format!("error {message}\n"),
                };
                out.write_all(reply.as_bytes()).await?;
                Ok(())
            }

            Command::Fetch(cmd) => {
                helper.fetch(&cmd).await.map_err(Error::Helper)?;
                out.write_all(b"\n").await?;
                Ok(())
            }

            Command::Push(mut cmd) => {
                helper.push(&mut cmd).await.map_err(Error::Helper)?;
                out.write_all(&encode_push_report(&cmd.refs)).await?;
                Ok(())
            }

            Command::Import(cmd, mut input) => {
                let streams = Streams {
                    reader: input.reader(),
                    writer: out,
                };
                helper.import(&cmd, streams).await.map_err(Error::Helper)
            }

            Command::Export(cmd, mut input) => {
                let streams = Streams {
                    reader: input.reader(),
                    writer: out,
                };
                helper.export(&cmd, streams).await.map_err(Error::Helper)
            }

            Command::Connect(cmd, mut input) => {
                let streams = Streams {
                    reader: input.reader(),
                    writer: out,
                };
                helper.connect(&cmd, streams).await.map_err(Error::Helper)
            }
        }
    }
}
