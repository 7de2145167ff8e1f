//! The transport seam.

use crate::capabilities::Capabilities;
use crate::command::{
    ConnectCommand, ExportCommand, FetchCommand, ImportCommand, ListCommand, PushCommand,
    Streams, UnknownCommand,
};
use crate::error::{BoxError, Error, OptionError};
use crate::refs::ListRef;
use async_trait::async_trait;
use bstr::BStr;

/// Transport-specific work behind a remote helper.
///
/// The runner decodes git's commands and writes the replies; implementors
/// only do the work. Everything except [`Helper::capabilities`] has a default
/// that reports the command as unsupported, so a helper only implements what
/// it advertises.
///
/// Methods take `&self`: state that changes during a session needs interior
/// mutability.
#[async_trait]
pub trait Helper: Send + Sync {
    /// Returns the capabilities to advertise.
    fn capabilities(&self) -> Capabilities;

    /// Applies `option <key> <value>`.
    async fn set_option(&self, key: &str, value: &BStr) -> Result<(), OptionError> {
        let _ = (key, value);
        Err(OptionError::Unsupported)
    }

    /// Lists the remote's refs.
    async fn list(&self, cmd: &ListCommand) -> Result<Vec<ListRef>, BoxError> {
        let _ = cmd;
        Err(Error::Unsupported("list".to_string()).into())
    }

    /// Fetches the objects of a `fetch` batch into the local repository.
    async fn fetch(&self, cmd: &FetchCommand) -> Result<(), BoxError> {
        let _ = cmd;
        Err(Error::Unsupported("fetch".to_string()).into())
    }

    /// Applies a `push` batch, recording each request's outcome on `cmd.refs`.
    ///
    /// Rejected updates are reported through [`PushRef::mark_failed`]; an
    /// `Err` aborts the whole session.
    ///
    /// [`PushRef::mark_failed`]: crate::PushRef::mark_failed
    async fn push(&self, cmd: &mut PushCommand) -> Result<(), BoxError> {
        let _ = cmd;
        Err(Error::Unsupported("push".to_string()).into())
    }

    /// Produces a fast-import stream for the requested refs.
    async fn import(&self, cmd: &ImportCommand, streams: Streams<'_>) -> Result<(), BoxError> {
        let _ = (cmd, streams);
        Err(Error::Unsupported("import".to_string()).into())
    }

    /// Consumes a fast-export stream.
    async fn export(&self, cmd: &ExportCommand, streams: Streams<'_>) -> Result<(), BoxError> {
        let _ = (cmd, streams);
        Err(Error::Unsupported("export".to_string()).into())
    }

    /// Connects the session streams to `cmd.service` on the remote.
    async fn connect(&self, cmd: &ConnectCommand, streams: Streams<'_>) -> Result<(), BoxError> {
        let _ = (cmd, streams);
        Err(Error::Unsupported("connect".to_string()).into())
    }

    /// Handles a line the decoder did not recognize.
    async fn unknown(&self, cmd: &UnknownCommand) -> Result<(), BoxError> {
        Err(Error::Unsupported(cmd.line.to_string()).into())
    }
}
