//! Incremental command decoder.
//!
//! git writes one command per line. `fetch`, `push` and `import` come in
//! batches: the first line opens the batch, further lines of the same kind
//! extend it, and a blank line closes it.

use crate::command::{
    CapabilitiesCommand, Command, ConnectCommand, ExportCommand, FetchCommand, ImportCommand,
    Input, InputLease, ListCommand, OptionCommand, PushCommand, UnknownCommand,
};
use crate::error::{Error, Result};
use crate::refs::PushRef;
use bstr::ByteSlice;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Decoder state between lines.
enum State {
    Root,
    Fetch(FetchCommand),
    Push(PushCommand),
    Import(ImportCommand),
}

/// Pulls commands off git's command stream.
///
/// The stream is shared with the streaming commands (`import`, `export`,
/// `connect`) it produces: each of those holds the stream until it is
/// dropped, and [`Decoder::next_command`] waits for it.
pub struct Decoder {
    input: Arc<Mutex<Input>>,
}

impl Decoder {
    /// Creates a decoder over an unbuffered reader.
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::buffered(BufReader::new(reader))
    }

    /// Creates a decoder over a reader that is already buffered.
    pub fn buffered<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self {
            input: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    /// Decodes the next command.
    ///
    /// Returns `Ok(None)` once the stream ends between commands. Blank lines
    /// between commands are skipped.
    pub async fn next_command(&mut self) -> Result<Option<Command>> {
        let mut input = Arc::clone(&self.input).lock_owned().await;
        let mut state = State::Root;

        loop {
            let Some(line) = read_line(&mut input).await? else {
                return match state {
                    State::Root => Ok(None),
                    _ => Err(Error::UnexpectedEof),
                };
            };
            trace!(line = %line.as_bstr(), "Read command line");

            state = match state {
                State::Root => match decode_root(line) {
                    Root::Blank => State::Root,
                    Root::Ready(cmd) => return Ok(Some(cmd)),
                    Root::Batch(batch) => batch,
                    Root::Export => {
                        let lease = InputLease::new(input);
                        return Ok(Some(Command::Export(ExportCommand::default(), lease)));
                    }
                    Root::Connect(cmd) => {
                        return Ok(Some(Command::Connect(cmd, InputLease::new(input))));
                    }
                },

                State::Fetch(mut fetch) => {
                    if line.is_empty() {
                        return Ok(Some(Command::Fetch(fetch)));
                    }
                    let Some((id, name)) = line.strip_prefix(b"fetch ").and_then(split_fetch) else {
                        return Err(invalid(&line));
                    };
                    fetch.insert(id, name);
                    State::Fetch(fetch)
                }

                State::Push(mut push) => {
                    if line.is_empty() {
                        return Ok(Some(Command::Push(push)));
                    }
                    match line.strip_prefix(b"push ") {
                        Some(spec) => match PushRef::parse(spec) {
                            Some(r) => push.refs.push(r),
                            None => return Err(invalid(&line)),
                        },
                        None => push.options.push(line.into()),
                    }
                    State::Push(push)
                }

                State::Import(mut import) => {
                    if line.is_empty() {
                        return Ok(Some(Command::Import(import, InputLease::new(input))));
                    }
                    match line.strip_prefix(b"import ") {
                        Some(name) => import.names.push(name.into()),
                        None => return Err(invalid(&line)),
                    }
                    State::Import(import)
                }
            };
        }
    }
}

/// Outcome of decoding a line in the root state.
enum Root {
    Blank,
    Ready(Command),
    Batch(State),
    Export,
    Connect(ConnectCommand),
}

fn decode_root(line: Vec<u8>) -> Root {
    match line.as_slice() {
        b"" => return Root::Blank,
        b"capabilities" => return Root::Ready(Command::Capabilities(CapabilitiesCommand::default())),
        b"list" => return Root::Ready(Command::List(ListCommand::new(false))),
        b"list for-push" => return Root::Ready(Command::List(ListCommand::new(true))),
        b"export" => return Root::Export,
        _ => {}
    }

    if let Some(args) = line.strip_prefix(b"option ") {
        if let Some((key, value)) = args.split_once_str(" ") {
            let key = String::from_utf8_lossy(key);
            return Root::Ready(Command::Option(OptionCommand::new(key, value)));
        }
    } else if let Some(args) = line.strip_prefix(b"fetch ") {
        if let Some((id, name)) = split_fetch(args) {
            return Root::Batch(State::Fetch(FetchCommand::new(id, name)));
        }
    } else if let Some(spec) = line.strip_prefix(b"push ") {
        if let Some(first) = PushRef::parse(spec) {
            return Root::Batch(State::Push(PushCommand::new(first)));
        }
    } else if let Some(name) = line.strip_prefix(b"import ") {
        return Root::Batch(State::Import(ImportCommand::new(name)));
    } else if let Some(service) = line.strip_prefix(b"connect ") {
        let service = String::from_utf8_lossy(service);
        return Root::Connect(ConnectCommand::new(service));
    }

    Root::Ready(Command::Unknown(UnknownCommand::new(line)))
}

/// Splits the arguments of a fetch line into `(id, name)`.
///
/// Object ids are hex, so an id that is not UTF-8 makes the line malformed.
fn split_fetch(args: &[u8]) -> Option<(&str, &[u8])> {
    let (id, name) = args.split_once_str(" ")?;
    Some((std::str::from_utf8(id).ok()?, name))
}

fn invalid(line: &[u8]) -> Error {
    Error::InvalidCommand(String::from_utf8_lossy(line).into_owned())
}

/// Reads one line without its trailing `\n`.
///
/// Returns `Ok(None)` at end of stream; a final line without a newline is an
/// unexpected end of stream.
async fn read_line(input: &mut OwnedMutexGuard<Input>) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let n = input.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.pop() != Some(b'\n') {
        return Err(Error::UnexpectedEof);
    }
    Ok(Some(line))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    proptest! {
        /// Property: a fetch batch maps every id to the last name sent for it.
        #[test]
        fn prop_fetch_last_value_wins(
            lines in prop::collection::vec(("[a-f0-9]{1,3}", "refs/heads/[a-z]{1,8}"), 1..30)
        ) {
            let mut input = String::new();
            let mut expected = std::collections::HashMap::new();
            for (id, name) in &lines {
                input.push_str(&format!("fetch {id} {name}\n"));
                expected.insert(id.clone(), bstr::BString::from(name.as_str()));
            }
            input.push('\n');

            let decoded = runtime().block_on(async {
                let mut decoder = Decoder::new(Cursor::new(input.into_bytes()));
                decoder.next_command().await
            });

            match decoded {
                Ok(Some(Command::Fetch(cmd))) => prop_assert_eq!(cmd.objects, expected),
                other => prop_assert!(false, "unexpected decode result: {:?}", other),
            }
        }

        /// Property: decoding arbitrary text never panics and always ends.
        #[test]
        fn prop_decoder_terminates(input in "[a-z +:\n]{0,200}") {
            runtime().block_on(async {
                let mut decoder = Decoder::new(Cursor::new(input.into_bytes()));
                for _ in 0..=200 {
                    match decoder.next_command().await {
                        Ok(Some(_)) => continue,
                        Ok(None) | Err(_) => return,
                    }
                }
                panic!("decoder did not terminate");
            });
        }
    }
}
