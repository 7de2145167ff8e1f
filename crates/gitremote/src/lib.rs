//! # gitremote
//!
//! Helper-side engine for git's remote helper protocol.
//!
//! git talks to a `git-remote-<transport>` process over its stdin and stdout
//! using a line-based command language (`capabilities`, `list`, `fetch`,
//! `push`, `option`, `import`, `export`, `connect`). This crate decodes that
//! command stream, runs each command against a [`Helper`] implementation and
//! writes the byte-exact responses git expects.
//!
//! See: https://git-scm.com/docs/gitremote-helpers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gitremote::{Capabilities, Capability, Config, Helper};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Noop;
//!
//! #[async_trait::async_trait]
//! impl Helper for Noop {
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::new().optional(Capability::Option)
//!     }
//! }
//!
//! # async fn example() -> gitremote::Result<()> {
//! let config = Config::new("origin", Some("noop::somewhere".to_string()));
//! gitremote::run_stdio(config, Noop, CancellationToken::new()).await
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod capabilities;
mod command;
mod config;
mod decoder;
mod error;
mod helper;
mod refs;
mod runner;

pub use bstr::{BStr, BString};
pub use capabilities::{Capabilities, Capability, CapabilitySet};
pub use command::{
    CapabilitiesCommand, Command, ConnectCommand, ExportCommand, FetchCommand, ImportCommand,
    InputLease, ListCommand, OptionCommand, PushCommand, Streams, UnknownCommand,
};
pub use config::Config;
pub use decoder::Decoder;
pub use error::{BoxError, Error, OptionError, Result};
pub use helper::Helper;
pub use refs::{encode_list, encode_push_report, ListRef, PushRef, RefValue};
pub use runner::{run_stdio, Runner};
