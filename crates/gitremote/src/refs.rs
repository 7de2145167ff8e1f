//! Ref listings and push reports.
//!
//! Ref names are byte strings: git does not require them to be UTF-8, and
//! they are written back exactly as they were read.

use bstr::{BStr, BString, ByteSlice, ByteVec};
use std::fmt;

/// The value column of a `list` response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// Hex object id the ref points to.
    Hash(String),
    /// Target of a symbolic ref, rendered as `@<target>`.
    Symref(BString),
    /// The helper could not determine the value, rendered as `?`.
    Unknown,
}

/// One entry of a ref listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRef {
    /// Reference name.
    pub name: BString,
    /// What the reference points to.
    pub value: RefValue,
    /// Marks the ref with the `unchanged` attribute.
    pub unchanged: bool,
}

impl ListRef {
    /// A ref pointing at an object.
    pub fn hash(name: impl Into<BString>, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: RefValue::Hash(hash.into()),
            unchanged: false,
        }
    }

    /// A symbolic ref pointing at another ref.
    pub fn symref(name: impl Into<BString>, target: impl Into<BString>) -> Self {
        Self {
            name: name.into(),
            value: RefValue::Symref(target.into()),
            unchanged: false,
        }
    }

    /// A ref whose value is unknown.
    pub fn unknown(name: impl Into<BString>) -> Self {
        Self {
            name: name.into(),
            value: RefValue::Unknown,
            unchanged: false,
        }
    }

    /// Sets the `unchanged` attribute.
    pub fn with_unchanged(mut self, unchanged: bool) -> Self {
        self.unchanged = unchanged;
        self
    }

    /// Appends the listing line for this ref, without its newline.
    fn encode_into(&self, out: &mut Vec<u8>) {
        match &self.value {
            RefValue::Hash(hash) if !hash.is_empty() => out.push_str(hash),
            RefValue::Symref(target) if !target.is_empty() => {
                out.push_byte(b'@');
                out.push_str(target);
            }
            _ => out.push_byte(b'?'),
        }
        out.push_byte(b' ');
        out.push_str(&self.name);
        if self.unchanged {
            out.push_str(" unchanged");
        }
    }
}

/// Lossy rendering for logs. The wire form comes from [`encode_list`].
impl fmt::Display for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut line = Vec::new();
        self.encode_into(&mut line);
        write!(f, "{}", line.as_bstr())
    }
}

/// Encodes a ref listing, one ref per line, ending with a blank line.
pub fn encode_list(refs: &[ListRef]) -> Vec<u8> {
    let mut out = Vec::new();
    for r in refs {
        r.encode_into(&mut out);
        out.push_byte(b'\n');
    }
    out.push_byte(b'\n');
    out
}

/// A single `push [+]<src>:<dst>` request and its outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushRef {
    /// Local source ref. Empty when the destination should be deleted.
    pub src: BString,
    /// Remote destination ref.
    pub dst: BString,
    /// Whether the update was requested with a leading `+`.
    pub force: bool,

    /// Set by the helper when the update succeeded.
    pub ok: bool,
    /// Optional reason reported alongside a failed update.
    pub error: Option<String>,
}

impl PushRef {
    /// Creates a pending push request.
    pub fn new(src: impl Into<BString>, dst: impl Into<BString>, force: bool) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            force,
            ..Self::default()
        }
    }

    /// Parses the argument of a push line: `[+]<src>:<dst>`.
    pub(crate) fn parse(spec: &[u8]) -> Option<Self> {
        let (force, spec) = match spec.strip_prefix(b"+") {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let mut parts = spec.split(|&b| b == b':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(src), Some(dst), None) => Some(Self::new(src, dst, force)),
            _ => None,
        }
    }

    /// Returns the destination ref.
    pub fn dst(&self) -> &BStr {
        self.dst.as_bstr()
    }

    /// Returns true if this request deletes the destination ref.
    pub fn is_delete(&self) -> bool {
        self.src.is_empty()
    }

    /// Marks the update as applied.
    pub fn mark_ok(&mut self) {
        self.ok = true;
        self.error = None;
    }

    /// Marks the update as rejected with an optional reason.
    pub fn mark_failed(&mut self, message: Option<String>) {
        self.ok = false;
        self.error = message;
    }
}

/// Encodes the per-ref push report, ending with a blank line.
pub fn encode_push_report(refs: &[PushRef]) -> Vec<u8> {
    let mut out = Vec::new();
    for r in refs {
        out.push_str(if r.ok { "ok " } else { "error " });
        out.push_str(&r.dst);
        if let (false, Some(message)) = (r.ok, &r.error) {
            out.push_byte(b' ');
            out.push_str(message);
        }
        out.push_byte(b'\n');
    }
    out.push_byte(b'\n');
    out
}
