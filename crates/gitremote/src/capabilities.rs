//! Capability advertisement.
//!
//! The reply to git's `capabilities` command lists one capability per line.
//! A `*` prefix marks a capability git must understand to continue; bare
//! names are optional. The block ends with a blank line.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A capability a remote helper can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `connect`: the helper can hand over a raw bidirectional connection.
    Connect,
    /// `push`: the helper accepts `push` batches.
    Push,
    /// `fetch`: the helper accepts `fetch` batches.
    Fetch,
    /// `export`: the helper consumes a fast-export stream.
    Export,
    /// `import`: the helper produces a fast-import stream.
    Import,
    /// `option`: the helper accepts `option` commands.
    Option,
    /// `refspec`: the helper advertises its private ref namespace.
    Refspec,
    /// `bidi-import`: the helper may query git's fast-import while importing.
    BidiImport,
    /// `export-marks`: git should persist export marks to a file.
    ExportMarks,
    /// `import-marks`: git should load import marks from a file.
    ImportMarks,
    /// `no-private-update`: git should not update private refs after import.
    NoPrivateUpdate,
    /// `check-connectivity`: the helper honours `option check-connectivity`.
    CheckConnectivity,
    /// `signed-tags`: the helper can accept signed tags on export.
    SignedTags,
}

impl Capability {
    /// Order in which capabilities are written to the wire.
    ///
    /// `Refspec` is absent: it renders once per configured refspec, after
    /// everything else.
    const RENDER_ORDER: [Capability; 12] = [
        Capability::Connect,
        Capability::Push,
        Capability::Fetch,
        Capability::Export,
        Capability::Import,
        Capability::Option,
        Capability::BidiImport,
        Capability::ExportMarks,
        Capability::ImportMarks,
        Capability::NoPrivateUpdate,
        Capability::CheckConnectivity,
        Capability::SignedTags,
    ];

    /// Returns the wire name of the capability.
    pub fn name(self) -> &'static str {
        match self {
            Capability::Connect => "connect",
            Capability::Push => "push",
            Capability::Fetch => "fetch",
            Capability::Export => "export",
            Capability::Import => "import",
            Capability::Option => "option",
            Capability::Refspec => "refspec",
            Capability::BidiImport => "bidi-import",
            Capability::ExportMarks => "export-marks",
            Capability::ImportMarks => "import-marks",
            Capability::NoPrivateUpdate => "no-private-update",
            Capability::CheckConnectivity => "check-connectivity",
            Capability::SignedTags => "signed-tags",
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of capabilities, stored as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    /// Creates an empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns true if the set contains `cap`.
    pub fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    /// Adds `cap` to the set.
    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    /// Removes `cap` from the set.
    pub fn remove(&mut self, cap: Capability) {
        self.0 &= !cap.bit();
    }

    /// Returns true if the set is empty.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<Capability> for CapabilitySet {
    fn from(cap: Capability) -> Self {
        Self(cap.bit())
    }
}

impl BitOr for Capability {
    type Output = CapabilitySet;

    fn bitor(self, rhs: Capability) -> CapabilitySet {
        CapabilitySet(self.bit() | rhs.bit())
    }
}

impl BitOr<Capability> for CapabilitySet {
    type Output = CapabilitySet;

    fn bitor(self, rhs: Capability) -> CapabilitySet {
        CapabilitySet(self.0 | rhs.bit())
    }
}

impl BitOr for CapabilitySet {
    type Output = CapabilitySet;

    fn bitor(self, rhs: CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 | rhs.0)
    }
}

impl BitOrAssign<Capability> for CapabilitySet {
    fn bitor_assign(&mut self, rhs: Capability) {
        self.insert(rhs);
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::empty();
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

/// The capability block a helper answers `capabilities` with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Capabilities advertised without a `*` prefix.
    pub optional: CapabilitySet,
    /// Capabilities git must understand, advertised with a `*` prefix.
    pub mandatory: CapabilitySet,
    /// Refspecs written as `refspec <value>` lines.
    pub refspecs: Vec<String>,
    /// Path appended to the `export-marks` line.
    pub export_marks: String,
    /// Path appended to the `import-marks` line.
    pub import_marks: String,
}

impl Capabilities {
    /// Creates an empty capability block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertises `caps` as optional.
    pub fn optional(mut self, caps: impl Into<CapabilitySet>) -> Self {
        self.optional = self.optional | caps.into();
        self
    }

    /// Advertises `caps` as mandatory.
    pub fn mandatory(mut self, caps: impl Into<CapabilitySet>) -> Self {
        self.mandatory = self.mandatory | caps.into();
        self
    }

    /// Adds a refspec line. Only rendered while `refspec` is advertised.
    pub fn refspec(mut self, refspec: impl Into<String>) -> Self {
        self.refspecs.push(refspec.into());
        self
    }

    /// Sets the export marks path. Only rendered while `export-marks` is advertised.
    pub fn export_marks(mut self, path: impl Into<String>) -> Self {
        self.export_marks = path.into();
        self
    }

    /// Sets the import marks path. Only rendered while `import-marks` is advertised.
    pub fn import_marks(mut self, path: impl Into<String>) -> Self {
        self.import_marks = path.into();
        self
    }

    /// Returns the wire prefix for `cap`, or `None` when it is not advertised.
    fn prefix(&self, cap: Capability) -> Option<&'static str> {
        if self.mandatory.contains(cap) {
            Some("*")
        } else if self.optional.contains(cap) {
            Some("")
        } else {
            None
        }
    }

    /// Encodes the capability block, including the terminating blank line.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cap in Capability::RENDER_ORDER {
            let Some(prefix) = self.prefix(cap) else {
                continue;
            };
            match cap {
                Capability::ExportMarks => writeln!(f, "{prefix}{cap} {}", self.export_marks)?,
                Capability::ImportMarks => writeln!(f, "{prefix}{cap} {}", self.import_marks)?,
                _ => writeln!(f, "{prefix}{cap}")?,
            }
        }

        if let Some(prefix) = self.prefix(Capability::Refspec) {
            for refspec in &self.refspecs {
                writeln!(f, "{prefix}{} {refspec}", Capability::Refspec)?;
            }
        }

        writeln!(f)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [Capability; 13] = [
        Capability::Connect,
        Capability::Push,
        Capability::Fetch,
        Capability::Export,
        Capability::Import,
        Capability::Option,
        Capability::Refspec,
        Capability::BidiImport,
        Capability::ExportMarks,
        Capability::ImportMarks,
        Capability::NoPrivateUpdate,
        Capability::CheckConnectivity,
        Capability::SignedTags,
    ];

    fn set_from_mask(mask: u16) -> CapabilitySet {
        ALL.iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, cap)| *cap)
            .collect()
    }

    proptest! {
        /// Property: every advertised capability appears exactly once, in
        /// render order, with a `*` exactly when it is mandatory.
        #[test]
        fn prop_render_matches_masks(optional in 0u16..(1 << 13), mandatory in 0u16..(1 << 13)) {
            let caps = Capabilities {
                optional: set_from_mask(optional),
                mandatory: set_from_mask(mandatory),
                refspecs: vec!["refs/heads/*:refs/x/*".to_string()],
                export_marks: "em".to_string(),
                import_marks: "im".to_string(),
            };
            let encoded = caps.encode();

            prop_assert!(encoded.ends_with('\n'));
            let body = &encoded[..encoded.len() - 1];
            prop_assert!(body.is_empty() || body.ends_with('\n'));

            let lines: Vec<&str> = body.lines().collect();
            let mut expected = Vec::new();
            for cap in Capability::RENDER_ORDER.into_iter().chain([Capability::Refspec]) {
                if caps.mandatory.contains(cap) {
                    expected.push((cap, true));
                } else if caps.optional.contains(cap) {
                    expected.push((cap, false));
                }
            }

            prop_assert_eq!(lines.len(), expected.len());
            for (line, (cap, mandatory)) in lines.iter().zip(expected) {
                prop_assert_eq!(line.starts_with('*'), mandatory);
                let name = line.trim_start_matches('*').split(' ').next().unwrap_or_default();
                prop_assert_eq!(name, cap.name());
            }
        }
    }
}
