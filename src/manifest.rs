//! Playas manifest parser
//!
//! A source container embeds a name/pointer table behind the ASCII marker
//! `!PlayAsManifest`. Relative to the marker: 0x10 reserved bytes, a big-endian
//! u16 entry count at +0x10, then variable-length records from +0x12. Each
//! record is a null-terminated ASCII name; the entry's big-endian u32 offset
//! starts one byte after the terminator, and the next record starts five bytes
//! after the terminator.

use crate::error::{EquipakError, Result};
use crate::scan::find_tag;

/// Manifest marker embedded in source containers
pub const PLAYAS_MARKER: &[u8] = b"!PlayAsManifest";

/// Byte offset of the entry count, relative to the marker
const COUNT_OFFSET: usize = 0x10;

/// Byte offset of the first record, relative to the marker
const RECORDS_OFFSET: usize = 0x12;

/// One decoded name/offset pair, in parse order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Internal display-list name (ASCII, practical length < 0x20)
    pub name: String,

    /// Absolute byte offset into the source container
    pub offset: u32,
}

/// Decoded playas manifest: an ordered name-to-offset table
#[derive(Debug, Clone, Default)]
pub struct PlayasManifest {
    entries: Vec<ManifestEntry>,
}

impl PlayasManifest {
    /// Parse the manifest embedded in `container`.
    ///
    /// The marker being absent is the single fatal precondition for the rest
    /// of the pipeline and yields [`EquipakError::ManifestNotFound`]. A count
    /// field that overruns the buffer is tolerated: decoding stops at the end
    /// of the container with however many records fit.
    pub fn parse(container: &[u8]) -> Result<Self> {
        let marker = find_tag(container, PLAYAS_MARKER).ok_or(EquipakError::ManifestNotFound)?;
        Self::parse_at(container, marker)
    }

    /// Parse a manifest whose marker offset is already known.
    pub fn parse_at(container: &[u8], marker: usize) -> Result<Self> {
        let count_pos = marker + COUNT_OFFSET;
        if count_pos + 2 > container.len() {
            return Err(EquipakError::ManifestNotFound);
        }
        let count = u16::from_be_bytes([container[count_pos], container[count_pos + 1]]);

        let mut entries = Vec::with_capacity(count as usize);
        let mut cursor = marker + RECORDS_OFFSET;

        for _ in 0..count {
            let start = cursor;
            while cursor < container.len() && container[cursor] != 0 {
                cursor += 1;
            }
            // cursor sits on the terminator; the offset field starts one byte
            // after it and the next record five bytes after it
            if cursor + 5 > container.len() {
                break;
            }
            let name = String::from_utf8_lossy(&container[start..cursor]).into_owned();
            let offset = u32::from_be_bytes([
                container[cursor + 1],
                container[cursor + 2],
                container[cursor + 3],
                container[cursor + 4],
            ]);
            entries.push(ManifestEntry { name, offset });
            cursor += 5;
        }

        Ok(PlayasManifest { entries })
    }

    /// Entries in parse order, duplicates included
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Look up an entry's offset by name. First occurrence wins when the
    /// manifest carries duplicate names.
    pub fn offset_of(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
