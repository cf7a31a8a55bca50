//! Output container assembler
//!
//! Serializes the runtime-facing tail of an equipment container: a fixed
//! runtime-identity tag carrying the command count, the 8-byte command
//! records, the JSON equipment manifest behind its own tag, and the name and
//! category metadata blocks. Every section boundary within the tail is
//! 16-byte aligned via zero padding.
//!
//! Container tail layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ compacted asset bytes (16-aligned)           │
//! ├──────────────────────────────────────────────┤
//! │ "MODLOADER64i" tag (0x10), count at +0x0C    │
//! │ command records (0x8 each) + pad to 0x10     │
//! ├──────────────────────────────────────────────┤
//! │ "EQUIPMANIFEST" tag (0x10)                   │
//! │ JSON manifest + 0xFF sentinel + pad to 0x10  │
//! ├──────────────────────────────────────────────┤
//! │ "EQUIPMENTNAME" block (>= 0x20, name at +0x10)│
//! │ "EQUIPMENTCAT" block (0x20, category at +0x10)│
//! └──────────────────────────────────────────────┘
//! ```

use crate::error::Result;
use crate::filter::{Family, Form, FormTable};
use crate::manifest::PLAYAS_MARKER;
use crate::scan::find_tag;
use serde::Serialize;
use std::collections::BTreeMap;

/// Runtime-identity tag; the command count lives at +0x0C
pub const ML64_TAG: &[u8] = b"MODLOADER64i";

/// Manifest-section tag
pub const EQUIP_MANIFEST_TAG: &[u8] = b"EQUIPMANIFEST";

/// Name-block tag
pub const EQUIP_NAME_TAG: &[u8] = b"EQUIPMENTNAME";

/// Category-block tag
pub const EQUIP_CATEGORY_TAG: &[u8] = b"EQUIPMENTCAT";

/// Command opcode word; byte 4 is overwritten with [`ENABLE_TAG`]
pub const DE_OPCODE: u32 = 0xDE01_0000;

/// Enable tag stamped over the relocated offset's segment byte
pub const ENABLE_TAG: u8 = 0x06;

/// Terminates the embedded JSON manifest
pub const MANIFEST_SENTINEL: u8 = 0xFF;

/// Names of this length or longer are rejected before assembly begins
pub const MAX_NAME_SIZE: usize = 0x20;

/// Runtime lookup manifest embedded in the output container.
///
/// Fixed nested shape keyed game family, then logical form, then stringified
/// ordinal; ordinal `i` corresponds exactly to command record `i`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EquipmentManifest {
    #[serde(rename = "OOT")]
    pub oot: OotForms,
    #[serde(rename = "MM")]
    pub mm: MmForms,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OotForms {
    pub adult: BTreeMap<String, String>,
    pub child: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MmForms {
    pub human: BTreeMap<String, String>,
    pub deku: BTreeMap<String, String>,
    pub zora: BTreeMap<String, String>,
    pub goron: BTreeMap<String, String>,
    pub fd: BTreeMap<String, String>,
}

impl EquipmentManifest {
    pub fn new() -> Self {
        Self::default()
    }

    fn form_map_mut(&mut self, form: Form) -> &mut BTreeMap<String, String> {
        match (form.family(), form) {
            (Family::Oot, Form::Adult) => &mut self.oot.adult,
            (Family::Oot, _) => &mut self.oot.child,
            (Family::Mm, Form::Deku) => &mut self.mm.deku,
            (Family::Mm, Form::Zora) => &mut self.mm.zora,
            (Family::Mm, Form::Goron) => &mut self.mm.goron,
            (Family::Mm, Form::Fd) => &mut self.mm.fd,
            (Family::Mm, _) => &mut self.mm.human,
        }
    }

    /// Record alias string `alias` at ordinal `index` under the active form
    pub fn push_alias(&mut self, form: Form, index: usize, alias: impl Into<String>) {
        self.form_map_mut(form).insert(index.to_string(), alias.into());
    }
}

/// Build one 8-byte command record for a relocated display-list offset
pub fn command_record(offset: u32) -> [u8; 8] {
    let mut record = [0u8; 8];
    record[0..4].copy_from_slice(&DE_OPCODE.to_be_bytes());
    record[4..8].copy_from_slice(&offset.to_be_bytes());
    record[4] = ENABLE_TAG;
    record
}

/// Assemble a fresh output container: compacted asset bytes followed by the
/// full tail. String fields are ASCII, null-padded, and truncated at their
/// block; name length is validated by the caller before any buffer work.
pub fn assemble_container(
    asset: &[u8],
    commands: &[[u8; 8]],
    manifest: &EquipmentManifest,
    name: &str,
    category: &str,
) -> Result<Vec<u8>> {
    let tail = build_tail(commands, manifest, name, category)?;
    let mut out = Vec::with_capacity(asset.len() + tail.len());
    out.extend_from_slice(asset);
    out.extend_from_slice(&tail);
    Ok(out)
}

/// Re-tag an already-assembled container without recompacting.
///
/// Scans the active form's alias keys directly in the raw bytes; each hit
/// whose offset field carries a zero segment byte contributes a command record
/// with the offset read in place. The buffer is truncated at the prior
/// `!PlayAsManifest` marker (kept whole when absent) and the standard tail is
/// appended to the prefix.
pub fn retag_container(
    buf: &[u8],
    aliases: &FormTable,
    form: Form,
    name: &str,
    category: &str,
) -> Result<Vec<u8>> {
    let mut manifest = EquipmentManifest::new();
    let mut commands = Vec::new();

    for key in aliases.names_for(form) {
        let Some(hit) = find_tag(buf, key.as_bytes()) else {
            continue;
        };
        let field = hit + key.len() + 1;
        if field + 4 > buf.len() || buf[field] != 0 {
            continue;
        }
        let offset =
            u32::from_be_bytes([buf[field], buf[field + 1], buf[field + 2], buf[field + 3]]);
        if let Some(alias) = aliases.get(form, key) {
            manifest.push_alias(form, commands.len(), alias);
        }
        commands.push(command_record(offset));
    }

    let prefix_len = find_tag(buf, PLAYAS_MARKER).unwrap_or(buf.len());
    assemble_container(&buf[..prefix_len], &commands, &manifest, name, category)
}

/// Serialize the tail sections shared by fresh assembly and re-tagging
fn build_tail(
    commands: &[[u8; 8]],
    manifest: &EquipmentManifest,
    name: &str,
    category: &str,
) -> Result<Vec<u8>> {
    let mut tail = Vec::new();

    let mut identity = [0u8; 0x10];
    write_ascii(&mut identity, 0, ML64_TAG);
    identity[0x0C..0x10].copy_from_slice(&(commands.len() as u32).to_be_bytes());
    tail.extend_from_slice(&identity);

    for record in commands {
        tail.extend_from_slice(record);
    }
    pad_to(&mut tail, 0x10);

    let mut manifest_tag = [0u8; 0x10];
    write_ascii(&mut manifest_tag, 0, EQUIP_MANIFEST_TAG);
    tail.extend_from_slice(&manifest_tag);
    tail.extend_from_slice(&serde_json::to_vec(manifest)?);
    tail.push(MANIFEST_SENTINEL);
    pad_to(&mut tail, 0x10);

    // minimum 0x20, grown in 0x10 increments to fit the name
    let mut name_block = vec![0u8; 0x10 + 0x10 * (name.len() / 0x10 + 1)];
    write_ascii(&mut name_block, 0, EQUIP_NAME_TAG);
    write_ascii(&mut name_block, 0x10, name.as_bytes());
    tail.extend_from_slice(&name_block);

    let mut category_block = [0u8; 0x20];
    write_ascii(&mut category_block, 0, EQUIP_CATEGORY_TAG);
    write_ascii(&mut category_block, 0x10, category.as_bytes());
    tail.extend_from_slice(&category_block);

    Ok(tail)
}

/// Copy ASCII bytes into a fixed block, truncating at the block end
fn write_ascii(dst: &mut [u8], offset: usize, src: &[u8]) {
    let avail = dst.len().saturating_sub(offset);
    let len = src.len().min(avail);
    dst[offset..offset + len].copy_from_slice(&src[..len]);
}

fn pad_to(buf: &mut Vec<u8>, align: usize) {
    let rem = buf.len() % align;
    if rem != 0 {
        buf.resize(buf.len() + align - rem, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::find_tag_from;

    #[test]
    fn test_command_record_layout() {
        let record = command_record(0x0000_1230);
        assert_eq!(&record[0..4], &[0xDE, 0x01, 0x00, 0x00]);
        assert_eq!(record[4], ENABLE_TAG);
        assert_eq!(&record[5..8], &[0x00, 0x12, 0x30]);
    }

    #[test]
    fn test_count_written_into_identity_tag() {
        let commands = [command_record(0x10), command_record(0x20), command_record(0x30)];
        let out =
            assemble_container(&[], &commands, &EquipmentManifest::new(), "", "").unwrap();

        let identity = find_tag(&out, ML64_TAG).unwrap();
        let count = u32::from_be_bytes(out[identity + 0x0C..identity + 0x10].try_into().unwrap());
        assert_eq!(count, 3);
    }

    #[test]
    fn test_section_boundaries_are_aligned() {
        let asset = vec![0xAB; 0x30];
        let commands = [command_record(0x0)];
        let mut manifest = EquipmentManifest::new();
        manifest.push_alias(Form::Adult, 0, "sword1");

        let out = assemble_container(&asset, &commands, &manifest, "my sword", "Kokiri Sword")
            .unwrap();

        let base = find_tag(&out, ML64_TAG).unwrap();
        assert_eq!(base % 0x10, 0);
        let manifest_tag = find_tag(&out, EQUIP_MANIFEST_TAG).unwrap();
        assert_eq!((manifest_tag - base) % 0x10, 0);
        let name_tag = find_tag(&out, EQUIP_NAME_TAG).unwrap();
        assert_eq!((name_tag - base) % 0x10, 0);
        let category_tag = find_tag(&out, EQUIP_CATEGORY_TAG).unwrap();
        assert_eq!((category_tag - base) % 0x10, 0);
        // category block closes the container
        assert_eq!(category_tag + 0x20, out.len());
    }

    #[test]
    fn test_manifest_json_terminated_by_sentinel() {
        let mut manifest = EquipmentManifest::new();
        manifest.push_alias(Form::Adult, 0, "sword1");
        let out = assemble_container(&[], &[command_record(0)], &manifest, "", "").unwrap();

        let tag = find_tag(&out, EQUIP_MANIFEST_TAG).unwrap();
        let json_start = tag + 0x10;
        let sentinel = find_tag_from(&out, &[MANIFEST_SENTINEL], json_start).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_slice(&out[json_start..sentinel]).unwrap();
        assert_eq!(parsed["OOT"]["adult"]["0"], "sword1");
        assert_eq!(parsed["MM"]["goron"], serde_json::json!({}));
    }

    #[test]
    fn test_name_block_grows_in_0x10_steps() {
        let short = build_tail(&[], &EquipmentManifest::new(), "", "").unwrap();
        let exact = build_tail(&[], &EquipmentManifest::new(), &"a".repeat(0x10), "").unwrap();
        // one extra 0x10 row for a name that fills the first row
        assert_eq!(exact.len(), short.len() + 0x10);

        let name_tag = find_tag(&exact, EQUIP_NAME_TAG).unwrap();
        assert_eq!(&exact[name_tag + 0x10..name_tag + 0x20], "a".repeat(0x10).as_bytes());
    }

    #[test]
    fn test_category_truncated_at_block_end() {
        let tail = build_tail(&[], &EquipmentManifest::new(), "", &"c".repeat(0x40)).unwrap();
        let tag = find_tag(&tail, EQUIP_CATEGORY_TAG).unwrap();
        assert_eq!(tail.len() - tag, 0x20);
        assert_eq!(&tail[tag + 0x10..], "c".repeat(0x10).as_bytes());
    }

    #[test]
    fn test_manifest_ordinals_follow_record_order() {
        let mut manifest = EquipmentManifest::new();
        manifest.push_alias(Form::Child, 0, "slingshot");
        manifest.push_alias(Form::Child, 1, "ocarina");
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["OOT"]["child"]["0"], "slingshot");
        assert_eq!(json["OOT"]["child"]["1"], "ocarina");
    }

    #[test]
    fn test_retag_truncates_at_prior_marker() {
        // a previously assembled container: asset prefix, then a playas
        // manifest section that must be cut off
        let mut buf = vec![0x11u8; 0x20];
        let marker_at = buf.len();
        buf.extend_from_slice(PLAYAS_MARKER);
        buf.resize(marker_at + 0x10, 0);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(b"swordA\0");
        buf.extend_from_slice(&0x0000_0140u32.to_be_bytes());

        let mut aliases = FormTable::new();
        aliases.insert(Form::Adult, "swordA", "sword1");

        let out = retag_container(&buf, &aliases, Form::Adult, "renamed", "Master Sword").unwrap();

        // prefix kept verbatim, manifest section gone
        assert_eq!(&out[..marker_at], &buf[..marker_at]);
        assert_eq!(find_tag(&out, PLAYAS_MARKER), None);

        // the in-place offset was lifted into the single command record
        let identity = find_tag(&out, ML64_TAG).unwrap();
        let count = u32::from_be_bytes(out[identity + 0x0C..identity + 0x10].try_into().unwrap());
        assert_eq!(count, 1);
        let record = &out[identity + 0x10..identity + 0x18];
        assert_eq!(record[4], ENABLE_TAG);
        assert_eq!(&record[5..8], &[0x00, 0x01, 0x40]);
    }

    #[test]
    fn test_retag_without_marker_keeps_whole_buffer() {
        let mut buf = vec![0x22u8; 0x18];
        buf.extend_from_slice(b"shieldB\0");
        buf.extend_from_slice(&0x0000_0200u32.to_be_bytes());

        let mut aliases = FormTable::new();
        aliases.insert(Form::Adult, "shieldB", "shield1");

        let out = retag_container(&buf, &aliases, Form::Adult, "", "").unwrap();
        assert_eq!(&out[..buf.len()], &buf[..]);
    }
}
