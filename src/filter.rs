//! Alias and selection filtering
//!
//! Narrows a parsed manifest to the entries recognized by the alias table for
//! the active logical form. Alias and display-name tables are collaborator
//! inputs loaded from external JSON configuration; they are threaded in as
//! explicit values, never ambient state.

use crate::error::{EquipakError, Result};
use crate::manifest::PlayasManifest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Game family selecting which branch of the output manifest a form writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Oot,
    Mm,
}

/// Active logical form (age or species variant)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    Adult,
    Child,
    Human,
    Deku,
    Zora,
    Goron,
    Fd,
}

impl Form {
    /// Wire string used as the table key and output-manifest key
    pub fn as_str(self) -> &'static str {
        match self {
            Form::Adult => "adult",
            Form::Child => "child",
            Form::Human => "human",
            Form::Deku => "deku",
            Form::Zora => "zora",
            Form::Goron => "goron",
            Form::Fd => "fd",
        }
    }

    pub fn family(self) -> Family {
        match self {
            Form::Adult | Form::Child => Family::Oot,
            _ => Family::Mm,
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-level `form -> internal_name -> string` lookup table
///
/// Used for both the alias table (internal name to runtime alias) and the
/// display-name table (internal name to human-readable label). Deserializable
/// from the external JSON configuration shape:
///
/// ```json
/// { "adult": { "Sword2.Blade": "sword2" }, "child": { ... } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormTable {
    forms: BTreeMap<String, BTreeMap<String, String>>,
}

impl FormTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        form: Form,
        internal_name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.forms
            .entry(form.as_str().to_string())
            .or_default()
            .insert(internal_name.into(), value.into());
    }

    pub fn get(&self, form: Form, internal_name: &str) -> Option<&str> {
        self.forms
            .get(form.as_str())
            .and_then(|names| names.get(internal_name))
            .map(String::as_str)
    }

    /// Internal names known for `form`, in table order
    pub fn names_for(&self, form: Form) -> impl Iterator<Item = &str> {
        self.forms
            .get(form.as_str())
            .into_iter()
            .flat_map(|names| names.keys().map(String::as_str))
    }
}

/// A manifest entry that survived filtering, ready for selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentEntry {
    /// Name as it appears in the playas manifest
    pub internal_name: String,

    /// Human-readable label from the display-name table
    pub display_name: String,

    /// Absolute offset into the source container
    pub offset: u32,

    /// Caller-toggled selection flag
    pub enabled: bool,
}

/// Intersect parsed manifest entries with the alias table for `form`.
///
/// Entries keep manifest parse order. Each is annotated with its display name
/// (falling back to the internal name when the label table has no entry) and
/// starts disabled. An empty working set is reported as
/// [`EquipakError::NoDisplayLists`], distinct from a parse failure.
pub fn filter_entries(
    manifest: &PlayasManifest,
    aliases: &FormTable,
    names: &FormTable,
    form: Form,
) -> Result<Vec<EquipmentEntry>> {
    let entries: Vec<EquipmentEntry> = manifest
        .entries()
        .iter()
        .filter(|entry| aliases.get(form, &entry.name).is_some())
        .map(|entry| EquipmentEntry {
            internal_name: entry.name.clone(),
            display_name: names
                .get(form, &entry.name)
                .unwrap_or(&entry.name)
                .to_string(),
            offset: entry.offset,
            enabled: false,
        })
        .collect();

    if entries.is_empty() {
        return Err(EquipakError::NoDisplayLists(form));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PLAYAS_MARKER;

    fn manifest_of(records: &[(&str, u32)]) -> PlayasManifest {
        let mut buf = Vec::new();
        buf.extend_from_slice(PLAYAS_MARKER);
        buf.resize(0x10, 0);
        buf.extend_from_slice(&(records.len() as u16).to_be_bytes());
        for (name, offset) in records {
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
            buf.extend_from_slice(&offset.to_be_bytes());
        }
        PlayasManifest::parse(&buf).unwrap()
    }

    #[test]
    fn test_filter_keeps_aliased_entries_in_order() {
        let manifest = manifest_of(&[("swordA", 0x100), ("hatC", 0x180), ("shieldB", 0x200)]);
        let mut aliases = FormTable::new();
        aliases.insert(Form::Adult, "swordA", "sword1");
        aliases.insert(Form::Adult, "shieldB", "shield1");
        let mut names = FormTable::new();
        names.insert(Form::Adult, "swordA", "Kokiri Sword");

        let entries = filter_entries(&manifest, &aliases, &names, Form::Adult).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].internal_name, "swordA");
        assert_eq!(entries[0].display_name, "Kokiri Sword");
        assert_eq!(entries[0].offset, 0x100);
        assert!(!entries[0].enabled);
        // no display-name table entry falls back to the internal name
        assert_eq!(entries[1].display_name, "shieldB");
    }

    #[test]
    fn test_filter_respects_active_form() {
        let manifest = manifest_of(&[("swordA", 0x100)]);
        let mut aliases = FormTable::new();
        aliases.insert(Form::Child, "swordA", "sword1");
        let names = FormTable::new();

        let err = filter_entries(&manifest, &aliases, &names, Form::Adult).unwrap_err();
        assert!(matches!(err, EquipakError::NoDisplayLists(Form::Adult)));
    }

    #[test]
    fn test_empty_result_is_reported() {
        let manifest = manifest_of(&[("unknown", 0x100)]);
        let aliases = FormTable::new();
        let names = FormTable::new();
        assert!(matches!(
            filter_entries(&manifest, &aliases, &names, Form::Adult),
            Err(EquipakError::NoDisplayLists(_))
        ));
    }

    #[test]
    fn test_form_table_json_round_trip() {
        let json = r#"{"adult":{"Sword2.Blade":"sword2"},"child":{"Slingshot.Body":"slingshot"}}"#;
        let table: FormTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.get(Form::Adult, "Sword2.Blade"), Some("sword2"));
        assert_eq!(table.get(Form::Child, "Slingshot.Body"), Some("slingshot"));
        assert_eq!(table.get(Form::Adult, "Slingshot.Body"), None);

        let back = serde_json::to_string(&table).unwrap();
        let again: FormTable = serde_json::from_str(&back).unwrap();
        assert_eq!(again.get(Form::Child, "Slingshot.Body"), Some("slingshot"));
    }

    #[test]
    fn test_form_family() {
        assert_eq!(Form::Adult.family(), Family::Oot);
        assert_eq!(Form::Child.family(), Family::Oot);
        assert_eq!(Form::Goron.family(), Family::Mm);
        assert_eq!(Form::Fd.family(), Family::Mm);
    }
}
