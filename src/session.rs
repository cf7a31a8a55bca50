//! Equipment session orchestrator
//!
//! Owns the loaded container, the active logical form, and the selection
//! state, and drives the load -> parse -> filter -> compact -> assemble
//! pipeline as a strict synchronous sequence. One session owns one container
//! at a time; a new load replaces the prior container and invalidates every
//! entry and offset computed against it. Failed calls leave no partial state.

use crate::assemble::{
    assemble_container, command_record, retag_container, EquipmentManifest, MAX_NAME_SIZE,
};
use crate::compact::{compact, DEFAULT_MAX_DEPTH};
use crate::error::{EquipakError, Result};
use crate::filter::{filter_entries, EquipmentEntry, Form, FormTable};
use crate::io;
use crate::manifest::PlayasManifest;
use std::path::Path;
use tracing::{error, info};

/// Minimal invalid buffer returned on the event surface when generation
/// fails; consumers detect failure by length alone
pub const FAILURE_SENTINEL: &[u8] = &[0];

/// Whether a generated buffer is the failure sentinel
pub fn is_failure(buf: &[u8]) -> bool {
    buf.len() <= 1
}

pub struct EquipmentSession {
    aliases: FormTable,
    names: FormTable,
    form: Form,
    container: Option<Vec<u8>>,
    entries: Vec<EquipmentEntry>,
}

impl EquipmentSession {
    /// Create a session over the collaborator tables. Both tables are
    /// read-only for the session's lifetime.
    pub fn new(aliases: FormTable, names: FormTable) -> Self {
        EquipmentSession {
            aliases,
            names,
            form: Form::Adult,
            container: None,
            entries: Vec::new(),
        }
    }

    pub fn form(&self) -> Form {
        self.form
    }

    /// Switch the active logical form. Entries already filtered stay as
    /// loaded; the form takes effect on the next load and on generation.
    pub fn set_form(&mut self, form: Form) {
        self.form = form;
    }

    /// Load a source container, replacing any prior one.
    ///
    /// Parsing and filtering run before any state is committed, so a failed
    /// load keeps the previously loaded container and entries intact.
    pub fn load_container(&mut self, bytes: Vec<u8>) -> Result<()> {
        let manifest = PlayasManifest::parse(&bytes)?;
        let entries = filter_entries(&manifest, &self.aliases, &self.names, self.form)?;
        info!(
            entries = entries.len(),
            container_len = bytes.len(),
            form = %self.form,
            "container loaded"
        );
        self.container = Some(bytes);
        self.entries = entries;
        Ok(())
    }

    pub fn load_container_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = io::read_container(path)?;
        self.load_container(bytes)
    }

    pub fn entries(&self) -> &[EquipmentEntry] {
        &self.entries
    }

    /// Toggle one entry by internal name (first occurrence wins). Returns
    /// false when no entry matches.
    pub fn set_enabled(&mut self, internal_name: &str, enabled: bool) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.internal_name == internal_name)
        {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Disable every entry
    pub fn clear_selection(&mut self) {
        for entry in &mut self.entries {
            entry.enabled = false;
        }
    }

    /// Generate the output container for the enabled entries.
    ///
    /// The name is validated before any buffer work; compaction runs over the
    /// enabled entries' offsets with the default depth bound; command records
    /// and manifest ordinals follow selection order.
    pub fn generate(&self, name: &str, category: &str, dedupe: bool) -> Result<Vec<u8>> {
        if name.len() >= MAX_NAME_SIZE {
            return Err(EquipakError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_SIZE,
            });
        }
        let container = self.container.as_deref().ok_or(EquipakError::NoContainer)?;

        let enabled: Vec<&EquipmentEntry> =
            self.entries.iter().filter(|entry| entry.enabled).collect();
        if enabled.is_empty() {
            return Err(EquipakError::NothingSelected);
        }
        let roots: Vec<u32> = enabled.iter().map(|entry| entry.offset).collect();

        let compacted = compact(container, &roots, 0, DEFAULT_MAX_DEPTH, dedupe);

        let mut manifest = EquipmentManifest::new();
        let mut commands = Vec::with_capacity(enabled.len());
        for entry in &enabled {
            let new_offset = compacted.relocations.get(&entry.offset).copied().ok_or_else(
                || EquipakError::Assembly(format!("no relocation for root 0x{:06X}", entry.offset)),
            )?;
            let alias = self
                .aliases
                .get(self.form, &entry.internal_name)
                .unwrap_or(entry.internal_name.as_str());
            manifest.push_alias(self.form, commands.len(), alias);
            commands.push(command_record(new_offset));
        }

        assemble_container(&compacted.container, &commands, &manifest, name, category)
    }

    /// Event-surface wrapper around [`generate`](Self::generate): failures are
    /// logged and surfaced as the one-byte [`FAILURE_SENTINEL`] so consumers
    /// can detect them by length without structured error types.
    pub fn generate_buffer(&self, name: &str, category: &str, dedupe: bool) -> Vec<u8> {
        match self.generate(name, category, dedupe) {
            Ok(buf) => buf,
            Err(err) => {
                error!(%err, "error creating equipment container");
                FAILURE_SENTINEL.to_vec()
            }
        }
    }

    /// Re-tag an already-assembled container (rename/recategorize) without
    /// re-running compaction.
    pub fn retag(&self, buf: &[u8], name: &str, category: &str) -> Result<Vec<u8>> {
        if name.len() >= MAX_NAME_SIZE {
            return Err(EquipakError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_SIZE,
            });
        }
        retag_container(buf, &self.aliases, self.form, name, category)
    }

    /// Event-surface wrapper: read, re-tag, sentinel on failure.
    pub fn retag_file<P: AsRef<Path>>(&self, path: P, name: &str, category: &str) -> Vec<u8> {
        let buf = match io::read_container(path) {
            Ok(buf) => buf,
            Err(err) => {
                error!(%err, "error reading equipment container");
                return FAILURE_SENTINEL.to_vec();
            }
        };
        match self.retag(&buf, name, category) {
            Ok(out) => out,
            Err(err) => {
                error!(%err, "error creating equipment container");
                FAILURE_SENTINEL.to_vec()
            }
        }
    }

    /// Generate and write the output container in one step
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        category: &str,
        dedupe: bool,
    ) -> Result<()> {
        let buf = self.generate(name, category, dedupe)?;
        io::write_container(path, &buf)
    }
}
