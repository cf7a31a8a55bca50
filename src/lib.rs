//! # Equipak - Display-List Container Repacker
//!
//! `equipak` extracts, filters, deduplicates, and repacks binary display-list
//! assets embedded inside a compiled game-asset container ("zobj"), producing
//! a minimized output container plus an embedded JSON lookup manifest that a
//! runtime loader uses to select which assets to render.
//!
//! ## Pipeline
//!
//! ```text
//! raw container
//!   -> tag scan          locate the embedded !PlayAsManifest marker
//!   -> manifest parse    decode the count-prefixed name/offset table
//!   -> alias filter      keep the entries recognized for the active form
//!   -> graph compaction  copy only reachable spans, dedup, relocate pointers
//!   -> assembly          command records + JSON manifest + metadata blocks
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use equipak::{EquipmentSession, Form, FormTable, Result};
//!
//! # fn main() -> Result<()> {
//! let aliases: FormTable = serde_json::from_str(
//!     r#"{"adult": {"Sword2.Blade": "sword2"}}"#,
//! ).unwrap();
//! let names: FormTable = serde_json::from_str(
//!     r#"{"adult": {"Sword2.Blade": "Master Sword"}}"#,
//! ).unwrap();
//!
//! let mut session = EquipmentSession::new(aliases, names);
//! session.set_form(Form::Adult);
//! session.load_container_file("custom_link.zobj")?;
//! session.set_enabled("Sword2.Blade", true);
//! session.save("equipment.zobj", "my sword", "Master Sword", true)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Output container layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ compacted asset bytes                        │
//! │  - spans reachable from the enabled entries  │
//! │  - byte-identical spans stored once          │
//! │  - pointers rewritten to relocated offsets   │
//! ├──────────────────────────────────────────────┤
//! │ "MODLOADER64i" identity tag + command count  │
//! │ 8-byte command records (0xDE opcode)         │
//! ├──────────────────────────────────────────────┤
//! │ "EQUIPMANIFEST" tag + JSON manifest + 0xFF   │
//! ├──────────────────────────────────────────────┤
//! │ "EQUIPMENTNAME" / "EQUIPMENTCAT" blocks      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! All section boundaries are 16-byte aligned. The pipeline is synchronous
//! and single-threaded; one session owns one container at a time.

pub mod assemble;
pub mod compact;
pub mod error;
pub mod filter;
pub mod io;
pub mod manifest;
pub mod scan;
pub mod session;

// Re-export commonly used types
pub use assemble::{
    assemble_container, command_record, retag_container, EquipmentManifest, MAX_NAME_SIZE,
};
pub use compact::{compact, CompactResult, DEFAULT_MAX_DEPTH};
pub use error::{EquipakError, Result};
pub use filter::{filter_entries, EquipmentEntry, Family, Form, FormTable};
pub use manifest::{ManifestEntry, PlayasManifest, PLAYAS_MARKER};
pub use scan::{find_tag, find_tag_from};
pub use session::{is_failure, EquipmentSession, FAILURE_SENTINEL};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
