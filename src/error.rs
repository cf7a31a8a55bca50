use crate::filter::Form;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EquipakError {
    #[error("playas manifest not found in container")]
    ManifestNotFound,

    #[error("no recognized display lists for form '{0}'")]
    NoDisplayLists(Form),

    #[error("equipment name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("no container loaded")]
    NoContainer,

    #[error("no entries enabled")]
    NothingSelected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Assembly error: {0}")]
    Assembly(String),
}

pub type Result<T> = std::result::Result<T, EquipakError>;
