use std::path::{Path, PathBuf};

use crate::errors::*;
use crate::field::*;
use crate::meta::*;

/// Id of the field that defines record order.
pub const IDENTIFIERS: &str = "identifiers";

/// A dataset directory opened for reading.
#[derive(Debug, Clone)]
pub struct Dataset {
    dir: PathBuf,
    meta: Metadata,
}

impl Dataset {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        let meta = Metadata::load(&dir)?;
        Ok(Self { dir, meta })
    }

    pub fn from_parts(dir: impl AsRef<Path>, meta: Metadata) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
            meta,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn records(&self) -> usize {
        self.meta.records
    }

    pub fn fetch_field(&self, field_id: &str) -> Result<Field> {
        fetch_field(&self.dir, field_id, &self.meta)
    }

    pub fn identifiers(&self) -> Result<IdentifierField> {
        match self.fetch_field(IDENTIFIERS)? {
            Field::Identifier(ids) => Ok(ids),
            other => Err(Error::format(
                IDENTIFIERS,
                format!("expected an identifier field, found {}", other.field_type()),
            )),
        }
    }
}
