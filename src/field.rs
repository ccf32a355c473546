//! Typed views over the per-record columns of a dataset directory.
//!
//! Every field is stored in its own `<field_id>.json` (or `<field_id>.json.gz`) file holding
//! `{"values": [...], "keys": [...]}`. The descriptor in `meta.json` decides how the values are
//! read.

mod identifier_field;
pub use identifier_field::*;

mod variable_field;
pub use variable_field::*;

mod category_field;
pub use category_field::*;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::errors::*;
use crate::file_io::*;
use crate::meta::*;

#[derive(Debug, Deserialize)]
pub(crate) struct RawPayload {
    pub values: Vec<Value>,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// A loaded field. Fields are immutable; filtering builds new ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Identifier(IdentifierField),
    Variable(VariableField),
    Category(CategoryField),
}

impl Field {
    pub fn field_id(&self) -> &str {
        match self {
            Field::Identifier(f) => f.field_id(),
            Field::Variable(f) => f.field_id(),
            Field::Category(f) => f.field_id(),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Identifier(_) => FieldType::Identifier,
            Field::Variable(_) => FieldType::Variable,
            Field::Category(f) if f.is_composite() => FieldType::MultiArray,
            Field::Category(_) => FieldType::Category,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Field::Identifier(f) => f.len(),
            Field::Variable(f) => f.len(),
            Field::Category(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A field of the same type holding only the records at `indices`, in that order.
    ///
    /// `fixed_keys` only applies to category fields. Variable fields cannot be projected
    /// onto an empty selection since their range would be undefined.
    pub fn project(&self, indices: &[usize], fixed_keys: Option<&[String]>) -> Result<Field> {
        match self {
            Field::Identifier(f) => Ok(Field::Identifier(f.project(indices))),
            Field::Variable(f) => {
                if indices.is_empty() {
                    return Err(Error::filter(f.field_id(), "no records left to take a range over"));
                }
                Ok(Field::Variable(f.project(indices)))
            }
            Field::Category(f) => Ok(Field::Category(f.project(indices, fixed_keys)?)),
        }
    }

    /// Refresh the descriptor attributes that are derived from the values.
    pub fn update_meta(&self, meta: &mut FieldMeta) -> Result<()> {
        match self {
            Field::Identifier(_) => {}
            Field::Variable(f) => meta.range = Some(f.range_numbers()?),
            Field::Category(f) => {
                if meta.keys.is_some() {
                    meta.keys = Some(f.keys().to_vec());
                }
                if f.is_composite() {
                    meta.category_slot = f.category_slot();
                    meta.headers = f.headers().map(<[String]>::to_vec);
                }
            }
        }
        Ok(())
    }

    pub fn to_payload(&self) -> Result<Value> {
        match self {
            Field::Identifier(f) => Ok(f.to_payload()),
            Field::Variable(f) => f.to_payload(),
            Field::Category(f) => Ok(f.to_payload()),
        }
    }

    /// Write the values to `<dir>/<field_id>.json`.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(format!("{}.json", self.field_id()));
        write_structured_file(&path, &self.to_payload()?)?;
        Ok(path)
    }
}

/// The file holding the values of `field_id`, if there is one.
pub fn field_path(dir: impl AsRef<Path>, field_id: &str) -> Option<PathBuf> {
    let dir = dir.as_ref();
    [format!("{field_id}.json"), format!("{field_id}.json.gz")]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Load the field `field_id` of the dataset in `dir`, typed according to `meta`.
pub fn fetch_field(dir: impl AsRef<Path>, field_id: &str, meta: &Metadata) -> Result<Field> {
    let dir = dir.as_ref();
    let field_meta = meta
        .field_meta(field_id)
        .ok_or_else(|| Error::FieldNotFound(field_id.to_owned()))?;
    let field_type = field_meta
        .field_type()
        .ok_or_else(|| Error::format(field_id, "descriptor has no type"))??;

    let path = field_path(dir, field_id).ok_or_else(|| Error::FileIo {
        file: dir.join(format!("{field_id}.json")).display().to_string(),
        source: Box::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
    })?;
    let mut raw: RawPayload = read_structured_file(&path)?;
    if raw.keys.is_empty() {
        if let Some(keys) = &field_meta.keys {
            raw.keys = keys.clone();
        }
    }

    let field = match field_type {
        FieldType::Identifier => Field::Identifier(IdentifierField::from_raw(field_id, raw)?),
        FieldType::Variable => Field::Variable(VariableField::from_raw(field_id, raw)?),
        FieldType::Category => Field::Category(CategoryField::from_raw(field_id, raw, None)?),
        FieldType::MultiArray => Field::Category(CategoryField::from_raw(
            field_id,
            raw,
            Some((
                field_meta.category_slot,
                field_meta.headers.clone().unwrap_or_default(),
            )),
        )?),
    };

    if field.len() != meta.records {
        return Err(Error::format(
            field_id,
            format!("{} values for {} records", field.len(), meta.records),
        ));
    }

    Ok(field)
}
