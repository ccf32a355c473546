use rustc_hash::FxHashSet;
use serde_json::{json, Value};

use crate::errors::*;
use crate::field::RawPayload;

/// Record identifiers; position `i` in `values` defines record index `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierField {
    field_id: String,
    values: Vec<String>,
}

impl IdentifierField {
    pub fn new(field_id: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let field_id = field_id.into();

        {
            let mut seen = FxHashSet::default();
            if let Some(dup) = values.iter().find(|v| !seen.insert(v.as_str())) {
                return Err(Error::format(field_id, format!("duplicate identifier \"{dup}\"")));
            }
        }

        Ok(Self { field_id, values })
    }

    pub(crate) fn from_raw(field_id: &str, raw: RawPayload) -> Result<Self> {
        let values = raw
            .values
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(Error::format(field_id, format!("{other} is not an identifier"))),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(field_id, values)
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn project(&self, indices: &[usize]) -> Self {
        Self {
            field_id: self.field_id.clone(),
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }

    pub fn to_payload(&self) -> Value {
        json!({ "values": self.values, "keys": [] })
    }
}
