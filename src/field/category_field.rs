use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{json, Value};

use crate::errors::*;
use crate::field::RawPayload;

pub type Row = Vec<Value>;

/// Encoded per-record values of a category field.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryValues {
    /// One code per record.
    Codes(Vec<usize>),
    /// A list of rows per record. The cell at `category_slot`, when there is one, holds a code.
    Rows {
        category_slot: Option<usize>,
        headers: Vec<String>,
        records: Vec<Vec<Row>>,
    },
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum Expanded {
    Label(String),
    Rows(Vec<Row>),
}

/// How the key list of a re-encoded field is chosen.
#[derive(Debug, Clone, Copy)]
pub enum KeyOrder<'a> {
    /// Use this domain as is, appending any label it is missing.
    Fixed(&'a [String]),
    /// Keep this order but drop labels that no longer occur.
    Restrict(&'a [String]),
}

/// Label-encoded values: codes index into `keys`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryField {
    field_id: String,
    keys: Vec<String>,
    values: CategoryValues,
}

fn as_code(field_id: &str, keys: &[String], cell: &Value) -> Result<usize> {
    cell.as_u64()
        .map(|c| c as usize)
        .filter(|&c| c < keys.len())
        .ok_or_else(|| {
            Error::format(
                field_id,
                format!("{cell} is not a code for one of {} keys", keys.len()),
            )
        })
}

impl CategoryField {
    pub fn new(field_id: impl Into<String>, keys: Vec<String>, codes: Vec<usize>) -> Result<Self> {
        let field_id = field_id.into();
        if let Some(bad) = codes.iter().find(|&&c| c >= keys.len()) {
            return Err(Error::format(
                field_id,
                format!("{bad} is not a code for one of {} keys", keys.len()),
            ));
        }

        Ok(Self {
            field_id,
            keys,
            values: CategoryValues::Codes(codes),
        })
    }

    /// A composite field whose records are lists of rows.
    pub fn multiarray(
        field_id: impl Into<String>,
        keys: Vec<String>,
        category_slot: Option<usize>,
        headers: Vec<String>,
        records: Vec<Vec<Row>>,
    ) -> Result<Self> {
        let field_id = field_id.into();
        if let Some(slot) = category_slot {
            for row in records.iter().flatten() {
                let cell = row.get(slot).ok_or_else(|| {
                    Error::format(&field_id, format!("row has no cell at category slot {slot}"))
                })?;
                as_code(&field_id, &keys, cell)?;
            }
        }

        Ok(Self {
            field_id,
            keys,
            values: CategoryValues::Rows {
                category_slot,
                headers,
                records,
            },
        })
    }

    pub(crate) fn from_raw(
        field_id: &str,
        raw: RawPayload,
        composite: Option<(Option<usize>, Vec<String>)>,
    ) -> Result<Self> {
        match composite {
            None => {
                let codes = raw
                    .values
                    .iter()
                    .map(|v| as_code(field_id, &raw.keys, v))
                    .collect::<Result<Vec<_>>>()?;
                Self::new(field_id, raw.keys, codes)
            }
            Some((category_slot, headers)) => {
                let records = serde_json::from_value::<Vec<Vec<Row>>>(Value::Array(raw.values))
                    .map_err(|e| Error::format(field_id, e.to_string()))?;
                Self::multiarray(field_id, raw.keys, category_slot, headers, records)
            }
        }
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &CategoryValues {
        &self.values
    }

    /// Per-record codes, for fields with one value per record.
    pub fn codes(&self) -> Option<&[usize]> {
        match &self.values {
            CategoryValues::Codes(codes) => Some(codes),
            CategoryValues::Rows { .. } => None,
        }
    }

    pub fn category_slot(&self) -> Option<usize> {
        match &self.values {
            CategoryValues::Codes(_) => None,
            CategoryValues::Rows { category_slot, .. } => *category_slot,
        }
    }

    pub fn headers(&self) -> Option<&[String]> {
        match &self.values {
            CategoryValues::Codes(_) => None,
            CategoryValues::Rows { headers, .. } => Some(headers),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.values, CategoryValues::Rows { .. })
    }

    pub fn len(&self) -> usize {
        match &self.values {
            CategoryValues::Codes(codes) => codes.len(),
            CategoryValues::Rows { records, .. } => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key_index(&self, label: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == label)
    }

    /// Decode the value of record `i`.
    pub fn expand(&self, i: usize) -> Expanded {
        match &self.values {
            CategoryValues::Codes(codes) => Expanded::Label(self.keys[codes[i]].clone()),
            CategoryValues::Rows {
                category_slot,
                records,
                ..
            } => {
                let mut rows = records[i].clone();
                if let Some(slot) = *category_slot {
                    for row in rows.iter_mut() {
                        // codes were checked on construction
                        if let Some(code) = row[slot].as_u64() {
                            row[slot] = Value::String(self.keys[code as usize].clone());
                        }
                    }
                }
                Expanded::Rows(rows)
            }
        }
    }

    /// Decode every record, in record order. Each call starts a fresh pass.
    pub fn expand_values(&self) -> impl Iterator<Item = Expanded> + '_ {
        (0..self.len()).map(move |i| self.expand(i))
    }

    /// Keep the records at `indices`, re-encoding their decoded values.
    ///
    /// With `fixed_keys` the key domain is taken from there (for fields that share a parent's
    /// encoding), otherwise the current key order is kept for the labels that remain.
    pub fn project(&self, indices: &[usize], fixed_keys: Option<&[String]>) -> Result<Self> {
        let expanded = indices.iter().map(|&i| self.expand(i)).collect::<Vec<_>>();
        let order = match fixed_keys {
            Some(keys) => KeyOrder::Fixed(keys),
            None => KeyOrder::Restrict(&self.keys),
        };
        self.collapse(expanded, order)
    }

    fn collapse(&self, expanded: Vec<Expanded>, order: KeyOrder) -> Result<Self> {
        let slot = self.category_slot();

        // one label per record, or per row for composite fields
        let mut labels = Vec::new();
        let mut records = Vec::new();
        for value in expanded {
            match (value, &self.values) {
                (Expanded::Label(label), CategoryValues::Codes(_)) => labels.push(label),
                (Expanded::Rows(rows), CategoryValues::Rows { .. }) => {
                    if let Some(slot) = slot {
                        for row in &rows {
                            let label = row.get(slot).and_then(Value::as_str).ok_or_else(|| {
                                Error::format(&self.field_id, "expanded row has no label at the category slot")
                            })?;
                            labels.push(label.to_owned());
                        }
                    }
                    records.push(rows);
                }
                _ => {
                    return Err(Error::format(
                        &self.field_id,
                        "expanded value does not match the field layout",
                    ))
                }
            }
        }

        let present = labels.iter().map(String::as_str).collect::<FxHashSet<_>>();
        let mut keys = match order {
            KeyOrder::Fixed(domain) => domain.to_vec(),
            KeyOrder::Restrict(domain) => domain
                .iter()
                .filter(|k| present.contains(k.as_str()))
                .cloned()
                .collect(),
        };
        let mut codes = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect::<FxHashMap<_, _>>();
        for label in &labels {
            if !codes.contains_key(label.as_str()) {
                codes.insert(label.clone(), keys.len());
                keys.push(label.clone());
            }
        }

        let label_codes = labels.iter().map(|l| codes[l.as_str()]);
        let values = match &self.values {
            CategoryValues::Codes(_) => CategoryValues::Codes(label_codes.collect()),
            CategoryValues::Rows {
                category_slot,
                headers,
                ..
            } => {
                // rows are visited in the order their labels were collected
                if let Some(slot) = *category_slot {
                    for (row, code) in records.iter_mut().flatten().zip(label_codes) {
                        row[slot] = Value::from(code);
                    }
                }
                CategoryValues::Rows {
                    category_slot: *category_slot,
                    headers: headers.clone(),
                    records,
                }
            }
        };

        Ok(Self {
            field_id: self.field_id.clone(),
            keys,
            values,
        })
    }

    pub fn to_payload(&self) -> Value {
        match &self.values {
            CategoryValues::Codes(codes) => json!({ "values": codes, "keys": self.keys }),
            CategoryValues::Rows { records, .. } => json!({ "values": records, "keys": self.keys }),
        }
    }
}
