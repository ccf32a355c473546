use rustc_hash::FxHashSet;

use crate::filter::*;

pub struct CategoryKeysOp<'a> {
    codes: &'a [usize],
    keys: FxHashSet<usize>,
}

impl<'a> CategoryKeysOp<'a> {
    const NAME: &'static str = "CategoryKeysOp";

    /// Retain records whose category is one of the requested keys.
    ///
    /// `Keys` is a comma separated list of key indices or labels and defaults to every key of
    /// the field. When the filter is inverted the complement over the field's keys is used.
    pub fn new(field: &'a CategoryField, params: &FieldParams, invert_all: bool) -> Result<Self> {
        let codes = field.codes().ok_or_else(|| {
            Error::filter(field.field_id(), "composite fields cannot be filtered by keys")
        })?;

        let mut keys = match params.get(&Param::Keys).filter(|k| !k.is_empty()) {
            Some(requested) => requested
                .split(',')
                .map(|k| resolve_key(field, k.trim()))
                .collect::<Result<FxHashSet<_>>>()?,
            None => (0..field.keys().len()).collect(),
        };

        if is_inverted(params, invert_all) {
            keys = (0..field.keys().len()).filter(|k| !keys.contains(k)).collect();
        }

        Ok(Self { codes, keys })
    }

    pub fn keys(&self) -> &FxHashSet<usize> {
        &self.keys
    }
}

fn resolve_key(field: &CategoryField, key: &str) -> Result<usize> {
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        let idx = key
            .parse::<usize>()
            .map_err(|e| Error::filter(field.field_id(), format!("bad key index \"{key}\": {e}")))?;
        if idx >= field.keys().len() {
            return Err(Error::filter(
                field.field_id(),
                format!("key index {idx} is out of range for {} keys", field.keys().len()),
            ));
        }
        return Ok(idx);
    }

    field
        .key_index(key)
        .ok_or_else(|| Error::filter(field.field_id(), format!("\"{key}\" is not one of its keys")))
}

impl<'a> FilterOp for CategoryKeysOp<'a> {
    fn apply(&self, indices: Vec<usize>) -> Vec<usize> {
        indices
            .into_iter()
            .filter(|&i| self.keys.contains(&self.codes[i]))
            .collect()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
