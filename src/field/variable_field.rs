use serde_json::{json, Number, Value};

use crate::errors::*;
use crate::field::RawPayload;

/// One number per record.
///
/// Fields whose values were all stored as integers are written back as integers.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableField {
    field_id: String,
    values: Vec<f64>,
    integral: bool,
}

impl VariableField {
    pub fn new(field_id: impl Into<String>, values: Vec<f64>) -> Self {
        let integral = values.iter().all(|v| v.fract() == 0.0);
        Self {
            field_id: field_id.into(),
            values,
            integral,
        }
    }

    pub(crate) fn from_raw(field_id: &str, raw: RawPayload) -> Result<Self> {
        let integral = raw.values.iter().all(|v| v.is_i64() || v.is_u64());
        let values = raw
            .values
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| Error::format(field_id, format!("{v} is not a number")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            field_id: field_id.to_owned(),
            values,
            integral,
        })
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(min, max)` of the values, `None` for an empty field.
    pub fn range(&self) -> Option<(f64, f64)> {
        let mut values = self.values.iter().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(low, high), v| (low.min(v), high.max(v))))
    }

    /// The range in the form stored in `meta.json`.
    pub fn range_numbers(&self) -> Result<[Number; 2]> {
        let (low, high) = self
            .range()
            .ok_or_else(|| Error::filter(&self.field_id, "no values to take a range over"))?;
        Ok([self.to_number(low)?, self.to_number(high)?])
    }

    fn to_number(&self, v: f64) -> Result<Number> {
        // 2^63 and 2^64 are exact as f64, so these bounds exclude saturating casts
        const I64_END: f64 = 9_223_372_036_854_775_808.0;
        const U64_END: f64 = 18_446_744_073_709_551_616.0;

        let number = if !self.integral {
            Number::from_f64(v)
        } else if (-I64_END..I64_END).contains(&v) {
            Some(Number::from(v as i64))
        } else if (0.0..U64_END).contains(&v) {
            Some(Number::from(v as u64))
        } else {
            None
        };
        number.ok_or_else(|| Error::format(&self.field_id, format!("{v} cannot be stored as JSON")))
    }

    pub fn project(&self, indices: &[usize]) -> Self {
        Self {
            field_id: self.field_id.clone(),
            values: indices.iter().map(|&i| self.values[i]).collect(),
            integral: self.integral,
        }
    }

    pub fn to_payload(&self) -> Result<Value> {
        let values = self
            .values
            .iter()
            .map(|&v| self.to_number(v).map(Value::Number))
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({ "values": values, "keys": [] }))
    }
}
