use crate::filter::*;

pub struct VariableRangeOp<'a> {
    values: &'a [f64],
    low: f64,
    high: f64,
    invert: bool,
}

fn bound(field: &VariableField, params: &FieldParams, param: Param, default: f64) -> Result<f64> {
    match params.get(&param).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(v) => v.parse::<f64>().map_err(|e| {
            Error::filter(field.field_id(), format!("bad {param:?} value \"{v}\": {e}"))
        }),
        None => Ok(default),
    }
}

impl<'a> VariableRangeOp<'a> {
    const NAME: &'static str = "VariableRangeOp";

    /// Retain records whose value lies in `[Min, Max]`, both ends inclusive.
    ///
    /// Missing bounds are unbounded. Inverted, the records strictly outside the bounds are
    /// retained instead.
    pub fn new(field: &'a VariableField, params: &FieldParams, invert_all: bool) -> Result<Self> {
        Ok(Self {
            values: field.values(),
            low: bound(field, params, Param::Min, f64::NEG_INFINITY)?,
            high: bound(field, params, Param::Max, f64::INFINITY)?,
            invert: is_inverted(params, invert_all),
        })
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.low, self.high)
    }
}

impl<'a> FilterOp for VariableRangeOp<'a> {
    fn apply(&self, indices: Vec<usize>) -> Vec<usize> {
        let (low, high) = (self.low, self.high);
        if self.invert {
            indices
                .into_iter()
                .filter(|&i| self.values[i] < low || self.values[i] > high)
                .collect()
        } else {
            indices
                .into_iter()
                .filter(|&i| low <= self.values[i] && self.values[i] <= high)
                .collect()
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
