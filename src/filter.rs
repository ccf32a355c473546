//! Selecting records.
//!
//! A run starts from every record index and narrows that set one op at a time: first one op
//! per field named in the filter parameters, in the order the fields were named, then the
//! identifier lists. Every op only ever removes indices, so the result keeps the original
//! record order.
//!
//! The global invert flag is combined with each field's own `Inv` flag by XOR. An inverted
//! field op complements its predicate over the indices that reach it, not over the whole
//! dataset.

mod ops;
pub use ops::*;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::dataset::*;
use crate::errors::*;
use crate::field::*;
use crate::params::*;

pub trait FilterOp {
    /// Keep the indices this op retains, in their current order.
    fn apply(&self, indices: Vec<usize>) -> Vec<usize>;

    fn name(&self) -> &'static str;
}

/// Whether a field's predicate is inverted, given its parameters and the global flag.
pub fn is_inverted(params: &FieldParams, invert_all: bool) -> bool {
    let own = params.get(&Param::Inv).is_some_and(|v| is_truthy(v));
    own != invert_all
}

/// The op filtering `field` with `params`.
pub fn field_op<'a>(
    field: &'a Field,
    params: &FieldParams,
    invert_all: bool,
) -> Result<Box<dyn FilterOp + 'a>> {
    match field {
        Field::Identifier(f) => Err(Error::filter(
            f.field_id(),
            "identifier fields take no filter parameters",
        )),
        Field::Variable(f) => Ok(Box::new(VariableRangeOp::new(f, params, invert_all)?)),
        Field::Category(f) => Ok(Box::new(CategoryKeysOp::new(f, params, invert_all)?)),
    }
}

/// Narrow `indices` by the per-field parameters.
///
/// A field that cannot be loaded or whose parameters cannot be resolved is reported and
/// leaves the indices unchanged.
pub fn filter_by_params(
    dataset: &Dataset,
    mut indices: Vec<usize>,
    params: &FilterParams,
    invert_all: bool,
) -> Vec<usize> {
    for (field_id, field_params) in params.iter() {
        let field = match dataset.fetch_field(field_id) {
            Ok(field) => field,
            Err(e) => {
                warn!("Not filtering on field '{field_id}': {e}");
                continue;
            }
        };
        let op = match field_op(&field, field_params, invert_all) {
            Ok(op) => op,
            Err(e) => {
                warn!("Not filtering on field '{field_id}': {e}");
                continue;
            }
        };

        let before = indices.len();
        indices = op.apply(indices);
        debug!(
            "{} on '{field_id}' kept {} of {before} records",
            op.name(),
            indices.len()
        );
    }
    indices
}

/// Narrow `indices` to the records listed in `targets` (or not listed, when inverted).
pub fn filter_by_identifiers(
    identifiers: &IdentifierField,
    indices: Vec<usize>,
    targets: &FxHashSet<String>,
    invert: bool,
) -> Vec<usize> {
    IdentifierListOp::new(identifiers, targets, invert).apply(indices)
}

/// Narrow `indices` to the records listed in the `identifiers` array of `json_file`.
pub fn filter_by_json(
    identifiers: &IdentifierField,
    indices: Vec<usize>,
    json_file: impl AsRef<std::path::Path>,
    invert: bool,
) -> Result<Vec<usize>> {
    let targets = read_identifier_json(json_file)?;
    Ok(filter_by_identifiers(identifiers, indices, &targets, invert))
}

/// The records retained by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    indices: Vec<usize>,
    identifiers: Vec<String>,
    total: usize,
}

impl Selection {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Number of records before filtering.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Builder for one filtering run over a dataset.
#[derive(Debug, Clone, Default)]
pub struct FilterRun {
    params: FilterParams,
    id_lists: Vec<FxHashSet<String>>,
    invert: bool,
}

impl FilterRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: FilterParams) -> Self {
        self.params = params;
        self
    }

    /// Add an identifier list; several lists are applied one after the other.
    pub fn identifiers(mut self, targets: FxHashSet<String>) -> Self {
        self.id_lists.push(targets);
        self
    }

    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn run(&self, dataset: &Dataset) -> Result<Selection> {
        let identifiers = dataset.identifiers()?;
        let mut indices = (0..identifiers.len()).collect::<Vec<_>>();
        let total = indices.len();

        if !self.params.is_empty() {
            indices = filter_by_params(dataset, indices, &self.params, self.invert);
        }
        for targets in &self.id_lists {
            indices = filter_by_identifiers(&identifiers, indices, targets, self.invert);
        }

        let retained = indices
            .iter()
            .map(|&i| identifiers.values()[i].clone())
            .collect();
        Ok(Selection {
            indices,
            identifiers: retained,
            total,
        })
    }
}
