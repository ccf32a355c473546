use std::path::Path;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::file_io::*;
use crate::filter::*;

#[derive(Debug, Deserialize)]
struct IdentifierList {
    identifiers: Vec<String>,
}

/// Read the `identifiers` array of a JSON (or YAML) selection document.
pub fn read_identifier_json(path: impl AsRef<Path>) -> Result<FxHashSet<String>> {
    let list: IdentifierList = read_structured_file(path)?;
    Ok(list.identifiers.into_iter().collect())
}

/// Read a whitespace separated list of identifiers.
pub fn read_identifier_list(path: impl AsRef<Path>) -> Result<FxHashSet<String>> {
    Ok(read_file(path)?
        .split_whitespace()
        .map(str::to_owned)
        .collect())
}

pub struct IdentifierListOp<'a> {
    identifiers: &'a [String],
    targets: &'a FxHashSet<String>,
    invert: bool,
}

impl<'a> IdentifierListOp<'a> {
    const NAME: &'static str = "IdentifierListOp";

    /// Retain records whose identifier is one of `targets`, or is not one of them when inverted.
    pub fn new(identifiers: &'a IdentifierField, targets: &'a FxHashSet<String>, invert: bool) -> Self {
        Self {
            identifiers: identifiers.values(),
            targets,
            invert,
        }
    }
}

impl<'a> FilterOp for IdentifierListOp<'a> {
    fn apply(&self, indices: Vec<usize>) -> Vec<usize> {
        indices
            .into_iter()
            .filter(|&i| self.targets.contains(&self.identifiers[i]) != self.invert)
            .collect()
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
