//! Filtering of directory based assembly datasets.
//!
//! # Overview
//! A dataset directory holds a `meta.json` document and one file of values per *field*.
//! Every field has one value per record, aligned by position with the `identifiers` field:
//! ```text
//! ds1/
//!   meta.json             {"id": "ds1", "records": 4, "fields": [...]}
//!   identifiers.json      {"values": ["ctg1", "ctg2", "ctg3", "ctg4"], "keys": []}
//!   length.json           {"values": [1200, 560, 9800, 3020], "keys": []}
//!   bestsum_phylum.json   {"values": [0, 1, 0, 0], "keys": ["Chordata", "no-hit"]}
//! ```
//!
//! Fields come in three kinds, see [`Field`]:
//! * identifiers, the record ids,
//! * variables, one number per record, with their `range` in the metadata,
//! * categories, one code per record indexing the field's `keys`. Composite (`multiarray`)
//!   category fields hold a list of rows per record instead, one cell of which is a code.
//!
//! ## Filtering
//! Filters are given as `<field_id>--<param>=<value>` tokens, either directly or as the query
//! string of a viewer URL. Variables take `Min`, `Max` and `Inv`, categories take `Keys` and
//! `Inv`. See [`parse_params`].
//!
//! A [`FilterRun`] starts with every record and narrows the set one field at a time, then by
//! any identifier lists:
//! ```no_run
//! use blobfilter::*;
//!
//! let dataset = Dataset::open("ds1").unwrap();
//! let tokens = ["length--Min=1000".to_owned(), "bestsum_phylum--Keys=no-hit".to_owned()];
//! let selection = FilterRun::new()
//!     .params(parse_params(&tokens, None, dataset.meta()))
//!     .invert(true)
//!     .run(&dataset)
//!     .unwrap();
//!
//! create_filtered_dataset(&dataset, "ds1_filtered", selection.indices()).unwrap();
//! ```
//!
//! ## Materializing
//! [`create_filtered_dataset`] writes the retained records as a new dataset whose metadata
//! points back at the source through `origin`, with recomputed ranges, keys and record count.
//! The source directory is never modified.

pub mod dataset;
pub mod errors;
pub mod extract;
pub mod field;
pub mod file_io;
pub mod filter;
pub mod materialize;
pub mod meta;
pub mod params;

// commonly used functions and types

pub use crate::dataset::*;
pub use crate::errors::*;
pub use crate::extract::*;
pub use crate::field::*;
pub use crate::filter::*;
pub use crate::materialize::*;
pub use crate::meta::*;
pub use crate::params::*;
