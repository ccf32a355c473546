//! Writing the retained records as a new dataset directory.
//!
//! Materializing happens in two phases. Staging projects and writes every field file, parents
//! before the fields that take their keys from them. Committing then writes `meta.json`, but
//! only if every field file was written; otherwise the staged files are removed again and the
//! destination is left without metadata.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::dataset::*;
use crate::errors::*;
use crate::field::*;
use crate::meta::*;

/// Field ids of `meta` ordered so that every field comes after its `parent`.
///
/// Fields keep their listing order otherwise. Parents that are not fields of the dataset are
/// ignored, and fields caught in a parent cycle are appended at the end.
pub fn dependency_order(meta: &Metadata) -> Vec<String> {
    let known = meta.list_fields().into_iter().collect::<FxHashSet<_>>();
    let mut pending = meta
        .list_fields()
        .into_iter()
        .map(|id| {
            let parent = meta
                .field_meta(&id)
                .and_then(|m| m.parent)
                .filter(|p| known.contains(p) && *p != id);
            (id, parent)
        })
        .collect::<Vec<_>>();

    let mut order = Vec::with_capacity(pending.len());
    let mut placed = FxHashSet::default();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|(id, parent)| {
            let ready = parent.as_ref().map_or(true, |p| placed.contains(p));
            if ready {
                placed.insert(id.clone());
                order.push(id.clone());
            }
            !ready
        });

        if pending.len() == before {
            warn!(
                "Fields {:?} have cyclic parents, writing them in listing order",
                pending.iter().map(|(id, _)| id).collect::<Vec<_>>()
            );
            order.extend(pending.drain(..).map(|(id, _)| id));
        }
    }
    order
}

/// Field files written to a destination directory whose metadata is not written yet.
#[derive(Debug)]
pub struct StagedDataset {
    dir: PathBuf,
    meta: Metadata,
    written: Vec<PathBuf>,
    failed: Vec<String>,
}

impl StagedDataset {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Fields whose file could not be written.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// Keys of the already staged category field `parent_id`.
    fn parent_keys(&self, parent_id: &str) -> Option<Vec<String>> {
        match fetch_field(&self.dir, parent_id, &self.meta) {
            Ok(Field::Category(parent)) => Some(parent.keys().to_vec()),
            Ok(_) => None,
            Err(e) => {
                warn!("Cannot take keys from parent field '{parent_id}': {e}");
                None
            }
        }
    }

    /// Write `meta.json`, making the destination a valid dataset.
    ///
    /// Fails, and rolls back, if any field file could not be written.
    pub fn commit(self) -> Result<Metadata> {
        if !self.failed.is_empty() {
            let reason = format!("could not write fields {:?}", self.failed);
            let dir = self.dir.display().to_string();
            self.rollback();
            return Err(Error::Materialize { dir, reason });
        }

        let path = self.meta.write(&self.dir)?;
        info!(
            "Wrote {} with {} records",
            path.display(),
            self.meta.records
        );
        Ok(self.meta)
    }

    /// Remove the staged field files, and any metadata that appeared in the meantime.
    pub fn rollback(self) {
        for path in &self.written {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Could not remove {}: {e}", path.display());
            }
        }
        if let Err(e) = remove_metadata(&self.dir) {
            warn!("{e}");
        }
    }
}

/// Delete `meta.json` and `meta.json.gz` from `dir`, if present.
fn remove_metadata(dir: &Path) -> Result<()> {
    for name in [META_FILE.to_owned(), format!("{META_FILE}.gz")] {
        let path = dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed stale {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::FileIo {
                    file: path.display().to_string(),
                    source: Box::new(e),
                })
            }
        }
    }
    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Project every data field of `source` onto `indices` and write it to `outdir`.
///
/// Fields that cannot be loaded or projected are reported and left out. Fields whose file
/// cannot be written are recorded in [`StagedDataset::failed`].
pub fn stage_filtered_dataset(
    source: &Dataset,
    outdir: impl AsRef<Path>,
    indices: &[usize],
) -> Result<StagedDataset> {
    let dir = outdir.as_ref().to_owned();
    if same_dir(source.dir(), &dir) {
        return Err(Error::Materialize {
            dir: dir.display().to_string(),
            reason: "the output directory is the source dataset".to_owned(),
        });
    }
    std::fs::create_dir_all(&dir).map_err(|e| Error::FileIo {
        file: dir.display().to_string(),
        source: Box::new(e),
    })?;
    // an earlier dataset in `outdir` must not stay valid while its fields are replaced
    remove_metadata(&dir)?;

    let mut staged = StagedDataset {
        meta: Metadata::filtered_from(source.meta(), indices.len()),
        dir,
        written: Vec::new(),
        failed: Vec::new(),
    };

    for field_id in dependency_order(source.meta()) {
        if source.meta().is_group(&field_id) {
            continue;
        }
        let Some(mut field_meta) = source.meta().field_meta(&field_id) else {
            continue;
        };
        if field_meta.type_name.is_none() {
            debug!("Skipping '{field_id}', it holds no values");
            continue;
        }

        let full = match source.fetch_field(&field_id) {
            Ok(field) => field,
            Err(e) => {
                warn!("Leaving out field '{field_id}': {e}");
                continue;
            }
        };

        let fixed_keys = match (&full, &field_meta.parent) {
            (Field::Category(_), Some(parent)) => staged.parent_keys(parent),
            _ => None,
        };

        let field = match full.project(indices, fixed_keys.as_deref()) {
            Ok(field) => field,
            Err(e) => {
                warn!("Leaving out field '{field_id}': {e}");
                continue;
            }
        };
        if let Err(e) = field.update_meta(&mut field_meta) {
            warn!("Leaving out field '{field_id}': {e}");
            continue;
        }

        match field.write(&staged.dir) {
            Ok(path) => staged.written.push(path),
            Err(e) => {
                warn!("Failed to write field '{field_id}': {e}");
                staged.failed.push(field_id);
                continue;
            }
        }

        let parents = source.meta().field_parent_list(&field_id);
        staged.meta.add_field(&parents, field_meta);
    }

    Ok(staged)
}

/// Write the records at `indices` of `source` as a new dataset in `outdir`.
pub fn create_filtered_dataset(
    source: &Dataset,
    outdir: impl AsRef<Path>,
    indices: &[usize],
) -> Result<Metadata> {
    stage_filtered_dataset(source, outdir, indices)?.commit()
}
