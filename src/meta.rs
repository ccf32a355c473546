//! The `meta.json` document describing a dataset directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::errors::*;
use crate::file_io::*;

pub const META_FILE: &str = "meta.json";

/// Storage type of a field, as named by the `type` attribute of its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Identifier,
    Variable,
    Category,
    /// Composite category: every record holds a list of rows, one cell of which may be a
    /// category code.
    MultiArray,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        use FieldType::*;
        match self {
            Identifier => "identifier",
            Variable => "variable",
            Category => "category",
            MultiArray => "multiarray",
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        use FieldType::*;
        match s {
            "identifier" => Ok(Identifier),
            "variable" => Ok(Variable),
            "category" => Ok(Category),
            "multiarray" => Ok(MultiArray),
            _ => Err(Error::Parse {
                string: s.to_owned(),
                context: "field type".to_owned(),
                reason: "unknown field type",
            }),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the `fields` tree.
///
/// Attributes this crate does not interpret are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FieldMeta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<FieldMeta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[Number; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_slot: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldMeta {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            type_name: Some(field_type.as_str().to_owned()),
            ..Default::default()
        }
    }

    pub fn field_type(&self) -> Option<Result<FieldType>> {
        self.type_name.as_deref().map(FieldType::from_str)
    }

    /// Whether this entry only groups other fields.
    pub fn is_group(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn range_f64(&self) -> Option<(f64, f64)> {
        let [low, high] = self.range.as_ref()?;
        Some((low.as_f64()?, high.as_f64()?))
    }

    /// A copy of this descriptor without its nested entries.
    pub fn shell(&self) -> Self {
        Self {
            children: None,
            data: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Children,
    Data,
}

/// One ancestor on the path from the top of the `fields` tree to a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentStep {
    pub id: String,
    pub relation: Relation,
    /// Attributes of the ancestor, used when it has to be created in another document.
    pub shell: FieldMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    #[serde(default)]
    pub records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    /// Load the metadata document of a dataset directory (`meta.json` or `meta.json.gz`).
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let gz = dir.join(format!("{META_FILE}.gz"));
        let path = if gz.exists() { gz } else { dir.join(META_FILE) };
        read_structured_file(path)
    }

    pub fn write(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(META_FILE);
        write_structured_file(&path, self)?;
        Ok(path)
    }

    /// Start the metadata of a dataset filtered from `source`: same attributes, no fields,
    /// `origin` pointing back at the source.
    pub fn filtered_from(source: &Metadata, records: usize) -> Self {
        Self {
            fields: Vec::new(),
            origin: Some(source.id.clone()),
            records,
            ..source.clone()
        }
    }

    fn find(&self, field_id: &str) -> Option<(&FieldMeta, Vec<ParentStep>)> {
        fn walk<'a>(
            fields: &'a [FieldMeta],
            field_id: &str,
            path: &mut Vec<ParentStep>,
        ) -> Option<&'a FieldMeta> {
            for f in fields {
                if f.id == field_id {
                    return Some(f);
                }

                for (relation, nested) in [(Relation::Data, &f.data), (Relation::Children, &f.children)] {
                    let Some(nested) = nested else { continue };
                    path.push(ParentStep {
                        id: f.id.clone(),
                        relation,
                        shell: f.shell(),
                    });
                    if let Some(found) = walk(nested, field_id, path) {
                        return Some(found);
                    }
                    path.pop();
                }
            }
            None
        }

        let mut path = Vec::new();
        walk(&self.fields, field_id, &mut path).map(|f| (f, path))
    }

    pub fn has_field(&self, field_id: &str) -> bool {
        self.find(field_id).is_some()
    }

    /// The descriptor of `field_id` without nested entries.
    ///
    /// Subfields listed under another field's `data` get that field as their `parent` unless
    /// they name one explicitly.
    pub fn field_meta(&self, field_id: &str) -> Option<FieldMeta> {
        let (field, parents) = self.find(field_id)?;
        let mut meta = field.shell();
        if meta.parent.is_none() {
            if let Some(step) = parents.last().filter(|s| s.relation == Relation::Data) {
                meta.parent = Some(step.id.clone());
            }
        }
        Some(meta)
    }

    pub fn is_group(&self, field_id: &str) -> bool {
        self.find(field_id).is_some_and(|(f, _)| f.is_group())
    }

    /// All field ids, depth first, every entry before its nested ones.
    pub fn list_fields(&self) -> Vec<String> {
        fn walk(fields: &[FieldMeta], out: &mut Vec<String>) {
            for f in fields {
                out.push(f.id.clone());
                for nested in [&f.data, &f.children].into_iter().flatten() {
                    walk(nested, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.fields, &mut out);
        out
    }

    pub fn field_parent_list(&self, field_id: &str) -> Vec<ParentStep> {
        self.find(field_id).map(|(_, path)| path).unwrap_or_default()
    }

    /// Register `field` below the ancestor chain `parents`, creating missing ancestors from
    /// their shells. A field that is already registered is replaced, keeping its nested entries.
    pub fn add_field(&mut self, parents: &[ParentStep], mut field: FieldMeta) {
        let mut list = &mut self.fields;

        for step in parents {
            let pos = match list.iter().position(|f| f.id == step.id) {
                Some(pos) => pos,
                None => {
                    list.push(step.shell.clone());
                    list.len() - 1
                }
            };
            let entry = &mut list[pos];
            list = match step.relation {
                Relation::Children => entry.children.get_or_insert_with(Vec::new),
                Relation::Data => entry.data.get_or_insert_with(Vec::new),
            };
        }

        match list.iter().position(|f| f.id == field.id) {
            Some(pos) => {
                let existing = &mut list[pos];
                field.children = existing.children.take();
                field.data = existing.data.take();
                *existing = field;
            }
            None => list.push(field),
        }
    }
}
