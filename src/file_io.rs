//! Reading and writing structured dataset files.
//!
//! The encoding is chosen from the file name: `.json` or `.yaml`/`.yml` select the
//! format and a `.gz` component anywhere in the suffixes (for example `gc.json.gz`)
//! enables gzip compression.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::errors::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

fn suffixes(path: &Path) -> impl Iterator<Item = &str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .split('.')
        .skip(1)
}

pub fn is_gzipped(path: impl AsRef<Path>) -> bool {
    suffixes(path.as_ref()).any(|s| s == "gz")
}

pub fn file_format(path: impl AsRef<Path>) -> Option<FileFormat> {
    suffixes(path.as_ref()).find_map(|s| match s {
        "json" => Some(FileFormat::Json),
        "yaml" | "yml" => Some(FileFormat::Yaml),
        _ => None,
    })
}

fn file_err<E>(path: &Path) -> impl FnOnce(E) -> Error + '_
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| Error::FileIo {
        file: path.display().to_string(),
        source: Box::new(e),
    }
}

/// Read a whole (possibly gzipped) file into memory.
pub fn read_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(file_err(path))?;

    let mut reader: Box<dyn Read> = if is_gzipped(path) {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(file_err(path))?;
    Ok(content)
}

/// Parse a JSON or YAML file into `T`.
///
/// Files without a recognised format suffix are parsed as JSON.
pub fn read_structured_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = read_file(path)?;

    match file_format(path).unwrap_or(FileFormat::Json) {
        FileFormat::Json => serde_json::from_str(&content).map_err(file_err(path)),
        FileFormat::Yaml => serde_yaml::from_str(&content).map_err(file_err(path)),
    }
}

fn write_payload<T: Serialize>(
    writer: &mut dyn Write,
    format: FileFormat,
    data: &T,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match format {
        FileFormat::Json => {
            let mut ser =
                serde_json::Serializer::with_formatter(&mut *writer, PrettyFormatter::with_indent(b" "));
            data.serialize(&mut ser)?;
        }
        FileFormat::Yaml => serde_yaml::to_writer(&mut *writer, data)?,
    }
    writer.flush()?;
    Ok(())
}

/// Write `data` to `path`, creating parent directories as needed.
pub fn write_structured_file<T: Serialize>(path: impl AsRef<Path>, data: &T) -> Result<()> {
    let path = path.as_ref();
    let format = file_format(path).unwrap_or(FileFormat::Json);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(file_err(path))?;
    }

    let file = File::create(path).map_err(file_err(path))?;
    let to_file_io = |source| Error::FileIo {
        file: path.display().to_string(),
        source,
    };

    if is_gzipped(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_payload(&mut encoder, format, data).map_err(to_file_io)?;
        encoder
            .finish()
            .and_then(|mut w| w.flush())
            .map_err(file_err(path))?;
    } else {
        let mut writer = BufWriter::new(file);
        write_payload(&mut writer, format, data).map_err(to_file_io)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[test]
    fn test_detects_compression_and_format_from_suffixes() {
        assert!(is_gzipped("dir/gc.json.gz"));
        assert!(!is_gzipped("dir/gc.json"));
        assert!(!is_gzipped("gz/gc.json"));
        assert_eq!(file_format("meta.json.gz"), Some(FileFormat::Json));
        assert_eq!(file_format("list.yml"), Some(FileFormat::Yaml));
        assert_eq!(file_format("list.txt"), None);
    }

    #[test]
    fn test_gzipped_json_survives_write_and_read() {
        let td = tempdir().unwrap();
        let path = td.path().join("nested").join("length.json.gz");
        let data = json!({"values": [1, 2, 3], "keys": []});

        write_structured_file(&path, &data).unwrap();
        let back: Value = read_structured_file(&path).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_yaml_is_parsed_by_suffix() {
        let td = tempdir().unwrap();
        let path = td.path().join("ids.yaml");
        std::fs::write(&path, "identifiers:\n  - r1\n  - r2\n").unwrap();

        let back: Value = read_structured_file(&path).unwrap();
        assert_eq!(back, json!({"identifiers": ["r1", "r2"]}));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let td = tempdir().unwrap();
        let err = read_structured_file::<Value>(td.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::FileIo { .. }));
    }
}
