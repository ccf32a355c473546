//! Extracting the retained records from sequence files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::{write::GzEncoder, Compression};
use needletail::parse_fastx_file;
use rustc_hash::FxHashSet;
use tracing::info;

use crate::errors::*;
use crate::file_io::is_gzipped;

const FASTA_EXTENSIONS: [&str; 3] = ["fa", "fasta", "fna"];

/// Where the filtered copy of `input` is written: `<base>.<suffix>.fasta`, where `<base>` is
/// `input` without `.gz` and without a FASTA extension. Gzipped inputs give gzipped outputs.
pub fn filtered_fasta_path(input: impl AsRef<Path>, suffix: &str) -> PathBuf {
    let input = input.as_ref();
    let gzipped = is_gzipped(input);

    let mut base = input.to_owned();
    if gzipped && base.extension().is_some_and(|e| e == "gz") {
        base.set_extension("");
    }
    if base
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| FASTA_EXTENSIONS.contains(&e))
    {
        base.set_extension("");
    }

    let mut name = base.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{suffix}.fasta"));
    if gzipped {
        name.push(".gz");
    }
    base.with_file_name(name)
}

/// Outcome of extracting one sequence file.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub output: PathBuf,
    pub records_read: usize,
    pub records_written: usize,
}

/// Copy the FASTA records of `input` whose id is in `identifiers` to
/// [`filtered_fasta_path`]. The id of a record is the first word of its header.
pub fn filter_fasta(
    input: impl AsRef<Path>,
    identifiers: &FxHashSet<&str>,
    suffix: &str,
) -> Result<Extracted> {
    let input = input.as_ref();
    let output = filtered_fasta_path(input, suffix);
    let file_err = |file: &Path, source: Box<dyn std::error::Error + Send + Sync>| Error::FileIo {
        file: file.display().to_string(),
        source,
    };

    let mut reader =
        parse_fastx_file(input).map_err(|e| file_err(input, Box::new(e)))?;

    let file = File::create(&output).map_err(|e| file_err(&output, Box::new(e)))?;
    let mut writer: Box<dyn Write> = if is_gzipped(&output) {
        Box::new(BufWriter::new(GzEncoder::new(file, Compression::default())))
    } else {
        Box::new(BufWriter::new(file))
    };

    let mut records_read = 0;
    let mut records_written = 0;
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| file_err(input, Box::new(e)))?;
        records_read += 1;

        let header = record.id();
        let id = header
            .split(|b| b.is_ascii_whitespace())
            .next()
            .unwrap_or_default();
        let keep = std::str::from_utf8(id).is_ok_and(|id| identifiers.contains(id));
        if !keep {
            continue;
        }

        let seq = record.seq();
        let parts: [&[u8]; 5] = [b">", header, b"\n", &seq, b"\n"];
        parts
            .iter()
            .try_for_each(|part| writer.write_all(part))
            .map_err(|e| file_err(&output, Box::new(e)))?;
        records_written += 1;
    }
    writer.flush().map_err(|e| file_err(&output, Box::new(e)))?;
    drop(writer);

    info!(
        "Wrote {records_written} of {records_read} records to {}",
        output.display()
    );
    Ok(Extracted {
        output,
        records_read,
        records_written,
    })
}
