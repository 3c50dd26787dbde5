use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::{LoadReport, LoadWarning, StorageError};

fn writer_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.terminator(csv::Terminator::Any(b'\n'));
    builder
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Records after the header, each with its 1-based line number.
pub type Rows = Vec<(u64, Vec<String>)>;

/// Reads every record after the header line, trimmed, with its 1-based line
/// number.
///
/// Each physical line is decoded on its own, so a stray quote can only
/// spoil the line it is on. Lines the CSV layer cannot decode are reported
/// and skipped; an I/O failure stops the read and is returned as an error.
pub fn read_rows(path: &Path) -> Result<(Rows, Vec<LoadWarning>), StorageError> {
    let file = fs::File::open(path)?;
    let mut rows = Vec::new();
    let mut warnings = Vec::new();

    // line 1 is the header
    for (index, line) in BufReader::new(file).lines().enumerate().skip(1) {
        let line = line?;
        let number = index as u64 + 1;
        if line.trim().is_empty() {
            continue;
        }
        match decode_line(&line) {
            Ok(fields) if fields.iter().all(String::is_empty) => {}
            Ok(fields) => rows.push((number, fields)),
            Err(e) => warnings.push(LoadWarning {
                line: Some(number),
                reason: e.to_string(),
            }),
        }
    }

    Ok((rows, warnings))
}

fn decode_line(line: &str) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}

/// Loads a record file through `parse`, turning every failure into a
/// warning. A missing or unreadable file yields an empty report with one
/// file-level warning.
pub fn load_with<T, F>(path: &Path, kind: &str, parse: F) -> LoadReport<T>
where
    F: Fn(&[String]) -> Result<T, String>,
{
    let (rows, mut warnings) = match read_rows(path) {
        Ok(read) => read,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Could not load {kind}: {e}");
            let mut report = LoadReport::empty();
            report.warnings.push(LoadWarning {
                line: None,
                reason: format!("could not load {kind} from {}: {e}", path.display()),
            });
            return report;
        }
    };

    let mut records = Vec::with_capacity(rows.len());
    for (line, fields) in rows {
        match parse(&fields) {
            Ok(record) => records.push(record),
            Err(reason) => warnings.push(LoadWarning {
                line: Some(line),
                reason,
            }),
        }
    }

    for warning in &warnings {
        tracing::warn!(path = %path.display(), "Skipped {kind} record: {warning}");
    }
    tracing::debug!(path = %path.display(), count = records.len(), "Loaded {kind}");

    LoadReport { records, warnings }
}

/// Replaces the file with `header` followed by `rows`.
///
/// Written to a temporary sibling first and renamed over the target, so an
/// interrupted rewrite leaves the previous content intact.
pub fn rewrite<I, R>(path: &Path, header: &[&str], rows: I) -> Result<usize, StorageError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    let mut writer = writer_builder().from_writer(tmp);
    writer.write_record(header)?;
    let mut count = 0usize;
    for row in rows {
        writer.write_record(row)?;
        count += 1;
    }
    let tmp = writer
        .into_inner()
        .map_err(|e| StorageError::Io(e.into_error()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    tracing::debug!(path = %path.display(), count, "Rewrote record file");
    Ok(count)
}

/// Appends one record, writing `header` first when the file is missing or
/// empty.
pub fn append<R>(path: &Path, header: &[&str], row: R) -> Result<(), StorageError>
where
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    fs::create_dir_all(parent_dir(path))?;

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    let len = file.metadata()?.len();

    if len > 0 && !ends_with_newline(&mut file)? {
        file.write_all(b"\n")?;
    }

    let mut writer = writer_builder().from_writer(file);
    if len == 0 {
        writer.write_record(header)?;
    }
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}

fn ends_with_newline(file: &mut fs::File) -> std::io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
