//! Reading source extracts into [`DataFrame`]s and writing frames back as CSV.
//!
//! Raw extracts arrive from different providers with different encodings
//! and separators, so delimited text is decoded and sniffed before polars
//! reads it. Quoted fields (for example `"Korea, Rep."`) keep their
//! delimiter. Column types are inferred over the whole file: empty is
//! missing, numeric columns become numbers.
//!
//! Output files are always comma separated with a header row and no index
//! column. Each file is written once, through a temporary file renamed into
//! place, so a reader never sees a half-written table.

use polars::prelude::*;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::Path;

use crate::logs::log_info_indent;
use crate::table::ops::rename;

/// Error reading a source file, with the line it happened on when known.
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl From<PolarsError> for CsvError {
    fn from(e: PolarsError) -> Self {
        CsvError::new(0, e.to_string())
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed frame
    pub table: DataFrame,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers, trimmed
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unrecognised: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use climate_subsidies::parser::parse_csv_str;
///
/// let df = parse_csv_str("Country,Year\nFrance,2020", ',').unwrap();
/// assert_eq!(df.height(), 1);
/// ```
pub fn parse_csv_str(content: &str, delimiter: char) -> Result<DataFrame, CsvError> {
    parse_string_with_metadata(content, delimiter, "utf-8".to_string()).map(|r| r.table)
}

/// Parse CSV string with explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> Result<ParseResult, CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let separator = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| CsvError::new(0, format!("Unsupported delimiter '{}'", delimiter)))?;

    let body: String = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .flat_map(|l| [l, "\n"])
        .collect();

    let parse_options = CsvParseOptions::default()
        .with_separator(separator)
        .with_truncate_ragged_lines(true);
    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(parse_options)
        .into_reader_with_file_handle(Cursor::new(body.into_bytes()))
        .finish()?;

    let original: Vec<String> = crate::table::column_names(&raw);
    let headers: Vec<String> = original.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let pairs: Vec<(&str, &str)> = original
        .iter()
        .zip(&headers)
        .filter(|(o, h)| o != h)
        .map(|(o, h)| (o.as_str(), h.as_str()))
        .collect();
    let table = rename(&raw, &pairs).map_err(|e| CsvError::new(1, e.to_string()))?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = fs::read(path.as_ref()).map_err(|e| cannot_read(path.as_ref(), e))?;
    parse_bytes_auto(&bytes)
}

/// Read a JSON array of flat records.
pub fn read_json_records(path: &Path) -> Result<DataFrame, CsvError> {
    let file = File::open(path).map_err(|e| cannot_read(path, e))?;
    Ok(JsonReader::new(file)
        .with_json_format(JsonFormat::Json)
        .finish()?)
}

/// Read a parquet file.
pub fn read_parquet(path: &Path) -> Result<DataFrame, CsvError> {
    let file = File::open(path).map_err(|e| cannot_read(path, e))?;
    Ok(ParquetReader::new(file).finish()?)
}

fn cannot_read(path: &Path, e: std::io::Error) -> CsvError {
    CsvError::new(0, format!("Cannot read file '{}': {}", path.display(), e))
}

/// Read a table from disk, choosing the format from the file extension.
///
/// `.parquet` and `.json` (record arrays) are read as-is; everything else
/// is delimited text.
pub fn read_table(path: &Path) -> Result<DataFrame, CsvError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("parquet") => read_parquet(path),
        Some("json") => read_json_records(path),
        _ => {
            let parsed = parse_csv_file_auto(path)?;
            log_info_indent(format!(
                "{}: encoding {}, delimiter {:?}",
                path.display(),
                parsed.encoding,
                parsed.delimiter
            ), 1);
            Ok(parsed.table)
        }
    }
}

/// Render a frame as CSV text: header row, comma separated, missing cells empty.
pub fn to_csv_string(df: &DataFrame) -> PolarsResult<String> {
    let mut out = df.clone();
    let mut buffer: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut out)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write a frame to `path` in a single step (temporary file, then rename).
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<(), crate::error::PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let content = to_csv_string(df)?;
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
