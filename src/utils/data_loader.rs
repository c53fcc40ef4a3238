//! CSV loading and saving helpers shared by the dataset store and predictor

use crate::error::{OdysseyError, Result};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Rows scanned for schema inference
const INFER_SCHEMA_ROWS: usize = 1000;

/// Parse an in-memory CSV payload with a header row.
///
/// Payloads that polars cannot parse, that have no columns, or that have no
/// data rows are rejected as [`OdysseyError::InvalidData`].
pub fn parse_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(OdysseyError::InvalidData("payload is empty".to_string()));
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| OdysseyError::InvalidData(format!("not a parseable table: {}", e)))?;

    ensure_tabular(&df)?;
    Ok(df)
}

/// Load a CSV file from disk
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| OdysseyError::InvalidData(format!("{}: {}", path.display(), e)))?
        .finish()
        .map_err(|e| OdysseyError::InvalidData(format!("{}: {}", path.display(), e)))?;
    Ok(df)
}

/// Serialize a frame to CSV bytes with a header row
pub fn to_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(df)
        .map_err(|e| OdysseyError::Data(e.to_string()))?;
    Ok(buffer)
}

fn ensure_tabular(df: &DataFrame) -> Result<()> {
    if df.width() == 0 {
        return Err(OdysseyError::InvalidData("table has no columns".to_string()));
    }
    if df.height() == 0 {
        return Err(OdysseyError::InvalidData("table has no data rows".to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    for name in df.get_column_names() {
        if name.as_str().trim().is_empty() {
            return Err(OdysseyError::InvalidData("table has an unnamed column".to_string()));
        }
        if !seen.insert(name.as_str()) {
            return Err(OdysseyError::InvalidData(format!("duplicate column '{}'", name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_bytes() {
        let df = parse_csv_bytes(b"a,b,target\n1,2.5,0\n3,4.5,1\n").unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("a").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_parse_rejects_empty_payload() {
        let err = parse_csv_bytes(b"  \n").unwrap_err();
        assert!(matches!(err, OdysseyError::InvalidData(_)));
    }

    #[test]
    fn test_parse_rejects_header_only() {
        let err = parse_csv_bytes(b"a,b\n").unwrap_err();
        assert!(matches!(err, OdysseyError::InvalidData(_)));
    }

    #[test]
    fn test_csv_roundtrip_through_disk() {
        let mut df = df!("x" => &[1.0, 2.0], "label" => &["a", "b"]).unwrap();
        let bytes = to_csv_bytes(&mut df).unwrap();

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        std::io::Write::write_all(&mut file, &bytes).unwrap();

        let loaded = load_csv(file.path()).unwrap();
        assert_eq!(loaded.shape(), (2, 2));
        assert!(loaded.equals(&df));
    }
}
