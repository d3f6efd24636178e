//! Stage 0: routing by file extension (spec §4.F), grounded in `ingest/gate.py`.

use crate::error::IngestError;

/// Which stage path a file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    CsvExcel,
    Ocr,
}

/// Normalize the extension and route the file to its starting stage.
pub fn route_file(file_name: &str, ext: Option<&str>) -> Result<(Route, String), IngestError> {
    let raw_ext = match ext {
        Some(e) => e.to_string(),
        None => file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_string())
            .ok_or_else(|| IngestError::MissingExtension(file_name.to_string()))?,
    };
    let normalized = raw_ext.to_lowercase().trim().trim_start_matches('.').to_string();

    match normalized.as_str() {
        "csv" | "tsv" | "xlsx" | "xls" => Ok((Route::CsvExcel, normalized)),
        "pdf" | "jpg" | "jpeg" | "png" => Ok((Route::Ocr, normalized)),
        other => Err(IngestError::UnsupportedExtension(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_csv_to_classic_path() {
        let (route, ext) = route_file("list.CSV", None).unwrap();
        assert_eq!(route, Route::CsvExcel);
        assert_eq!(ext, "csv");
    }

    #[test]
    fn routes_pdf_to_ocr_path() {
        let (route, _) = route_file("scan.pdf", None).unwrap();
        assert_eq!(route, Route::Ocr);
    }

    #[test]
    fn rejects_unsupported_extension() {
        assert!(route_file("archive.zip", None).is_err());
    }

    #[test]
    fn rejects_missing_extension() {
        assert!(route_file("noext", None).is_err());
    }
}
