//! Tabular loader
//!
//! Reads a roster export (`.xlsx` or `.csv`) into header + row form. The
//! registrar's template wraps the table in a fixed banner above it and a
//! signature block below it; both are cut off by position before any
//! column handling happens.

use crate::errors::IngestionError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument};
use vis4t_common::config::IngestionConfig;

/// Columns the template carries for display only
pub const DECORATIVE_COLUMNS: &[&str] = &["STT", "Ngày sinh", "Ghi chú"];

/// Fixed banner/footer geometry of the roster template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateLayout {
    /// Rows above the column header row
    pub header_rows: usize,
    /// Rows below the last student row
    pub footer_rows: usize,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            header_rows: 9,
            footer_rows: 2,
        }
    }
}

impl From<&IngestionConfig> for TemplateLayout {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            header_rows: config.header_rows,
            footer_rows: config.footer_rows,
        }
    }
}

impl TemplateLayout {
    /// Smallest raw sheet that can hold a header row and one student
    pub fn min_rows(&self) -> usize {
        self.header_rows + self.footer_rows + 1
    }
}

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s.trim()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Header plus data rows, every row as wide as the header
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Supported roster file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Csv,
}

impl SourceFormat {
    /// Detect format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self, IngestionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "xlsx" => Ok(SourceFormat::Xlsx),
            "csv" => Ok(SourceFormat::Csv),
            _ => Err(IngestionError::UnsupportedFormat { extension }),
        }
    }

    /// File suffix including the dot
    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Xlsx => ".xlsx",
            SourceFormat::Csv => ".csv",
        }
    }
}

/// Loads roster files laid out per a [`TemplateLayout`]
#[derive(Debug, Clone, Default)]
pub struct Loader {
    layout: TemplateLayout,
}

impl Loader {
    pub fn new(layout: TemplateLayout) -> Self {
        Self { layout }
    }

    /// Read a roster file into a trimmed table. The file is never modified.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> Result<Table, IngestionError> {
        let raw = match SourceFormat::from_path(path)? {
            SourceFormat::Xlsx => read_xlsx(path)?,
            SourceFormat::Csv => read_csv(path)?,
        };

        debug!(raw_rows = raw.len(), "Sheet read");
        self.shape(raw)
    }

    /// Cut the banner and footer, drop decorative columns and blank rows
    pub fn shape(&self, raw: Vec<Vec<Cell>>) -> Result<Table, IngestionError> {
        let layout = self.layout;
        if raw.len() < layout.min_rows() {
            return Err(IngestionError::TemplateMismatch {
                message: format!(
                    "expected at least {} rows ({} banner, 1 header, {} footer), found {}",
                    layout.min_rows(),
                    layout.header_rows,
                    layout.footer_rows,
                    raw.len()
                ),
            });
        }

        let end = raw.len() - layout.footer_rows;
        let mut body = raw.into_iter().take(end).skip(layout.header_rows);

        let header_row = body.next().unwrap_or_default();
        let headers: Vec<String> = header_row.iter().map(|c| c.to_string()).collect();
        let width = headers.len();

        let keep: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !DECORATIVE_COLUMNS.contains(&h.trim()))
            .map(|(i, _)| i)
            .collect();

        let rows: Vec<Vec<Cell>> = body
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                keep.iter().map(|&i| row[i].clone()).collect::<Vec<_>>()
            })
            .filter(|row| !row.iter().all(Cell::is_blank))
            .collect();

        if rows.is_empty() {
            return Err(IngestionError::EmptyTable);
        }

        let headers = keep.iter().map(|&i| headers[i].clone()).collect();
        Ok(Table { headers, rows })
    }
}

fn read_xlsx(path: &Path) -> Result<Vec<Vec<Cell>>, IngestionError> {
    let parse_error = |message: String| IngestionError::Parse {
        path: path.display().to_string(),
        message,
    };

    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| parse_error(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| parse_error("workbook has no sheets".to_string()))?
        .map_err(|e| parse_error(e.to_string()))?;

    // Ranges start at the first used cell; restore leading empty rows so
    // the banner offset counts from the top of the sheet.
    let leading = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows = vec![Vec::new(); leading];
    rows.extend(range.rows().map(|row| row.iter().map(Cell::from).collect()));

    Ok(rows)
}

fn read_csv(path: &Path) -> Result<Vec<Vec<Cell>>, IngestionError> {
    let parse_error = |message: String| IngestionError::Parse {
        path: path.display().to_string(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| parse_error(e.to_string()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_error(e.to_string()))?;
        let row = record
            .iter()
            .map(|value| {
                let value = value.trim_matches('\u{feff}').trim();
                if value.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(value.to_string())
                }
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    pub(crate) const HEADER: &str =
        "STT,Mã SV,Họ đệm,Tên,Ngày sinh,Lớp,Số TC đạt,Điểm TB 10,Điểm TB 4,Xếp loại chữ,Xếp loại,Ghi chú";

    /// A registrar-style export: 9 banner rows, header, students, 2 footer rows
    pub(crate) fn roster_csv(students: &[&str]) -> String {
        let mut lines = vec![
            "TRƯỜNG ĐẠI HỌC CÔNG NGHIỆP TP.HCM,,,".to_string(),
            "PHÒNG ĐÀO TẠO,,,".to_string(),
            "BẢNG ĐIỂM TỔNG HỢP,,,".to_string(),
        ];
        for i in 3..9 {
            lines.push(format!("banner {},,,", i));
        }
        lines.push(HEADER.to_string());
        lines.extend(students.iter().map(|s| s.to_string()));
        lines.push("Người lập bảng,,,".to_string());
        lines.push("Ký tên,,,".to_string());
        lines.join("\n")
    }

    pub(crate) fn write_fixture(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_csv_trims_layout() {
        let csv = roster_csv(&[
            "1,20000001,Nguyễn Văn,An,01/01/2003,KHDL16A,120,8.1,3.4,B+,Giỏi,",
            "2,20000002,Trần Thị,Bình,02/02/2003,KHDL16A,110,7.0,3.0,B,Khá,",
            ",,,,,,,,,,,",
            "3,20000003,Lê,Cường,03/03/2003,KHDL16A,100,6.5,2.5,C+,Trung bình,note",
        ]);
        let file = write_fixture(".csv", &csv);

        let table = Loader::default().load(file.path()).unwrap();

        // 9 banner + 1 header + 4 body + 2 footer, one body row blank
        assert_eq!(table.len(), 3);
        assert_eq!(table.width(), 9);
        assert_eq!(table.headers[0], "Mã SV");
        assert!(!table.headers.iter().any(|h| h == "STT" || h == "Ghi chú"));
        assert_eq!(table.rows[0][0], Cell::Text("20000001".to_string()));
        assert_eq!(table.rows[2][2], Cell::Text("Cường".to_string()));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let csv = roster_csv(&["1,20000001,Nguyễn Văn,An,,KHDL16A,120,8.1,3.4,B+,Giỏi,"]);
        let file = write_fixture(".CSV", &csv);

        let table = Loader::default().load(file.path()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unsupported_format() {
        let err = Loader::default().load(Path::new("roster.pdf")).unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedFormat { extension } if extension == "pdf"));

        let err = Loader::default().load(Path::new("roster")).unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_short_sheet_is_template_mismatch() {
        let file = write_fixture(".csv", "a,b\nc,d\ne,f\n");
        let err = Loader::default().load(file.path()).unwrap_err();
        assert!(matches!(err, IngestionError::TemplateMismatch { .. }));
    }

    #[test]
    fn test_no_students_is_empty_table() {
        let csv = roster_csv(&[",,,,,,,,,,,"]);
        let file = write_fixture(".csv", &csv);

        let err = Loader::default().load(file.path()).unwrap_err();
        assert!(matches!(err, IngestionError::EmptyTable));
    }

    #[test]
    fn test_corrupt_xlsx_is_parse_error() {
        let file = write_fixture(".xlsx", "this is not a zip archive");
        let err = Loader::default().load(file.path()).unwrap_err();
        assert!(matches!(err, IngestionError::Parse { .. }));
    }

    #[test]
    fn test_load_xlsx_with_blank_leading_row() {
        let file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();

        // Row 0 left empty so the used range starts at row 1
        for row in 1..9u32 {
            sheet.write_string(row, 0, format!("banner {}", row)).unwrap();
        }
        for (col, header) in HEADER.split(',').enumerate() {
            sheet.write_string(9, col as u16, header).unwrap();
        }
        let students: [(f64, &str, &str, f64); 2] = [
            (20000001.0, "Nguyễn Văn", "An", 8.1),
            (20000002.0, "Trần Thị", "Bình", 7.0),
        ];
        for (i, (id, first, last, score)) in students.iter().enumerate() {
            let row = 10 + i as u32;
            sheet.write_number(row, 0, (i + 1) as f64).unwrap();
            sheet.write_number(row, 1, *id).unwrap();
            sheet.write_string(row, 2, *first).unwrap();
            sheet.write_string(row, 3, *last).unwrap();
            sheet.write_string(row, 5, "KHDL16A").unwrap();
            sheet.write_number(row, 6, 120.0).unwrap();
            sheet.write_number(row, 7, *score).unwrap();
            sheet.write_number(row, 8, 3.4).unwrap();
            sheet.write_string(row, 9, "B+").unwrap();
            sheet.write_string(row, 10, "Giỏi").unwrap();
        }
        sheet.write_string(12, 0, "Người lập bảng").unwrap();
        sheet.write_string(13, 0, "Ký tên").unwrap();
        workbook.save(file.path()).unwrap();

        let table = Loader::default().load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.width(), 9);
        assert_eq!(table.headers[0], "Mã SV");
        assert_eq!(table.rows[0][0], Cell::Number(20000001.0));
        assert_eq!(table.rows[1][2], Cell::Text("Bình".to_string()));
    }

    #[test]
    fn test_custom_layout() {
        let loader = Loader::new(TemplateLayout {
            header_rows: 1,
            footer_rows: 0,
        });
        let raw = vec![
            vec![Cell::Text("banner".to_string())],
            vec![Cell::Text("Mã SV".to_string()), Cell::Text("STT".to_string())],
            vec![Cell::Number(20000001.0)],
        ];

        let table = loader.shape(raw).unwrap();
        assert_eq!(table.headers, vec!["Mã SV".to_string()]);
        assert_eq!(table.rows, vec![vec![Cell::Number(20000001.0)]]);
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Number(20000001.0).to_string(), "20000001");
        assert_eq!(Cell::Number(8.25).to_string(), "8.25");
        assert_eq!(Cell::Text("  An ".to_string()).to_string(), "An");
        assert!(Cell::Text("   ".to_string()).is_blank());
    }
}
