//! Row normalizer
//!
//! Turns a loaded roster [`Table`] into canonical [`RosterRow`]s. Columns
//! are picked by position: the template keeps the identity columns first
//! and the five summary columns last, with a varying number of columns in
//! between.

use crate::errors::IngestionError;
use crate::loader::{Cell, Table};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use vis4t_common::config::IngestionConfig;
use vis4t_common::db::StudentFields;

/// Leading identity columns: student ID, first name, last name
const IDENTITY_COLUMNS: usize = 3;

/// Trailing summary columns, in template order
const SUMMARY_COLUMNS: [&str; 5] = ["passed_credit", "score_10", "score_4", "score_char", "rank"];

pub const MIN_COLUMNS: usize = IDENTITY_COLUMNS + SUMMARY_COLUMNS.len();

/// One student as read from a roster file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRow {
    pub student_id: i64,
    pub student_name: String,
    pub student_gmail: String,
    pub passed_credit: i32,
    pub score_10: f64,
    pub score_4: f64,
    pub score_char: String,
    #[serde(default)]
    pub rank: String,
}

impl RosterRow {
    /// Student ID as stored: zero-padded to `width` digits
    pub fn padded_id(&self, width: usize) -> String {
        format!("{:0>width$}", self.student_id, width = width)
    }

    /// Columns written to the student table
    pub fn to_fields(&self) -> StudentFields {
        StudentFields {
            student_name: self.student_name.clone(),
            student_gmail: self.student_gmail.clone(),
            passed_credit: self.passed_credit,
            score_10: self.score_10,
            score_4: self.score_4,
            score_char: self.score_char.clone(),
            rank: self.rank.clone(),
        }
    }
}

/// Normalizes loaded tables into roster rows
#[derive(Debug, Clone)]
pub struct Normalizer {
    email_domain: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new("iuh.edu.vn")
    }
}

impl From<&IngestionConfig> for Normalizer {
    fn from(config: &IngestionConfig) -> Self {
        Self::new(&config.email_domain)
    }
}

impl Normalizer {
    pub fn new(email_domain: &str) -> Self {
        Self {
            email_domain: email_domain.trim_start_matches('@').to_string(),
        }
    }

    /// Produce one roster row per table row, in order.
    ///
    /// Any row with an unreadable student ID or score rejects the whole table.
    #[instrument(skip_all, fields(rows = table.len(), columns = table.width()))]
    pub fn normalize(&self, table: &Table) -> Result<Vec<RosterRow>, IngestionError> {
        let width = table.width();
        if width < MIN_COLUMNS {
            return Err(IngestionError::TemplateMismatch {
                message: format!(
                    "expected at least {} columns after dropping decorative ones, found {}",
                    MIN_COLUMNS, width
                ),
            });
        }

        let summary_start = width - SUMMARY_COLUMNS.len();
        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(index, cells)| {
                if cells.len() != width {
                    return Err(IngestionError::TemplateMismatch {
                        message: format!("row {} has {} cells, header has {}", index + 1, cells.len(), width),
                    });
                }
                self.normalize_row(index + 1, &cells[..IDENTITY_COLUMNS], &cells[summary_start..])
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(normalized = rows.len(), "Roster normalized");
        Ok(rows)
    }

    fn normalize_row(
        &self,
        row: usize,
        identity: &[Cell],
        summary: &[Cell],
    ) -> Result<RosterRow, IngestionError> {
        let student_id = parse_student_id(row, &identity[0])?;
        let first_name = identity[1].to_string();
        let last_name = identity[2].to_string();

        let student_name = [first_name.as_str(), last_name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        Ok(RosterRow {
            student_id,
            student_gmail: self.derive_email(&last_name, student_id),
            student_name,
            passed_credit: parse_credit(row, SUMMARY_COLUMNS[0], &summary[0])?,
            score_10: parse_number(row, SUMMARY_COLUMNS[1], &summary[1])?,
            score_4: parse_number(row, SUMMARY_COLUMNS[2], &summary[2])?,
            score_char: summary[3].to_string(),
            rank: summary[4].to_string(),
        })
    }

    /// `{transliterated last name}.{student id}@{domain}`
    pub fn derive_email(&self, last_name: &str, student_id: i64) -> String {
        format!(
            "{}.{}@{}",
            transliterate(&last_name.to_lowercase()),
            student_id,
            self.email_domain
        )
    }
}

/// Strip Vietnamese diacritics and whitespace, leaving an ASCII-friendly token
pub fn transliterate(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c) && !c.is_whitespace())
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        })
        .collect()
}

/// Stored form of a student ID: digit-only IDs are zero-padded to `width`
pub fn canonical_student_id(raw: &str, width: usize) -> String {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>width$}", raw, width = width)
    } else {
        raw.to_string()
    }
}

fn parse_student_id(row: usize, cell: &Cell) -> Result<i64, IngestionError> {
    let invalid = || IngestionError::InvalidStudentId {
        row,
        value: cell.to_string(),
    };

    let id = match cell {
        Cell::Number(n) => integral(*n),
        Cell::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Cell::Empty => None,
    };

    // IDs are positive and stored as fixed-width digit strings
    id.filter(|id| *id > 0).ok_or_else(invalid)
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15).then_some(f as i64)
}

fn parse_credit(row: usize, column: &str, cell: &Cell) -> Result<i32, IngestionError> {
    let value = parse_number(row, column, cell)?;
    if (0.0..=i32::MAX as f64).contains(&value) {
        Ok(value as i32)
    } else {
        Err(IngestionError::InvalidNumber {
            row,
            column: column.to_string(),
            value: cell.to_string(),
        })
    }
}

fn parse_number(row: usize, column: &str, cell: &Cell) -> Result<f64, IngestionError> {
    match cell {
        Cell::Number(n) => Ok(*n),
        _ if cell.is_blank() => Ok(0.0),
        Cell::Text(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| IngestionError::InvalidNumber {
                row,
                column: column.to_string(),
                value: s.trim().to_string(),
            }),
        Cell::Empty => Ok(0.0),
    }
}
