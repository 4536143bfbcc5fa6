use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use chrono::Local;
use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook};

use crate::model::Outcome;
use crate::{error_time, info_time, Error, Result};

pub const SHEET_NAME: &str = "Sheet1";
/// Fill for rows that carry an error.
pub const ERROR_FILL: u32 = 0xFFC7CE;
pub const ERROR_COLUMN: &str = "error";
/// Excel refuses longer strings in a cell.
pub const MAX_CELL_CHARS: usize = 32_767;
pub const COLUMNS: [&str; 11] = [
    "profileUrl",
    "profileName",
    "instagramID",
    "fullName",
    "postsCount",
    "followersCount",
    "followingCount",
    "bio",
    "verified",
    "private",
    ERROR_COLUMN,
];

/// Receives every completed batch.
pub trait OutcomeSink {
    /// Persists `batch`. Failures are the sink's business, they never reach the caller.
    fn flush(&mut self, batch: &[Outcome]);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    fn text(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::text(s),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            other => Cell::text(&other.to_string()),
        }
    }
}

/// In-memory sheet: a header plus rows of equal width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let rows = outcomes
            .iter()
            .map(|outcome| match outcome {
                Outcome::Profile(rec) => vec![
                    Cell::text(&rec.profile_url),
                    Cell::text(&rec.profile_name),
                    Cell::Number(rec.instagram_id as f64),
                    Cell::text(&rec.full_name),
                    Cell::Number(rec.posts_count as f64),
                    Cell::Number(rec.followers_count as f64),
                    Cell::Number(rec.following_count as f64),
                    Cell::text(&rec.bio),
                    Cell::Bool(rec.verified),
                    Cell::Bool(rec.private),
                    Cell::Empty,
                ],
                Outcome::Failure(failure) => {
                    let mut row = vec![Cell::Empty; COLUMNS.len()];
                    row[0] = Cell::text(&failure.profile_url);
                    row[COLUMNS.len() - 1] = Cell::text(&failure.error);
                    row
                }
            })
            .collect();

        Self {
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Loads the first worksheet; the first row becomes the header.
    pub fn load(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::EmptyWorkbook(path.display().to_string()))??;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(Self::default());
        };
        let columns: Vec<String> = header.iter().map(crate::input::cell_to_string).collect();
        let width = columns.len();
        let rows = rows
            .map(|row| {
                let mut cells: Vec<Cell> = row.iter().map(Cell::from).collect();
                cells.resize(width, Cell::Empty);
                cells
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Appends `other` below `self`. Columns are the union, `self`'s order first.
    pub fn concat(mut self, other: Table) -> Table {
        for col in &other.columns {
            if !self.columns.contains(col) {
                self.columns.push(col.clone());
            }
        }
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, Cell::Empty);
        }

        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|col| self.columns.iter().position(|c| c == col).unwrap_or_default())
            .collect();
        for row in other.rows {
            let mut merged = vec![Cell::Empty; width];
            for (cell, &idx) in row.into_iter().zip(&mapping) {
                merged[idx] = cell;
            }
            self.rows.push(merged);
        }
        self
    }

    /// Indices of rows with a non-blank `error` cell.
    pub fn flagged_rows(&self) -> Vec<usize> {
        let Some(err_idx) = self.columns.iter().position(|c| c == ERROR_COLUMN) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(err_idx).is_some_and(|c| !c.is_blank()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Writes the whole table to `path`, replacing whatever was there.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        let header_fmt = Format::new().set_bold();
        let error_fmt = Format::new()
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(ERROR_FILL));

        for (col, name) in self.columns.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, name, &header_fmt)?;
        }

        let flagged = self.flagged_rows();
        for (i, row) in self.rows.iter().enumerate() {
            let r = i as u32 + 1;
            let fmt = flagged.binary_search(&i).is_ok().then_some(&error_fmt);
            for (col, cell) in row.iter().enumerate() {
                let c = col as u16;
                match (cell, fmt) {
                    (Cell::Text(s), Some(f)) => {
                        sheet.write_string_with_format(r, c, clamp_text(s), f)?
                    }
                    (Cell::Text(s), None) => sheet.write_string(r, c, clamp_text(s))?,
                    (Cell::Number(n), Some(f)) => sheet.write_number_with_format(r, c, *n, f)?,
                    (Cell::Number(n), None) => sheet.write_number(r, c, *n)?,
                    (Cell::Bool(b), Some(f)) => sheet.write_boolean_with_format(r, c, *b, f)?,
                    (Cell::Bool(b), None) => sheet.write_boolean(r, c, *b)?,
                    (Cell::Empty, Some(f)) => sheet.write_blank(r, c, f)?,
                    (Cell::Empty, None) => continue,
                };
            }
        }

        workbook.save(path)?;
        Ok(())
    }
}

/// Cuts `s` down to what fits in one cell.
fn clamp_text(s: &str) -> &str {
    match s.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => &s[..cut],
        None => s,
    }
}

/// Spreadsheet sink. Every flush reloads the existing file and rewrites it in full,
/// so a flush costs O(rows written so far).
#[derive(Debug, Clone)]
pub struct XlsxSink {
    path: PathBuf,
}

impl XlsxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_flush(&self, batch: &[Outcome]) -> Result<()> {
        let new_rows = Table::from_outcomes(batch);
        let table = if self.path.exists() {
            Table::load(&self.path)?.concat(new_rows)
        } else {
            info_time!("Creating new file: {}", self.path.display());
            new_rows
        };
        table.save(&self.path)
    }
}

impl OutcomeSink for XlsxSink {
    fn flush(&mut self, batch: &[Outcome]) {
        let start_time = Local::now();
        match self.try_flush(batch) {
            Ok(()) => info_time!(
                start_time,
                "Data saved to {} ({} new rows)",
                self.path.display(),
                batch.len()
            ),
            Err(e) => error_time!("Error saving data to {}: {e}", self.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Read;

    use tempfile::TempDir;

    use super::*;
    use crate::model::{FetchFailure, ProfileRecord};

    fn profile(name: &str) -> Outcome {
        Outcome::Profile(ProfileRecord {
            profile_url: format!("https://www.instagram.com/{name}/"),
            profile_name: name.into(),
            instagram_id: 100,
            full_name: "Full Name".into(),
            posts_count: 1,
            followers_count: 2,
            following_count: 3,
            bio: "bio".into(),
            verified: false,
            private: true,
        })
    }

    fn failure(name: &str) -> Outcome {
        Outcome::Failure(FetchFailure::new(
            format!("https://www.instagram.com/{name}/"),
            "User not found",
        ))
    }

    #[test]
    fn failure_rows_are_flagged() {
        let table = Table::from_outcomes(&[profile("a"), failure("b"), profile("c")]);
        assert_eq!(table.flagged_rows(), vec![1]);
    }

    #[test]
    fn concat_unions_columns() {
        let existing = Table {
            columns: vec!["profileUrl".into(), "note".into()],
            rows: vec![vec![Cell::text("u0"), Cell::text("kept")]],
        };
        let merged = existing.concat(Table::from_outcomes(&[failure("x")]));

        assert_eq!(merged.columns[..2], ["profileUrl".to_string(), "note".to_string()]);
        assert_eq!(merged.columns.len(), COLUMNS.len() + 1);
        assert_eq!(merged.rows.len(), 2);
        assert_eq!(merged.rows[0][1], Cell::text("kept"));
        assert_eq!(merged.rows[1][1], Cell::Empty);
        assert_eq!(merged.rows[1][0], Cell::text("https://www.instagram.com/x/"));
        assert_eq!(merged.flagged_rows(), vec![1]);
    }

    #[test]
    fn two_flushes_append_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instagram_profiles.xlsx");
        let mut sink = XlsxSink::new(&path);

        let b1 = [profile("a"), failure("b")];
        let b2 = [profile("c")];
        sink.flush(&b1);
        sink.flush(&b2);

        let table = Table::load(&path).unwrap();
        let expected: Vec<Outcome> = b1.iter().chain(&b2).cloned().collect();
        assert_eq!(table, Table::from_outcomes(&expected));
        assert_eq!(table.flagged_rows(), vec![1]);
    }

    fn zip_entry(path: &Path, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut xml = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
        let key = format!(" {name}=\"");
        let start = tag.find(&key)? + key.len();
        let end = tag[start..].find('"')? + start;
        Some(&tag[start..end])
    }

    /// Opening tags of all `<name ...>` elements inside `xml`.
    fn tags<'a>(xml: &'a str, name: &str) -> Vec<&'a str> {
        let open = format!("<{name} ");
        xml.match_indices(&open)
            .map(|(i, _)| {
                let rest = &xml[i + 1..];
                &rest[..rest.find('>').unwrap()]
            })
            .collect()
    }

    /// Style index of every cell in the 1-based spreadsheet row `row`.
    fn row_styles<'a>(sheet_xml: &'a str, row: u32) -> Vec<Option<&'a str>> {
        let row = row.to_string();
        tags(sheet_xml, "c")
            .into_iter()
            .filter(|tag| {
                attr(tag, "r").is_some_and(|r| {
                    r.trim_start_matches(|c: char| c.is_ascii_alphabetic()) == row
                })
            })
            .map(|tag| attr(tag, "s"))
            .collect()
    }

    #[test]
    fn saved_failure_rows_carry_the_fill() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instagram_profiles.xlsx");
        Table::from_outcomes(&[profile("a"), failure("b")])
            .save(&path)
            .unwrap();

        let sheet = zip_entry(&path, "xl/worksheets/sheet1.xml");
        let styles = zip_entry(&path, "xl/styles.xml");

        // Row 2 is the profile, untouched.
        assert!(row_styles(&sheet, 2).iter().all(Option::is_none));

        // Row 3 is the failure: every column styled, all with the same style.
        let failed = row_styles(&sheet, 3);
        assert_eq!(failed.len(), COLUMNS.len());
        let style: usize = failed[0].unwrap().parse().unwrap();
        assert!(failed.iter().all(|s| *s == failed[0]));

        let xfs_start = styles.find("<cellXfs").unwrap();
        let xfs = &styles[xfs_start..xfs_start + styles[xfs_start..].find("</cellXfs>").unwrap()];
        let fill_id: usize = attr(tags(xfs, "xf")[style], "fillId")
            .unwrap()
            .parse()
            .unwrap();

        let fills_start = styles.find("<fills").unwrap();
        let fills = &styles[fills_start..fills_start + styles[fills_start..].find("</fills>").unwrap()];
        let fill = fills.split("<fill>").nth(fill_id + 1).unwrap();
        assert!(fill.contains("solid"));
        assert!(fill.contains("FFC7CE"));
    }

    #[test]
    fn oversized_text_is_cut_to_cell_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instagram_profiles.xlsx");
        let huge = Outcome::Failure(FetchFailure::new("https://x/a", "x".repeat(40_000)));

        XlsxSink::new(&path).try_flush(&[huge]).unwrap();

        let table = Table::load(&path).unwrap();
        let Cell::Text(error) = &table.rows[0][COLUMNS.len() - 1] else {
            panic!("expected the error text");
        };
        assert_eq!(error.chars().count(), MAX_CELL_CHARS);
        assert_eq!(table.flagged_rows(), vec![0]);
    }

    #[test]
    fn unreadable_sink_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instagram_profiles.xlsx");
        std::fs::write(&path, b"not a spreadsheet").unwrap();

        assert!(XlsxSink::new(&path).try_flush(&[profile("a")]).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"not a spreadsheet");
    }
}
