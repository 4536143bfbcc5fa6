use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::{error_time, info_time, Error, Result};

/// Reads profile references from the first worksheet of `path`.
///
/// The first row is the header. `start_row` and `end_row` are 1-based and inclusive,
/// counted over data rows. Empty cells come back as empty references.
/// Any failure is logged and an empty list is returned.
pub fn read_references(
    path: impl AsRef<Path>,
    column: &str,
    start_row: usize,
    end_row: usize,
) -> Vec<String> {
    let path = path.as_ref();
    match try_read_references(path, column, start_row, end_row) {
        Ok(references) => {
            info_time!(
                "Read {} profile URLs from {} (rows {start_row}-{end_row})",
                references.len(),
                path.display()
            );
            references
        }
        Err(e) => {
            error_time!("Error reading profile URLs from {}: {e}", path.display());
            Vec::new()
        }
    }
}

pub fn try_read_references(
    path: &Path,
    column: &str,
    start_row: usize,
    end_row: usize,
) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::EmptyWorkbook(path.display().to_string()))??;

    let mut rows = range.rows();
    let missing_column = || Error::MissingColumn {
        column: column.to_string(),
        path: path.display().to_string(),
    };
    let header = rows.next().ok_or_else(missing_column)?;
    let col_idx = header
        .iter()
        .position(|cell| cell_to_string(cell).trim() == column)
        .ok_or_else(missing_column)?;

    let skip = start_row.saturating_sub(1);
    let take = (end_row + 1).saturating_sub(start_row.max(1));
    let references = rows
        .skip(skip)
        .take(take)
        .map(|row| row.get(col_idx).map(cell_to_string).unwrap_or_default())
        .collect();

    Ok(references)
}

pub(crate) fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
