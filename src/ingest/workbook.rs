use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use tracing::{debug, warn};

use super::sheet::{Cell, Sheet};

/// Read every worksheet of an xlsx/xls/ods workbook, in workbook order.
pub fn load(path: &Path) -> Result<Vec<Sheet>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        match workbook.worksheet_range(&name) {
            Ok(range) => sheets.push(to_sheet(&name, &range)),
            Err(e) => warn!("Skipping unreadable sheet '{}': {}", name, e),
        }
    }
    debug!("Loaded {} sheets from {}", sheets.len(), path.display());
    Ok(sheets)
}

fn to_sheet(name: &str, range: &Range<Data>) -> Sheet {
    let mut sheet = Sheet::new(name);
    let (top, left) = range.start().unwrap_or((0, 0));
    for (r, c, value) in range.used_cells() {
        // calamine is 0-based and relative to the range start
        let row = top + r as u32 + 1;
        let col = left + c as u32 + 1;
        sheet.set(row, col, to_cell(value));
    }
    sheet
}

fn to_cell(value: &Data) -> Cell {
    match value {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        _ => Cell::Empty,
    }
}
