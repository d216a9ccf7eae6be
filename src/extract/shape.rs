use scraper::ElementRef;

use super::Extractor;

/// Chunk size used when the header row is missing or empty.
pub const DEFAULT_COLUMN_COUNT: usize = 3;

/// Position of the category column, the one checked for col-span cells.
const DATA_COLUMN_INDEX: usize = 1;

/// Direct `td`/`th` children of one `tr`, in source order.
#[derive(Debug, Clone)]
pub struct RawRow<'a> {
    pub cells: Vec<ElementRef<'a>>,
}

impl<'a> RawRow<'a> {
    pub fn from_element(row: ElementRef<'a>) -> Self {
        let cells = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| matches!(child.value().name(), "td" | "th"))
            .collect();
        Self { cells }
    }

    fn is_header(&self) -> bool {
        !self.cells.is_empty() && self.cells.iter().all(|cell| cell.value().name() == "th")
    }
}

pub fn is_body_row(row: &RawRow<'_>) -> bool {
    row.cells.iter().any(|cell| cell.value().name() == "td")
}

/// Numeric `rowspan`/`colspan` value, 1 when absent or malformed.
pub fn span_attr(cell: &ElementRef<'_>, name: &str) -> usize {
    cell.value()
        .attr(name)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    Normal,
    Colspan,
}

impl TableLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            TableLayout::Normal => "normal",
            TableLayout::Colspan => "colspan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableShape {
    pub column_count: Option<usize>,
    pub layout: TableLayout,
}

impl TableShape {
    pub fn detect(rows: &[RawRow<'_>]) -> Self {
        let layout = if has_colspan(rows) {
            TableLayout::Colspan
        } else {
            TableLayout::Normal
        };

        Self {
            column_count: column_count(rows),
            layout,
        }
    }

    pub fn chunk_size(&self) -> usize {
        match self.column_count {
            Some(count) if count > 0 => count,
            _ => DEFAULT_COLUMN_COUNT,
        }
    }
}

/// Header cell count of the first all-`th` row.
pub fn column_count(rows: &[RawRow<'_>]) -> Option<usize> {
    rows.iter()
        .find(|row| row.is_header())
        .map(|row| row.cells.len())
}

pub fn has_colspan(rows: &[RawRow<'_>]) -> bool {
    rows.iter()
        .filter(|row| is_body_row(row))
        .filter_map(|row| row.cells.get(DATA_COLUMN_INDEX))
        .any(|cell| span_attr(cell, "colspan") >= 2)
}

impl Extractor {
    /// Rows owned by `table`; rows of nested tables are skipped.
    pub(super) fn table_rows<'a>(&self, table: ElementRef<'a>) -> Vec<RawRow<'a>> {
        table
            .select(&self.table_row)
            .filter(|row| nearest_table(*row).map(|owner| owner.id()) == Some(table.id()))
            .map(RawRow::from_element)
            .collect()
    }
}

fn nearest_table(row: ElementRef<'_>) -> Option<ElementRef<'_>> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "table")
}
