//! Table-relation matcher.
//!
//! Candidate output may carry tables as markdown pipe tables or as HTML
//! `<table>` markup. Both are flattened onto a [`TableGrid`] where a cell
//! spanning several rows or columns occupies every slot it covers; each slot
//! remembers which cell it belongs to so neighbor lookups skip over the
//! cell's own span.

use super::Outcome;
use crate::align::edit_distance;
use crate::assertion::{Relation, TableRule};
use crate::normalize::normalize_text;
use scraper::{ElementRef, Html, Selector};

/// Upper bound on `rowspan`/`colspan` to keep malformed markup cheap.
const MAX_SPAN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    cell_id: usize,
    text: String,
}

/// One table laid out on a row/column grid.
#[derive(Debug, Clone, Default)]
pub struct TableGrid {
    rows: Vec<Vec<Option<Slot>>>,
    /// Leading rows that hold column headings.
    header_rows: usize,
    next_id: usize,
}

impl TableGrid {
    fn slot(&self, row: usize, col: usize) -> Option<&Slot> {
        self.rows.get(row).and_then(|r| r.get(col)).and_then(Option::as_ref)
    }

    /// Place a cell at the first free column of `row` at or after `col`.
    /// Returns the column after the placed cell.
    fn place(
        &mut self,
        row: usize,
        mut col: usize,
        text: String,
        rowspan: usize,
        colspan: usize,
    ) -> usize {
        while self.slot(row, col).is_some() {
            col += 1;
        }
        let cell_id = self.next_id;
        self.next_id += 1;
        for r in row..row + rowspan {
            if self.rows.len() <= r {
                self.rows.resize_with(r + 1, Vec::new);
            }
            let cells = &mut self.rows[r];
            if cells.len() < col + colspan {
                cells.resize(col + colspan, None);
            }
            for slot in &mut cells[col..col + colspan] {
                *slot = Some(Slot {
                    cell_id,
                    text: text.clone(),
                });
            }
        }
        col + colspan
    }

    /// Text of every slot, row-major; used by tests and explanations.
    #[must_use]
    pub fn texts(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|slot| slot.as_ref().map(|s| s.text.clone()).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// Texts related to the slot at `(row, col)` by `relation`.
    ///
    /// Directional neighbors yield at most one value: the nearest slot that
    /// belongs to a different cell. A gap (ragged row) yields nothing.
    /// `TopHeading` yields every distinct heading above the cell in its
    /// column, `LeftHeading` the first cell of its row.
    fn related(&self, row: usize, col: usize, relation: Relation) -> Vec<String> {
        let Some(own) = self.slot(row, col) else {
            return Vec::new();
        };
        let own_id = own.cell_id;

        let walk = |positions: &mut dyn Iterator<Item = (usize, usize)>| -> Vec<String> {
            for (r, c) in positions {
                match self.slot(r, c) {
                    Some(slot) if slot.cell_id == own_id => {}
                    Some(slot) => return vec![slot.text.clone()],
                    None => return Vec::new(),
                }
            }
            Vec::new()
        };

        match relation {
            Relation::Up => walk(&mut (0..row).rev().map(|r| (r, col))),
            Relation::Down => walk(&mut (row + 1..self.rows.len()).map(|r| (r, col))),
            Relation::Left => walk(&mut (0..col).rev().map(|c| (row, c))),
            Relation::Right => {
                let width = self.rows.get(row).map_or(0, Vec::len);
                walk(&mut (col + 1..width).map(|c| (row, c)))
            }
            Relation::TopHeading => {
                let mut headings: Vec<String> = Vec::new();
                for r in 0..self.header_rows.max(1).min(row) {
                    if let Some(slot) = self.slot(r, col) {
                        if slot.cell_id != own_id
                            && !slot.text.is_empty()
                            && !headings.contains(&slot.text)
                        {
                            headings.push(slot.text.clone());
                        }
                    }
                }
                headings
            }
            Relation::LeftHeading => match self.slot(row, 0) {
                Some(slot) if slot.cell_id != own_id && !slot.text.is_empty() => {
                    vec![slot.text.clone()]
                }
                _ => Vec::new(),
            },
        }
    }
}

/// Extract every markdown and HTML table from candidate text.
#[must_use]
pub fn parse_tables(text: &str) -> Vec<TableGrid> {
    let mut tables = parse_markdown_tables(text);
    if text.to_ascii_lowercase().contains("<table") {
        tables.extend(parse_html_tables(text));
    }
    tables
}

fn is_separator_row(cells: &[&str]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            let cell = cell.trim();
            let inner = cell.trim_start_matches(':').trim_end_matches(':');
            !inner.is_empty() && inner.chars().all(|c| c == '-')
        })
}

fn split_pipe_row(line: &str) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').collect()
}

/// Markdown pipe tables: a run of lines containing `|`, at least one of them
/// a `---` separator row. Leading and trailing pipes are optional.
fn parse_markdown_tables(text: &str) -> Vec<TableGrid> {
    let mut tables = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    let mut flush = |block: &mut Vec<&str>| {
        if block.len() >= 2 {
            if let Some(table) = markdown_block_to_grid(block) {
                tables.push(table);
            }
        }
        block.clear();
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.contains('|') && trimmed != "|" {
            block.push(trimmed);
        } else {
            flush(&mut block);
        }
    }
    flush(&mut block);

    tables
}

fn markdown_block_to_grid(lines: &[&str]) -> Option<TableGrid> {
    let rows: Vec<Vec<&str>> = lines.iter().map(|line| split_pipe_row(line)).collect();
    let separator = rows.iter().position(|cells| is_separator_row(cells))?;

    let mut grid = TableGrid {
        header_rows: separator,
        ..TableGrid::default()
    };
    let mut row_idx = 0;
    for (idx, cells) in rows.iter().enumerate() {
        if idx == separator {
            continue;
        }
        let mut col = 0;
        for cell in cells {
            col = grid.place(row_idx, col, normalize_text(cell), 1, 1);
        }
        row_idx += 1;
    }
    Some(grid)
}

/// Direct `<tr>` children, looking through `thead`/`tbody`/`tfoot`.
fn direct_rows<'a>(table: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut rows = Vec::new();
    for child in table.children() {
        let Some(element) = ElementRef::wrap(child) else {
            continue;
        };
        match element.value().name() {
            "tr" => rows.push(element),
            "thead" | "tbody" | "tfoot" => {
                for inner in element.children() {
                    if let Some(inner) = ElementRef::wrap(inner) {
                        if inner.value().name() == "tr" {
                            rows.push(inner);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    rows
}

fn span_attr(cell: &ElementRef, name: &str) -> usize {
    cell.value()
        .attr(name)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|&span| span > 0)
        .map_or(1, |span| span.min(MAX_SPAN))
}

fn parse_html_tables(text: &str) -> Vec<TableGrid> {
    let Ok(table_selector) = Selector::parse("table") else {
        return Vec::new();
    };
    let document = Html::parse_fragment(text);

    let mut tables = Vec::new();
    for table in document.select(&table_selector) {
        let mut grid = TableGrid::default();
        let mut in_header = true;
        for (row_idx, row) in direct_rows(&table).into_iter().enumerate() {
            let cells: Vec<ElementRef> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .collect();
            if cells.iter().any(|cell| cell.value().name() == "td") {
                in_header = false;
            }
            if in_header {
                grid.header_rows = row_idx + 1;
            }
            let mut col = 0;
            for cell in cells {
                let text = normalize_text(&cell.text().collect::<Vec<_>>().join(" "));
                col = grid.place(
                    row_idx,
                    col,
                    text,
                    span_attr(&cell, "rowspan"),
                    span_attr(&cell, "colspan"),
                );
            }
        }
        if !grid.rows.is_empty() {
            tables.push(grid);
        }
    }
    tables
}

fn within(found: &str, expected: &str, budget: usize) -> bool {
    let found: Vec<char> = found.chars().collect();
    let expected: Vec<char> = expected.chars().collect();
    edit_distance(&found, &expected) <= budget
}

pub(super) fn table_relation(rule: &TableRule, candidate: &str) -> Outcome {
    let tables = parse_tables(candidate);
    if tables.is_empty() {
        return Outcome::fail("No tables found in candidate output".to_string());
    }

    let cell = normalize_text(&rule.cell);
    let cell_budget = rule.max_diffs as usize;
    let relations: Vec<(Relation, String)> = rule
        .relations()
        .map(|(relation, expected)| (relation, normalize_text(expected)))
        .collect();

    let mut first_mismatch: Option<String> = None;
    let mut occurrences = 0usize;

    for table in &tables {
        for (row, cells) in table.rows.iter().enumerate() {
            for (col, slot) in cells.iter().enumerate() {
                let Some(slot) = slot else { continue };
                if !within(&slot.text, &cell, cell_budget) {
                    continue;
                }
                occurrences += 1;

                let mismatch = relations.iter().find_map(|(relation, expected)| {
                    let budget = cell_budget.max(expected.chars().count() / 10);
                    let found = table.related(row, col, *relation);
                    if found.iter().any(|text| within(text, expected, budget)) {
                        None
                    } else if found.is_empty() {
                        Some(format!("no {} neighbor (expected '{}')", relation.name(), expected))
                    } else {
                        Some(format!(
                            "{} is '{}' (expected '{}')",
                            relation.name(),
                            found.join("' / '"),
                            expected
                        ))
                    }
                });

                match mismatch {
                    None => return Outcome::pass(),
                    Some(reason) => {
                        if first_mismatch.is_none() {
                            first_mismatch = Some(reason);
                        }
                    }
                }
            }
        }
    }

    match first_mismatch {
        Some(reason) => Outcome::fail(format!(
            "Cell '{}' found {} time(s) but relations do not hold: {}",
            rule.cell, occurrences, reason
        )),
        None => Outcome::fail(format!(
            "Cell '{}' not found in any of {} table(s)",
            rule.cell,
            tables.len()
        )),
    }
}
