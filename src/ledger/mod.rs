//! The payee ledger: a spreadsheet with one worksheet per month.
//!
//! `Workbook` wraps a `Ledger` backend and addresses cells relative to header labels, so that the
//! operations in `payees` and `rotate` do not depend on where the tables sit in the worksheet.

mod payees;
mod rotate;

use crate::api::{Ledger, Worksheet};
use crate::config::GsheetsConfig;
use crate::error::not_found;
use crate::model::{CellRange, CellRef};
use crate::Result;
use anyhow::Context;
use tracing::trace;

pub use rotate::{next_month_name, next_payment_date, Rotation};

/// The header of the payee name column.
pub const PAYEE: &str = "Payee";
/// The header of the payment status column.
pub const STATUS: &str = "Status";
pub const COST_PER_PAYEE: &str = "Cost per payee";
pub const PAYMENT_DATE: &str = "Payment date";
pub const FULLY_PAID: &str = "Fully paid?";
pub const NUMBER_OF_PAYEES: &str = "Number of payees";

/// Written into the cost cell of a new row so the row can be found again.
pub(crate) const PLACEHOLDER: &str = "!tmp";

/// Settings from the `gsheets` section that shape how the ledger is edited.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LedgerOptions {
    /// The header of the ID column, e.g. `Steam ID`.
    pub id_header: String,
    pub cost_formula: String,
    pub date_format: String,
}

impl From<&GsheetsConfig> for LedgerOptions {
    fn from(gsheets: &GsheetsConfig) -> Self {
        Self {
            id_header: format!("{} ID", gsheets.game),
            cost_formula: gsheets.cost_formula.clone(),
            date_format: gsheets.date_format.clone(),
        }
    }
}

/// The values of the summary block of a worksheet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Summary {
    pub cost: String,
    pub payment_date: String,
    pub fully_paid: bool,
    pub payee_count: usize,
}

/// A worksheet's cells as read in one call, row by row.
#[derive(Debug, Clone, Default)]
pub(crate) struct Grid(Vec<Vec<String>>);

impl Grid {
    pub(crate) fn new(rows: Vec<Vec<String>>) -> Self {
        Self(rows)
    }

    /// The first cell, scanning row by row, whose trimmed value equals `label`.
    pub(crate) fn find(&self, label: &str) -> Option<CellRef> {
        self.0.iter().enumerate().find_map(|(r, row)| {
            row.iter()
                .position(|value| value.trim() == label)
                .map(|c| CellRef::new(r + 1, c + 1))
        })
    }

    /// Like `find`, but a missing label is a `NotFound` error.
    pub(crate) fn header(&self, label: &str) -> Result<CellRef> {
        self.find(label)
            .ok_or_else(|| not_found(format!("The header '{label}' was not found")))
    }

    /// The value at `cell`. Cells outside the grid are empty.
    pub(crate) fn value(&self, cell: CellRef) -> &str {
        self.0
            .get(cell.row - 1)
            .and_then(|row| row.get(cell.col - 1))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Row `row`, or an empty row.
    pub(crate) fn row(&self, row: usize) -> Vec<String> {
        self.0.get(row - 1).cloned().unwrap_or_default()
    }

    /// The values of `range`, row by row and left to right.
    pub(crate) fn range(&self, range: CellRange) -> Vec<String> {
        let mut values = Vec::new();
        for row in range.start.row..=range.end.row {
            for col in range.start.col..=range.end.col {
                values.push(self.value(CellRef::new(row, col)).to_string());
            }
        }
        values
    }
}

/// Client surface over a `Ledger` backend. Every read goes to the backend, nothing is cached.
pub struct Workbook {
    ledger: Box<dyn Ledger>,
    options: LedgerOptions,
}

impl Workbook {
    pub fn new(ledger: Box<dyn Ledger>, options: LedgerOptions) -> Self {
        Self { ledger, options }
    }

    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    /// Lists the worksheets, left-most first.
    pub async fn worksheets(&mut self) -> Result<Vec<Worksheet>> {
        self.ledger.worksheets().await
    }

    /// The worksheet of the current month, which is the left-most one.
    pub async fn current(&mut self) -> Result<Worksheet> {
        self.ledger
            .worksheets()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found("The spreadsheet has no worksheets"))
    }

    pub(crate) async fn grid(&mut self, ws: &str) -> Result<Grid> {
        Ok(Grid::new(self.ledger.get(ws).await?))
    }

    pub(crate) async fn formula_grid(&mut self, ws: &str) -> Result<Grid> {
        Ok(Grid::new(self.ledger.get_formulas(ws).await?))
    }

    /// The cell holding `label`.
    pub async fn find_header(&mut self, ws: &str, label: &str) -> Result<CellRef> {
        self.grid(ws).await?.header(label)
    }

    /// The value in the cell directly beneath `label`.
    pub async fn value_below(&mut self, ws: &str, label: &str) -> Result<String> {
        let grid = self.grid(ws).await?;
        let header = grid.header(label)?;
        Ok(grid.value(header.below()).to_string())
    }

    pub async fn read_range(&mut self, ws: &str, range: CellRange) -> Result<Vec<String>> {
        trace!("read_range {range} in {ws}");
        Ok(self.grid(ws).await?.range(range))
    }

    pub async fn row_values(&mut self, ws: &str, row: usize) -> Result<Vec<String>> {
        Ok(self.grid(ws).await?.row(row))
    }

    pub async fn write_cell(
        &mut self,
        ws: &str,
        cell: CellRef,
        value: impl Into<String>,
    ) -> Result<()> {
        trace!("write_cell {cell} in {ws}");
        self.ledger
            .write_range(ws, cell, vec![vec![value.into()]])
            .await
    }

    /// Writes `values` downwards from `start`.
    pub async fn write_column(
        &mut self,
        ws: &str,
        start: CellRef,
        values: Vec<String>,
    ) -> Result<()> {
        let rows = values.into_iter().map(|v| vec![v]).collect();
        self.ledger.write_range(ws, start, rows).await
    }

    pub async fn insert_row(
        &mut self,
        ws: &Worksheet,
        index: usize,
        values: Vec<String>,
    ) -> Result<()> {
        trace!("insert_row {index} in {}", ws.title);
        self.ledger.insert_row(ws, index, values).await
    }

    pub async fn delete_row(&mut self, ws: &Worksheet, index: usize) -> Result<()> {
        trace!("delete_row {index} in {}", ws.title);
        self.ledger.delete_row(ws, index).await
    }

    pub async fn duplicate_worksheet(
        &mut self,
        source: &Worksheet,
        title: &str,
    ) -> Result<Worksheet> {
        self.ledger.duplicate_worksheet(source, title).await
    }

    pub async fn delete_worksheet(&mut self, ws: &Worksheet) -> Result<()> {
        self.ledger.delete_worksheet(ws).await
    }

    /// Reads the summary block of `ws`.
    pub async fn summary(&mut self, ws: &str) -> Result<Summary> {
        let grid = self.grid(ws).await?;
        let below = |label: &str| -> Result<String> {
            Ok(grid.value(grid.header(label)?.below()).trim().to_string())
        };
        Ok(Summary {
            cost: below(COST_PER_PAYEE)?,
            payment_date: below(PAYMENT_DATE)?,
            fully_paid: below(FULLY_PAID)?.eq_ignore_ascii_case("true"),
            payee_count: parse_count(&below(NUMBER_OF_PAYEES)?)?,
        })
    }
}

/// Parses the `Number of payees` value. An empty cell counts as zero.
pub(crate) fn parse_count(value: &str) -> Result<usize> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .with_context(|| format!("'{value}' under '{NUMBER_OF_PAYEES}' is not a number"))
}
