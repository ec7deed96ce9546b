//! Implements the `Ledger` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets (see `HALOGEN_IN_TEST_MODE`).

use crate::api::{Ledger, Worksheet};
use crate::error::{classify, not_found, ErrorType};
use crate::model::{CellRef, Status};
use crate::Result;
use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// In-memory spreadsheets by spreadsheet ID, so that every `TestLedger` opened for the same
/// spreadsheet within a process sees the same cells.
static SPREADSHEETS: OnceLock<Mutex<HashMap<String, Arc<Mutex<TestLedgerState>>>>> =
    OnceLock::new();

/// An implementation of the `Ledger` trait that does not use Google Sheets. It holds its worksheets
/// in memory and, by default, is seeded with two months of sample data.
///
/// Clones share the same state, so a test can keep a `TestLedger` (or the handle returned by
/// `state`) to inspect the cells after handing a boxed clone to a `Workbook`.
#[derive(Debug, Clone)]
pub struct TestLedger {
    state: Arc<Mutex<TestLedgerState>>,
}

/// The cells of every worksheet of a `TestLedger`, in tab order.
#[derive(Debug, Clone, Default)]
pub struct TestLedgerState {
    sheets: Vec<TestWorksheet>,
    next_id: i64,
}

#[derive(Debug, Clone)]
struct TestWorksheet {
    id: i64,
    title: String,
    cells: Vec<Vec<String>>,
}

impl TestLedgerState {
    /// Worksheet titles, left-most first.
    pub fn titles(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.title.clone()).collect()
    }

    /// The raw cells of `title`, with formulas unevaluated.
    pub fn cells(&self, title: &str) -> Option<&[Vec<String>]> {
        self.sheet(title).map(|s| s.cells.as_slice())
    }

    /// The raw content of a single cell. Cells outside the grid are empty.
    pub fn cell(&self, title: &str, cell: CellRef) -> Option<&str> {
        let sheet = self.sheet(title)?;
        Some(
            sheet
                .cells
                .get(cell.row - 1)
                .and_then(|row| row.get(cell.col - 1))
                .map(String::as_str)
                .unwrap_or(""),
        )
    }

    /// The first column of every row of `title`, which is where the seed data keeps payee names.
    pub fn column_a(&self, title: &str) -> Vec<String> {
        self.cells(title)
            .unwrap_or_default()
            .iter()
            .map(|row| row.first().cloned().unwrap_or_default())
            .collect()
    }

    fn sheet(&self, title: &str) -> Option<&TestWorksheet> {
        self.sheets.iter().find(|s| s.title == title)
    }

    fn sheet_mut(&mut self, title: &str) -> Result<&mut TestWorksheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.title == title)
            .ok_or_else(|| not_found(format!("Worksheet '{title}' not found")))
    }

    fn add(&mut self, title: String, cells: Vec<Vec<String>>) {
        let id = self.next_id;
        self.next_id += 1;
        self.sheets.push(TestWorksheet { id, title, cells });
    }

    /// Evaluates the formulas that are a plain reference to another cell, e.g. `=G3`. Any other
    /// formula is returned as its text.
    fn formatted(&self, sheet: &TestWorksheet) -> Vec<Vec<String>> {
        sheet
            .cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|value| match reference(value) {
                        Some(cell) => sheet
                            .cells
                            .get(cell.row - 1)
                            .and_then(|r| r.get(cell.col - 1))
                            .cloned()
                            .unwrap_or_default(),
                        None => value.strip_prefix('\'').unwrap_or(value).to_string(),
                    })
                    .collect()
            })
            .collect()
    }
}

fn reference(value: &str) -> Option<CellRef> {
    value.strip_prefix('=')?.parse().ok()
}

impl TestLedger {
    /// Create a new `TestLedger` holding `sheets`, left-most first. Each entry is a worksheet title
    /// and its rows.
    pub fn new(sheets: Vec<(String, Vec<Vec<String>>)>) -> Self {
        let mut state = TestLedgerState::default();
        for (title, cells) in sheets {
            state.add(title, cells);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A ledger with a single `October` worksheet listing `payees` (which should be sorted),
    /// laid out like the seed data.
    pub fn with_payees(payees: &[(&str, &str, Status)]) -> Self {
        let mut cells = summary_rows(payees.len(), "05/10/2026");
        for (name, id, status) in payees {
            cells.push(vec![
                name.to_string(),
                "=G3".to_string(),
                status.to_string(),
                id.to_string(),
            ]);
        }
        cells.push(total_row(payees.len()));
        Self::new(vec![("October".to_string(), cells)])
    }

    /// The ledger for `spreadsheet_id`, seeded with the default data the first time it is opened.
    pub fn for_spreadsheet(spreadsheet_id: &str) -> Self {
        let registry = SPREADSHEETS.get_or_init(Default::default);
        let mut spreadsheets = match registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = spreadsheets
            .entry(spreadsheet_id.to_string())
            .or_insert_with(|| TestLedger::default().state)
            .clone();
        Self { state }
    }

    /// Replaces every worksheet with those of `state`.
    pub fn set_state(&self, state: TestLedgerState) {
        match self.state.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// A handle to the shared state.
    pub fn state(&self) -> Arc<Mutex<TestLedgerState>> {
        self.state.clone()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> TestLedgerState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TestLedgerState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("The in-memory ledger lock is poisoned"))
    }
}

impl Default for TestLedger {
    /// Loads seed data from this module: `October` (current) and `September`.
    fn default() -> Self {
        let sheets = [("October", OCTOBER_DATA), ("September", SEPTEMBER_DATA)]
            .into_iter()
            .map(|(title, data)| Ok((title.to_string(), load_csv(data)?)))
            .collect::<Result<Vec<_>>>();
        match sheets {
            Ok(sheets) => Self::new(sheets),
            // The seed data is a constant of this module, so this only happens if it is edited
            // into something that is not CSV.
            Err(e) => {
                tracing::error!("Unable to load the seed data: {e:#}");
                Self::new(Vec::new())
            }
        }
    }
}

#[async_trait::async_trait]
impl Ledger for TestLedger {
    async fn worksheets(&mut self) -> Result<Vec<Worksheet>> {
        let state = self.lock()?;
        Ok(state
            .sheets
            .iter()
            .enumerate()
            .map(|(index, s)| Worksheet {
                id: s.id,
                title: s.title.clone(),
                index,
            })
            .collect())
    }

    async fn get(&mut self, worksheet: &str) -> Result<Vec<Vec<String>>> {
        let state = self.lock()?;
        let sheet = state
            .sheet(worksheet)
            .ok_or_else(|| not_found(format!("Worksheet '{worksheet}' not found")))?;
        Ok(state.formatted(sheet))
    }

    async fn get_formulas(&mut self, worksheet: &str) -> Result<Vec<Vec<String>>> {
        let state = self.lock()?;
        state
            .sheet(worksheet)
            .map(|s| s.cells.clone())
            .ok_or_else(|| not_found(format!("Worksheet '{worksheet}' not found")))
    }

    async fn write_range(
        &mut self,
        worksheet: &str,
        start: CellRef,
        rows: Vec<Vec<String>>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        let sheet = state.sheet_mut(worksheet)?;
        for (r, values) in rows.into_iter().enumerate() {
            let row_index = start.row - 1 + r;
            if sheet.cells.len() <= row_index {
                sheet.cells.resize(row_index + 1, Vec::new());
            }
            let row = &mut sheet.cells[row_index];
            for (c, value) in values.into_iter().enumerate() {
                let col_index = start.col - 1 + c;
                if row.len() <= col_index {
                    row.resize(col_index + 1, String::new());
                }
                row[col_index] = value;
            }
        }
        Ok(())
    }

    async fn insert_row(
        &mut self,
        worksheet: &Worksheet,
        index: usize,
        values: Vec<String>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        let sheet = state.sheet_mut(&worksheet.title)?;
        let at = index.max(1) - 1;
        if sheet.cells.len() < at {
            sheet.cells.resize(at, Vec::new());
        }
        // Raw input: a leading `=` is text, which Sheets shows with a quote prefix.
        let values = values
            .into_iter()
            .map(|v| if v.starts_with('=') { format!("'{v}") } else { v })
            .collect();
        sheet.cells.insert(at, values);
        Ok(())
    }

    async fn delete_row(&mut self, worksheet: &Worksheet, index: usize) -> Result<()> {
        let mut state = self.lock()?;
        let sheet = state.sheet_mut(&worksheet.title)?;
        let at = index.max(1) - 1;
        if at < sheet.cells.len() {
            sheet.cells.remove(at);
        }
        Ok(())
    }

    async fn duplicate_worksheet(&mut self, source: &Worksheet, title: &str) -> Result<Worksheet> {
        let mut state = self.lock()?;
        if state.sheet(title).is_some() {
            return Err(classify(
                ErrorType::RemoteService,
                anyhow!("A worksheet named '{title}' already exists"),
            ));
        }
        let cells = state
            .sheets
            .iter()
            .find(|s| s.id == source.id)
            .map(|s| s.cells.clone())
            .ok_or_else(|| not_found(format!("Worksheet '{}' not found", source.title)))?;
        let id = state.next_id;
        state.next_id += 1;
        state.sheets.insert(
            0,
            TestWorksheet {
                id,
                title: title.to_string(),
                cells,
            },
        );
        Ok(Worksheet {
            id,
            title: title.to_string(),
            index: 0,
        })
    }

    async fn delete_worksheet(&mut self, worksheet: &Worksheet) -> Result<()> {
        let mut state = self.lock()?;
        let before = state.sheets.len();
        state.sheets.retain(|s| s.id != worksheet.id);
        if state.sheets.len() == before {
            return Err(not_found(format!(
                "Worksheet '{}' not found",
                worksheet.title
            )));
        }
        Ok(())
    }
}

/// Loads data from a CSV-formatted string.
pub(crate) fn load_csv(csv_data: &str) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.context("Invalid CSV seed data")?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Rows 1 to 5 of a month worksheet: title, summary block and the payee table header.
fn summary_rows(payee_count: usize, payment_date: &str) -> Vec<Vec<String>> {
    let blank = |n: usize| vec![String::new(); n];
    let mut summary_labels = blank(6);
    summary_labels.extend(
        ["Cost per payee", "Payment date", "Fully paid?", "Number of payees"].map(String::from),
    );
    let mut summary_values = blank(6);
    summary_values.extend([
        "£3.00".to_string(),
        payment_date.to_string(),
        "FALSE".to_string(),
        payee_count.to_string(),
    ]);
    vec![
        vec!["Server payments".to_string()],
        summary_labels,
        summary_values,
        Vec::new(),
        ["Payee", "Amount", "Status", "Steam ID"].map(String::from).to_vec(),
    ]
}

fn total_row(payee_count: usize) -> Vec<String> {
    let last = 5 + payee_count.max(1);
    vec!["Total".to_string(), format!("=SUM(B6:B{last})")]
}

/// Seed data for the current month.
const OCTOBER_DATA: &str = r##"Server payments,,,,,,,,,
,,,,,,Cost per payee,Payment date,Fully paid?,Number of payees
,,,,,,£3.00,05/10/2026,FALSE,3
,,,,,,,,,
Payee,Amount,Status,Steam ID,,,,,,
Alice,=G3,Paid,76561198000000001,,,,,,
Charlie,=G3,Awaiting,76561198000000003,,,,,,
Dave,=G3,Paid,76561198000000004,,,,,,
Total,=SUM(B6:B8),,,,,,,,
"##;

/// Seed data for the previous month.
const SEPTEMBER_DATA: &str = r##"Server payments,,,,,,,,,
,,,,,,Cost per payee,Payment date,Fully paid?,Number of payees
,,,,,,£3.00,05/09/2026,TRUE,2
,,,,,,,,,
Payee,Amount,Status,Steam ID,,,,,,
Alice,=G3,Paid,76561198000000001,,,,,,
Charlie,=G3,Paid,76561198000000003,,,,,,
Total,=SUM(B6:B7),,,,,,,,
"##;
