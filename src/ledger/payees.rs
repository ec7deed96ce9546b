//! Adding, removing and resetting payee rows.
//!
//! The payee table starts with the `Payee` header, followed by `Number of payees` rows, one per
//! payee sorted by name, and ends with an aggregate row whose formulas span the payee rows. A row
//! is never inserted directly after the last payee, since the aggregate formulas would not grow to
//! include it.

use super::{parse_count, Grid, Workbook, NUMBER_OF_PAYEES, PAYEE, PLACEHOLDER, STATUS};
use crate::api::Worksheet;
use crate::error::{invalid_input, not_found};
use crate::model::{CellRef, Payee, PayeeName, Status};
use crate::Result;
use tracing::{debug, info};

/// Where the columns and the count of the payee table are.
#[derive(Debug, Clone, Copy)]
struct Table {
    payee: CellRef,
    status_col: usize,
    id_col: usize,
    count_cell: CellRef,
    count: usize,
}

impl Table {
    fn locate(grid: &Grid, id_header: &str) -> Result<Self> {
        let payee = grid.header(PAYEE)?;
        let status_col = grid.header(STATUS)?.col;
        let id_col = grid.header(id_header)?.col;
        let count_cell = grid.header(NUMBER_OF_PAYEES)?.below();
        let count = parse_count(grid.value(count_cell))?;
        Ok(Self {
            payee,
            status_col,
            id_col,
            count_cell,
            count,
        })
    }

    fn first_row(&self) -> usize {
        self.payee.row + 1
    }

    /// The cost formula sits to the right of the name.
    fn formula_col(&self) -> usize {
        self.payee.col + 1
    }

    fn names(&self, grid: &Grid) -> Vec<String> {
        (0..self.count)
            .map(|i| {
                let cell = CellRef::new(self.first_row() + i, self.payee.col);
                grid.value(cell).trim().to_string()
            })
            .collect()
    }

    fn payee_at(&self, grid: &Grid, row: usize) -> Payee {
        Payee {
            name: PayeeName::from_cell(grid.value(CellRef::new(row, self.payee.col))),
            id: grid.value(CellRef::new(row, self.id_col)).trim().to_string(),
            status: Status::from_cell(grid.value(CellRef::new(row, self.status_col))),
        }
    }

    /// A new row for `payee`, with the placeholder in the formula cell.
    fn row_for(&self, payee: &Payee) -> Vec<String> {
        let width = [self.payee.col, self.formula_col(), self.status_col, self.id_col]
            .into_iter()
            .max()
            .unwrap_or(1);
        let mut row = vec![String::new(); width];
        row[self.payee.col - 1] = payee.name.to_string();
        row[self.formula_col() - 1] = PLACEHOLDER.to_string();
        row[self.status_col - 1] = payee.status.to_string();
        row[self.id_col - 1] = payee.id.clone();
        row
    }
}

impl Workbook {
    /// The payees listed in `ws`, in table order.
    pub async fn payees(&mut self, ws: &str) -> Result<Vec<Payee>> {
        let grid = self.grid(ws).await?;
        let table = Table::locate(&grid, &self.options().id_header)?;
        Ok((0..table.count)
            .map(|i| table.payee_at(&grid, table.first_row() + i))
            .collect())
    }

    /// Adds a payee to the current worksheet, keeping the table sorted by name and the aggregate
    /// row last. The new payee is `Awaiting` payment.
    pub async fn add_payee(&mut self, name: &str, id: &str) -> Result<Payee> {
        let name = PayeeName::parse(name)?;
        let id = id.trim();
        if id.is_empty() {
            return Err(invalid_input(format!("An ID is needed to add '{name}'")));
        }
        let payee = Payee::new(name, id);

        let ws = self.current().await?;
        let grid = self.grid(&ws.title).await?;
        let table = Table::locate(&grid, &self.options().id_header)?;
        let mut names = table.names(&grid);
        if names.iter().any(|n| n == payee.name.as_str()) {
            return Err(invalid_input(format!("'{}' is already a payee", payee.name)));
        }

        let first = table.first_row();
        match names.last().cloned() {
            None => {
                debug!("The table is empty, adding {} at row {first}", payee.name);
                self.insert_payee_row(&ws, &table, first, table.row_for(&payee))
                    .await?;
            }
            Some(last) => {
                names.push(payee.name.to_string());
                names.sort();
                let index = names
                    .iter()
                    .position(|n| n == payee.name.as_str())
                    .unwrap_or(names.len() - 1);
                let row = first + index;

                if names[table.count] == last {
                    debug!("Adding {} at row {row}", payee.name);
                    self.insert_payee_row(&ws, &table, row, table.row_for(&payee))
                        .await?;
                } else {
                    // Sorts last: add it above the last payee, then move that payee above it.
                    debug!("Adding {} at row {row} by displacing {last}", payee.name);
                    self.insert_payee_row(&ws, &table, row - 1, table.row_for(&payee))
                        .await?;
                    let formulas = self.formula_grid(&ws.title).await?;
                    let mut displaced = formulas.row(row);
                    if displaced.len() < table.formula_col() {
                        displaced.resize(table.formula_col(), String::new());
                    }
                    displaced[table.formula_col() - 1] = PLACEHOLDER.to_string();
                    self.insert_payee_row(&ws, &table, row - 1, displaced).await?;
                    self.delete_row(&ws, row + 1).await?;
                }
            }
        }

        self.update_count(&ws, &table, table.count + 1).await?;
        info!("Added {} to {}", payee.name, ws.title);
        Ok(payee)
    }

    /// Removes the payee named `name` (normalized first) from the current worksheet and returns
    /// the removed row. Fails with `NotFound` if there is no such payee.
    pub async fn remove_payee(&mut self, name: &str) -> Result<Payee> {
        let name = PayeeName::parse(name)?;
        let ws = self.current().await?;
        let grid = self.grid(&ws.title).await?;
        let table = Table::locate(&grid, &self.options().id_header)?;

        let index = table
            .names(&grid)
            .iter()
            .position(|n| n == name.as_str())
            .ok_or_else(|| not_found(format!("There is no payee named '{name}'")))?;
        let row = table.first_row() + index;
        let payee = table.payee_at(&grid, row);

        self.delete_row(&ws, row).await?;
        self.update_count(&ws, &table, table.count.saturating_sub(1))
            .await?;
        info!("Removed {} from {}", payee.name, ws.title);
        Ok(payee)
    }

    /// Sets every payee of `ws` to `Awaiting` and returns how many cells were written.
    pub async fn reset_status(&mut self, ws: &str) -> Result<usize> {
        let grid = self.grid(ws).await?;
        let table = Table::locate(&grid, &self.options().id_header)?;
        if table.count == 0 {
            debug!("No payees in {ws}, nothing to reset");
            return Ok(0);
        }
        let start = CellRef::new(table.first_row(), table.status_col);
        let values = vec![Status::Awaiting.to_string(); table.count];
        self.write_column(ws, start, values).await?;
        info!("Reset the status of {} payees in {ws}", table.count);
        Ok(table.count)
    }

    /// Inserts `values` at `row` and replaces the placeholder with the cost formula.
    async fn insert_payee_row(
        &mut self,
        ws: &Worksheet,
        table: &Table,
        row: usize,
        values: Vec<String>,
    ) -> Result<()> {
        let (values, formulas) = split_formulas(values);
        self.insert_row(ws, row, values).await?;
        for (col, formula) in formulas {
            self.write_cell(&ws.title, CellRef::new(row, col), formula)
                .await?;
        }
        let cell = match self.grid(&ws.title).await?.find(PLACEHOLDER) {
            Some(cell) => cell,
            None => CellRef::new(row, table.formula_col()),
        };
        let formula = self.options().cost_formula.clone();
        self.write_cell(&ws.title, cell, formula).await
    }

    /// Writes `count` under `Number of payees`, unless the cell is a formula.
    async fn update_count(&mut self, ws: &Worksheet, table: &Table, count: usize) -> Result<()> {
        let formulas = self.formula_grid(&ws.title).await?;
        if formulas.value(table.count_cell).trim_start().starts_with('=') {
            debug!("'{NUMBER_OF_PAYEES}' is a formula, leaving it");
            return Ok(());
        }
        self.write_cell(&ws.title, table.count_cell, count.to_string())
            .await
    }
}

/// Blanks the formulas of `values`, which are inserted as raw text, and returns them with their
/// column numbers so they can be written separately.
fn split_formulas(values: Vec<String>) -> (Vec<String>, Vec<(usize, String)>) {
    let mut formulas = Vec::new();
    let values = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            if value.trim_start().starts_with('=') {
                formulas.push((i + 1, value));
                String::new()
            } else {
                value
            }
        })
        .collect();
    (values, formulas)
}

#[cfg(test)]
mod tests {
    use super::super::tests::options;
    use super::*;
    use crate::api::{Ledger, TestLedger, TestLedgerState};
    use crate::error::{error_type, ErrorType};

    fn workbook(payees: &[(&str, &str, Status)]) -> (Workbook, TestLedger) {
        let ledger = TestLedger::with_payees(payees);
        (Workbook::new(Box::new(ledger.clone()), options()), ledger)
    }

    /// Column A from the payee header down, which is the table plus the aggregate row.
    fn table(state: &TestLedgerState) -> Vec<String> {
        state.column_a("October")[4..].to_vec()
    }

    #[tokio::test]
    async fn test_add_payee_in_the_middle() {
        let (mut workbook, ledger) = workbook(&[
            ("Alice", "1", Status::Paid),
            ("Charlie", "3", Status::Paid),
        ]);
        let payee = workbook.add_payee("bob", "77").await.unwrap();
        assert_eq!("Bob", payee.name.as_str());

        let state = ledger.snapshot();
        assert_eq!(vec!["Payee", "Alice", "Bob", "Charlie", "Total"], table(&state));
        assert_eq!(Some("Awaiting"), state.cell("October", CellRef::new(7, 3)));
        assert_eq!(Some("77"), state.cell("October", CellRef::new(7, 4)));
        assert_eq!(Some("=G3"), state.cell("October", CellRef::new(7, 2)));
        assert_eq!(Some("3"), state.cell("October", CellRef::new(3, 10)));
    }

    #[tokio::test]
    async fn test_add_payee_at_the_end() {
        let (mut workbook, ledger) = workbook(&[
            ("Alice", "1", Status::Paid),
            ("Bob", "2", Status::Paid),
        ]);
        workbook.add_payee("zoe", "99").await.unwrap();

        let state = ledger.snapshot();
        assert_eq!(vec!["Payee", "Alice", "Bob", "Zoe", "Total"], table(&state));
        // Bob was moved, not rewritten
        assert_eq!(Some("Paid"), state.cell("October", CellRef::new(7, 3)));
        assert_eq!(Some("2"), state.cell("October", CellRef::new(7, 4)));
        assert_eq!(Some("=G3"), state.cell("October", CellRef::new(7, 2)));
        assert_eq!(Some("Awaiting"), state.cell("October", CellRef::new(8, 3)));
        assert_eq!(Some("=G3"), state.cell("October", CellRef::new(8, 2)));
        let placeholders = state
            .cells("October")
            .unwrap()
            .iter()
            .flatten()
            .filter(|v| v.as_str() == PLACEHOLDER)
            .count();
        assert_eq!(0, placeholders);
    }

    #[tokio::test]
    async fn test_moved_row_keeps_its_formulas() {
        let (mut workbook, ledger) = workbook(&[
            ("Alice", "1", Status::Paid),
            ("Bob", "2", Status::Paid),
        ]);
        let mut seed = ledger.clone();
        seed.write_range("October", CellRef::new(7, 5), vec![vec!["=A7".to_string()]])
            .await
            .unwrap();

        workbook.add_payee("zoe", "99").await.unwrap();
        let state = ledger.snapshot();
        assert_eq!(Some("Bob"), state.cell("October", CellRef::new(7, 1)));
        assert_eq!(Some("=A7"), state.cell("October", CellRef::new(7, 5)));
        assert_eq!(Some("=G3"), state.cell("October", CellRef::new(7, 2)));
        assert!(!state
            .cells("October")
            .unwrap()
            .iter()
            .flatten()
            .any(|v| v.starts_with("'=")));
    }

    #[test]
    fn test_split_formulas() {
        let row = vec!["Bob".to_string(), "=G3".to_string(), " =A7".to_string(), "2".to_string()];
        let (values, formulas) = split_formulas(row);
        assert_eq!(vec!["Bob", "", "", "2"], values);
        assert_eq!(
            vec![(2, "=G3".to_string()), (3, " =A7".to_string())],
            formulas
        );
    }

    #[tokio::test]
    async fn test_add_first_payee() {
        let (mut workbook, ledger) = workbook(&[]);
        workbook.add_payee("mary-jane", "5").await.unwrap();
        let state = ledger.snapshot();
        assert_eq!(vec!["Payee", "Mary Jane", "Total"], table(&state));
        assert_eq!(Some("1"), state.cell("October", CellRef::new(3, 10)));
    }

    #[tokio::test]
    async fn test_add_payee_rejects_bad_input() {
        let (mut workbook, ledger) = workbook(&[("Alice", "1", Status::Paid)]);
        for (name, id) in [("alice", "2"), ("r2d2", "3"), ("  ", "4"), ("Bob", " ")] {
            let e = workbook.add_payee(name, id).await.unwrap_err();
            assert_eq!(Some(ErrorType::InvalidInput), error_type(&e), "{name}");
        }
        assert_eq!(vec!["Payee", "Alice", "Total"], table(&ledger.snapshot()));
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_table() {
        let (mut workbook, ledger) = workbook(&[
            ("Alice", "1", Status::Paid),
            ("Bob", "2", Status::Awaiting),
        ]);
        let before = ledger.snapshot().cells("October").unwrap().to_vec();

        for name in ["aaron", "bea", "zed"] {
            workbook.add_payee(name, "9").await.unwrap();
            let removed = workbook.remove_payee(name).await.unwrap();
            assert_eq!("9", removed.id);
            assert_eq!(before, ledger.snapshot().cells("October").unwrap().to_vec());
        }
    }

    #[tokio::test]
    async fn test_remove_payee() {
        let mut workbook = Workbook::new(Box::new(TestLedger::default()), options());
        let removed = workbook.remove_payee("CHARLIE").await.unwrap();
        assert_eq!(
            Payee {
                name: PayeeName::parse("Charlie").unwrap(),
                id: "76561198000000003".to_string(),
                status: Status::Awaiting,
            },
            removed
        );
        let names: Vec<String> = workbook
            .payees("October")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name.to_string())
            .collect();
        assert_eq!(vec!["Alice", "Dave"], names);
    }

    #[tokio::test]
    async fn test_hand_edited_names_are_read() {
        let (mut workbook, _) = workbook(&[
            ("Alice", "1", Status::Paid),
            ("Player2", "2", Status::Awaiting),
        ]);
        let payees = workbook.payees("October").await.unwrap();
        assert_eq!("Player2", payees[1].name.as_str());

        let removed = workbook.remove_payee("alice").await.unwrap();
        assert_eq!("1", removed.id);
        assert_eq!(1, workbook.payees("October").await.unwrap().len());
    }

    #[tokio::test]
    async fn test_remove_missing_payee() {
        let (mut workbook, _) = workbook(&[("Alice", "1", Status::Paid)]);
        let e = workbook.remove_payee("Nobody").await.unwrap_err();
        assert_eq!(Some(ErrorType::NotFound), error_type(&e));
    }

    #[tokio::test]
    async fn test_count_formula_is_left_alone() {
        let (mut workbook, ledger) = workbook(&[("Alice", "1", Status::Paid)]);
        let mut cells = ledger.snapshot().cells("October").unwrap().to_vec();
        cells[2][9] = "=K3".to_string();
        cells[2].push("1".to_string());
        ledger.set_state(TestLedger::new(vec![("October".to_string(), cells)]).snapshot());

        workbook.add_payee("bob", "2").await.unwrap();
        let state = ledger.snapshot();
        assert_eq!(vec!["Payee", "Alice", "Bob", "Total"], table(&state));
        assert_eq!(Some("=K3"), state.cell("October", CellRef::new(3, 10)));
    }

    #[tokio::test]
    async fn test_reset_status() {
        let (mut workbook, ledger) = workbook(&[
            ("Alice", "1", Status::Paid),
            ("Bob", "2", Status::Paid),
            ("Carol", "3", Status::Awaiting),
        ]);
        assert_eq!(3, workbook.reset_status("October").await.unwrap());
        let state = ledger.snapshot();
        for row in 6..=8 {
            assert_eq!(Some("Awaiting"), state.cell("October", CellRef::new(row, 3)));
        }
        // The aggregate row is untouched
        assert_eq!(Some(""), state.cell("October", CellRef::new(9, 3)));
    }
}
