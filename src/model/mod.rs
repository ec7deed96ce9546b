//! Types that represent the core data model, such as `Payee` and `CellRef`.
mod cell;
mod payee;

pub use cell::{column_letters, CellRange, CellRef};
pub use payee::{Payee, PayeeName, Status};
