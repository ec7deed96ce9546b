use crate::error::invalid_input;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The payment status of a payee for the month.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Awaiting,
    Paid,
}

serde_plain::derive_display_from_serialize!(Status);
serde_plain::derive_fromstr_from_deserialize!(Status);

impl Status {
    /// Reads a status cell. Anything that is not exactly `Paid` counts as `Awaiting`.
    pub fn from_cell(s: &str) -> Self {
        match s.trim() {
            "Paid" => Status::Paid,
            _ => Status::Awaiting,
        }
    }
}

/// A normalized payee name: tokens split on `-`, `_` and whitespace, each token title-cased and
/// joined with single spaces. `"mary-jane  o_neil"` becomes `"Mary Jane O Neil"`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayeeName(String);

impl PayeeName {
    /// Normalizes `raw`. Fails with `InvalidInput` if the result is empty or contains a digit.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw
            .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(title_case)
            .collect::<Vec<_>>()
            .join(" ");

        if normalized.is_empty() {
            return Err(invalid_input("A payee name cannot be empty"));
        }
        if normalized.chars().any(char::is_numeric) {
            return Err(invalid_input(format!(
                "A payee name cannot contain numbers, got '{raw}'"
            )));
        }
        Ok(Self(normalized))
    }

    /// A name read back from a name cell, kept as written apart from surrounding whitespace.
    /// Names edited by hand in the sheet are not rejected here.
    pub fn from_cell(s: &str) -> Self {
        Self(s.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PayeeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl AsRef<str> for PayeeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// A row of the payee table.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    pub name: PayeeName,
    /// The game identifier, e.g. a Steam ID.
    pub id: String,
    pub status: Status,
}

impl Payee {
    /// A new payee always starts out `Awaiting` payment.
    pub fn new(name: PayeeName, id: impl Into<String>) -> Self {
        Self {
            name,
            id: id.into(),
            status: Status::Awaiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_type, ErrorType};

    #[test]
    fn test_normalize_simple() {
        assert_eq!("Bob", PayeeName::parse("bob").unwrap().as_str());
        assert_eq!("Zed Leadling", PayeeName::parse("zED leadling").unwrap().as_str());
    }

    #[test]
    fn test_normalize_separators() {
        let name = PayeeName::parse("  mary-jane__o_neil ").unwrap();
        assert_eq!("Mary Jane O Neil", name.to_string());
    }

    #[test]
    fn test_reject_digits() {
        let e = PayeeName::parse("b0b").unwrap_err();
        assert_eq!(Some(ErrorType::InvalidInput), error_type(&e));
    }

    #[test]
    fn test_reject_non_ascii_digits() {
        for raw in ["bob²", "ali٣", "zoe Ⅻ"] {
            let e = PayeeName::parse(raw).unwrap_err();
            assert_eq!(Some(ErrorType::InvalidInput), error_type(&e), "{raw}");
        }
    }

    #[test]
    fn test_from_cell_keeps_hand_edits() {
        assert_eq!("Player2", PayeeName::from_cell(" Player2 ").as_str());
        assert_eq!("McDonald", PayeeName::from_cell("McDonald").as_str());
    }

    #[test]
    fn test_reject_empty() {
        for raw in ["", "   ", "-_-"] {
            let e = PayeeName::parse(raw).unwrap_err();
            assert_eq!(Some(ErrorType::InvalidInput), error_type(&e));
        }
    }

    #[test]
    fn test_status_cells() {
        assert_eq!(Status::Paid, Status::from_cell("Paid"));
        assert_eq!(Status::Awaiting, Status::from_cell("Awaiting"));
        assert_eq!(Status::Awaiting, Status::from_cell(""));
        assert_eq!("Awaiting", Status::Awaiting.to_string());
    }
}
