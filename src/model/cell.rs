use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 1-based (row, column) coordinate in a worksheet, the way spreadsheets number them.
/// Displays and serializes as A1 notation, e.g. `CellRef::new(3, 2)` is `"B3"`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    /// Both `row` and `col` are 1-based; zero is clamped to 1.
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row: row.max(1),
            col: col.max(1),
        }
    }

    /// The cell directly beneath this one.
    pub fn below(self) -> Self {
        Self::new(self.row + 1, self.col)
    }

    /// The cell directly to the right of this one.
    pub fn right(self) -> Self {
        Self::new(self.row, self.col + 1)
    }

    /// The range from this cell down `n` rows (inclusive of this cell). `n` must be non-zero.
    pub fn down(self, n: usize) -> CellRange {
        CellRange::new(self, Self::new(self.row + n.saturating_sub(1), self.col))
    }
}

/// Converts a 1-based column number to letters, e.g. 1 -> A, 27 -> AA.
pub fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Expected format: "B3"
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| anyhow::anyhow!("Cell must be in A1 format, got: {s}"))?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!("Cell must start with column letters, got: {s}");
        }

        let col = letters
            .to_ascii_uppercase()
            .bytes()
            .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
        let row = digits
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid row number: {e}"))?;
        if row == 0 {
            anyhow::bail!("Row numbers start at 1, got: {s}");
        }

        Ok(CellRef::new(row, col))
    }
}

impl Serialize for CellRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CellRef::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// An inclusive rectangular range of cells, displayed as `A6:A8`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self { start, end }
    }

    pub fn rows(&self) -> usize {
        self.end.row + 1 - self.start.row
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}
