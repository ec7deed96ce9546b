//! Monthly rotation: from the 5th of each month a worksheet for the next month is created from the
//! current one, and only the two newest worksheets are kept.

use super::{Workbook, PAYMENT_DATE};
use crate::Result;
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

/// Rotation does nothing before this day of the month.
pub const ROTATION_DAY: u32 = 5;

/// How many worksheets are kept after rotating.
const KEEP: usize = 2;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// The outcome of `rotate_month`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Rotation {
    /// The title of the next month's worksheet.
    pub month: String,
    /// Whether the worksheet was created by this rotation.
    pub created: bool,
    /// Titles of the worksheets that were deleted.
    pub pruned: Vec<String>,
}

/// The English name of the month after the month of `today`. December is followed by January.
pub fn next_month_name(today: NaiveDate) -> &'static str {
    MONTHS[(today.month0() as usize + 1) % 12]
}

/// One calendar month after `current`, parsed with `format`. A day that does not exist in the
/// next month becomes its last day. If `current` cannot be parsed, one month after `today`.
pub fn next_payment_date(current: &str, format: &str, today: NaiveDate) -> NaiveDate {
    let next = |date: NaiveDate| date.checked_add_months(Months::new(1));
    let parsed = match NaiveDate::parse_from_str(current.trim(), format) {
        Ok(date) => next(date),
        Err(e) => {
            debug!("Unable to parse the payment date '{current}' with '{format}': {e}");
            None
        }
    };
    parsed.or_else(|| next(today)).unwrap_or(today)
}

impl Workbook {
    /// Creates next month's worksheet from the current one if it does not exist yet and deletes
    /// all but the two newest worksheets. Returns `None` before the 5th of the month, when
    /// nothing is done. Running it again in the same month changes nothing.
    pub async fn rotate_month(&mut self, today: NaiveDate) -> Result<Option<Rotation>> {
        if today.day() < ROTATION_DAY {
            info!(
                "It is too early in the month to rotate, waiting until the {}th",
                ROTATION_DAY
            );
            return Ok(None);
        }

        let month = next_month_name(today).to_string();
        let worksheets = self.worksheets().await?;
        let created = if worksheets.iter().any(|w| w.title == month) {
            debug!("The {month} worksheet already exists");
            false
        } else {
            let current = self.current().await?;
            let current_date = self.value_below(&current.title, PAYMENT_DATE).await?;
            let format = self.options().date_format.clone();
            let date = next_payment_date(&current_date, &format, today);

            let new = self.duplicate_worksheet(&current, &month).await?;
            let cell = self.find_header(&new.title, PAYMENT_DATE).await?.below();
            self.write_cell(&new.title, cell, date.format(&format).to_string())
                .await?;
            self.reset_status(&new.title).await?;
            info!("Created the {month} worksheet from {}", current.title);
            true
        };

        let mut pruned = Vec::new();
        for old in self.worksheets().await?.into_iter().skip(KEEP) {
            self.delete_worksheet(&old).await?;
            info!("Deleted the {} worksheet", old.title);
            pruned.push(old.title);
        }

        Ok(Some(Rotation {
            month,
            created,
            pruned,
        }))
    }
}
