use chrono::{Datelike, NaiveDate};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::fines::FineCalculator;

/// day of month on which the second half-month boundary falls
const MID_MONTH_DAY: u32 = 16;

/// overdue fine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineConfig {
    /// fine added for every half-month boundary crossed
    pub step_amount: Money,
    /// cap on the fine for a single fee head
    pub maximum_fine: Option<Money>,
}

impl FineConfig {
    pub fn new(step_amount: Money) -> Self {
        Self {
            step_amount,
            maximum_fine: None,
        }
    }
}

impl Default for FineConfig {
    fn default() -> Self {
        FineConfig::new(Money::from_decimal(dec!(25)))
    }
}

/// engine for the stepped half-month fine
///
/// Boundaries start at the 16th of the due month and then alternate between
/// the 1st and the 16th of each following month. Every boundary on or before
/// `today` adds one step, provided `today` is after the due date.
#[derive(Debug, Clone, Default)]
pub struct FineEngine {
    pub config: FineConfig,
}

impl FineEngine {
    pub fn new(config: FineConfig) -> Self {
        Self { config }
    }

    /// number of half-month boundaries crossed between `due_date` and `today`
    ///
    /// Closed form over the month difference, so the cost does not grow with
    /// the gap between the two dates.
    pub fn steps_between(due_date: NaiveDate, today: NaiveDate) -> u32 {
        if today <= due_date {
            return 0;
        }

        let months = (today.year() - due_date.year()) as i64 * 12
            + today.month0() as i64
            - due_date.month0() as i64;
        let past_mid = today.day() >= MID_MONTH_DAY;

        let steps: i64 = if months == 0 {
            if past_mid { 1 } else { 0 }
        } else {
            // 16th of the due month, two per full month between, then the
            // current month's 1st (and 16th if reached)
            1 + 2 * (months - 1) + if past_mid { 2 } else { 1 }
        };

        u32::try_from(steps).unwrap_or(u32::MAX)
    }

    fn last_boundary(today: NaiveDate) -> Option<NaiveDate> {
        let day = if today.day() >= MID_MONTH_DAY { MID_MONTH_DAY } else { 1 };
        today.with_day(day)
    }
}

impl FineCalculator for FineEngine {
    fn assess(&self, due_date: Option<NaiveDate>, today: NaiveDate) -> FineAssessment {
        let Some(due) = due_date else {
            return FineAssessment::none();
        };

        let steps = Self::steps_between(due, today);
        if steps == 0 {
            return FineAssessment::none();
        }

        let uncapped = self.config.step_amount * steps;
        let (amount, capped) = match self.config.maximum_fine {
            Some(max) if uncapped > max => (max, true),
            _ => (uncapped, false),
        };

        FineAssessment {
            steps,
            amount,
            first_boundary: due.with_day(MID_MONTH_DAY),
            last_boundary: Self::last_boundary(today),
            capped,
        }
    }
}

/// fine assessment result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineAssessment {
    pub steps: u32,
    pub amount: Money,
    pub first_boundary: Option<NaiveDate>,
    pub last_boundary: Option<NaiveDate>,
    pub capped: bool,
}

impl FineAssessment {
    pub fn none() -> Self {
        Self {
            steps: 0,
            amount: Money::ZERO,
            first_boundary: None,
            last_boundary: None,
            capped: false,
        }
    }
}

/// the boundary sequence itself, starting at the 16th of the due month
#[derive(Debug, Clone)]
pub struct HalfMonthBoundaries {
    cursor: Option<NaiveDate>,
}

impl HalfMonthBoundaries {
    pub fn from_due_date(due_date: NaiveDate) -> Self {
        Self {
            cursor: due_date.with_day(MID_MONTH_DAY),
        }
    }

    /// boundaries on or before `today`
    pub fn up_to(due_date: NaiveDate, today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        Self::from_due_date(due_date).take_while(move |d| *d <= today)
    }

    fn advance(date: NaiveDate) -> Option<NaiveDate> {
        if date.day() == MID_MONTH_DAY {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
        } else {
            date.with_day(MID_MONTH_DAY)
        }
    }
}

impl Iterator for HalfMonthBoundaries {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.cursor?;
        self.cursor = Self::advance(current);
        Some(current)
    }
}
