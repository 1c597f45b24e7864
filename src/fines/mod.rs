pub mod half_month;

use chrono::NaiveDate;

use crate::decimal::Money;

pub use half_month::{FineAssessment, FineConfig, FineEngine, HalfMonthBoundaries};

/// trait for overdue fine schedules
pub trait FineCalculator {
    fn assess(&self, due_date: Option<NaiveDate>, today: NaiveDate) -> FineAssessment;

    fn compute_fine(&self, due_date: Option<NaiveDate>, today: NaiveDate) -> Money {
        self.assess(due_date, today).amount
    }
}

/// fine under the default ₹25 half-month schedule
pub fn compute_fine(due_date: Option<NaiveDate>, today: NaiveDate) -> Money {
    FineEngine::default().compute_fine(due_date, today)
}
