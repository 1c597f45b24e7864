pub mod projections;
pub mod reconciler;

#[cfg(test)]
mod reconciler_props;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{AdmNo, ClassId, FeeHeadKey, PaymentStatus};

pub use projections::{
    defaulters, outstanding_rows, reminder_list, summarize_by_class, summarize_by_fee_head,
    ClassSummary, CollectionDashboard, DefaulterNotice, FeeHeadSummary, OutstandingRow,
    StatusCounts,
};
pub use reconciler::{reconcile_student, Reconciler};

/// one fee head of a student's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeHeadLedgerItem {
    pub fee_head: String,
    pub required: Money,
    /// amount paid against the head, fines excluded
    pub paid: Money,
    /// `max(0, required - paid)`
    pub balance: Money,
    /// overdue fine currently due, zero once the head is cleared
    pub fine: Money,
    /// fines already collected on this head
    pub fine_paid: Money,
    pub due_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
    pub is_paid: bool,
}

impl FeeHeadLedgerItem {
    pub fn total_due(&self) -> Money {
        self.balance + self.fine
    }

    /// amount paid beyond what was required
    pub fn excess(&self) -> Money {
        self.paid.saturating_sub(self.required)
    }
}

/// payments recorded against a fee head missing from the student's schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedPayment {
    pub fee_head: String,
    pub amount: Money,
    pub fine: Money,
    pub receipt_nos: Vec<String>,
    pub last_payment_date: Option<NaiveDate>,
}

/// reconciled ledger of one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentLedger {
    pub adm_no: AdmNo,
    pub name: String,
    pub class: ClassId,
    pub total_required: Money,
    pub total_paid: Money,
    pub total_fine_paid: Money,
    /// sum of the item balances
    pub balance: Money,
    pub fine_due: Money,
    pub status: PaymentStatus,
    pub items: Vec<FeeHeadLedgerItem>,
    pub orphaned: Vec<OrphanedPayment>,
    pub last_payment_date: Option<NaiveDate>,
}

impl StudentLedger {
    /// every scheduled head, paid or not
    pub fn all_items(&self) -> &[FeeHeadLedgerItem] {
        &self.items
    }

    /// heads that still have a balance
    pub fn payable_items(&self) -> impl Iterator<Item = &FeeHeadLedgerItem> {
        self.items.iter().filter(|i| i.balance.is_positive())
    }

    pub fn item(&self, fee_head: &str) -> Option<&FeeHeadLedgerItem> {
        let key = FeeHeadKey::new(fee_head);
        self.items.iter().find(|i| FeeHeadKey::new(&i.fee_head) == key)
    }

    pub fn is_defaulter(&self) -> bool {
        self.balance.is_positive()
    }

    pub fn total_due_with_fines(&self) -> Money {
        self.balance + self.fine_due
    }

    pub fn orphaned_total(&self) -> Money {
        self.orphaned.iter().map(|o| o.amount + o.fine).sum()
    }

    /// paid beyond the required total on individual heads
    pub fn credit(&self) -> Money {
        self.items.iter().map(FeeHeadLedgerItem::excess).sum()
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
