use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::decimal::{collection_percent, Money};
use crate::payments::aggregator::AggregateStats;
use crate::types::{AdmNo, ClassId, FeeHeadKey, PaymentStatus, Student};

use super::StudentLedger;

/// students owing money, largest balance first
pub fn defaulters(ledgers: &[StudentLedger]) -> Vec<&StudentLedger> {
    let mut owing: Vec<&StudentLedger> = ledgers.iter().filter(|l| l.is_defaulter()).collect();
    owing.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.adm_no.cmp(&b.adm_no)));
    owing
}

/// one unpaid fee head of one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingRow {
    pub adm_no: AdmNo,
    pub name: String,
    pub class: ClassId,
    pub fee_head: String,
    pub required: Money,
    pub paid: Money,
    pub balance: Money,
    pub fine: Money,
    pub total_due: Money,
    pub due_date: Option<NaiveDate>,
    /// days since the due date, zero if not yet due or undated
    pub days_overdue: i64,
}

/// itemized outstanding balances, one row per payable head
pub fn outstanding_rows(ledgers: &[StudentLedger], today: NaiveDate) -> Vec<OutstandingRow> {
    ledgers
        .iter()
        .flat_map(|ledger| {
            ledger.payable_items().map(move |item| OutstandingRow {
                adm_no: ledger.adm_no.clone(),
                name: ledger.name.clone(),
                class: ledger.class.clone(),
                fee_head: item.fee_head.clone(),
                required: item.required,
                paid: item.paid,
                balance: item.balance,
                fine: item.fine,
                total_due: item.total_due(),
                due_date: item.due_date,
                days_overdue: item
                    .due_date
                    .map_or(0, |due| (today - due).num_days().max(0)),
            })
        })
        .collect()
}

/// count of students per payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub paid: usize,
    pub partial: usize,
    pub pending: usize,
    pub no_fees: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: PaymentStatus) {
        match status {
            PaymentStatus::Paid => self.paid += 1,
            PaymentStatus::Partial => self.partial += 1,
            PaymentStatus::Pending => self.pending += 1,
            PaymentStatus::NoFees => self.no_fees += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.paid + self.partial + self.pending + self.no_fees
    }
}

/// totals for one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub class: ClassId,
    pub students: usize,
    pub total_required: Money,
    pub total_paid: Money,
    pub total_fine_paid: Money,
    pub balance: Money,
    pub fine_due: Money,
    pub defaulters: usize,
    pub status_counts: StatusCounts,
    pub collection_percent: Option<Decimal>,
}

impl ClassSummary {
    fn new(class: ClassId) -> Self {
        Self {
            class,
            students: 0,
            total_required: Money::ZERO,
            total_paid: Money::ZERO,
            total_fine_paid: Money::ZERO,
            balance: Money::ZERO,
            fine_due: Money::ZERO,
            defaulters: 0,
            status_counts: StatusCounts::default(),
            collection_percent: None,
        }
    }
}

/// per-class totals, ordered by class id
pub fn summarize_by_class(ledgers: &[StudentLedger]) -> Vec<ClassSummary> {
    let mut classes: BTreeMap<&ClassId, ClassSummary> = BTreeMap::new();

    for ledger in ledgers {
        let summary = classes
            .entry(&ledger.class)
            .or_insert_with(|| ClassSummary::new(ledger.class.clone()));
        summary.students += 1;
        summary.total_required += ledger.total_required;
        summary.total_paid += ledger.total_paid;
        summary.total_fine_paid += ledger.total_fine_paid;
        summary.balance += ledger.balance;
        summary.fine_due += ledger.fine_due;
        if ledger.is_defaulter() {
            summary.defaulters += 1;
        }
        summary.status_counts.record(ledger.status);
    }

    classes
        .into_values()
        .map(|mut s| {
            // amount actually applied against requirements
            let applied = s.total_required - s.balance;
            s.collection_percent = collection_percent(applied, s.total_required);
            s
        })
        .collect()
}

/// totals for one fee head across students
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeHeadSummary {
    pub fee_head: String,
    pub students: usize,
    pub required: Money,
    pub paid: Money,
    pub balance: Money,
    pub fine_due: Money,
    pub fully_paid: usize,
}

/// per-fee-head totals, ordered by normalized name
pub fn summarize_by_fee_head(ledgers: &[StudentLedger]) -> Vec<FeeHeadSummary> {
    let mut heads: BTreeMap<FeeHeadKey, FeeHeadSummary> = BTreeMap::new();

    for item in ledgers.iter().flat_map(|l| l.all_items()) {
        let summary = heads
            .entry(FeeHeadKey::new(&item.fee_head))
            .or_insert_with(|| FeeHeadSummary {
                fee_head: item.fee_head.clone(),
                students: 0,
                required: Money::ZERO,
                paid: Money::ZERO,
                balance: Money::ZERO,
                fine_due: Money::ZERO,
                fully_paid: 0,
            });
        summary.students += 1;
        summary.required += item.required;
        summary.paid += item.paid;
        summary.balance += item.balance;
        summary.fine_due += item.fine;
        if item.is_paid {
            summary.fully_paid += 1;
        }
    }

    heads.into_values().collect()
}

/// school-wide collection figures
///
/// `total_collected` is amount plus fines plus orphaned payments, i.e.
/// everything the cashier received. `total_paid` only counts amounts
/// applied to scheduled heads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDashboard {
    pub students: usize,
    pub total_required: Money,
    pub total_paid: Money,
    pub total_fine_collected: Money,
    pub orphaned_amount: Money,
    pub total_collected: Money,
    pub total_outstanding: Money,
    pub fine_due: Money,
    pub collection_percent: Option<Decimal>,
    pub status_counts: StatusCounts,
    pub defaulters: usize,
    pub transaction_count: usize,
    pub voided_count: usize,
    pub voided_amount: Money,
    pub by_mode: BTreeMap<String, Money>,
}

impl CollectionDashboard {
    pub fn build(ledgers: &[StudentLedger], stats: &AggregateStats) -> Self {
        let mut status_counts = StatusCounts::default();
        let mut total_required = Money::ZERO;
        let mut total_paid = Money::ZERO;
        let mut total_fine_collected = Money::ZERO;
        let mut orphaned_amount = Money::ZERO;
        let mut total_outstanding = Money::ZERO;
        let mut fine_due = Money::ZERO;
        let mut defaulters = 0;

        for ledger in ledgers {
            status_counts.record(ledger.status);
            total_required += ledger.total_required;
            total_paid += ledger.total_paid;
            total_fine_collected += ledger.total_fine_paid;
            orphaned_amount += ledger.orphaned_total();
            total_outstanding += ledger.balance;
            fine_due += ledger.fine_due;
            if ledger.is_defaulter() {
                defaulters += 1;
            }
        }

        let applied = total_required - total_outstanding;

        Self {
            students: ledgers.len(),
            total_required,
            total_paid,
            total_fine_collected,
            orphaned_amount,
            total_collected: total_paid + total_fine_collected + orphaned_amount,
            total_outstanding,
            fine_due,
            collection_percent: collection_percent(applied, total_required),
            status_counts,
            defaulters,
            transaction_count: stats.transaction_count,
            voided_count: stats.voided_count,
            voided_amount: stats.voided_amount,
            by_mode: stats.by_mode.clone(),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// data for a fee reminder to one defaulter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaulterNotice {
    pub adm_no: AdmNo,
    pub name: String,
    pub class: ClassId,
    pub balance: Money,
    pub fine_due: Money,
    pub total_due: Money,
    pub pending_heads: Vec<String>,
    pub parent_contact: Option<String>,
    pub email: Option<String>,
}

/// reminder data for every defaulter, largest balance first
pub fn reminder_list(ledgers: &[StudentLedger], students: &[Student]) -> Vec<DefaulterNotice> {
    let contacts: HashMap<&str, &Student> =
        students.iter().map(|s| (s.adm_no.as_str(), s)).collect();

    defaulters(ledgers)
        .into_iter()
        .map(|ledger| {
            let student = contacts.get(ledger.adm_no.as_str());
            DefaulterNotice {
                adm_no: ledger.adm_no.clone(),
                name: ledger.name.clone(),
                class: ledger.class.clone(),
                balance: ledger.balance,
                fine_due: ledger.fine_due,
                total_due: ledger.total_due_with_fines(),
                pending_heads: ledger.payable_items().map(|i| i.fee_head.clone()).collect(),
                parent_contact: student.and_then(|s| s.parent_contact.clone()),
                email: student.and_then(|s| s.email.clone()),
            }
        })
        .collect()
}
