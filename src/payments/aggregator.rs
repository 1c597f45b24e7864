use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::decimal::Money;
use crate::events::{EventStore, LedgerEvent};
use crate::types::{AdmNo, FeeHeadKey, Transaction};

/// paid totals for one fee head of one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadAggregate {
    /// fee head name as first seen in the transactions
    pub fee_head: String,
    /// sum of `amount`, fines excluded
    pub paid: Money,
    /// sum of `fine`
    pub fine_paid: Money,
    pub last_payment_date: Option<NaiveDate>,
    pub transaction_count: usize,
    pub receipt_nos: Vec<String>,
}

impl HeadAggregate {
    fn new(fee_head: &str) -> Self {
        Self {
            fee_head: fee_head.trim().to_string(),
            paid: Money::ZERO,
            fine_paid: Money::ZERO,
            last_payment_date: None,
            transaction_count: 0,
            receipt_nos: Vec::new(),
        }
    }

    fn record(&mut self, txn: &Transaction) {
        self.paid += txn.amount;
        self.fine_paid += txn.fine;
        self.transaction_count += 1;
        if let Some(date) = txn.date {
            self.last_payment_date = Some(self.last_payment_date.map_or(date, |d| d.max(date)));
        }
        if !txn.receipt_no.is_empty() && !self.receipt_nos.contains(&txn.receipt_no) {
            self.receipt_nos.push(txn.receipt_no.clone());
        }
    }

    /// amount plus fine
    pub fn collected(&self) -> Money {
        self.paid + self.fine_paid
    }
}

/// per-fee-head paid sums for one student, void transactions excluded
pub fn aggregate_by_fee_head(
    transactions: &[Transaction],
    adm_no: &str,
) -> BTreeMap<FeeHeadKey, HeadAggregate> {
    let adm_no = adm_no.trim();
    aggregate_student(
        transactions.iter().filter(|t| t.adm_no.trim() == adm_no),
        None,
    )
}

/// group already-filtered transactions of one student by fee head
pub(crate) fn aggregate_student<'a, I>(
    transactions: I,
    mut events: Option<&mut EventStore>,
) -> BTreeMap<FeeHeadKey, HeadAggregate>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut heads: BTreeMap<FeeHeadKey, HeadAggregate> = BTreeMap::new();

    for txn in transactions {
        if txn.voided {
            if let Some(store) = events.as_deref_mut() {
                store.emit(LedgerEvent::VoidTransactionSkipped {
                    adm_no: txn.adm_no.clone(),
                    fee_head: txn.fee_head.clone(),
                    receipt_no: txn.receipt_no.clone(),
                    amount: txn.amount,
                });
            }
            continue;
        }

        heads
            .entry(txn.key())
            .or_insert_with(|| HeadAggregate::new(&txn.fee_head))
            .record(txn);
    }

    heads
}

/// transactions grouped by admission number, built once per snapshot
#[derive(Debug, Default)]
pub struct TransactionIndex<'a> {
    by_student: HashMap<&'a str, Vec<&'a Transaction>>,
}

impl<'a> TransactionIndex<'a> {
    pub fn build(transactions: &'a [Transaction]) -> Self {
        let mut by_student: HashMap<&'a str, Vec<&'a Transaction>> = HashMap::new();
        for txn in transactions {
            by_student.entry(txn.adm_no.trim()).or_default().push(txn);
        }
        Self { by_student }
    }

    pub fn for_student(&self, adm_no: &str) -> &[&'a Transaction] {
        self.by_student
            .get(adm_no.trim())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// admission numbers that have at least one transaction
    pub fn students(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_student.keys().copied()
    }
}

/// totals over a whole transaction set
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub transaction_count: usize,
    pub total_amount: Money,
    pub total_fine: Money,
    pub voided_count: usize,
    pub voided_amount: Money,
    pub by_mode: BTreeMap<String, Money>,
    pub paying_students: usize,
}

impl AggregateStats {
    pub fn compute(transactions: &[Transaction]) -> Self {
        let mut stats = AggregateStats::default();
        let mut payers: Vec<&AdmNo> = Vec::new();

        for txn in transactions {
            if txn.voided {
                stats.voided_count += 1;
                stats.voided_amount += txn.collected();
                continue;
            }
            stats.transaction_count += 1;
            stats.total_amount += txn.amount;
            stats.total_fine += txn.fine;

            let mode = match txn.mode.trim() {
                "" => "Unspecified".to_string(),
                m => m.to_string(),
            };
            *stats.by_mode.entry(mode).or_insert(Money::ZERO) += txn.collected();
            payers.push(&txn.adm_no);
        }

        payers.sort();
        payers.dedup();
        stats.paying_students = payers.len();
        stats
    }

    /// amount plus fines, the dashboard "collected" figure
    pub fn total_collected(&self) -> Money {
        self.total_amount + self.total_fine
    }
}
