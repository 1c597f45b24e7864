//! Property-based tests for ledger reconciliation.
//!
//! - void transactions never reach a paid sum
//! - balances are never negative and add up per student
//! - status agrees with the totals
//! - reconciling twice gives the same ledger

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use super::reconciler::Reconciler;
use crate::decimal::Money;
use crate::payments::aggregator::aggregate_by_fee_head;
use crate::types::{FeeHead, FeeHeadKey, PaymentStatus, Student, Transaction};

const HEADS: [&str; 4] = ["Tuition", "Transport", "Exam", "Library"];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

/// amounts from 0.00 to 5,000.00
fn amount() -> impl Strategy<Value = Money> {
    (0i64..500_000).prop_map(Money::from_minor)
}

fn date() -> impl Strategy<Value = NaiveDate> {
    (0i64..400).prop_map(|offset| base_date() + Duration::days(offset))
}

/// schedule for class 5A using a subset of the head names
fn schedule() -> impl Strategy<Value = Vec<FeeHead>> {
    prop::collection::vec((0usize..HEADS.len(), amount(), prop::option::of(date())), 0..4).prop_map(
        |rows| {
            rows.into_iter()
                .map(|(i, amount, due)| {
                    let head = FeeHead::new("5A", HEADS[i], amount);
                    match due {
                        Some(d) => head.with_due_date(d),
                        None => head,
                    }
                })
                .collect()
        },
    )
}

/// transactions for S1 and another student, some voided
fn transactions() -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec(
        (
            prop::bool::weighted(0.8),
            0usize..HEADS.len(),
            amount(),
            amount(),
            prop::bool::weighted(0.25),
        ),
        0..12,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(own, i, amount, fine, voided)| {
                let adm_no = if own { "S1" } else { "S2" };
                let txn = Transaction::new(adm_no, HEADS[i], amount).with_fine(fine);
                if voided {
                    txn.void()
                } else {
                    txn
                }
            })
            .collect()
    })
}

fn student() -> Student {
    Student::new("S1", "Asha", "5A")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// voiding a transaction has the same effect as removing it
    #[test]
    fn prop_void_equals_removal(
        heads in schedule(),
        txns in transactions(),
        today in date(),
    ) {
        let reconciler = Reconciler::default();
        let without_void: Vec<Transaction> =
            txns.iter().filter(|t| !t.voided).cloned().collect();

        let with_void = reconciler.reconcile_student(&student(), &heads, &txns, today);
        let removed = reconciler.reconcile_student(&student(), &heads, &without_void, today);
        prop_assert_eq!(with_void, removed);

        let aggregated = aggregate_by_fee_head(&txns, "S1");
        for (key, agg) in &aggregated {
            let expected: Money = txns
                .iter()
                .filter(|t| t.adm_no == "S1" && !t.voided && &FeeHeadKey::new(&t.fee_head) == key)
                .map(|t| t.amount)
                .sum();
            prop_assert_eq!(agg.paid, expected);
        }
    }

    #[test]
    fn prop_balances_non_negative_and_summed(
        heads in schedule(),
        txns in transactions(),
        today in date(),
    ) {
        let ledger = Reconciler::default().reconcile_student(&student(), &heads, &txns, today);

        for item in &ledger.items {
            prop_assert!(!item.balance.is_negative());
            prop_assert_eq!(item.balance, item.required.saturating_sub(item.paid));
            prop_assert_eq!(item.is_paid, item.balance.is_zero());
            if item.is_paid {
                prop_assert_eq!(item.fine, Money::ZERO);
            }
        }

        let summed: Money = ledger.items.iter().map(|i| i.balance).sum();
        prop_assert_eq!(ledger.balance, summed);
        prop_assert!(ledger.balance >= ledger.total_required.saturating_sub(ledger.total_paid));
    }

    #[test]
    fn prop_status_consistent_with_totals(
        heads in schedule(),
        txns in transactions(),
        today in date(),
    ) {
        let ledger = Reconciler::default().reconcile_student(&student(), &heads, &txns, today);
        let paid = ledger.total_paid;
        let required = ledger.total_required;

        prop_assert_eq!(
            ledger.status == PaymentStatus::Paid,
            paid >= required && required.is_positive()
        );
        prop_assert_eq!(
            ledger.status == PaymentStatus::Partial,
            paid.is_positive() && paid < required
        );
        prop_assert_eq!(ledger.status == PaymentStatus::NoFees, required.is_zero());
    }

    #[test]
    fn prop_reconcile_is_idempotent(
        heads in schedule(),
        txns in transactions(),
        today in date(),
    ) {
        let reconciler = Reconciler::default();
        let first = reconciler.reconcile_student(&student(), &heads, &txns, today);
        let second = reconciler.reconcile_student(&student(), &heads, &txns, today);
        prop_assert_eq!(first, second);
    }

    /// scheduled paid plus orphaned amounts account for every non-void payment
    #[test]
    fn prop_no_payment_is_lost(
        heads in schedule(),
        txns in transactions(),
        today in date(),
    ) {
        let ledger = Reconciler::default().reconcile_student(&student(), &heads, &txns, today);
        let collected: Money = txns
            .iter()
            .filter(|t| t.adm_no == "S1" && !t.voided)
            .map(|t| t.amount)
            .sum();
        let orphaned: Money = ledger.orphaned.iter().map(|o| o.amount).sum();
        prop_assert_eq!(ledger.total_paid + orphaned, collected);
    }
}

#[test]
fn test_tuition_scenario_with_void() {
    let heads = vec![FeeHead::new("5A", "Tuition", Money::from_major(1_000))];
    let txns = vec![
        Transaction::new("S1", "Tuition", Money::from_major(400)),
        Transaction::new("S1", "Tuition", Money::from_major(200)).void(),
    ];
    let ledger = Reconciler::default().reconcile_student(&student(), &heads, &txns, base_date());

    assert_eq!(ledger.items[0].balance, Money::from_major(600));
    assert_eq!(ledger.items[0].paid, Money::from_major(400));
}

#[test]
fn test_class_with_no_fee_heads() {
    let heads = vec![FeeHead::new("5A", "Tuition", Money::from_major(1_000))];
    let ledger = Reconciler::default().reconcile_student(
        &Student::new("S2", "Ravi", "6B"),
        &heads,
        &[],
        base_date(),
    );

    assert_eq!(ledger.total_required, Money::ZERO);
    assert!(ledger.items.is_empty());
    assert_eq!(ledger.status, PaymentStatus::NoFees);
}
