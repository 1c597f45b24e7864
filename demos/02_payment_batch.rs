/// payment batch - split a lump sum and build the addPaymentBatch request
use chrono::NaiveDate;
use fee_ledger_rs::payments::{allocate_lump_sum, BatchReceipt};
use fee_ledger_rs::{
    FeeHead, LedgerConfig, Money, PaymentBatch, PaymentItem, Reconciler, Student, Transaction,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== payment batch ===\n");

    let today = NaiveDate::from_ymd_opt(2024, 2, 20).ok_or("bad date")?;
    let config = LedgerConfig::indian_school();
    let reconciler = Reconciler::new(config.clone());

    let student = Student::new("S1", "Asha Rao", "5A");
    let fee_heads = vec![
        FeeHead::new("5A", "Tuition", Money::from_major(1_000))
            .with_due_date(NaiveDate::from_ymd_opt(2024, 1, 10).ok_or("bad date")?),
        FeeHead::new("5A", "Transport", Money::from_major(500))
            .with_due_date(NaiveDate::from_ymd_opt(2023, 12, 5).ok_or("bad date")?),
        FeeHead::new("5A", "Exam", Money::from_major(200)),
    ];
    let transactions = vec![Transaction::new("S1", "Tuition", Money::from_major(400))];

    let ledger = reconciler.reconcile_student(&student, &fee_heads, &transactions, today);
    for item in ledger.payable_items() {
        println!("{:<10} balance {:>6} fine {:>4}", item.fee_head, item.balance, item.fine);
    }

    // parent hands over 1,000 at the counter
    let payment_config = &config.payment_config;
    let allocation =
        allocate_lump_sum(&ledger, Money::from_major(1_000), payment_config.fines_first)?;
    let batch = allocation.to_batch(&ledger, today, "Cash", payment_config)?;
    println!("\nlump sum request:\n{}", serde_json::to_string_pretty(&batch)?);

    // or the cashier picks heads by hand
    let selection = vec![
        PaymentItem::new("exam", Money::from_major(100)),
        PaymentItem::new("Exam", Money::from_major(100)),
    ];
    let batch = PaymentBatch::from_selection(&ledger, today, "UPI", &selection, payment_config)?;
    println!("\nmanual request:\n{}", batch.to_json()?);

    let over = vec![PaymentItem::new("Tuition", Money::from_major(900))];
    if let Err(e) = PaymentBatch::from_selection(&ledger, today, "UPI", &over, payment_config) {
        println!("\nrejected ({}): {}", e.error_code(), e);
    }

    let reply = r#"{"ok": true, "receiptNo": "R-2041", "date": "2024-02-20"}"#;
    let receipt = BatchReceipt::parse(reply)?.into_result()?;
    println!("\nrecorded as receipt {}", receipt.receipt_no.unwrap_or_default());

    Ok(())
}
