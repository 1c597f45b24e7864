/// quick start - reconcile one student against a class fee schedule
use chrono::NaiveDate;
use fee_ledger_rs::{reconcile_student, FeeHead, Money, Student, Transaction};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let due = NaiveDate::from_ymd_opt(2024, 1, 10).ok_or("bad date")?;
    let today = NaiveDate::from_ymd_opt(2024, 2, 20).ok_or("bad date")?;

    let student = Student::new("S1", "Asha Rao", "STD 5 A");
    let fee_heads = vec![
        FeeHead::new("5A", "Tuition", Money::from_major(1_000)).with_due_date(due),
        FeeHead::new("5A", "Transport", Money::from_major(500)),
    ];
    let transactions = vec![
        Transaction::new("S1", "Tuition", Money::from_major(400)).receipt("R-101"),
        // voided receipts never count
        Transaction::new("S1", "Tuition", Money::from_major(200)).receipt("R-102").void(),
    ];

    let ledger = reconcile_student(&student, &fee_heads, &transactions, today);

    println!("{}", ledger.to_json_pretty()?);
    println!(
        "\n{} owes {} plus {} in fines ({})",
        ledger.name,
        ledger.balance,
        ledger.fine_due,
        ledger.status.as_str()
    );

    Ok(())
}
