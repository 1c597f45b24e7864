/// dashboard - ingest raw api responses and build the collection views
use chrono::{TimeZone, Utc};
use fee_ledger_rs::ledger::{defaulters, outstanding_rows, summarize_by_class};
use fee_ledger_rs::{
    AggregateStats, CollectionDashboard, EventStore, LedgerConfig, RawResponses, Reconciler,
    SafeTimeProvider, Snapshot, SnapshotSlot, TimeSource,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== collection dashboard ===\n");

    // 19:00 UTC is already the next morning in IST
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 2, 19, 19, 0, 0).unwrap()
    ));
    let config = LedgerConfig::indian_school();

    // every endpoint answers with a different envelope
    let raw = RawResponses {
        students: json!({"success": true, "data": [
            {"admNo": "S1", "name": "Asha Rao", "class": "5A", "parentContact": "98450 00001"},
            {"admNo": "S2", "name": "Ravi Kumar", "class": "5 A"},
            {"admNo": 3, "name": "Meera Iyer", "cls": "STD 6B"},
            {"admNo": "S4", "name": "Kabir Das", "class": "7C"}
        ]}),
        fee_heads: json!({"data": {"data": [
            {"class": "5A", "feeHead": "Tuition", "amount": 1000, "dueDate": "2024-01-10"},
            {"class": "5A", "feeHead": "Transport", "amount": "500"},
            {"class": "6B", "feeHead": "Tuition", "amount": 1200, "dueDate": "10-01-2024"}
        ]}}),
        transactions: json!([
            {"admNo": "S1", "feeHead": "Tuition", "amount": 400, "mode": "Cash",
             "date": "2024-01-05T04:00:00Z"},
            {"admNo": "S1", "feeHead": "Tuition", "amount": 200, "void": "Y", "mode": "Cash"},
            {"admNo": "S2", "feeHead": "Tuition", "amount": 1000, "fine": 50, "mode": "UPI"},
            {"admNo": "S2", "feeHead": "Transport", "amount": 500, "mode": "UPI"},
            {"admNo": "3", "feeHead": "Library", "amount": 80, "mode": "Cash"},
            {"feeHead": "Tuition", "amount": 10}
        ]),
        grade_boundaries: None,
    };

    let mut events = EventStore::new();
    let mut slot = SnapshotSlot::new();
    let generation = slot.begin_fetch();
    let snapshot = Snapshot::ingest(raw, generation, &config, &time, &mut events)?;
    slot.offer(snapshot, &mut events);

    let snapshot = slot.current().ok_or("no snapshot")?;
    let reconciler = Reconciler::new(config);
    let ledgers = reconciler.reconcile_snapshot_now(snapshot, &time, Some(&mut events));

    let stats = AggregateStats::compute(&snapshot.transactions);
    let dashboard = CollectionDashboard::build(&ledgers, &stats);
    println!("{}\n", dashboard.to_json_pretty()?);

    println!("class summary");
    println!("-------------");
    for class in summarize_by_class(&ledgers) {
        println!(
            "{:>4}: {} students, required {}, outstanding {}, collected {}%",
            class.class.as_str(),
            class.students,
            class.total_required,
            class.balance,
            class
                .collection_percent
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    println!("\ndefaulters");
    println!("----------");
    for ledger in defaulters(&ledgers) {
        println!("{} {} owes {}", ledger.adm_no, ledger.name, ledger.total_due_with_fines());
    }

    let today = fee_ledger_rs::dates::today_in(reconciler.config().timezone, &time);
    println!("\noutstanding on {}", today);
    println!("--------------------------");
    for row in outstanding_rows(&ledgers, today) {
        println!(
            "{} {:<10} balance {:>8} fine {:>6} overdue {} days",
            row.adm_no, row.fee_head, row.balance, row.fine, row.days_overdue
        );
    }

    println!(
        "\n{} events recorded, {} orphaned payments",
        events.len(),
        events.orphaned_payments().count()
    );

    Ok(())
}
