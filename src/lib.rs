pub mod cache;
pub mod config;
pub mod dates;
pub mod decimal;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod fines;
pub mod grading;
pub mod ledger;
pub mod payments;
pub mod snapshot;
pub mod types;

// re-export key types
pub use cache::{LedgerCache, MemoCache};
pub use config::{GradingConfig, LedgerConfig, PaymentConfig};
pub use dates::{parse_local_date, to_date_key, SCHOOL_TZ};
pub use decimal::{round_percent, Money};
pub use envelope::{normalize_array_response, parse_response};
pub use errors::{LedgerError, Result};
pub use events::{EventStore, LedgerEvent};
pub use fines::{compute_fine, FineCalculator, FineConfig, FineEngine};
pub use grading::{classify_grade, GradeBoundary, GradeClassifier, Score};
pub use ledger::{
    reconcile_student, CollectionDashboard, FeeHeadLedgerItem, OrphanedPayment, Reconciler,
    StudentLedger,
};
pub use payments::{aggregate_by_fee_head, AggregateStats, PaymentBatch, PaymentItem};
pub use snapshot::{RawResponses, Snapshot, SnapshotSlot};
pub use types::{
    AdmNo, ClassId, FeeHead, FeeHeadKey, Identifier, PaymentStatus, Student, Transaction,
};

// re-export external dependencies that users will need
pub use chrono;
pub use chrono_tz::Tz;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
