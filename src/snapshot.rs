use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::envelope::{
    decode_records, normalize_array_response, Decoded, FeeHeadRecord, GradeBoundaryRecord,
    StudentRecord, TransactionRecord,
};
use crate::errors::Result;
use crate::events::{EventStore, LedgerEvent};
use crate::grading::GradeBoundary;
use crate::types::{ClassId, FeeHead, Student, Transaction};

pub type SnapshotId = Uuid;

/// response bodies of one refresh, as returned by the api client
#[derive(Debug, Clone, Default)]
pub struct RawResponses {
    pub students: Value,
    pub fee_heads: Value,
    pub transactions: Value,
    /// `None` when boundaries were not requested
    pub grade_boundaries: Option<Value>,
}

/// immutable, normalized inputs for one reconciliation pass
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
    pub students: Vec<Student>,
    pub fee_heads: Vec<FeeHead>,
    pub transactions: Vec<Transaction>,
    pub grade_boundaries: Vec<GradeBoundary>,
    pub skipped_records: usize,
}

impl Snapshot {
    pub fn new(
        generation: u64,
        fetched_at: DateTime<Utc>,
        students: Vec<Student>,
        fee_heads: Vec<FeeHead>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            fetched_at,
            students,
            fee_heads,
            transactions,
            grade_boundaries: Vec::new(),
            skipped_records: 0,
        }
    }

    pub fn with_grade_boundaries(mut self, boundaries: Vec<GradeBoundary>) -> Self {
        self.grade_boundaries = boundaries;
        self
    }

    /// normalize raw responses into a snapshot
    ///
    /// Envelope errors fail the whole refresh. Individual malformed records
    /// are skipped and reported as events. Missing or broken grade boundaries
    /// leave the list empty so grading falls back to the default table.
    pub fn ingest(
        raw: RawResponses,
        generation: u64,
        config: &LedgerConfig,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Self> {
        let tz = config.timezone;

        let students = normalize_array_response(raw.students)?;
        let fee_heads = normalize_array_response(raw.fee_heads)?;
        let transactions = normalize_array_response(raw.transactions)?;

        let students = decode_records::<StudentRecord>("student", students);
        let fee_heads = decode_records::<FeeHeadRecord>("fee_head", fee_heads);
        let transactions = decode_records::<TransactionRecord>("transaction", transactions);

        let mut skipped = 0;
        skipped += report_skipped("student", &students, events);
        skipped += report_skipped("fee_head", &fee_heads, events);
        skipped += report_skipped("transaction", &transactions, events);

        let mut seen = HashSet::new();
        let mut student_rows = Vec::with_capacity(students.records.len());
        for (index, record) in students.records.into_iter().enumerate() {
            let student = record.into_domain();
            let reason = if student.adm_no.is_empty() {
                Some("blank admission number")
            } else if !seen.insert(student.adm_no.clone()) {
                Some("duplicate admission number")
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    skip(events, "student", index, reason);
                    skipped += 1;
                }
                None => student_rows.push(student),
            }
        }

        let mut fee_head_rows = Vec::with_capacity(fee_heads.records.len());
        for (index, record) in fee_heads.records.into_iter().enumerate() {
            let head = record.into_domain(tz);
            if head.fee_head.is_empty() || head.class.is_empty() {
                skip(events, "fee_head", index, "blank class or fee head");
                skipped += 1;
                continue;
            }
            fee_head_rows.push(head);
        }

        let mut transaction_rows = Vec::with_capacity(transactions.records.len());
        for (index, record) in transactions.records.into_iter().enumerate() {
            let txn = record.into_domain(tz);
            if txn.adm_no.is_empty() || txn.fee_head.is_empty() {
                skip(events, "transaction", index, "blank admission number or fee head");
                skipped += 1;
                continue;
            }
            transaction_rows.push(txn);
        }

        let grade_boundaries = match raw.grade_boundaries.map(normalize_array_response) {
            Some(Ok(values)) => {
                let decoded = decode_records::<GradeBoundaryRecord>("grade_boundary", values);
                skipped += report_skipped("grade_boundary", &decoded, events);
                decoded
                    .records
                    .into_iter()
                    .filter_map(GradeBoundaryRecord::into_domain)
                    .collect()
            }
            Some(Err(e)) => {
                warn!(error = %e, "grade boundaries unavailable, using default table");
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut snapshot = Snapshot::new(
            generation,
            time_provider.now(),
            student_rows,
            fee_head_rows,
            transaction_rows,
        )
        .with_grade_boundaries(grade_boundaries);
        snapshot.skipped_records = skipped;

        debug!(
            snapshot_id = %snapshot.id,
            generation,
            students = snapshot.students.len(),
            fee_heads = snapshot.fee_heads.len(),
            transactions = snapshot.transactions.len(),
            skipped,
            "snapshot ingested"
        );

        Ok(snapshot)
    }

    pub fn student(&self, adm_no: &str) -> Option<&Student> {
        let adm_no = adm_no.trim();
        self.students.iter().find(|s| s.adm_no == adm_no)
    }

    /// schedule of a class
    pub fn fee_heads_for<'a>(
        &'a self,
        class: &'a ClassId,
    ) -> impl Iterator<Item = &'a FeeHead> + 'a {
        self.fee_heads.iter().filter(move |h| &h.class == class)
    }
}

fn report_skipped<T>(kind: &str, decoded: &Decoded<T>, events: &mut EventStore) -> usize {
    for s in &decoded.skipped {
        events.emit(LedgerEvent::MalformedRecordSkipped {
            kind: kind.to_string(),
            index: s.index,
            reason: s.reason.clone(),
        });
    }
    decoded.skipped.len()
}

fn skip(events: &mut EventStore, kind: &str, index: usize, reason: &str) {
    debug!(kind, index, reason, "record dropped");
    events.emit(LedgerEvent::MalformedRecordSkipped {
        kind: kind.to_string(),
        index,
        reason: reason.to_string(),
    });
}

/// holds the latest accepted snapshot; a response from an older fetch never
/// replaces a newer one
#[derive(Debug, Default)]
pub struct SnapshotSlot {
    issued: u64,
    current: Option<Snapshot>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// generation number for a fetch about to start
    pub fn begin_fetch(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// install `snapshot` if it is newer than the current one
    pub fn offer(&mut self, snapshot: Snapshot, events: &mut EventStore) -> bool {
        let current_generation = self.generation();

        if self.current.is_some() && snapshot.generation <= current_generation {
            debug!(
                snapshot_id = %snapshot.id,
                generation = snapshot.generation,
                current_generation,
                "discarding stale snapshot"
            );
            events.emit(LedgerEvent::StaleSnapshotDiscarded {
                snapshot_id: snapshot.id,
                generation: snapshot.generation,
                current_generation,
            });
            return false;
        }

        info!(
            snapshot_id = %snapshot.id,
            generation = snapshot.generation,
            students = snapshot.students.len(),
            "snapshot accepted"
        );
        events.emit(LedgerEvent::SnapshotAccepted {
            snapshot_id: snapshot.id,
            generation: snapshot.generation,
            students: snapshot.students.len(),
            fee_heads: snapshot.fee_heads.len(),
            transactions: snapshot.transactions.len(),
        });
        self.issued = self.issued.max(snapshot.generation);
        self.current = Some(snapshot);
        true
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// generation of the current snapshot, 0 before the first one
    pub fn generation(&self) -> u64 {
        self.current.as_ref().map_or(0, |s| s.generation)
    }
}
