use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::snapshot::SnapshotId;
use crate::types::{AdmNo, ClassId};

/// events emitted while ingesting and reconciling a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    // ingestion events
    MalformedRecordSkipped {
        kind: String,
        index: usize,
        reason: String,
    },
    SnapshotAccepted {
        snapshot_id: SnapshotId,
        generation: u64,
        students: usize,
        fee_heads: usize,
        transactions: usize,
    },
    StaleSnapshotDiscarded {
        snapshot_id: SnapshotId,
        generation: u64,
        current_generation: u64,
    },

    // reconciliation events
    VoidTransactionSkipped {
        adm_no: AdmNo,
        fee_head: String,
        receipt_no: String,
        amount: Money,
    },
    OrphanedPayment {
        adm_no: AdmNo,
        class: ClassId,
        fee_head: String,
        amount: Money,
        fine: Money,
    },
    FineAssessed {
        adm_no: AdmNo,
        fee_head: String,
        due_date: NaiveDate,
        steps: u32,
        amount: Money,
    },
    StudentReconciled {
        adm_no: AdmNo,
        total_required: Money,
        total_paid: Money,
        balance: Money,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<LedgerEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// orphaned payments seen so far
    pub fn orphaned_payments(&self) -> impl Iterator<Item = &LedgerEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, LedgerEvent::OrphanedPayment { .. }))
    }
}
