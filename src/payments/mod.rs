pub mod aggregator;
pub mod batch;

pub use aggregator::{aggregate_by_fee_head, AggregateStats, HeadAggregate, TransactionIndex};
pub use batch::{
    allocate_lump_sum, Allocation, BatchReceipt, PaymentBatch, PaymentItem, ADD_PAYMENT_BATCH,
};
