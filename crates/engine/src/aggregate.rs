//! The aggregate protocol
//!
//! An aggregate stacks a partition-local operator on a view, scans it, and
//! folds the one partial each non-empty partition returns. Every fold here
//! is associative and commutative, so the order partitions answer in does
//! not change the result.
//!
//! [`aggregate`] fails with [`Error::MissingCapability`] when a partition
//! cannot run the operator. [`aggregate_with_fallback`] instead runs the
//! same operator on the client, partition by partition, and logs a warning.

use keyspan_core::{KeyRange, SummaryStatistics};
use keyspan_codec::LongCodec;
use keyspan_operators::{decode_count, decode_summary, OperatorConfig, CHECKSUM_ID, COUNT_ID, STATS_ID};
use tracing::warn;

use crate::error::{Error, Result};
use crate::view::View;

/// A partition-local operator and the client-side fold of its partials
pub trait AggregateOp {
    /// Merged result
    type Output;

    /// Registered operator id
    fn operator_id(&self) -> &str;

    /// Operator options
    fn options(&self) -> OperatorConfig {
        OperatorConfig::new()
    }

    /// Result over no partitions
    fn identity(&self) -> Self::Output;

    /// Fold one encoded partial into the accumulator
    fn fold(&self, acc: Self::Output, partial: &[u8]) -> Result<Self::Output>;
}

/// Entry count; partials are summed
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl AggregateOp for Count {
    type Output = u64;

    fn operator_id(&self) -> &str {
        COUNT_ID
    }

    fn identity(&self) -> u64 {
        0
    }

    fn fold(&self, acc: u64, partial: &[u8]) -> Result<u64> {
        Ok(acc + decode_count(partial)?)
    }
}

/// Packed key and value hash sums; partials are XORed
#[derive(Debug, Clone, Copy, Default)]
pub struct Checksum;

impl AggregateOp for Checksum {
    type Output = u64;

    fn operator_id(&self) -> &str {
        CHECKSUM_ID
    }

    fn identity(&self) -> u64 {
        0
    }

    fn fold(&self, acc: u64, partial: &[u8]) -> Result<u64> {
        Ok(acc ^ LongCodec::decode_i64(partial)? as u64)
    }
}

/// Numeric summary; partials are merged
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericSummary;

impl AggregateOp for NumericSummary {
    type Output = SummaryStatistics;

    fn operator_id(&self) -> &str {
        STATS_ID
    }

    fn identity(&self) -> SummaryStatistics {
        SummaryStatistics::new()
    }

    fn fold(&self, mut acc: SummaryStatistics, partial: &[u8]) -> Result<SummaryStatistics> {
        acc.merge(&decode_summary(partial)?);
        Ok(acc)
    }
}

/// Run `op` as a pushdown aggregate over `view`.
///
/// # Errors
///
/// Returns [`Error::MissingCapability`] if any partition lacks the operator.
pub fn aggregate<A: AggregateOp>(view: &View, op: &A) -> Result<A::Output> {
    let partials = view.aggregate_view(op.operator_id(), op.options())?;
    let mut acc = op.identity();
    for entry in partials.scan_raw(None, partials.mode())? {
        acc = op.fold(acc, &entry?.value)?;
    }
    Ok(acc)
}

/// Like [`aggregate`], but computes the result on the client when a
/// partition cannot run the operator
pub fn aggregate_with_fallback<A: AggregateOp>(view: &View, op: &A) -> Result<A::Output> {
    match aggregate(view, op) {
        Err(Error::MissingCapability {
            operator,
            partition,
        }) => {
            warn!(
                %operator,
                partition,
                "aggregate operator unavailable, folding partitions on the client"
            );
            aggregate_locally(view, op)
        }
        other => other,
    }
}

/// Scan `view` one partition span at a time and run the aggregate operator
/// on each span, matching what the store would have returned
fn aggregate_locally<A: AggregateOp>(view: &View, op: &A) -> Result<A::Output> {
    let partials = view.aggregate_view(op.operator_id(), op.options())?;
    let Some(setting) = partials.operator().cloned() else {
        return Ok(op.identity());
    };
    if partials.is_empty_view() {
        return Ok(op.identity());
    }
    let core = view.core();
    let mut acc = op.identity();
    for (lo, hi) in core.store.partition_bounds() {
        let span = KeyRange::half_open(lo, hi);
        let entries = view
            .scan_raw(Some(&span), partials.mode())?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut operator = core.registry.build(&setting)?;
        for partial in operator.process(entries)? {
            acc = op.fold(acc, &partial.value)?;
        }
    }
    Ok(acc)
}
