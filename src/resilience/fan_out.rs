//! Concurrent sub-operations with explicit telemetry merging.

use std::future::Future;

use futures_util::future::join_all;

use crate::standards::merge_records;
use crate::types::TelemetryRecord;

/// Await every branch concurrently and merge their records.
///
/// Each branch owns its own trace and yields `(value, record)`. Values come
/// back in input order; the records are merged with the usual rules (sums,
/// ORs, worst degradation).
///
/// ```rust
/// # use huginn::{join_traced, OperationTrace};
/// # tokio_test::block_on(async {
/// let branches = ["rag", "csv"].map(|name| async move {
///     let mut trace = OperationTrace::start(name);
///     trace.record_step("llm", 100);
///     (name.len(), trace.finish())
/// });
/// let (values, record) = join_traced(branches).await;
/// assert_eq!(values, vec![3, 3]);
/// assert_eq!(record.latency_ms_llm, 200);
/// # });
/// ```
pub async fn join_traced<I, Fut, T>(branches: I) -> (Vec<T>, TelemetryRecord)
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = (T, TelemetryRecord)>,
{
    let (values, records): (Vec<T>, Vec<TelemetryRecord>) =
        join_all(branches).await.into_iter().unzip();
    let merged = merge_records(&records);
    (values, merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DegradationLevel;

    #[tokio::test]
    async fn worst_branch_degradation_wins() {
        let branch = |level: DegradationLevel| async move {
            let mut record = TelemetryRecord::default();
            record.raise_degradation(level);
            record.graceful_message = level.is_degraded().then(|| "limited".to_string());
            ((), record)
        };
        let (_, merged) = join_traced([
            branch(DegradationLevel::None),
            branch(DegradationLevel::Degraded),
            branch(DegradationLevel::Mild),
        ])
        .await;
        assert_eq!(merged.degradation_level, DegradationLevel::Degraded);
    }

    #[tokio::test]
    async fn empty_fan_out_is_default() {
        let branches: Vec<std::future::Ready<((), TelemetryRecord)>> = Vec::new();
        let (values, record) = join_traced(branches).await;
        assert!(values.is_empty());
        assert_eq!(record, TelemetryRecord::default());
    }
}
