use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::model::{BatchReport, Fields, Record, UpdateOutcome};
use crate::telemetry::{self};
use crate::telemetry::ops::apply::Phase as ApplyPhase;

use super::store::{PatchFailure, PatchResult, RecordStore};

/// Applies records against a `RecordStore`, one call per record, isolating
/// failures per item.
pub struct Dispatcher<S> {
    store: S,
    concurrency: usize,
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl<S: RecordStore> Dispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store, concurrency: 1, deadline: None, cancel: CancellationToken::new() }
    }

    /// Upper bound on in-flight calls; 1 keeps dispatch strictly sequential.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Cancelling stops records that have not been issued yet. Calls already in
    /// flight finish normally.
    pub fn cancellation_token(&self) -> CancellationToken { self.cancel.clone() }

    pub fn store(&self) -> &S { &self.store }

    pub async fn apply_one(&self, id: &str, fields: &Fields) -> PatchResult {
        self.store.patch(id, fields).await
    }

    /// Dispatch every record in input order and report per-id outcomes.
    pub async fn apply_batch(&self, records: Vec<Record>) -> BatchReport {
        let log = telemetry::apply();
        let token = self.cancel.child_token();
        let timer = self.deadline.map(|d| {
            let t = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(d).await;
                t.cancel();
            })
        });

        let placeholders = placeholder_keys(&records);
        let outcomes: Vec<UpdateOutcome> = stream::iter(records.into_iter().zip(placeholders))
            .map(|(rec, placeholder)| self.dispatch_one(rec, placeholder, &token))
            .buffered(self.concurrency)
            .collect()
            .await;

        if let Some(t) = timer { t.abort(); }

        let report = BatchReport::from_outcomes(outcomes);
        log.totals(report.total, report.successful, report.failed);
        report
    }

    async fn dispatch_one(&self, rec: Record, placeholder: Option<String>, token: &CancellationToken) -> UpdateOutcome {
        let log = telemetry::apply();
        let Record { id, fields } = rec;

        let (id, result) = if let Some(key) = placeholder {
            (key, PatchResult::Failed(PatchFailure::MissingId))
        } else if token.is_cancelled() {
            (id, PatchResult::Failed(PatchFailure::Cancelled))
        } else {
            let span = log.span(&ApplyPhase::Patch);
            let result = self.apply_one(&id, &fields).instrument(span).await;
            (id, result)
        };

        log.outcome(&id, result.succeeded(), &result.to_string());
        UpdateOutcome { succeeded: result.succeeded(), id }
    }
}

/// Report keys for records without an id: `unknown#<position>`, suffixed with
/// `.1`, `.2`, ... while a real id in the batch already uses that text.
fn placeholder_keys(records: &[Record]) -> Vec<Option<String>> {
    let mut taken: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
    records
        .iter()
        .enumerate()
        .map(|(pos, r)| {
            if !r.id.trim().is_empty() {
                return None;
            }
            let base = format!("unknown#{}", pos + 1);
            let mut key = base.clone();
            let mut n = 1;
            while taken.contains(&key) {
                key = format!("{base}.{n}");
                n += 1;
            }
            taken.insert(key.clone());
            Some(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::model::Scalar;

    /// Accepts a fixed set of ids, records every call, optionally sleeps.
    #[derive(Default)]
    struct StubStore {
        accept: Option<HashSet<String>>,
        /// Reject this many calls before applying the accept rule.
        fail_first: usize,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StubStore {
        fn accepting(ids: &[&str]) -> Self {
            Self { accept: Some(ids.iter().map(|s| s.to_string()).collect()), ..Self::default() }
        }

        fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
    }

    #[async_trait]
    impl RecordStore for StubStore {
        async fn patch(&self, id: &str, _fields: &Fields) -> PatchResult {
            let nth = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(id.to_string());
                calls.len()
            };
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(d) = self.delay { tokio::time::sleep(d).await; }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match &self.accept {
                _ if nth <= self.fail_first => PatchResult::Failed(PatchFailure::Status(503)),
                Some(ok) if !ok.contains(id) => PatchResult::Failed(PatchFailure::Status(404)),
                _ => PatchResult::Applied,
            }
        }
    }

    fn rec(id: &str, name: &str) -> Record {
        let mut fields = Fields::new();
        fields.insert("name".into(), Scalar::text(name));
        Record::new(id, fields)
    }

    #[tokio::test]
    async fn empty_batch_reports_zeroes() {
        let d = Dispatcher::new(StubStore::default());
        let report = d.apply_batch(vec![]).await;
        assert_eq!(report, BatchReport::default());
        assert_eq!(report.total, 0);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn one_rejection_does_not_affect_siblings() {
        let d = Dispatcher::new(StubStore::accepting(&["1"]));
        let report = d.apply_batch(vec![rec("1", "A"), rec("2", "B")]).await;
        assert_eq!(report.total, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);
        let outcomes: Vec<(&str, bool)> = report.outcomes.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(outcomes, vec![("1", true), ("2", false)]);
    }

    #[tokio::test]
    async fn empty_ids_get_unique_placeholders_and_no_call() {
        let d = Dispatcher::new(StubStore::default());
        let report = d.apply_batch(vec![rec("", "x"), rec("5", "y"), rec("  ", "z")]).await;
        assert_eq!(report.total, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.outcomes.get("unknown#1"), Some(&false));
        assert_eq!(report.outcomes.get("unknown#3"), Some(&false));
        assert_eq!(d.store().calls(), vec!["5"]);
    }

    #[tokio::test]
    async fn placeholder_never_shadows_a_real_id() {
        let d = Dispatcher::new(StubStore::default());
        let report = d.apply_batch(vec![rec("", "x"), rec("unknown#1", "y"), rec("unknown#1.1", "z")]).await;
        assert_eq!(report.total, 3);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.outcomes.get("unknown#1"), Some(&true));
        assert_eq!(report.outcomes.get("unknown#1.1"), Some(&true));
        assert_eq!(report.outcomes.get("unknown#1.2"), Some(&false));
        assert_eq!(report.failed, report.failed_ids().len());
    }

    #[tokio::test]
    async fn repeated_id_keeps_its_failure_in_retry_list() {
        let d = Dispatcher::new(StubStore { fail_first: 1, ..StubStore::default() });
        let report = d.apply_batch(vec![rec("1", "A"), rec("1", "B")]).await;
        assert_eq!(d.store().calls(), vec!["1", "1"]);
        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failed_ids(), vec!["1"]);
        assert_eq!(report.failed, report.failed_ids().len());
    }

    #[tokio::test]
    async fn repeated_batches_give_identical_reports() {
        let d = Dispatcher::new(StubStore::default());
        let records = vec![rec("1", "A"), rec("2", "B"), rec("3", "C")];
        let first = d.apply_batch(records.clone()).await;
        let second = d.apply_batch(records).await;
        assert_eq!(first, second);
        assert_eq!(first.successful, 3);
    }

    #[tokio::test]
    async fn concurrent_dispatch_is_bounded_and_keeps_order() {
        let store = StubStore { delay: Some(Duration::from_millis(20)), ..StubStore::default() };
        let d = Dispatcher::new(store).with_concurrency(3);
        let records: Vec<Record> = (1..=9).map(|i| rec(&i.to_string(), "n")).collect();
        let report = d.apply_batch(records).await;
        assert_eq!(report.successful, 9);
        let ids: Vec<&str> = report.outcomes.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7", "8", "9"]);
        let max = d.store().max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3 && max >= 2, "max in flight was {max}");
    }

    #[tokio::test]
    async fn cancelled_batch_issues_no_calls() {
        let d = Dispatcher::new(StubStore::default());
        d.cancellation_token().cancel();
        let report = d.apply_batch(vec![rec("1", "A"), rec("2", "B")]).await;
        assert_eq!(report.failed, 2);
        assert!(d.store().calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_unissued_records_only() {
        let store = StubStore { delay: Some(Duration::from_millis(50)), ..StubStore::default() };
        let d = Dispatcher::new(store).with_deadline(Some(Duration::from_millis(75)));
        let records: Vec<Record> = (1..=5).map(|i| rec(&i.to_string(), "n")).collect();
        let report = d.apply_batch(records).await;
        // call 2 is already in flight when the deadline hits and still lands
        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 3);
        assert_eq!(d.store().calls(), vec!["1", "2"]);

        // the deadline is per batch; the dispatcher stays usable
        let again = d.apply_batch(vec![rec("9", "n")]).await;
        assert_eq!(again.successful, 1);
    }
}
