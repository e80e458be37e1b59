//! Ingest pipeline: every planned day, every record type, one write per record.

use anyhow::Context;
use enpull_core::{DateRange, Operation, RecordKind, RecordMapper, format_day};
use enpull_store::DuckStore;
use enpull_sync::{ExportBatch, ExportSource};
use tracing::{error, info};

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub days: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Records mapped to no operation.
    pub ignored: usize,
    /// (day, type) exports the service reported as failed.
    pub failed_batches: usize,
}

/// Pull and write every (day, type) pair in `range`, sequentially.
///
/// A failed export skips its pair. A fetch transport error, a malformed
/// record or a store failure aborts the run; records already written stay
/// committed.
pub async fn run<S>(
    source: &S,
    store: &mut DuckStore,
    mapper: &RecordMapper,
    range: &DateRange,
) -> anyhow::Result<RunSummary>
where
    S: ExportSource + ?Sized,
{
    let mut summary = RunSummary::default();

    for day in range.days() {
        let day_str = format_day(day);
        summary.days += 1;

        for kind in RecordKind::ALL {
            let batch = source
                .fetch(day, kind)
                .await
                .with_context(|| format!("fetching {kind} export for {day_str}"))?;

            let rows = match batch {
                ExportBatch::Rows(rows) => rows,
                ExportBatch::Failed(message) => {
                    error!(day = %day_str, %kind, error = %message, "export failed, skipping");
                    summary.failed_batches += 1;
                    continue;
                }
            };
            if rows.is_empty() {
                info!(day = %day_str, %kind, "no records");
                continue;
            }

            let count = rows.len();
            for (index, row) in rows.into_iter().enumerate() {
                let record = row
                    .into_record()
                    .with_context(|| format!("{kind} export for {day_str}, row {index}"))?;
                let Some(op) = mapper
                    .map(&record)
                    .with_context(|| format!("{kind} export for {day_str}, row {index}"))?
                else {
                    summary.ignored += 1;
                    continue;
                };
                let affected = store
                    .apply(&op)
                    .with_context(|| format!("writing {kind} row {index} for {day_str}"))?;
                match op {
                    Operation::Insert(_) => summary.inserted += affected,
                    Operation::Update(_) => summary.updated += affected,
                }
            }
            info!(day = %day_str, %kind, records = count, "batch ingested");
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use enpull_core::{Config, RowFields};
    use enpull_sync::{SyncError, parse_export};

    const TABLE: &str = "en_supporters";

    /// Serves canned batches; unknown pairs export no rows.
    #[derive(Default)]
    struct FakeSource {
        batches: HashMap<(NaiveDate, RecordKind), ExportBatch>,
        broken: Option<(NaiveDate, RecordKind)>,
        calls: Mutex<Vec<(NaiveDate, RecordKind)>>,
    }

    impl FakeSource {
        fn with(mut self, day: NaiveDate, kind: RecordKind, batch: ExportBatch) -> Self {
            self.batches.insert((day, kind), batch);
            self
        }
    }

    #[async_trait]
    impl ExportSource for FakeSource {
        async fn fetch(&self, day: NaiveDate, kind: RecordKind) -> Result<ExportBatch, SyncError> {
            self.calls.lock().unwrap().push((day, kind));
            if self.broken == Some((day, kind)) {
                return Err(parse_export("<rows></row>").unwrap_err());
            }
            Ok(self
                .batches
                .get(&(day, kind))
                .cloned()
                .unwrap_or(ExportBatch::Rows(vec![])))
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn rows(rows: &[&[(&str, &str)]]) -> ExportBatch {
        ExportBatch::Rows(
            rows.iter()
                .map(|pairs| pairs.iter().copied().collect::<RowFields>())
                .collect(),
        )
    }

    fn store() -> DuckStore {
        let store = DuckStore::open().unwrap();
        store.ensure_person_table(TABLE).unwrap();
        store
    }

    fn mapper() -> RecordMapper {
        RecordMapper::new(&Config::with_token("t"))
    }

    fn sms_status(store: &DuckStore, id: &str) -> String {
        store
            .connection()
            .query_row(
                &format!("SELECT sms_status FROM {TABLE} WHERE supporter_id = ?"),
                [id],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn ingests_every_day_and_type_in_order() {
        let source = FakeSource::default()
            .with(
                d(1),
                RecordKind::PersonEvent,
                rows(&[
                    &[("type", "PET"), ("supporter_id", "42"), ("campaign_date", "2024-03-01")],
                    &[("type", "PET"), ("supporter_id", "7"), ("campaign_date", "2024-03-01")],
                ]),
            )
            .with(
                d(1),
                RecordKind::ConsentStatus,
                rows(&[
                    &[("type", "QCB"), ("supporter_id", "42"), ("id", "sms_ok")],
                    &[("type", "QCB"), ("supporter_id", "42"), ("id", "foo_ok")],
                ]),
            )
            .with(
                d(2),
                RecordKind::PersonEvent,
                rows(&[&[("type", "PET"), ("supporter_id", "8"), ("campaign_date", "2024-03-02")]]),
            );
        let mut store = store();

        let summary = run(&source, &mut store, &mapper(), &DateRange::new(d(1), d(2)))
            .await
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                days: 2,
                inserted: 3,
                updated: 1,
                ignored: 1,
                failed_batches: 0,
            }
        );
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec![
                (d(1), RecordKind::PersonEvent),
                (d(1), RecordKind::ConsentStatus),
                (d(2), RecordKind::PersonEvent),
                (d(2), RecordKind::ConsentStatus),
            ]
        );
        assert_eq!(store.count_rows(TABLE).unwrap(), 3);
        assert_eq!(sms_status(&store, "42"), "sms_ok");
        assert_eq!(sms_status(&store, "7"), " ");
        assert_eq!(store.last_signing_date(TABLE).unwrap(), Some(d(2)));
    }

    #[tokio::test]
    async fn failed_export_skips_only_that_pair() {
        let source = FakeSource::default()
            .with(
                d(1),
                RecordKind::PersonEvent,
                ExportBatch::Failed("Invalid token".into()),
            )
            .with(
                d(2),
                RecordKind::PersonEvent,
                rows(&[&[("type", "PET"), ("supporter_id", "8")]]),
            );
        let mut store = store();

        let summary = run(&source, &mut store, &mapper(), &DateRange::new(d(1), d(2)))
            .await
            .unwrap();

        assert_eq!(summary.failed_batches, 1);
        assert_eq!(summary.inserted, 1);
        assert_eq!(source.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn missing_type_aborts_the_run_after_committed_rows() {
        let source = FakeSource::default().with(
            d(1),
            RecordKind::PersonEvent,
            rows(&[
                &[("type", "PET"), ("supporter_id", "1")],
                &[("supporter_id", "2")],
                &[("type", "PET"), ("supporter_id", "3")],
            ]),
        );
        let mut store = store();

        let err = run(&source, &mut store, &mapper(), &DateRange::new(d(1), d(2)))
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("no `type` field"), "{err:#}");
        // The first row was committed before the failure; nothing after it ran.
        assert_eq!(store.count_rows(TABLE).unwrap(), 1);
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_supporter_id_aborts_the_run() {
        let source = FakeSource::default().with(
            d(1),
            RecordKind::ConsentStatus,
            rows(&[&[("type", "QCB"), ("supporter_id", "x1"), ("id", "email_ok")]]),
        );
        let mut store = store();

        let err = run(&source, &mut store, &mapper(), &DateRange::new(d(1), d(1)))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("not an integer"), "{err:#}");
    }

    #[tokio::test]
    async fn transport_error_is_fatal() {
        let source = FakeSource {
            broken: Some((d(1), RecordKind::ConsentStatus)),
            ..FakeSource::default()
        };
        let mut store = store();

        let err = run(&source, &mut store, &mapper(), &DateRange::new(d(1), d(3)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fetching QCB export for 03012024"));
        assert_eq!(source.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_range_fetches_nothing() {
        let source = FakeSource::default();
        let mut store = store();

        let summary = run(&source, &mut store, &mapper(), &DateRange::new(d(5), d(4)))
            .await
            .unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(source.calls.lock().unwrap().is_empty());
    }
}
