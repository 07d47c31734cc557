use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::{PgListener, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::models::{NewReport, Report, ReportStatus};

/// Channel the reports trigger notifies on every change.
const CHANGE_CHANNEL: &str = "dlc_reports_changed";

pub type OnReports = Box<dyn FnMut(Vec<Report>) + Send + 'static>;
pub type OnStoreError = Box<dyn FnMut(StoreError) + Send + 'static>;

/// The remote report collection.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates a report; the store assigns its id and timestamp.
    async fn save_report(&self, report: &NewReport) -> Result<Report, StoreError>;

    /// Writes a report that already has an identity, keeping its id and
    /// submission time. Writing an id the store already holds is a no-op.
    async fn restore_report(&self, report: &Report) -> Result<Report, StoreError>;

    /// All reports, newest first.
    async fn fetch_reports(&self) -> Result<Vec<Report>, StoreError>;

    /// Returns whether a report with this id existed.
    async fn delete_report(&self, id: &str) -> Result<bool, StoreError>;

    /// Delivers the full ordered report set now and after every change until
    /// the returned handle is cancelled or dropped. `on_error` fires once if
    /// the subscription fails, after which no more snapshots arrive.
    fn subscribe_to_reports(&self, on_data: OnReports, on_error: OnStoreError) -> Subscription;
}

/// Cancellation handle for a live report subscription.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    /// Builds the pool without connecting; the first operation surfaces
    /// connectivity problems as `StoreError::Unavailable`.
    pub fn connect_lazy(database_url: &str, acquire_timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .context("DATABASE_URL is not a valid Postgres connection string")?;
        Ok(Self { pool })
    }

    pub async fn init_db(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn seed(&self) -> anyhow::Result<usize> {
        let reports = vec![
            ("seed-001", "02162", "Jan-26", 1, 50, ReportStatus::Present, (2026, 1, 5)),
            ("seed-002", "02496", "Jan-26", 1, 42, ReportStatus::Present, (2026, 1, 5)),
            ("seed-003", "03101", "Jan-26", 1, 0, ReportStatus::Absent, (2026, 1, 6)),
            ("seed-004", "04101", "Jan-26", 2, 35, ReportStatus::Present, (2026, 1, 12)),
            ("seed-005", "05102", "Jan-26", 2, 0, ReportStatus::NoData, (2026, 1, 13)),
            ("seed-006", "06101", "Jan-26", 2, 61, ReportStatus::Present, (2026, 1, 13)),
        ];

        let mut inserted = 0usize;
        for (id, team_id, month, week, score, status, (year, mon, day)) in reports {
            let submitted_at = Utc
                .with_ymd_and_hms(year, mon, day, 9, 30, 0)
                .single()
                .context("invalid seed timestamp")?;

            let result = sqlx::query(
                r#"
                INSERT INTO dlc_portal.reports
                (id, team_id, month, week, score, status, submitted_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(id)
            .bind(team_id)
            .bind(month)
            .bind(week as i16)
            .bind(score as i64)
            .bind(status.as_str())
            .bind(submitted_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        Ok(inserted)
    }
}

#[async_trait]
impl RemoteStore for PgReportStore {
    #[tracing::instrument(level = "debug", skip_all, fields(team_id = %report.team_id))]
    async fn save_report(&self, report: &NewReport) -> Result<Report, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO dlc_portal.reports (team_id, month, week, score, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, submitted_at
            "#,
        )
        .bind(&report.team_id)
        .bind(&report.month)
        .bind(i16::from(report.week))
        .bind(i64::from(report.score))
        .bind(report.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        let id: String = row.try_get("id")?;
        let submitted_at: DateTime<Utc> = row.try_get("submitted_at")?;
        Ok(report.clone().into_report(id, submitted_at))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(id = %report.id))]
    async fn restore_report(&self, report: &Report) -> Result<Report, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO dlc_portal.reports (id, team_id, month, week, score, status, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&report.id)
        .bind(&report.team_id)
        .bind(&report.month)
        .bind(i16::from(report.week))
        .bind(i64::from(report.score))
        .bind(report.status.as_str())
        .bind(report.submitted_at)
        .execute(&self.pool)
        .await?;
        Ok(report.clone())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn fetch_reports(&self) -> Result<Vec<Report>, StoreError> {
        fetch_all(&self.pool).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_report(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM dlc_portal.reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn subscribe_to_reports(&self, mut on_data: OnReports, mut on_error: OnStoreError) -> Subscription {
        let pool = self.pool.clone();
        let task = tokio::spawn(async move {
            if let Err(error) = stream_reports(&pool, &mut on_data).await {
                tracing::warn!(%error, "report subscription stopped");
                on_error(error);
            }
        });
        Subscription::new(task)
    }
}

async fn stream_reports(pool: &PgPool, on_data: &mut OnReports) -> Result<(), StoreError> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;
    on_data(fetch_all(pool).await?);

    loop {
        let notification = listener.recv().await?;
        tracing::debug!(operation = notification.payload(), "reports changed");
        on_data(fetch_all(pool).await?);
    }
}

async fn fetch_all(pool: &PgPool) -> Result<Vec<Report>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, team_id, month, week, score, status, submitted_at \
         FROM dlc_portal.reports \
         ORDER BY submitted_at DESC, id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(report_from_row).collect()
}

fn report_from_row(row: &PgRow) -> Result<Report, StoreError> {
    let id: String = row.try_get("id")?;
    let week: i16 = row.try_get("week")?;
    let score: i64 = row.try_get("score")?;
    let status: String = row.try_get("status")?;

    Ok(Report {
        team_id: row.try_get("team_id")?,
        month: row.try_get("month")?,
        week: u8::try_from(week)
            .map_err(|_| StoreError::Unknown(format!("report {id} has week {week}")))?,
        score: u32::try_from(score)
            .map_err(|_| StoreError::Unknown(format!("report {id} has score {score}")))?,
        status: status.parse().map_err(StoreError::Unknown)?,
        submitted_at: row.try_get("submitted_at")?,
        id,
    })
}

/// Stand-in used when no `DATABASE_URL` is configured: every operation is
/// unavailable, so reads and submissions take their local fallback paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

const OFFLINE: &str = "no DATABASE_URL configured";

#[async_trait]
impl RemoteStore for OfflineStore {
    async fn save_report(&self, _report: &NewReport) -> Result<Report, StoreError> {
        Err(StoreError::Unavailable(OFFLINE.to_string()))
    }

    async fn restore_report(&self, _report: &Report) -> Result<Report, StoreError> {
        Err(StoreError::Unavailable(OFFLINE.to_string()))
    }

    async fn fetch_reports(&self) -> Result<Vec<Report>, StoreError> {
        Err(StoreError::Unavailable(OFFLINE.to_string()))
    }

    async fn delete_report(&self, _id: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable(OFFLINE.to_string()))
    }

    fn subscribe_to_reports(&self, _on_data: OnReports, mut on_error: OnStoreError) -> Subscription {
        Subscription::new(tokio::spawn(async move {
            on_error(StoreError::Unavailable(OFFLINE.to_string()));
        }))
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::memory::MemoryRemote;
    use super::*;
    use crate::cache::tests::sample_report;

    fn new_report(team_id: &str, score: u32) -> NewReport {
        NewReport {
            team_id: team_id.to_string(),
            month: "Jan-26".to_string(),
            week: 1,
            score,
            status: ReportStatus::Present,
        }
    }

    fn channel_subscription(
        remote: &MemoryRemote,
    ) -> (Subscription, mpsc::UnboundedReceiver<Vec<Report>>, mpsc::UnboundedReceiver<StoreError>) {
        let (data_tx, data_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let subscription = remote.subscribe_to_reports(
            Box::new(move |reports| {
                let _ = data_tx.send(reports);
            }),
            Box::new(move |error| {
                let _ = error_tx.send(error);
            }),
        );
        (subscription, data_rx, error_rx)
    }

    #[tokio::test]
    async fn subscription_delivers_ordered_snapshots() {
        let remote = MemoryRemote::new();
        remote.save_report(&new_report("02162", 10)).await.unwrap();

        let (subscription, mut data, _errors) = channel_subscription(&remote);
        assert_eq!(data.recv().await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = remote.save_report(&new_report("02496", 20)).await.unwrap();
        let snapshot = data.recv().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, second.id);

        subscription.cancel();
        tokio::task::yield_now().await;
        remote.save_report(&new_report("03101", 30)).await.unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(50), data.recv())
            .await
            .map_or(true, |next| next.is_none()));
    }

    #[tokio::test]
    async fn restore_keeps_identity_and_submission_time() {
        let remote = MemoryRemote::new();
        let original = sample_report("local-7", "02162", ReportStatus::Present, 25);

        let restored = remote.restore_report(&original).await.unwrap();
        assert_eq!(restored, original);
        remote.restore_report(&original).await.unwrap();

        let stored = remote.fetch_reports().await.unwrap();
        assert_eq!(stored, vec![original]);
    }

    #[tokio::test]
    async fn offline_store_is_always_unavailable() {
        let store = OfflineStore;
        assert!(matches!(
            store.save_report(&new_report("02162", 1)).await,
            Err(StoreError::Unavailable(_))
        ));

        let (error_tx, mut errors) = mpsc::unbounded_channel();
        let _subscription = store.subscribe_to_reports(
            Box::new(|_| panic!("offline store has no data")),
            Box::new(move |error| {
                let _ = error_tx.send(error);
            }),
        );
        assert!(matches!(errors.recv().await, Some(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn rejected_subscription_reports_the_error() {
        let remote = MemoryRemote::failing(StoreError::PermissionDenied("rules".into()));
        let (_subscription, mut data, mut errors) = channel_subscription(&remote);

        let error = errors.recv().await.unwrap();
        assert!(error.is_permission_denied());
        assert!(data.recv().await.is_none());
    }
}
