//! Run lifecycle records

use crate::Database;
use crate::error::{Result, StoreError};
use crate::rows::RunRow;
use chrono::{DateTime, NaiveDate, Utc};
use research_core::{Run, RunStatus, UNIVERSE_ON_DEMAND};
use tracing::info;

const RUN_COLUMNS: &str = "id, run_date, universe, status, started_at, completed_at, notes";

impl Database {
    /// Create a PENDING run, rejecting the request when a PENDING or RUNNING
    /// run already exists for the same date and universe.
    pub async fn create_pending_run(&self, run_date: NaiveDate, universe: &str) -> Result<Run> {
        let mut tx = self.pool().begin().await?;

        let active = sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM runs \
             WHERE run_date = ? AND universe = ? AND status IN ('pending', 'running') \
             LIMIT 1"
        ))
        .bind(run_date)
        .bind(universe)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = active {
            let existing = existing.into_run()?;
            return Err(StoreError::RunAlreadyActive {
                run_date,
                universe: universe.to_string(),
                status: existing.status,
            });
        }

        let inserted = sqlx::query(
            "INSERT INTO runs (run_date, universe, status) VALUES (?, ?, 'pending')",
        )
        .bind(run_date)
        .bind(universe)
        .execute(&mut *tx)
        .await;

        // The partial unique index catches a concurrent creator that slipped
        // between the check and the insert.
        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::RunAlreadyActive {
                    run_date,
                    universe: universe.to_string(),
                    status: RunStatus::Pending,
                });
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;

        info!(run_id = id, %run_date, universe, "Created pending run");
        self.get_run(id).await
    }

    /// Create the COMPLETED anchor run of an on-demand analysis
    pub async fn create_on_demand_run(&self, run_date: NaiveDate) -> Result<Run> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO runs (run_date, universe, status, started_at, completed_at) \
             VALUES (?, ?, 'completed', ?, ?)",
        )
        .bind(run_date)
        .bind(UNIVERSE_ON_DEMAND)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_run(id).await
    }

    pub async fn get_run(&self, id: i64) -> Result<Run> {
        self.find_run(id)
            .await?
            .ok_or_else(|| StoreError::not_found("run", id))
    }

    pub async fn find_run(&self, id: i64) -> Result<Option<Run>> {
        sqlx::query_as::<_, RunRow>(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .map(RunRow::into_run)
            .transpose()
    }

    /// PENDING → RUNNING, stamping `started_at`
    pub async fn mark_run_running(&self, id: i64) -> Result<Run> {
        let result = sqlx::query(
            "UPDATE runs SET status = 'running', started_at = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.checked_transition(id, result.rows_affected(), RunStatus::Pending)
            .await
    }

    /// RUNNING → COMPLETED, stamping `completed_at`
    pub async fn mark_run_completed(&self, id: i64) -> Result<Run> {
        let result = sqlx::query(
            "UPDATE runs SET status = 'completed', completed_at = ? \
             WHERE id = ? AND status = 'running'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.checked_transition(id, result.rows_affected(), RunStatus::Running)
            .await
    }

    /// Non-terminal → FAILED with the cause recorded in `notes`
    pub async fn mark_run_failed(&self, id: i64, notes: &str) -> Result<Run> {
        let result = sqlx::query(
            "UPDATE runs SET status = 'failed', completed_at = ?, notes = ? \
             WHERE id = ? AND status IN ('pending', 'running')",
        )
        .bind(Utc::now())
        .bind(notes)
        .bind(id)
        .execute(self.pool())
        .await?;

        self.checked_transition(id, result.rows_affected(), RunStatus::Running)
            .await
    }

    async fn checked_transition(
        &self,
        id: i64,
        rows_affected: u64,
        expected: RunStatus,
    ) -> Result<Run> {
        if rows_affected == 0 {
            // Distinguish a missing run from one in the wrong state
            self.get_run(id).await?;
            return Err(StoreError::InvalidTransition {
                run_id: id,
                expected,
            });
        }
        self.get_run(id).await
    }

    /// Most recent COMPLETED run by run date, excluding on-demand anchors
    pub async fn latest_completed_run(&self) -> Result<Option<Run>> {
        sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM runs \
             WHERE status = 'completed' AND universe != ? \
             ORDER BY run_date DESC, id DESC LIMIT 1"
        ))
        .bind(UNIVERSE_ON_DEMAND)
        .fetch_optional(self.pool())
        .await?
        .map(RunRow::into_run)
        .transpose()
    }

    /// Runs newest first
    pub async fn list_runs(&self, limit: i64, offset: i64) -> Result<Vec<Run>> {
        sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM runs ORDER BY run_date DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(RunRow::into_run)
        .collect()
    }

    /// Non-terminal runs that look abandoned: RUNNING since before `cutoff`,
    /// or still PENDING for a date before the cutoff's date. Read-only.
    pub async fn list_stale_runs(&self, cutoff: DateTime<Utc>) -> Result<Vec<Run>> {
        sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM runs \
             WHERE (status = 'running' AND started_at < ?) \
                OR (status = 'pending' AND run_date < ?) \
             ORDER BY id"
        ))
        .bind(cutoff)
        .bind(cutoff.date_naive())
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(RunRow::into_run)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_pending_run_rejected() {
        let db = Database::in_memory().await.unwrap();

        let run = db.create_pending_run(june_first(), "US_LARGE_CAP").await.unwrap();
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.started_at.is_none());

        let err = db
            .create_pending_run(june_first(), "US_LARGE_CAP")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::RunAlreadyActive {
                status: RunStatus::Pending,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "A run for 2024-06-01 (US_LARGE_CAP) is already pending"
        );

        // Other universes and dates are unaffected
        db.create_pending_run(june_first(), "CUSTOM").await.unwrap();
        db.create_pending_run(june_first().succ_opt().unwrap(), "US_LARGE_CAP")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_new_run_allowed_after_terminal() {
        let db = Database::in_memory().await.unwrap();

        let run = db.create_pending_run(june_first(), "US_LARGE_CAP").await.unwrap();
        db.mark_run_running(run.id).await.unwrap();
        assert!(db.create_pending_run(june_first(), "US_LARGE_CAP").await.is_err());

        db.mark_run_completed(run.id).await.unwrap();
        let second = db.create_pending_run(june_first(), "US_LARGE_CAP").await.unwrap();
        assert_ne!(second.id, run.id);
    }

    #[tokio::test]
    async fn test_index_backs_invariant() {
        let db = Database::in_memory().await.unwrap();
        db.create_pending_run(june_first(), "US_LARGE_CAP").await.unwrap();

        let raw = sqlx::query(
            "INSERT INTO runs (run_date, universe, status) VALUES (?, 'US_LARGE_CAP', 'running')",
        )
        .bind(june_first())
        .execute(db.pool())
        .await
        .map_err(StoreError::from);

        assert!(raw.unwrap_err().is_unique_violation());
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let db = Database::in_memory().await.unwrap();
        let run = db.create_pending_run(june_first(), "US_LARGE_CAP").await.unwrap();

        // Cannot complete a run that never started
        assert!(matches!(
            db.mark_run_completed(run.id).await,
            Err(StoreError::InvalidTransition { .. })
        ));

        let running = db.mark_run_running(run.id).await.unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.started_at.is_some());

        let failed = db.mark_run_failed(run.id, "config missing").await.unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.notes.as_deref(), Some("config missing"));
        assert!(failed.completed_at.is_some());

        assert!(db.mark_run_running(run.id).await.is_err());
        assert!(matches!(
            db.mark_run_running(999).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_on_demand_runs_do_not_conflict() {
        let db = Database::in_memory().await.unwrap();
        let a = db.create_on_demand_run(june_first()).await.unwrap();
        let b = db.create_on_demand_run(june_first()).await.unwrap();

        assert_eq!(a.universe, "ON_DEMAND");
        assert_eq!(a.status, RunStatus::Completed);
        assert!(a.completed_at.is_some());
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_latest_and_list() {
        let db = Database::in_memory().await.unwrap();
        let older = db.create_pending_run(june_first(), "US_LARGE_CAP").await.unwrap();
        let newer = db
            .create_pending_run(june_first() + Duration::days(1), "US_LARGE_CAP")
            .await
            .unwrap();
        db.create_on_demand_run(june_first() + Duration::days(2)).await.unwrap();

        assert!(db.latest_completed_run().await.unwrap().is_none());

        for id in [older.id, newer.id] {
            db.mark_run_running(id).await.unwrap();
            db.mark_run_completed(id).await.unwrap();
        }

        let latest = db.latest_completed_run().await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);

        let page = db.list_runs(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].universe, "ON_DEMAND");
        assert_eq!(page[1].id, newer.id);

        let rest = db.list_runs(10, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, older.id);
    }

    #[tokio::test]
    async fn test_stale_runs_report() {
        let db = Database::in_memory().await.unwrap();
        let stale = db.create_pending_run(june_first(), "US_LARGE_CAP").await.unwrap();
        db.mark_run_running(stale.id).await.unwrap();

        let none = db
            .list_stale_runs(Utc::now() - Duration::hours(6))
            .await
            .unwrap();
        assert!(none.is_empty());

        let found = db
            .list_stale_runs(Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status, RunStatus::Running);
    }
}
