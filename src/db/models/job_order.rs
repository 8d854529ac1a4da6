//! Job order models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::flag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::OnHold,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in-progress",
            JobStatus::OnHold => "on-hold",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Finished jobs are never carried over to the next day.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "in-progress" => Ok(JobStatus::InProgress),
            "on-hold" => Ok(JobStatus::OnHold),
            "completed" => Ok(JobStatus::Completed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Where a job order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Appointment,
    WalkIn,
    CarryOver,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Appointment => "appointment",
            SourceType::WalkIn => "walk-in",
            SourceType::CarryOver => "carry-over",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "appointment" => Ok(SourceType::Appointment),
            "walk-in" => Ok(SourceType::WalkIn),
            "carry-over" => Ok(SourceType::CarryOver),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobOrder {
    pub id: String,
    pub job_number: String,
    pub status: String,
    pub date: String,
    pub carried_over: i64,
    pub source_type: String,
    pub carried_from: Option<String>,
    pub technician_id: Option<String>,
    pub plate_number: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOrderResponse {
    pub id: String,
    pub job_number: String,
    pub status: String,
    pub date: String,
    pub carried_over: bool,
    pub source_type: String,
    pub carried_from: Option<String>,
    pub technician_id: Option<String>,
    pub plate_number: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<JobOrder> for JobOrderResponse {
    fn from(job: JobOrder) -> Self {
        Self {
            id: job.id,
            job_number: job.job_number,
            status: job.status,
            date: job.date,
            carried_over: flag(job.carried_over),
            source_type: job.source_type,
            carried_from: job.carried_from,
            technician_id: job.technician_id,
            plate_number: job.plate_number,
            created_by: job.created_by,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobOrderRequest {
    pub job_number: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub source_type: Option<String>,
    pub technician_id: Option<String>,
    pub plate_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobOrderRequest {
    pub job_number: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub technician_id: Option<String>,
    pub plate_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobOrdersQuery {
    pub date: Option<String>,
    pub status: Option<String>,
    pub carried_over: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EndOfDayRequest {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndOfDayResponse {
    pub date: String,
    pub next_date: String,
    pub carried_over: u64,
}

/// Validated job order fields ready for insertion.
#[derive(Debug, Clone)]
pub struct NewJobOrder {
    pub job_number: String,
    pub date: String,
    pub status: JobStatus,
    pub source_type: SourceType,
    pub carried_from: Option<String>,
    pub technician_id: Option<String>,
    pub plate_number: Option<String>,
}

/// Validated partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct JobOrderChanges {
    pub job_number: Option<String>,
    pub date: Option<String>,
    pub status: Option<JobStatus>,
    pub technician_id: Option<String>,
    pub plate_number: Option<String>,
}

const INSERT_JOB_ORDER: &str = r#"
    INSERT INTO job_orders (id, job_number, status, date, carried_over, source_type, carried_from, technician_id, plate_number, created_by, created_at, updated_at)
    VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?)
"#;

impl JobOrder {
    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<JobOrder>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM job_orders WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list(
        db: &SqlitePool,
        filter: &ListJobOrdersQuery,
    ) -> Result<Vec<JobOrder>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM job_orders WHERE 1 = 1");
        if let Some(date) = &filter.date {
            query.push(" AND date = ").push_bind(date.clone());
        }
        if let Some(status) = &filter.status {
            query.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(carried_over) = filter.carried_over {
            query
                .push(" AND carried_over = ")
                .push_bind(carried_over as i64);
        }
        query.push(" ORDER BY date ASC, job_number ASC");

        query.build_query_as::<JobOrder>().fetch_all(db).await
    }

    pub async fn create(
        db: &SqlitePool,
        new: &NewJobOrder,
        created_by: &str,
    ) -> Result<JobOrder, sqlx::Error> {
        let mut conn = db.acquire().await?;
        let id = Self::insert(&mut conn, new, created_by).await?;
        drop(conn);

        Self::get_by_id(db, &id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Insert on an existing connection (or transaction) and return the new id.
    pub async fn insert(
        conn: &mut sqlx::SqliteConnection,
        new: &NewJobOrder,
        created_by: &str,
    ) -> Result<String, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(INSERT_JOB_ORDER)
            .bind(&id)
            .bind(&new.job_number)
            .bind(new.status.as_str())
            .bind(&new.date)
            .bind(new.source_type.as_str())
            .bind(&new.carried_from)
            .bind(&new.technician_id)
            .bind(&new.plate_number)
            .bind(created_by)
            .bind(&now)
            .bind(&now)
            .execute(&mut *conn)
            .await?;

        Ok(id)
    }

    /// Apply a partial update. Returns `None` when the job order does not exist.
    pub async fn update(
        db: &SqlitePool,
        id: &str,
        changes: &JobOrderChanges,
    ) -> Result<Option<JobOrder>, sqlx::Error> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE job_orders SET
                job_number = COALESCE(?, job_number),
                date = COALESCE(?, date),
                status = COALESCE(?, status),
                technician_id = COALESCE(?, technician_id),
                plate_number = COALESCE(?, plate_number),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.job_number)
        .bind(&changes.date)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(&changes.technician_id)
        .bind(&changes.plate_number)
        .bind(&now)
        .bind(id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::get_by_id(db, id).await
    }

    pub async fn delete(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM job_orders WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Unfinished job orders on `date` that have not been carried over yet.
    pub async fn pending_carry_over(
        conn: &mut sqlx::SqliteConnection,
        date: &str,
    ) -> Result<Vec<JobOrder>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT * FROM job_orders WHERE carried_over = 0 AND date = ",
        );
        query.push_bind(date.to_string());
        query.push(" AND status NOT IN (");
        let mut finished = query.separated(", ");
        for status in JobStatus::ALL.iter().filter(|s| s.is_finished()) {
            finished.push_bind(status.as_str());
        }
        query.push(") ORDER BY job_number ASC");

        query.build_query_as::<JobOrder>().fetch_all(&mut *conn).await
    }

    /// Flag a job order as carried over. Only succeeds once per job order.
    pub async fn mark_carried_over(
        conn: &mut sqlx::SqliteConnection,
        id: &str,
    ) -> Result<bool, sqlx::Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE job_orders SET carried_over = 1, updated_at = ? WHERE id = ? AND carried_over = 0",
        )
        .bind(&now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_parse_and_finished() {
        assert_eq!("in-progress".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert_eq!("COMPLETED".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert!("done".parse::<JobStatus>().is_err());

        assert!(JobStatus::Completed.is_finished());
        assert!(JobStatus::Cancelled.is_finished());
        assert!(!JobStatus::OnHold.is_finished());
    }

    #[test]
    fn test_all_statuses_round_trip() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        let finished: Vec<_> = JobStatus::ALL.iter().filter(|s| s.is_finished()).collect();
        assert_eq!(finished, vec![&JobStatus::Completed, &JobStatus::Cancelled]);
    }

    #[test]
    fn test_source_type_serde_matches_as_str() {
        for source in [SourceType::Appointment, SourceType::WalkIn, SourceType::CarryOver] {
            assert_eq!(
                serde_json::to_value(source).unwrap(),
                serde_json::Value::String(source.as_str().to_string())
            );
            assert_eq!(source.as_str().parse::<SourceType>().unwrap(), source);
        }
    }
}
