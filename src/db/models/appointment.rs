//! Appointment models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::common::{flag, TimeRange};

#[derive(Debug, Clone, FromRow)]
pub struct Appointment {
    pub id: String,
    pub plate_number: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub technician_id: String,
    pub service_advisor_id: Option<String>,
    pub no_show: i64,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentResponse {
    pub id: String,
    pub plate_number: String,
    pub date: String,
    pub time_range: TimeRange,
    pub technician_id: String,
    pub service_advisor_id: Option<String>,
    pub no_show: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Appointment> for AppointmentResponse {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            plate_number: a.plate_number,
            date: a.date,
            time_range: TimeRange {
                start: a.start_time,
                end: a.end_time,
            },
            technician_id: a.technician_id,
            service_advisor_id: a.service_advisor_id,
            no_show: flag(a.no_show),
            created_by: a.created_by,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// Raw time range as sent by clients; validated into [`TimeRange`].
#[derive(Debug, Clone, Deserialize)]
pub struct TimeRangeInput {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub plate_number: Option<String>,
    pub date: Option<String>,
    pub time_range: Option<TimeRangeInput>,
    pub technician_id: Option<String>,
    pub service_advisor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub plate_number: Option<String>,
    pub date: Option<String>,
    pub time_range: Option<TimeRangeInput>,
    pub technician_id: Option<String>,
    pub service_advisor_id: Option<String>,
    pub no_show: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetNoShowRequest {
    pub no_show: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAppointmentsQuery {
    pub date: Option<String>,
    pub technician_id: Option<String>,
    pub no_show: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNoShowResponse {
    pub deleted_count: u64,
}

/// Validated appointment fields ready for insertion.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub plate_number: String,
    pub date: String,
    pub time_range: TimeRange,
    pub technician_id: String,
    pub service_advisor_id: Option<String>,
}

/// Validated partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub plate_number: Option<String>,
    pub date: Option<String>,
    pub time_range: Option<TimeRange>,
    pub technician_id: Option<String>,
    pub service_advisor_id: Option<String>,
    /// Set the advisor to NULL, overriding `service_advisor_id`.
    pub clear_service_advisor: bool,
    pub no_show: Option<bool>,
}

impl Appointment {
    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<Appointment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list(
        db: &SqlitePool,
        filter: &ListAppointmentsQuery,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM appointments WHERE 1 = 1");
        if let Some(date) = &filter.date {
            query.push(" AND date = ").push_bind(date.clone());
        }
        if let Some(technician_id) = &filter.technician_id {
            query
                .push(" AND technician_id = ")
                .push_bind(technician_id.clone());
        }
        if let Some(no_show) = filter.no_show {
            query.push(" AND no_show = ").push_bind(no_show as i64);
        }
        query.push(" ORDER BY date ASC, start_time ASC");

        query.build_query_as::<Appointment>().fetch_all(db).await
    }

    pub async fn create(
        db: &SqlitePool,
        new: &NewAppointment,
        created_by: &str,
    ) -> Result<Appointment, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO appointments (id, plate_number, date, start_time, end_time, technician_id, service_advisor_id, no_show, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.plate_number)
        .bind(&new.date)
        .bind(&new.time_range.start)
        .bind(&new.time_range.end)
        .bind(&new.technician_id)
        .bind(&new.service_advisor_id)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_by_id(db, &id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Apply a partial update. Returns `None` when the appointment does not exist.
    pub async fn update(
        db: &SqlitePool,
        id: &str,
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let (start, end) = match &changes.time_range {
            Some(range) => (Some(range.start.clone()), Some(range.end.clone())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE appointments SET
                plate_number = COALESCE(?, plate_number),
                date = COALESCE(?, date),
                start_time = COALESCE(?, start_time),
                end_time = COALESCE(?, end_time),
                technician_id = COALESCE(?, technician_id),
                service_advisor_id = CASE WHEN ? THEN NULL ELSE COALESCE(?, service_advisor_id) END,
                no_show = COALESCE(?, no_show),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.plate_number)
        .bind(&changes.date)
        .bind(start)
        .bind(end)
        .bind(&changes.technician_id)
        .bind(changes.clear_service_advisor)
        .bind(&changes.service_advisor_id)
        .bind(changes.no_show.map(|b| b as i64))
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
        let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every appointment flagged as a no-show. Returns how many went.
    pub async fn delete_all_no_show(db: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM appointments WHERE no_show = 1")
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }
}
