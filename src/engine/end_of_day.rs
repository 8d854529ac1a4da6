//! End-of-day carry-over of unfinished job orders.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::{format_date, EndOfDayResponse, JobOrder, JobStatus, NewJobOrder, SourceType};

/// The next day that is not a Saturday or Sunday.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}

/// Close `date`: flag every unfinished job order on it as carried over and
/// open a pending copy on the next business day.
///
/// Runs in one transaction that takes the write lock before reading, so
/// concurrent runs for the same date queue up instead of failing. Job orders
/// already carried over are skipped, so a second run carries nothing.
pub async fn run_end_of_day(
    db: &SqlitePool,
    date: NaiveDate,
    created_by: &str,
) -> Result<EndOfDayResponse, sqlx::Error> {
    let day = format_date(date);
    let next_day = format_date(next_business_day(date));

    let mut tx = db.begin_with("BEGIN IMMEDIATE").await?;
    let pending = JobOrder::pending_carry_over(&mut *tx, &day).await?;

    let mut carried_over = 0u64;
    for job in pending {
        if !JobOrder::mark_carried_over(&mut *tx, &job.id).await? {
            continue;
        }

        let copy = NewJobOrder {
            job_number: job.job_number.clone(),
            date: next_day.clone(),
            status: JobStatus::Pending,
            source_type: SourceType::CarryOver,
            carried_from: Some(job.id.clone()),
            technician_id: job.technician_id.clone(),
            plate_number: job.plate_number.clone(),
        };
        JobOrder::insert(&mut *tx, &copy, created_by).await?;
        carried_over += 1;
    }

    tx.commit().await?;

    info!(
        date = %day,
        next_date = %next_day,
        carried_over,
        "End of day completed"
    );

    Ok(EndOfDayResponse {
        date: day,
        next_date: next_day,
        carried_over,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::db::{self, ListJobOrdersQuery, NewUser, Role, User};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_business_day() {
        // 2024-05-06 is a Monday
        assert_eq!(next_business_day(ymd(2024, 5, 6)), ymd(2024, 5, 7));
        assert_eq!(next_business_day(ymd(2024, 5, 10)), ymd(2024, 5, 13));
        assert_eq!(next_business_day(ymd(2024, 5, 11)), ymd(2024, 5, 13));
        assert_eq!(next_business_day(ymd(2024, 5, 12)), ymd(2024, 5, 13));
        assert_eq!(next_business_day(ymd(2024, 12, 31)), ymd(2025, 1, 1));
    }

    async fn setup() -> (SqlitePool, String) {
        let pool = db::init_in_memory().await.unwrap();
        let controller = User::create(
            &pool,
            &NewUser {
                name: "Jo Controller".into(),
                email: "jo@example.com".into(),
                password_hash: hash_password("secret1").unwrap(),
                role: Role::JobController,
                level: None,
                picture_url: None,
                break_times: vec![],
            },
        )
        .await
        .unwrap();
        (pool, controller.id)
    }

    async fn job(pool: &SqlitePool, by: &str, number: &str, date: &str, status: JobStatus) {
        JobOrder::create(
            pool,
            &NewJobOrder {
                job_number: number.into(),
                date: date.into(),
                status,
                source_type: SourceType::WalkIn,
                carried_from: None,
                technician_id: None,
                plate_number: Some("ABC 123".into()),
            },
            by,
        )
        .await
        .unwrap();
    }

    fn on(date: &str) -> ListJobOrdersQuery {
        ListJobOrdersQuery {
            date: Some(date.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_carries_only_unfinished_jobs() {
        let (pool, by) = setup().await;
        job(&pool, &by, "JO-1", "2024-05-10", JobStatus::InProgress).await;
        job(&pool, &by, "JO-2", "2024-05-10", JobStatus::Completed).await;
        job(&pool, &by, "JO-3", "2024-05-10", JobStatus::Cancelled).await;
        job(&pool, &by, "JO-4", "2024-05-10", JobStatus::OnHold).await;
        job(&pool, &by, "JO-5", "2024-05-09", JobStatus::Pending).await;

        let result = run_end_of_day(&pool, ymd(2024, 5, 10), &by).await.unwrap();
        assert_eq!(result.date, "2024-05-10");
        assert_eq!(result.next_date, "2024-05-13");
        assert_eq!(result.carried_over, 2);

        let next = JobOrder::list(&pool, &on("2024-05-13")).await.unwrap();
        let numbers: Vec<_> = next.iter().map(|j| j.job_number.as_str()).collect();
        assert_eq!(numbers, vec!["JO-1", "JO-4"]);
        for copy in &next {
            assert_eq!(copy.status, "pending");
            assert_eq!(copy.source_type, "carry-over");
            assert_eq!(copy.carried_over, 0);
            assert!(copy.carried_from.is_some());
            assert_eq!(copy.plate_number.as_deref(), Some("ABC 123"));
        }

        let today = JobOrder::list(&pool, &on("2024-05-10")).await.unwrap();
        let flagged: Vec<_> = today
            .iter()
            .filter(|j| j.carried_over == 1)
            .map(|j| j.job_number.as_str())
            .collect();
        assert_eq!(flagged, vec!["JO-1", "JO-4"]);
    }

    #[tokio::test]
    async fn test_second_run_carries_nothing() {
        let (pool, by) = setup().await;
        job(&pool, &by, "JO-1", "2024-05-06", JobStatus::Pending).await;

        let first = run_end_of_day(&pool, ymd(2024, 5, 6), &by).await.unwrap();
        let second = run_end_of_day(&pool, ymd(2024, 5, 6), &by).await.unwrap();

        assert_eq!(first.carried_over, 1);
        assert_eq!(second.carried_over, 0);
        assert_eq!(second.next_date, "2024-05-07");

        let next = JobOrder::list(&pool, &on("2024-05-07")).await.unwrap();
        assert_eq!(next.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_day() {
        let (pool, by) = setup().await;
        let result = run_end_of_day(&pool, ymd(2024, 5, 6), &by).await.unwrap();
        assert_eq!(result.carried_over, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_runs_do_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("shop.db").display());
        let pool = db::init(&url, 4).await.unwrap();
        let by = User::create(
            &pool,
            &NewUser {
                name: "Jo Controller".into(),
                email: "jo@example.com".into(),
                password_hash: hash_password("secret1").unwrap(),
                role: Role::JobController,
                level: None,
                picture_url: None,
                break_times: vec![],
            },
        )
        .await
        .unwrap()
        .id;
        for i in 0..100 {
            job(&pool, &by, &format!("JO-{:03}", i), "2024-05-06", JobStatus::Pending).await;
        }

        let (first, second) = tokio::join!(
            run_end_of_day(&pool, ymd(2024, 5, 6), &by),
            run_end_of_day(&pool, ymd(2024, 5, 6), &by)
        );
        let first = first.unwrap();
        let second = second.unwrap();

        let mut carried = vec![first.carried_over, second.carried_over];
        carried.sort();
        assert_eq!(carried, vec![0, 100]);

        let next = JobOrder::list(&pool, &on("2024-05-07")).await.unwrap();
        assert_eq!(next.len(), 100);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_job_number_clash_rolls_back() {
        let (pool, by) = setup().await;
        job(&pool, &by, "JO-1", "2024-05-06", JobStatus::Pending).await;
        job(&pool, &by, "JO-2", "2024-05-06", JobStatus::Pending).await;
        job(&pool, &by, "JO-2", "2024-05-07", JobStatus::Pending).await;

        let err = run_end_of_day(&pool, ymd(2024, 5, 6), &by).await.unwrap_err();
        assert!(matches!(&err, sqlx::Error::Database(e) if e.is_unique_violation()));

        let today = JobOrder::list(&pool, &on("2024-05-06")).await.unwrap();
        assert!(today.iter().all(|j| j.carried_over == 0));
        let next = JobOrder::list(&pool, &on("2024-05-07")).await.unwrap();
        assert_eq!(next.len(), 1);
    }
}
