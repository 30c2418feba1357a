//! Grades computed outside the request path, and the log of those runs.

use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

use coursestate_storage::timestamp::{format_timestamp, now, parse_timestamp};
use coursestate_storage::StorageError;

use crate::db_err;

const GRADE_COLUMNS: &str = "user_id, course_id, created, updated, gradeset";
const LOG_COLUMNS: &str = "id, course_id, created, seconds, nstudents";

/// One learner's precomputed grade set for a course.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineGrade {
    pub user_id: i64,
    pub course_id: String,
    /// Grade set as JSON text.
    pub gradeset: Option<String>,
    pub created: OffsetDateTime,
    pub updated: OffsetDateTime,
}

/// One offline grading run over a course.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeComputation {
    pub id: i64,
    pub course_id: String,
    pub created: OffsetDateTime,
    /// Wall time the run took.
    pub seconds: i64,
    pub nstudents: i64,
}

#[derive(Debug, FromRow)]
struct GradeRow {
    user_id: i64,
    course_id: String,
    created: String,
    updated: String,
    gradeset: Option<String>,
}

impl GradeRow {
    fn into_grade(self) -> Result<OfflineGrade, StorageError> {
        Ok(OfflineGrade {
            user_id: self.user_id,
            course_id: self.course_id,
            gradeset: self.gradeset,
            created: parse_timestamp(&self.created)?,
            updated: parse_timestamp(&self.updated)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct LogRow {
    id: i64,
    course_id: String,
    created: String,
    seconds: i64,
    nstudents: i64,
}

impl LogRow {
    fn into_computation(self) -> Result<GradeComputation, StorageError> {
        Ok(GradeComputation {
            id: self.id,
            course_id: self.course_id,
            created: parse_timestamp(&self.created)?,
            seconds: self.seconds,
            nstudents: self.nstudents,
        })
    }
}

/// Offline grades and their run log, in the relational database.
///
/// Grades are unique per (user, course) and overwritten in place; the log
/// is append-only.
#[derive(Debug, Clone)]
pub struct GradeStore {
    pool: SqlitePool,
}

impl GradeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a learner's grade set; `created` is kept on overwrite.
    pub async fn save_grade(
        &self,
        user_id: i64,
        course_id: &str,
        gradeset: Option<&str>,
    ) -> Result<OfflineGrade, StorageError> {
        let ts = format_timestamp(now())?;
        let row = sqlx::query_as::<_, GradeRow>(&format!(
            "INSERT INTO courseware_offlinecomputedgrade
                (user_id, course_id, created, updated, gradeset)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (user_id, course_id) DO UPDATE SET
                gradeset = excluded.gradeset,
                updated = excluded.updated
             RETURNING {GRADE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(course_id)
        .bind(&ts)
        .bind(&ts)
        .bind(gradeset)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row.into_grade()
    }

    pub async fn grade(
        &self,
        user_id: i64,
        course_id: &str,
    ) -> Result<Option<OfflineGrade>, StorageError> {
        let row = sqlx::query_as::<_, GradeRow>(&format!(
            "SELECT {GRADE_COLUMNS} FROM courseware_offlinecomputedgrade
             WHERE user_id = ? AND course_id = ?"
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(GradeRow::into_grade).transpose()
    }

    /// Every grade stored for a course, by user id.
    pub async fn course_grades(&self, course_id: &str) -> Result<Vec<OfflineGrade>, StorageError> {
        let rows = sqlx::query_as::<_, GradeRow>(&format!(
            "SELECT {GRADE_COLUMNS} FROM courseware_offlinecomputedgrade
             WHERE course_id = ?
             ORDER BY user_id"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(GradeRow::into_grade).collect()
    }

    pub async fn log_computation(
        &self,
        course_id: &str,
        seconds: i64,
        nstudents: i64,
    ) -> Result<GradeComputation, StorageError> {
        let row = sqlx::query_as::<_, LogRow>(&format!(
            "INSERT INTO courseware_offlinecomputedgradelog (course_id, created, seconds, nstudents)
             VALUES (?, ?, ?, ?)
             RETURNING {LOG_COLUMNS}"
        ))
        .bind(course_id)
        .bind(format_timestamp(now())?)
        .bind(seconds)
        .bind(nstudents)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row.into_computation()
    }

    /// Runs for a course, newest first.
    pub async fn computations(&self, course_id: &str) -> Result<Vec<GradeComputation>, StorageError> {
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM courseware_offlinecomputedgradelog
             WHERE course_id = ?
             ORDER BY created DESC, id DESC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(LogRow::into_computation).collect()
    }

    pub async fn latest_computation(
        &self,
        course_id: &str,
    ) -> Result<Option<GradeComputation>, StorageError> {
        let row = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM courseware_offlinecomputedgradelog
             WHERE course_id = ?
             ORDER BY created DESC, id DESC
             LIMIT 1"
        ))
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(LogRow::into_computation).transpose()
    }
}
