use sqlx::SqlitePool;

use coursestate_storage::StorageError;

/// Schema statements, applied in order. Every statement is idempotent.
///
/// `module_id` holds the module state key. The unique index is the
/// composite identity (student_id, module_id, course_id); module_type only
/// gets a plain lookup index.
const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS courseware_studentmodule (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        module_type TEXT NOT NULL DEFAULT 'problem',
        module_id TEXT NOT NULL,
        student_id INTEGER NOT NULL,
        course_id TEXT NOT NULL,
        state TEXT,
        grade REAL,
        max_grade REAL,
        done TEXT NOT NULL DEFAULT 'na',
        created TEXT NOT NULL,
        modified TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS courseware_studentmodule_student_module_course
        ON courseware_studentmodule (student_id, module_id, course_id)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodule_module_type
        ON courseware_studentmodule (module_type)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodule_module_id
        ON courseware_studentmodule (module_id)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodule_student_id
        ON courseware_studentmodule (student_id)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodule_course_id
        ON courseware_studentmodule (course_id)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodule_grade
        ON courseware_studentmodule (grade)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodule_done
        ON courseware_studentmodule (done)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodule_created
        ON courseware_studentmodule (created)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodule_modified
        ON courseware_studentmodule (modified)",
    // No foreign key: history outlives the row it was taken from.
    "CREATE TABLE IF NOT EXISTS courseware_studentmodulehistory (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_module_id INTEGER NOT NULL,
        version TEXT,
        created TEXT NOT NULL,
        state TEXT,
        grade REAL,
        max_grade REAL
    )",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodulehistory_student_module_id
        ON courseware_studentmodulehistory (student_module_id)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodulehistory_version
        ON courseware_studentmodulehistory (version)",
    "CREATE INDEX IF NOT EXISTS courseware_studentmodulehistory_created
        ON courseware_studentmodulehistory (created)",
    // Field-scoped values. `value` holds JSON text.
    "CREATE TABLE IF NOT EXISTS courseware_xmoduleuserstatesummaryfield (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        field_name TEXT NOT NULL,
        usage_id TEXT NOT NULL,
        value TEXT NOT NULL DEFAULT 'null',
        created TEXT NOT NULL,
        modified TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS courseware_xmoduleuserstatesummaryfield_usage_field
        ON courseware_xmoduleuserstatesummaryfield (usage_id, field_name)",
    "CREATE TABLE IF NOT EXISTS courseware_xmodulestudentprefsfield (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        field_name TEXT NOT NULL,
        module_type TEXT NOT NULL,
        student_id INTEGER NOT NULL,
        value TEXT NOT NULL DEFAULT 'null',
        created TEXT NOT NULL,
        modified TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS courseware_xmodulestudentprefsfield_student_type_field
        ON courseware_xmodulestudentprefsfield (student_id, module_type, field_name)",
    "CREATE TABLE IF NOT EXISTS courseware_xmodulestudentinfofield (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        field_name TEXT NOT NULL,
        student_id INTEGER NOT NULL,
        value TEXT NOT NULL DEFAULT 'null',
        created TEXT NOT NULL,
        modified TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS courseware_xmodulestudentinfofield_student_field
        ON courseware_xmodulestudentinfofield (student_id, field_name)",
    // Grades computed offline, one row per (user, course), plus a log of runs.
    "CREATE TABLE IF NOT EXISTS courseware_offlinecomputedgrade (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        course_id TEXT NOT NULL,
        created TEXT NOT NULL,
        updated TEXT NOT NULL,
        gradeset TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS courseware_offlinecomputedgrade_user_course
        ON courseware_offlinecomputedgrade (user_id, course_id)",
    "CREATE INDEX IF NOT EXISTS courseware_offlinecomputedgrade_course_id
        ON courseware_offlinecomputedgrade (course_id)",
    "CREATE TABLE IF NOT EXISTS courseware_offlinecomputedgradelog (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        course_id TEXT NOT NULL,
        created TEXT NOT NULL,
        seconds INTEGER NOT NULL DEFAULT 0,
        nstudents INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS courseware_offlinecomputedgradelog_course_created
        ON courseware_offlinecomputedgradelog (course_id, created)",
];

/// Create every table and index if missing.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
    for stmt in STATEMENTS {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .map_err(|e| StorageError::Backend(format!("migration failed: {e}")))?;
    }
    Ok(())
}
