//! Field-scoped value stores.

mod common;

use coursestate_sql::FieldKey;

use common::TempBackend;

#[tokio::test]
async fn missing_field_reads_as_none() {
    let t = TempBackend::new().await;
    let fields = t.backend.fields();
    assert!(fields
        .get(&FieldKey::student_info(1, "language"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn set_overwrites_value_and_keeps_created() {
    let t = TempBackend::new().await;
    let fields = t.backend.fields();
    let key = FieldKey::user_state_summary("i4x://poll1", "tally");

    let first = fields.set(&key, r#"{"yes":1}"#).await.unwrap();
    let second = fields.set(&key, r#"{"yes":2}"#).await.unwrap();

    assert_eq!(second.value, r#"{"yes":2}"#);
    assert_eq!(second.created, first.created);
    assert!(second.modified >= first.modified);
    assert_eq!(fields.get(&key).await.unwrap(), Some(second));
}

#[tokio::test]
async fn scopes_do_not_share_keys() {
    let t = TempBackend::new().await;
    let fields = t.backend.fields();

    let prefs_video = FieldKey::student_prefs(5, "video", "speed");
    let prefs_problem = FieldKey::student_prefs(5, "problem", "speed");
    let info = FieldKey::student_info(5, "speed");
    let other_student = FieldKey::student_info(6, "speed");

    fields.set(&prefs_video, "1.5").await.unwrap();
    fields.set(&prefs_problem, "1.0").await.unwrap();
    fields.set(&info, "2.0").await.unwrap();

    assert_eq!(fields.get(&prefs_video).await.unwrap().unwrap().value, "1.5");
    assert_eq!(fields.get(&prefs_problem).await.unwrap().unwrap().value, "1.0");
    assert_eq!(fields.get(&info).await.unwrap().unwrap().value, "2.0");
    assert!(fields.get(&other_student).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_reports_whether_a_value_existed() {
    let t = TempBackend::new().await;
    let fields = t.backend.fields();
    let key = FieldKey::student_prefs(5, "video", "speed");

    assert!(!fields.delete(&key).await.unwrap());
    fields.set(&key, "1.5").await.unwrap();
    assert!(fields.delete(&key).await.unwrap());
    assert!(fields.get(&key).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sets_leave_one_row() {
    let t = TempBackend::new().await;
    let key = FieldKey::student_info(9, "goal");

    let mut handles = Vec::new();
    for i in 0..8 {
        let fields = t.backend.fields();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            fields.set(&key, &i.to_string()).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM courseware_xmodulestudentinfofield WHERE student_id = 9",
    )
    .fetch_one(t.backend.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);
}
