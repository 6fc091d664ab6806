// Tests for starting, ending and switching work sessions

use chrono::{Local, TimeZone};
use tempfile::TempDir;
use worklog::db::{
    repositories::{local_day_bounds, WorkHoursRepository},
    Database, DbError, Location, MigrationRunner, Model, Project, User, WorkSession,
};

struct Fixture {
    db: Database,
    work: WorkHoursRepository,
    user_id: i64,
    project_id: i64,
    _temp: TempDir,
}

async fn setup() -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(temp_dir.path().join("test.db"));
    MigrationRunner::new(db.clone()).run().await.unwrap();

    let user = User::create(&db, User::new("Jane", "Doe", "jane@x.com"))
        .await
        .unwrap();
    let project = Project::create(&db, Project::new("Website", Location::Home))
        .await
        .unwrap();

    Fixture {
        work: WorkHoursRepository::new(db.clone()),
        db,
        user_id: user.id.unwrap(),
        project_id: project.id.unwrap(),
        _temp: temp_dir,
    }
}

async fn add_project(db: &Database, name: &str, location: Location) -> i64 {
    Project::create(db, Project::new(name, location))
        .await
        .unwrap()
        .id
        .unwrap()
}

#[tokio::test]
async fn test_start_then_end() {
    let f = setup().await;

    let started = f
        .work
        .start(f.project_id, f.user_id, Location::Home, 1_000)
        .await
        .unwrap();
    assert_eq!(started.id, Some(1));
    assert!(started.is_active());
    assert_eq!(started.duration(), 0);
    assert_eq!(started.notes.as_deref(), Some("Started - HOME"));

    let ended = f.work.end(f.user_id, 5_000, None).await.unwrap().unwrap();
    assert_eq!(ended.id, Some(1));
    assert_eq!(ended.end_work_time, Some(5_000));
    assert_eq!(ended.duration(), 4_000);
    assert_eq!(ended.notes.as_deref(), Some("Started - HOME | Ended"));

    let stored = f.work.get(1).await.unwrap().unwrap();
    assert_eq!(stored.end_work_time, Some(5_000));
    assert_eq!(stored.break_time, 0);
    assert!(WorkSession::active_for(&f.db, f.user_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_break_is_deducted() {
    let f = setup().await;

    f.work
        .start(f.project_id, f.user_id, Location::Office, 0)
        .await
        .unwrap();
    let ended = f
        .work
        .end(f.user_id, 3_600_000, Some(15))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ended.break_time, 15);
    assert_eq!(ended.duration(), 45 * 60_000);
    assert_eq!(ended.location(), Some(Location::Office));
}

#[tokio::test]
async fn test_negative_break_is_rejected() {
    let f = setup().await;

    f.work
        .start(f.project_id, f.user_id, Location::Home, 0)
        .await
        .unwrap();
    let err = f
        .work
        .end(f.user_id, 3_600_000, Some(-60))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NegativeBreak(-60)));

    let active = WorkSession::active_for(&f.db, f.user_id).await.unwrap().unwrap();
    assert_eq!(active.break_time, 0);
    assert_eq!(active.end_work_time, None);
}

#[tokio::test]
async fn test_end_before_start_is_rejected() {
    let f = setup().await;

    f.work
        .start(f.project_id, f.user_id, Location::Home, 10_000)
        .await
        .unwrap();
    let err = f.work.end(f.user_id, 1_000, None).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::EndBeforeStart {
            start: 10_000,
            end: 1_000,
            ..
        }
    ));

    let stored = f.work.get(1).await.unwrap().unwrap();
    assert!(stored.is_active());
    assert_eq!(stored.notes.as_deref(), Some("Started - HOME"));

    // Ending at the start instant is allowed
    let ended = f.work.end(f.user_id, 10_000, None).await.unwrap().unwrap();
    assert_eq!(ended.duration(), 0);
}

#[tokio::test]
async fn test_switch_before_start_is_rejected() {
    let f = setup().await;
    let other = add_project(&f.db, "Accounting", Location::Client).await;

    f.work
        .start(f.project_id, f.user_id, Location::Home, 10_000)
        .await
        .unwrap();
    let err = f
        .work
        .switch(f.user_id, other, Location::Client, 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::EndBeforeStart { .. }));

    let entries = f.work.by_user(f.user_id, None, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].session.project_id, f.project_id);
    assert!(entries[0].session.is_active());
}

#[tokio::test]
async fn test_end_without_active_session() {
    let f = setup().await;
    assert!(f.work.end(f.user_id, 5_000, None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_start_while_active_fails() {
    let f = setup().await;

    f.work
        .start(f.project_id, f.user_id, Location::Home, 1_000)
        .await
        .unwrap();
    let err = f
        .work
        .start(f.project_id, f.user_id, Location::Home, 2_000)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::ActiveSessionExists {
            session_id: 1,
            ..
        }
    ));
    assert_eq!(f.work.by_user(f.user_id, None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sequential_sessions() {
    let f = setup().await;

    f.work
        .start(f.project_id, f.user_id, Location::Home, 1_000)
        .await
        .unwrap();
    f.work.end(f.user_id, 2_000, None).await.unwrap();
    f.work
        .start(f.project_id, f.user_id, Location::Home, 3_000)
        .await
        .unwrap();

    let user = User::find(&f.db, f.user_id).await.unwrap().unwrap();
    let sessions = user.work_sessions(&f.db).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.iter().filter(|s| s.is_active()).count(), 1);

    let entries = f.work.by_user(f.user_id, None, None).await.unwrap();
    let starts: Vec<i64> = entries.iter().map(|e| e.session.start_work_time).collect();
    assert_eq!(starts, vec![3_000, 1_000]);
    assert_eq!(entries[0].project_name, "Website");
    assert_eq!(entries[0].project_location, Location::Home);
}

#[tokio::test]
async fn test_switch_closes_previous_session() {
    let f = setup().await;
    let other = add_project(&f.db, "Accounting", Location::Client).await;

    f.work
        .start(f.project_id, f.user_id, Location::Home, 1_000)
        .await
        .unwrap();
    let (ended, started) = f
        .work
        .switch(f.user_id, other, Location::Client, 9_000)
        .await
        .unwrap();

    let ended = ended.unwrap();
    assert_eq!(ended.end_work_time, Some(9_000));
    assert_eq!(ended.notes.as_deref(), Some("Started - HOME | Switched"));
    assert_eq!(started.start_work_time, 9_000);
    assert_eq!(started.project_id, other);
    assert_eq!(started.location(), Some(Location::Client));

    let active = f.work.active_for(f.user_id).await.unwrap().unwrap();
    assert_eq!(active.session.id, started.id);
    assert_eq!(active.project_name, "Accounting");

    let project = active.session.project(&f.db).await.unwrap().unwrap();
    assert_eq!(project.location, Location::Client);
}

#[tokio::test]
async fn test_switch_when_idle_just_starts() {
    let f = setup().await;

    let (ended, started) = f
        .work
        .switch(f.user_id, f.project_id, Location::Home, 1_000)
        .await
        .unwrap();

    assert!(ended.is_none());
    assert!(started.is_active());
    assert_eq!(f.work.by_user(f.user_id, None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_switch_keeps_previous_session_running() {
    let f = setup().await;

    f.work
        .start(f.project_id, f.user_id, Location::Home, 1_000)
        .await
        .unwrap();
    let err = f
        .work
        .switch(f.user_id, 999, Location::Home, 2_000)
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());

    let active = WorkSession::active_for(&f.db, f.user_id).await.unwrap().unwrap();
    assert_eq!(active.start_work_time, 1_000);
    assert_eq!(active.end_work_time, None);
}

#[tokio::test]
async fn test_store_rejects_second_active_session() {
    let f = setup().await;

    WorkSession::create(
        &f.db,
        WorkSession::start(f.project_id, f.user_id, Location::Home, 1_000),
    )
    .await
    .unwrap();
    let err = WorkSession::create(
        &f.db,
        WorkSession::start(f.project_id, f.user_id, Location::Home, 2_000),
    )
    .await
    .unwrap_err();

    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn test_users_track_independently() {
    let f = setup().await;
    let other = User::create(&f.db, User::new("John", "Roe", "john@x.com"))
        .await
        .unwrap()
        .id
        .unwrap();

    f.work
        .start(f.project_id, f.user_id, Location::Home, 1_000)
        .await
        .unwrap();
    f.work
        .start(f.project_id, other, Location::Office, 1_500)
        .await
        .unwrap();

    f.work.end(f.user_id, 2_000, None).await.unwrap();
    assert!(f.work.active_for(f.user_id).await.unwrap().is_none());
    assert!(f.work.active_for(other).await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_starts_leave_one_active() {
    let f = setup().await;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let work = WorkHoursRepository::new(f.db.clone());
            let (project_id, user_id) = (f.project_id, f.user_id);
            tokio::spawn(async move {
                work.start(project_id, user_id, Location::Home, 1_000 + i)
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(f.work.by_user(f.user_id, None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_report_for_day() {
    let f = setup().await;
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
    let (day_start, day_end) = local_day_bounds(date);
    let at = |h: u32| {
        Local
            .from_local_datetime(&date.and_hms_opt(h, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .timestamp_millis()
    };

    // Before the day, two during it, one still running, one after
    for (start, end) in [
        (day_start - 3_600_000, Some(day_start - 60_000)),
        (at(9), Some(at(11))),
        (at(13), Some(at(14))),
        (at(16), None),
        (day_end + 1, Some(day_end + 3_600_000)),
    ] {
        let mut session = WorkSession::start(f.project_id, f.user_id, Location::Home, start);
        session.end_work_time = end;
        WorkSession::create(&f.db, session).await.unwrap();
    }

    let report = f.work.report_for_day(f.user_id, date).await.unwrap();
    let starts: Vec<i64> = report
        .entries
        .iter()
        .map(|e| e.session.start_work_time)
        .collect();
    assert_eq!(starts, vec![at(16), at(13), at(9)]);
    assert_eq!(report.total_millis, 3 * 3_600_000);
    assert_eq!(report.active().unwrap().session.start_work_time, at(16));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["entries"][0]["project_name"], "Website");
    assert_eq!(json["entries"][0]["project_location"], "HOME");
}
