//! Save protocol: backup, temp-file hygiene, and lock interaction.

mod common;

use common::TestProject;
use std::fs;
use tui_wbs::commands::{Command, CommandLog};
use tui_wbs::lock::{ProjectLock, lock_path};
use tui_wbs::models::{Status, WarningKind};
use tui_wbs::writer::{backup_path, write_project};
use tui_wbs::Error;

fn edit_and_save(fixture: &TestProject) -> tui_wbs::Result<()> {
    let mut project = fixture.parse();
    let (lock, _) = ProjectLock::acquire(fixture.path())?;
    project.lock = Some(lock);
    let a = project.find_by_title("A").unwrap().id;
    let mut log = CommandLog::new();
    log.apply(
        &mut project,
        Command::SetStatus {
            id: a,
            status: Status::Done,
        },
    )?;
    write_project(&mut project)?;
    if let Some(lock) = project.lock.take() {
        lock.release()?;
    }
    Ok(())
}

#[test]
fn save_writes_backup_of_presave_bytes_and_no_tmp() {
    let fixture = TestProject::new();
    let original = "# A\n<!-- status: TODO -->\nbody\n";
    let path = fixture.write_file("plan.wbs.md", original);

    edit_and_save(&fixture).unwrap();

    assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), original);
    assert!(fixture.read_file("plan.wbs.md").contains("status: DONE"));

    let stray_tmp = fs::read_dir(fixture.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().ends_with(".tmp"));
    assert!(!stray_tmp);
}

#[test]
fn second_save_overwrites_previous_backup() {
    let fixture = TestProject::new();
    let path = fixture.write_file("plan.wbs.md", "# A\n");

    edit_and_save(&fixture).unwrap();
    let after_first = fixture.read_file("plan.wbs.md");

    let mut project = fixture.parse();
    let a = project.find_by_title("A").unwrap().id;
    let mut log = CommandLog::new();
    log.apply(
        &mut project,
        Command::SetField {
            id: a,
            field: "assignee".to_string(),
            value: "kim".to_string(),
        },
    )
    .unwrap();
    write_project(&mut project).unwrap();

    assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), after_first);
}

#[test]
fn save_aborts_with_lock_lost_when_lock_taken_over() {
    let fixture = TestProject::new();
    fixture.write_file("plan.wbs.md", "# A\nbody\n");

    let mut project = fixture.parse();
    let (lock, _) = ProjectLock::acquire(fixture.path()).unwrap();
    project.lock = Some(lock);

    let a = project.find_by_title("A").unwrap().id;
    let mut log = CommandLog::new();
    log.apply(
        &mut project,
        Command::SetStatus {
            id: a,
            status: Status::Done,
        },
    )
    .unwrap();

    // Another process replaces the lock file.
    fs::write(
        lock_path(fixture.path()),
        format!("{}\n{}\n", 1, chrono::Local::now().to_rfc3339()),
    )
    .unwrap();

    assert!(matches!(write_project(&mut project), Err(Error::LockLost)));
    // Nothing was written: the file keeps its pre-edit bytes.
    assert_eq!(fixture.read_file("plan.wbs.md"), "# A\nbody\n");
    assert!(project.is_modified());
}

#[test]
fn stale_lock_from_dead_process_is_taken_over() {
    let fixture = TestProject::new();
    fixture.write_file("plan.wbs.md", "# A\n");

    let lock_file = lock_path(fixture.path());
    fs::create_dir_all(lock_file.parent().unwrap()).unwrap();
    let ten_minutes_ago = chrono::Local::now() - chrono::Duration::minutes(10);
    fs::write(
        &lock_file,
        format!("{}\n{}\n", 3_999_999u32, ten_minutes_ago.to_rfc3339()),
    )
    .unwrap();

    let (lock, warning) = ProjectLock::acquire(fixture.path()).unwrap();
    let warning = warning.unwrap();
    assert_eq!(warning.kind, WarningKind::StaleLockTakenOver);

    // The takeover proceeds to a normal save.
    let mut project = fixture.parse();
    project.lock = Some(lock);
    let a = project.find_by_title("A").unwrap().id;
    let mut log = CommandLog::new();
    log.apply(
        &mut project,
        Command::SetStatus {
            id: a,
            status: Status::Done,
        },
    )
    .unwrap();
    write_project(&mut project).unwrap();
    assert!(fixture.read_file("plan.wbs.md").contains("status: DONE"));
}

#[test]
fn live_foreign_lock_blocks_acquisition() {
    let fixture = TestProject::new();
    let lock_file = lock_path(fixture.path());
    fs::create_dir_all(lock_file.parent().unwrap()).unwrap();
    fs::write(
        &lock_file,
        format!("{}\n{}\n", 1, chrono::Local::now().to_rfc3339()),
    )
    .unwrap();

    match ProjectLock::acquire(fixture.path()) {
        Err(Error::Locked { pid }) => assert_eq!(pid, 1),
        other => panic!("expected Locked, got {:?}", other.map(|_| ())),
    }
}
