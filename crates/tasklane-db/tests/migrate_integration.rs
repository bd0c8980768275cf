use std::fs;
use std::path::Path;
use std::sync::Arc;

use tasklane_common::Error;
use tasklane_db::{
    Database, DirectorySource, EmbeddedSource, Migration, MigrationGenerator, Migrator, SeedRunner,
    Seeder, Template, UnitState,
};
use tempfile::TempDir;

const CREATE_USERS: &str = "\
-- description: create users table
-- up
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    email TEXT NOT NULL UNIQUE
);

-- down
DROP TABLE users;
";

/// Write a migration file into `dir`.
fn write_migration(dir: &Path, id: &str, up: &str, down: &str) {
    fs::create_dir_all(dir).expect("create migrations dir");
    fs::write(
        dir.join(format!("{id}.sql")),
        format!("-- up\n{up}\n-- down\n{down}\n"),
    )
    .expect("write migration");
}

/// A fresh on-disk database plus an empty migrations directory.
fn workspace() -> (TempDir, Arc<Database>) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db = Database::open(&tmp.path().join("tasklane.db")).expect("open db");
    (tmp, Arc::new(db))
}

fn directory_migrator(db: &Arc<Database>, dir: &Path) -> Migrator {
    Migrator::new(Arc::clone(db), Box::new(DirectorySource::new(dir)))
}

fn applied_ids(migrator: &Migrator) -> Vec<String> {
    migrator
        .list_applied()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

#[test]
fn users_table_round_trip_on_disk() {
    let (tmp, db) = workspace();
    let dir = tmp.path().join("migrations");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("0001_create_users.sql"), CREATE_USERS).unwrap();

    let migrator = directory_migrator(&db, &dir);
    let run = migrator.apply_pending().unwrap();
    assert_eq!(run.applied, vec!["0001_create_users"]);
    assert!(db.table_exists("users").unwrap());

    let records = migrator.list_applied().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "0001_create_users");
    assert_eq!(records[0].description, "create users table");

    let rollback = migrator.rollback_last().unwrap();
    assert_eq!(rollback.rolled_back.as_deref(), Some("0001_create_users"));
    assert!(!db.table_exists("users").unwrap());
    assert!(migrator.list_applied().unwrap().is_empty());
}

#[test]
fn applies_in_id_order_and_records_in_the_same_order() {
    let (tmp, db) = workspace();
    let dir = tmp.path().join("migrations");
    write_migration(&dir, "0003_c", "CREATE TABLE c (id INT);", "DROP TABLE c;");
    write_migration(&dir, "0001_a", "CREATE TABLE a (id INT);", "DROP TABLE a;");
    write_migration(&dir, "0002_b", "CREATE TABLE b (id INT);", "DROP TABLE b;");

    let migrator = directory_migrator(&db, &dir);
    let run = migrator.apply_pending().unwrap();
    assert_eq!(run.applied, vec!["0001_a", "0002_b", "0003_c"]);
    assert_eq!(applied_ids(&migrator), vec!["0001_a", "0002_b", "0003_c"]);

    let again = migrator.apply_pending().unwrap();
    assert!(again.applied.is_empty());
    assert_eq!(again.skipped_count, 3);
    assert_eq!(migrator.list_applied().unwrap().len(), 3);
}

#[test]
fn failure_stops_the_run_and_names_the_unit() {
    let (tmp, db) = workspace();
    let dir = tmp.path().join("migrations");
    write_migration(&dir, "0001_ok", "CREATE TABLE ok (id INT);", "DROP TABLE ok;");
    write_migration(
        &dir,
        "0002_broken",
        "CREATE TABLE half (id INT);\nINSERT INTO nowhere VALUES (1);",
        "DROP TABLE half;",
    );
    write_migration(&dir, "0003_later", "CREATE TABLE later (id INT);", "DROP TABLE later;");

    let migrator = directory_migrator(&db, &dir);
    let err = migrator.apply_pending().unwrap_err();
    assert!(matches!(err, Error::Migration { ref id, .. } if id == "0002_broken"));

    assert_eq!(applied_ids(&migrator), vec!["0001_ok"]);
    assert!(db.table_exists("ok").unwrap());
    assert!(!db.table_exists("half").unwrap());
    assert!(!db.table_exists("later").unwrap());

    // Fixing the file lets the next run pick up where it stopped.
    write_migration(&dir, "0002_broken", "CREATE TABLE half (id INT);", "DROP TABLE half;");
    let run = migrator.apply_pending().unwrap();
    assert_eq!(run.applied, vec!["0002_broken", "0003_later"]);
}

#[test]
fn rollback_with_deleted_source_file_is_drift() {
    let (tmp, db) = workspace();
    let dir = tmp.path().join("migrations");
    write_migration(&dir, "0001_a", "CREATE TABLE a (id INT);", "DROP TABLE a;");
    write_migration(&dir, "0002_b", "CREATE TABLE b (id INT);", "DROP TABLE b;");

    let migrator = directory_migrator(&db, &dir);
    migrator.apply_pending().unwrap();
    fs::remove_file(dir.join("0002_b.sql")).unwrap();

    let err = migrator.rollback_last().unwrap_err();
    assert!(err.is_drift());
    assert!(db.table_exists("b").unwrap());
    assert_eq!(applied_ids(&migrator), vec!["0001_a", "0002_b"]);

    let status = migrator.status().unwrap();
    assert_eq!(status.drifted.len(), 1);
    assert_eq!(status.drifted[0].id, "0002_b");
}

#[test]
fn rollback_on_fresh_database_touches_nothing() {
    let (tmp, db) = workspace();
    let migrator = directory_migrator(&db, &tmp.path().join("migrations"));

    let result = migrator.rollback_last().unwrap();
    assert!(result.rolled_back.is_none());
    assert!(db.list_tables().unwrap().is_empty());
}

#[test]
fn state_survives_reopening_the_database() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("tasklane.db");
    let dir = tmp.path().join("migrations");
    write_migration(&dir, "0001_a", "CREATE TABLE a (id INT);", "DROP TABLE a;");

    {
        let db = Arc::new(Database::open(&path).unwrap());
        directory_migrator(&db, &dir).apply_pending().unwrap();
        Arc::try_unwrap(db).ok().unwrap().close().unwrap();
    }

    write_migration(&dir, "0002_b", "CREATE TABLE b (id INT);", "DROP TABLE b;");
    let db = Arc::new(Database::open(&path).unwrap());
    let migrator = directory_migrator(&db, &dir);
    let pending: Vec<String> = migrator
        .pending()
        .unwrap()
        .iter()
        .map(|u| u.id().to_string())
        .collect();
    assert_eq!(pending, vec!["0002_b"]);
}

#[test]
fn generated_migrations_are_discovered_and_applied() {
    let (tmp, db) = workspace();
    let dir = tmp.path().join("migrations");
    let generator = MigrationGenerator::new(&dir);
    generator
        .generate("create posts table", Template::CreateTable)
        .unwrap();

    let migrator = directory_migrator(&db, &dir);
    let status = migrator.status().unwrap();
    assert_eq!(status.pending_count(), 1);

    migrator.apply_pending().unwrap();
    assert!(db.table_exists("posts").unwrap());
    let status = migrator.status().unwrap();
    assert_eq!(status.applied_count(), 1);
    assert!(matches!(status.units[0].state, UnitState::Applied { .. }));
}

#[test]
fn generated_tables_named_after_keywords_apply_and_revert() {
    let (tmp, db) = workspace();
    let dir = tmp.path().join("migrations");
    let generator = MigrationGenerator::new(&dir);
    for name in ["create table", "2fa codes", "create order table"] {
        generator.generate(name, Template::CreateTable).unwrap();
    }

    let migrator = directory_migrator(&db, &dir);
    assert_eq!(migrator.apply_pending().unwrap().applied.len(), 3);
    for table in ["table", "2fa_codes", "order"] {
        assert!(db.table_exists(table).unwrap(), "{table} missing");
    }

    for _ in 0..3 {
        assert!(migrator.rollback_last().unwrap().rolled_back.is_some());
    }
    assert_eq!(db.list_tables().unwrap(), vec!["migrations".to_string()]);
}

#[test]
fn builtin_schema_and_seeders_on_disk() {
    let (_tmp, db) = workspace();
    let migrator = Migrator::new(Arc::clone(&db), Box::new(EmbeddedSource::builtin()));
    assert_eq!(migrator.apply_pending().unwrap().applied.len(), 6);

    let seeders: Vec<Box<dyn Seeder>> = vec![
        Box::new(tasklane_db::seeds::ProfilesSeeder),
        Box::new(tasklane_db::seeds::UsersSeeder::default().with_iterations(1)),
        Box::new(tasklane_db::seeds::ListsTasksSubtasksSeeder),
    ];
    let runner = SeedRunner::new(Arc::clone(&db), seeders);
    assert_eq!(runner.run_all().unwrap().executed.len(), 3);
    assert_eq!(runner.run_all().unwrap().skipped.len(), 3);

    // The seeders table is owned by a migration; the runner reuses it.
    let records = runner.executed().unwrap();
    assert_eq!(records[0].name, "profiles_seeder");
    assert_eq!(
        records[0].description.as_deref(),
        Some("Create default user profiles")
    );
}
