//! Integration tests for the flightbook-sqlite crate.

use std::ops::ControlFlow;

use chrono::{NaiveDate, NaiveDateTime};
use flightbook_core::{
    ColumnInfo, Depth, Entity, Property, Schema, SchemaError, TableInfo, Value, flightlog,
};
use flightbook_db::{DatabaseError, Store, StoreConfig};
use flightbook_sqlite::{IN_MEMORY, Migration, SqliteAdapter, create_store};
use rusqlite::Connection;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn memory_store() -> Store<SqliteAdapter> {
    create_store(StoreConfig::new(IN_MEMORY), flightlog::schema()).unwrap()
}

fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
    raw.iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
}

fn keep_going(_: &flightbook_db::ImportReport) -> ControlFlow<()> {
    ControlFlow::Continue(())
}

fn at(date: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Two pilots (the second entered twice), two gliders and three flights.
fn seeded_store() -> Store<SqliteAdapter> {
    let mut store = memory_store();
    store
        .import(
            "people",
            &["last_name", "first_name", "count", "birthday", "email"],
            rows(&[
                &["Meier", "Hans", "0", "1970-04-02", ""],
                &["Huber", "Anna", "0", "", "anna@example.org"],
                &["Meier", "Hans", "1", "", ""],
            ]),
            false,
            keep_going,
        )
        .unwrap();
    store
        .import(
            "vehicles",
            &["registration", "model", "seats"],
            rows(&[&["D-KXYZ", "ASK 21", "2"], &["D-1234", "Ka 8", "1"]]),
            false,
            keep_going,
        )
        .unwrap();
    store
        .import(
            "missions",
            &["date", "vehicle", "departure", "pilot", "copilot", "launch"],
            rows(&[
                &["2024-06-01", "1", "2024-06-01 09:30:00", "1", "2", "0"],
                &["2024-06-01", "2", "2024-06-01 09:30:00", "3", "", ""],
                &["2024-06-02", "1", "2024-06-02 11:00:00", "2", "3", "1"],
            ]),
            false,
            keep_going,
        )
        .unwrap();
    store
}

// ---------------------------------------------------------------------------
// Flight-log scenario
// ---------------------------------------------------------------------------

#[test]
fn test_flightlog_schema_creation() {
    let mut store = memory_store();
    assert_eq!(store.count("missions", None, &[]).unwrap(), 0);

    let created = store.create_schema(false).unwrap();
    assert_eq!(created.len(), 4);
    let position = |name: &str| created.iter().position(|t| t == name).unwrap();
    assert!(position("people") < position("person_properties"));
    assert!(position("people") < position("missions"));
    assert!(position("vehicles") < position("missions"));

    let deps = store.schema().dependencies("people").unwrap();
    let from_missions: Vec<&str> = deps
        .iter()
        .filter(|d| d.table == "missions")
        .map(|d| d.foreign_column.as_str())
        .collect();
    assert_eq!(from_missions, flightlog::CREW_COLUMNS);
    assert!(deps
        .iter()
        .any(|d| d.table == "person_properties" && d.foreign_column == "person"));
}

#[test]
fn test_import_and_select_coerces_types() {
    let store = seeded_store();
    assert_eq!(store.count("people", None, &[]).unwrap(), 3);

    let missions = store
        .select("missions", None, Some("\"id\""), &[])
        .unwrap();
    assert_eq!(missions.len(), 3);
    assert_eq!(
        missions[0].get("date"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()))
    );
    assert_eq!(
        missions[0].get("departure"),
        Some(&Value::DateTime(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        ))
    );
    // A zero launch reference is stored as null.
    assert_eq!(missions[0].get("launch"), Some(&Value::Null));
    assert_eq!(missions[2].get("launch"), Some(&Value::Integer(1)));
    assert_eq!(missions[0].get("landings"), Some(&Value::Integer(1)));
}

#[test]
fn test_reimport_skips_existing_rows() {
    let mut store = seeded_store();
    let report = store
        .import(
            "vehicles",
            &["registration", "model"],
            rows(&[&["D-KXYZ", "ASK 21 Mi"], &["D-5678", "LS 4"]]),
            false,
            keep_going,
        )
        .unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);

    let kept = store
        .find_one("vehicles", "\"registration\" = ?", &[Value::from("D-KXYZ")])
        .unwrap();
    assert_eq!(kept.get("model"), Some(&Value::from("ASK 21")));
}

#[test]
fn test_forced_import_replaces_rows() {
    let mut store = memory_store();
    for (model, force) in [("Ka 8", false), ("Ka 8b", true)] {
        store
            .import(
                "vehicles",
                &["registration", "model"],
                rows(&[&["D-1234", model]]),
                force,
                keep_going,
            )
            .unwrap();
    }
    assert_eq!(store.count("vehicles", None, &[]).unwrap(), 1);
    let row = store
        .find_one("vehicles", "\"registration\" = ?", &[Value::from("D-1234")])
        .unwrap();
    assert_eq!(row.get("model"), Some(&Value::from("Ka 8b")));
}

// ---------------------------------------------------------------------------
// Entities and properties
// ---------------------------------------------------------------------------

#[test]
fn test_save_lookup_and_resolve_id() {
    let mut store = seeded_store();
    let mut pilot = Entity::new(&flightlog::PERSON)
        .with("last_name", "Berger")
        .with("first_name", "Eva")
        .with("count", 0)
        .with("birthday", NaiveDate::from_ymd_opt(1985, 1, 20).unwrap());
    let id = store.save(&mut pilot, false).unwrap();
    assert_eq!(id, 4);
    assert_eq!(pilot.id(), Some(4));

    // Saving the same natural key again keeps the stored row.
    let mut again = Entity::new(&flightlog::PERSON)
        .with("last_name", "Berger")
        .with("first_name", "Eva")
        .with("count", 0);
    assert_eq!(store.save(&mut again, false).unwrap(), 4);
    assert_eq!(store.count("people", None, &[]).unwrap(), 4);

    let stored = store.lookup(&again).unwrap();
    assert_eq!(
        stored.get("birthday"),
        &Value::Date(NaiveDate::from_ymd_opt(1985, 1, 20).unwrap())
    );
    assert_eq!(stored, pilot);

    let mut anna = Entity::new(&flightlog::PERSON)
        .with("last_name", "Huber")
        .with("first_name", "Anna")
        .with("count", 0);
    assert_eq!(store.resolve_id(&mut anna).unwrap(), 2);
}

#[test]
fn test_ignored_save_without_key_leaves_other_people_alone() {
    let mut store = seeded_store();
    let mut hans = Entity::new(&flightlog::PERSON)
        .with("last_name", "Meier")
        .with("first_name", "Hans")
        .with("count", 1);
    assert_eq!(store.resolve_id(&mut hans).unwrap(), 3);
    Property::new("licence", "SPL").add_to(&mut hans).unwrap();
    store.save_properties(&hans).unwrap();

    // No first name: the NOT NULL column makes the insert a no-op.
    let mut ghost = Entity::new(&flightlog::PERSON).with("last_name", "Ghost");
    Property::new("medical", "class 2").add_to(&mut ghost).unwrap();
    assert!(matches!(
        store.save(&mut ghost, false),
        Err(DatabaseError::Schema(SchemaError::IncompleteRecord { .. }))
    ));
    assert_eq!(ghost.id(), None);
    assert_eq!(store.count("people", None, &[]).unwrap(), 3);

    let row = store
        .find_one("person_properties", "\"person\" = ?", &[Value::Integer(3)])
        .unwrap();
    assert_eq!(row.get("kind"), Some(&Value::from("licence")));
}

#[test]
fn test_lookup_needs_complete_key() {
    let store = seeded_store();
    let partial = Entity::new(&flightlog::PERSON).with("last_name", "Meier");
    assert!(matches!(
        store.lookup(&partial),
        Err(DatabaseError::Schema(SchemaError::IncompleteRecord { .. }))
    ));
}

#[test]
fn test_properties_round_trip() {
    let mut store = seeded_store();
    let mut pilot = Entity::new(&flightlog::PERSON)
        .with("last_name", "Huber")
        .with("first_name", "Anna")
        .with("count", 0);
    store.resolve_id(&mut pilot).unwrap();

    Property::new("licence", "SPL")
        .with_validity(Some(at("2023-01-01")), Some(at("2024-01-01")))
        .add_to(&mut pilot)
        .unwrap();
    Property::new("licence", "SPL")
        .with_validity(Some(at("2024-01-01")), None)
        .add_to(&mut pilot)
        .unwrap();
    Property::new("membership", "LSV").add_to(&mut pilot).unwrap();
    assert_eq!(store.save_properties(&pilot).unwrap(), 3);
    assert_eq!(store.count("person_properties", None, &[]).unwrap(), 3);

    let mut loaded = store.lookup(&pilot).unwrap();
    assert_eq!(store.load_properties(&mut loaded).unwrap(), 3);

    let current = Property::get_from(&loaded, "licence", Some(at("2024-06-01"))).unwrap();
    assert_eq!(current.valid_until, NaiveDateTime::MAX);
    assert_eq!(current.owner(), Some(2));
    assert!(matches!(
        Property::get_from(&loaded, "licence", None),
        Err(SchemaError::AmbiguousLookup { count: 2, .. })
    ));
    assert!(matches!(
        Property::get_from(&loaded, "medical", None),
        Err(SchemaError::NotFound(_))
    ));

    // Saving again rewrites instead of appending.
    Property::discard_from(&mut loaded, "membership", None);
    assert_eq!(store.save_properties(&loaded).unwrap(), 2);
    assert_eq!(store.count("person_properties", None, &[]).unwrap(), 2);
}

#[test]
fn test_save_writes_properties() {
    let mut store = seeded_store();
    let mut pilot = Entity::new(&flightlog::PERSON)
        .with("last_name", "Berger")
        .with("first_name", "Eva")
        .with("count", 0);
    Property::new("medical", "class 2")
        .add_to(&mut pilot)
        .unwrap();
    let id = store.save(&mut pilot, false).unwrap();

    let row = store
        .find_one("person_properties", "\"person\" = ?", &[Value::Integer(id)])
        .unwrap();
    assert_eq!(row.get("kind"), Some(&Value::from("medical")));
    assert_eq!(row.get("valid_from"), Some(&Value::Null));
    assert_eq!(row.get("valid_until"), Some(&Value::Null));
}

// ---------------------------------------------------------------------------
// Joins
// ---------------------------------------------------------------------------

#[test]
fn test_select_join_flattens_references() {
    let store = seeded_store();
    let rows = store
        .select_join("missions", Some(Depth::Limited(1)))
        .unwrap();
    assert_eq!(rows.len(), 3);

    let first = rows
        .iter()
        .find(|r| r.get("id") == Some(&Value::Integer(1)))
        .unwrap();
    assert_eq!(first.get("pilot.last_name"), Some(&Value::from("Meier")));
    assert_eq!(first.get("copilot.first_name"), Some(&Value::from("Anna")));
    assert_eq!(first.get("vehicle.registration"), Some(&Value::from("D-KXYZ")));
    assert_eq!(
        first.get("pilot.birthday"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(1970, 4, 2).unwrap()))
    );
    // Missing references join to nulls.
    assert_eq!(first.get("passenger.last_name"), Some(&Value::Null));
    assert_eq!(first.get("launch.date"), Some(&Value::Null));
}

#[test]
fn test_select_join_follows_self_reference() {
    let store = seeded_store();
    let rows = store.select_join("missions", None).unwrap();
    let third = rows
        .iter()
        .find(|r| r.get("id") == Some(&Value::Integer(3)))
        .unwrap();
    assert_eq!(third.get("launch.pilot.last_name"), Some(&Value::from("Meier")));
}

#[test]
fn test_select_join_unbounded_cycle() {
    let store = seeded_store();
    assert!(matches!(
        store.select_join("missions", Some(Depth::Unlimited)),
        Err(DatabaseError::Schema(SchemaError::UnboundedTraversal(_)))
    ));
}

// ---------------------------------------------------------------------------
// Replace
// ---------------------------------------------------------------------------

#[test]
fn test_replace_merges_duplicates() {
    let mut store = seeded_store();
    let filter = "\"last_name\" = ? AND \"first_name\" = ?";
    let params = [Value::from("Meier"), Value::from("Hans")];

    let report = store
        .atomically(|s| s.replace("people", filter, &params, 1))
        .unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.deleted, 1);
    // pilot of mission 2, copilot of mission 3
    assert_eq!(report.rewritten, 2);

    assert_eq!(store.count("people", None, &[]).unwrap(), 2);
    let references = store
        .count(
            "missions",
            Some("\"pilot\" = ? OR \"copilot\" = ?"),
            &[Value::Integer(3), Value::Integer(3)],
        )
        .unwrap();
    assert_eq!(references, 0);
    let flights = store
        .count(
            "missions",
            Some("\"pilot\" = ? OR \"copilot\" = ?"),
            &[Value::Integer(1), Value::Integer(1)],
        )
        .unwrap();
    assert_eq!(flights, 3);

    let second = store.replace("people", filter, &params, 1).unwrap();
    assert_eq!(second.matched, 0);
    assert!(second.is_noop());
}

#[test]
fn test_replace_rolls_back_on_integrity_violation() {
    let mut store = seeded_store();
    // Retargeting D-1234's flight onto D-KXYZ collides with the first
    // flight's date and departure.
    let err = store
        .atomically(|s| {
            s.replace(
                "vehicles",
                "\"registration\" = ?",
                &[Value::from("D-1234")],
                1,
            )
        })
        .unwrap_err();
    assert!(matches!(err, DatabaseError::IntegrityViolation(_)), "{err}");

    assert_eq!(store.count("vehicles", None, &[]).unwrap(), 2);
    assert_eq!(
        store
            .count("missions", Some("\"vehicle\" = ?"), &[Value::Integer(2)])
            .unwrap(),
        1
    );
}

#[test]
fn test_replace_unknown_canonical_row() {
    let mut store = seeded_store();
    let err = store
        .replace("people", "\"last_name\" = ?", &[Value::from("Meier")], 99)
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Schema(SchemaError::NotFound(_))));
    assert_eq!(store.count("people", None, &[]).unwrap(), 3);
}

// ---------------------------------------------------------------------------
// File-backed stores
// ---------------------------------------------------------------------------

#[test]
fn test_create_store_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flights.db");
    let config = StoreConfig::new(path.to_string_lossy());

    let mut store = create_store(config.clone(), flightlog::schema()).unwrap();
    store
        .import(
            "vehicles",
            &["registration"],
            rows(&[&["D-KXYZ"]]),
            false,
            keep_going,
        )
        .unwrap();
    store.close().unwrap();
    assert!(path.exists());

    let store = Store::open(SqliteAdapter::new(), config, None).unwrap();
    assert_eq!(store.schema().len(), 4);
    assert!(store.schema().sorted_tables().is_ok());
    assert_eq!(store.count("vehicles", None, &[]).unwrap(), 1);
    assert!(store
        .schema()
        .table("missions")
        .unwrap()
        .is_self_referencing());
}

fn broken_schema() -> Schema {
    let mut hangars = TableInfo::new("hangars");
    hangars
        .add_column(ColumnInfo::new("id", "INTEGER"))
        .unwrap();
    let mut doors = TableInfo::new("door list");
    doors
        .add_column(ColumnInfo::new("hangar", "INTEGER").references("hangars(id)").unwrap())
        .unwrap();
    [hangars, doors].into_iter().collect()
}

#[test]
fn test_create_store_removes_file_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.db");
    let config = StoreConfig::new(path.to_string_lossy());

    assert!(create_store(config, broken_schema()).is_err());
    assert!(!path.exists());
}

#[test]
fn test_create_store_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("existing.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE notes (body TEXT);")
        .unwrap();
    let config = StoreConfig::new(path.to_string_lossy());

    assert!(create_store(config, broken_schema()).is_err());
    assert!(path.exists());

    let conn = Connection::open(&path).unwrap();
    let hangars: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'hangars'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hangars, 0);
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

#[test]
fn test_migration_then_store_introspection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("migrated.db");

    let mut migration = Migration::new(Connection::open(&path).unwrap(), flightlog::schema()).unwrap();
    migration.up().unwrap();
    assert!(migration.status().unwrap().tables_exist);
    drop(migration.into_connection());

    let store = Store::open(
        SqliteAdapter::new(),
        StoreConfig::new(path.to_string_lossy()),
        None,
    )
    .unwrap();
    let people = store.schema().table("people").unwrap();
    assert_eq!(people.id_column().map(ColumnInfo::name), Some("id"));
    assert!(people.index("people_name").unwrap().is_unique());
    let deps = store.schema().dependencies("vehicles").unwrap();
    assert_eq!(deps.len(), 2);
}
