use modelstore_core::db::migrations::latest_version;
use modelstore_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "instances");
    assert_table_exists(&conn, "attribute_values");
    assert_table_exists(&conn, "reference_links");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modelstore.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "reference_links");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn deleting_an_instance_cascades_its_values_and_outgoing_links() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO instances (entity_type, id, version, created_by, updated_by, updated_at)
         VALUES ('Order', '1', 1, 'u', 'u', '2024-01-01T00:00:00.000Z');
         INSERT INTO attribute_values (entity_type, instance_id, attribute, position, sql_type, value)
         VALUES ('Order', '1', 'code', 0, 'TEXT', 'A-1');
         INSERT INTO reference_links (source_type, source_id, feature, target_type, target_id, containment)
         VALUES ('Order', '1', 'customer', 'Customer', '7', 0);
         DELETE FROM instances WHERE entity_type = 'Order' AND id = '1';",
    )
    .unwrap();

    assert_eq!(count(&conn, "attribute_values"), 0);
    assert_eq!(count(&conn, "reference_links"), 0);
}

#[test]
fn containment_flag_is_constrained_to_boolean() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO instances (entity_type, id, version, created_by, updated_by, updated_at)
         VALUES ('Order', '1', 1, 'u', 'u', '2024-01-01T00:00:00.000Z');",
    )
    .unwrap();

    let result = conn.execute_batch(
        "INSERT INTO reference_links (source_type, source_id, feature, target_type, target_id, containment)
         VALUES ('Order', '1', 'lines', 'Line', '2', 2);",
    );
    assert!(result.is_err());
}

fn count(conn: &Connection, table_name: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table_name};"), [], |row| row.get(0))
        .unwrap()
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
