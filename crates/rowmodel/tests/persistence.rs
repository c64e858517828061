mod support;

use rowmodel::prelude::*;
use rowmodel::{ExecuteResult, MappingError};
use support::{Author, Country, memory_db, scripted_db};

#[test]
fn test_insert_then_noop_save() {
    let (db, conn) = memory_db();
    let mut author = Author::named("Ada");

    assert!(author.save(&db).unwrap());
    assert!(author.is_persisted());
    assert_eq!(author.id().unwrap(), Value::BigInt(1));
    assert_eq!(
        conn.statements(),
        vec!["INSERT INTO authors (name) VALUES (?)".to_string()]
    );

    conn.clear_statements();
    assert!(author.save(&db).unwrap());
    assert!(conn.statements().is_empty());
}

#[test]
fn test_save_leaves_attributes_clean() {
    let (db, _conn) = memory_db();
    let mut author = Author::named("Ada");
    author.email.write(Some("ada@example.com".to_string()));

    author.save(&db).unwrap();

    assert!(!author.id.has_been_modified());
    assert!(!author.name.has_been_modified());
    assert!(!author.email.has_been_modified());
    assert_eq!(author.name.original(), "Ada");
}

#[test]
fn test_update_names_only_modified_columns() {
    let (db, conn) = scripted_db();
    conn.push_result(ExecuteResult::affected(1).with_generated_key(Value::BigInt(7)));

    let mut author = Author::named("Ada");
    author.save(&db).unwrap();
    assert_eq!(*author.id.read(), Some(7));

    author.email.write(Some("ada@example.com".to_string()));
    assert!(author.save(&db).unwrap());

    let calls = conn.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].sql, "UPDATE authors SET email = ? WHERE id = ?");
    assert_eq!(
        calls[1].params,
        vec![Value::Text("ada@example.com".to_string()), Value::BigInt(7)]
    );
    assert!(!author.email.has_been_modified());
}

#[test]
fn test_update_binds_last_persisted_key() {
    let (db, conn) = memory_db();
    let mut country = Country::new("FR", "France", 68_000_000);
    country.save(&db).unwrap();

    country.code.write("FX");
    country.name.write("Metropolitan France");
    assert!(country.save(&db).unwrap());

    assert_eq!(
        conn.statements().last().map(String::as_str),
        Some("UPDATE countries SET code = ?, name = ? WHERE code = ?")
    );
    let rows = conn.rows("countries");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("code"), Some(&Value::Text("FX".to_string())));

    // The new key is now the persisted one.
    country.population.write(1_i64);
    assert!(country.save(&db).unwrap());
    assert_eq!(
        conn.rows("countries")[0].get("population"),
        Some(&Value::BigInt(1))
    );
}

#[test]
fn test_natural_key_is_always_inserted() {
    let (db, conn) = memory_db();
    let mut country = Country::default();
    country.name.write("Nowhere");
    country.population.write(3_i64);

    assert!(country.save(&db).unwrap());
    assert_eq!(
        conn.statements(),
        vec!["INSERT INTO countries (code, name, population) VALUES (?, ?, ?)".to_string()]
    );
}

#[test]
fn test_user_assigned_auto_key_is_inserted() {
    let (db, conn) = memory_db();
    let mut author = Author::named("Ada");
    author.id.write(Some(42));

    author.save(&db).unwrap();

    assert_eq!(
        conn.statements(),
        vec!["INSERT INTO authors (id, name) VALUES (?, ?)".to_string()]
    );
    assert_eq!(author.id().unwrap(), Value::BigInt(42));
}

#[test]
fn test_destroy_then_save_inserts_again() {
    let (db, conn) = memory_db();
    let mut country = Country::new("PE", "Peru", 34_000_000);
    country.save(&db).unwrap();

    assert!(country.destroy(&db).unwrap());
    assert!(!country.is_persisted());
    assert!(country.code.has_been_modified());
    assert!(country.name.has_been_modified());
    assert_eq!(conn.row_count("countries"), 0);

    conn.clear_statements();
    assert!(country.save(&db).unwrap());
    assert_eq!(
        conn.statements(),
        vec!["INSERT INTO countries (code, name, population) VALUES (?, ?, ?)".to_string()]
    );
    assert_eq!(conn.row_count("countries"), 1);
}

#[test]
fn test_destroy_is_idempotent() {
    let (db, conn) = memory_db();
    let mut country = Country::new("CL", "Chile", 19_000_000);
    country.save(&db).unwrap();

    assert!(country.destroy(&db).unwrap());
    assert!(!country.destroy(&db).unwrap());
    assert!(!country.is_persisted());
    assert_eq!(conn.row_count("countries"), 0);
}

#[test]
fn test_destroy_binds_persisted_key() {
    let (db, conn) = memory_db();
    let mut country = Country::new("BO", "Bolivia", 12_000_000);
    country.save(&db).unwrap();
    country.code.write("XX");

    assert!(country.destroy(&db).unwrap());
    assert_eq!(conn.row_count("countries"), 0);
}

#[test]
fn test_zero_affected_insert_keeps_instance_new() {
    let (db, conn) = scripted_db();
    conn.push_affected(0);

    let mut author = Author::named("Ada");
    assert!(!author.save(&db).unwrap());
    assert!(!author.is_persisted());
    assert!(author.name.has_been_modified());
}

#[test]
fn test_stale_update_returns_false() {
    let (db, conn) = scripted_db();
    conn.push_result(ExecuteResult::affected(1).with_generated_key(Value::BigInt(1)));
    conn.push_affected(0);

    let mut author = Author::named("Ada");
    author.save(&db).unwrap();
    author.name.write("Grace");

    assert!(!author.save(&db).unwrap());
    assert!(author.is_persisted());
    assert!(author.name.has_been_modified());
}

#[test]
fn test_constraint_violation_leaves_state_untouched() {
    let (db, _conn) = memory_db();
    let mut first = Country::new("AR", "Argentina", 46_000_000);
    first.save(&db).unwrap();

    let mut second = Country::new("AR", "Also Argentina", 1);
    let err = second.save(&db).unwrap_err();

    assert!(err.is_constraint_violation());
    assert!(!second.is_persisted());
    assert!(second.code.has_been_modified());
    assert!(second.name.has_been_modified());
}

#[test]
fn test_connection_error_propagates() {
    let (db, conn) = scripted_db();
    conn.push_error(Error::Connection(rowmodel::ConnectionError::new(
        rowmodel::ConnectionErrorKind::Disconnected,
        "socket closed",
    )));

    let mut author = Author::named("Ada");
    let err = author.save(&db).unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert!(!author.is_persisted());
}

#[test]
fn test_empty_update_policy_execute() {
    let conn = MemoryConnection::new();
    let db = Database::new(conn.clone(), GenericDialect)
        .with_config(DatabaseConfig::new().empty_update(EmptyUpdatePolicy::Execute));

    let mut author = Author::named("Ada");
    author.save(&db).unwrap();
    conn.clear_statements();

    assert!(author.save(&db).unwrap());
    assert_eq!(
        conn.statements(),
        vec!["UPDATE authors SET id = ? WHERE id = ?".to_string()]
    );
}

#[test]
fn test_writing_original_back_is_not_modified() {
    let (db, conn) = memory_db();
    let mut author = Author::named("Ada");
    author.save(&db).unwrap();
    conn.clear_statements();

    author.name.write("Grace");
    author.name.write("Ada");
    assert!(!author.name.has_been_modified());
    assert!(author.save(&db).unwrap());
    assert!(conn.statements().is_empty());
}

#[derive(Debug, Default, Entity)]
struct Broken {
    #[column(primary_key)]
    id: Attribute<i64>,
    title: Attribute<String>,
    #[column(name = "title")]
    heading: Attribute<String>,
    state: EntityState,
}

#[test]
fn test_duplicate_column_is_rejected() {
    let (db, conn) = memory_db();
    let mut broken = Broken::default();
    broken.id.write(1_i64);

    let err = broken.save(&db).unwrap_err();
    assert!(matches!(
        err,
        Error::Mapping(MappingError::DuplicateColumn { ref column, .. }) if column == "title"
    ));
    assert!(conn.statements().is_empty());

    // The failure is memoized for the type.
    let again = rowmodel::descriptor_for::<Broken>().unwrap_err();
    assert!(matches!(again, MappingError::DuplicateColumn { .. }));
}

#[derive(Debug, Default, Entity)]
struct Keyless {
    name: Attribute<String>,
    state: EntityState,
}

#[test]
fn test_missing_primary_key_is_rejected() {
    let err = rowmodel::descriptor_for::<Keyless>().unwrap_err();
    assert_eq!(err, MappingError::MissingPrimaryKey { entity: "Keyless" });
}

#[derive(Debug, Default, Entity)]
#[entity(table = "switches")]
struct Switch {
    #[column(primary_key, auto_generated, sql_type = "TEXT")]
    id: Attribute<Option<i64>>,
    #[column(sql_type = "JSON")]
    on: Attribute<bool>,
    state: EntityState,
}

#[test]
fn test_sql_type_override_must_fit_rust_type() {
    let (db, conn) = memory_db();
    let mut switch = Switch::default();
    switch.on.write(true);

    let err = switch.save(&db).unwrap_err();
    assert!(matches!(
        err,
        Error::Mapping(MappingError::UnsupportedType { field: "id", .. })
    ));
    assert!(conn.statements().is_empty());
}

#[derive(Debug, Default, Entity)]
struct Label {
    #[column(primary_key, auto_generated)]
    id: Attribute<Option<i32>>,
    text: Attribute<String>,
    state: EntityState,
}

#[test]
fn test_table_defaults_to_lowercased_name() {
    let (db, conn) = memory_db();
    let mut label = Label::default();
    label.text.write("urgent");

    assert!(label.save(&db).unwrap());
    assert_eq!(
        conn.statements(),
        vec!["INSERT INTO label (text) VALUES (?)".to_string()]
    );
    assert_eq!(label.id().unwrap(), Value::Int(1));
}
