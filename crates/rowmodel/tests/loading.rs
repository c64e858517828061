mod support;

use rowmodel::prelude::*;
use rowmodel::{MappingError, Row};
use support::{Author, Country, memory_db, scripted_db};

#[derive(Debug, Default, Entity)]
#[entity(table = "samples")]
struct Sample {
    #[column(primary_key, auto_generated)]
    id: Attribute<Option<i64>>,
    flag: Attribute<bool>,
    small: Attribute<i16>,
    medium: Attribute<i32>,
    large: Attribute<i64>,
    ratio: Attribute<f32>,
    precise: Attribute<f64>,
    label: Attribute<String>,
    payload: Attribute<Vec<u8>>,
    document: Attribute<serde_json::Value>,
    note: Attribute<Option<String>>,
    state: EntityState,
}

#[test]
fn test_round_trip_every_column_type() {
    let (db, _conn) = memory_db();
    let mut sample = Sample::default();
    sample.flag.write(true);
    sample.small.write(-7_i16);
    sample.medium.write(40_000_i32);
    sample.large.write(9_000_000_000_i64);
    sample.ratio.write(0.5_f32);
    sample.precise.write(std::f64::consts::PI);
    sample.label.write("héllo");
    sample.payload.write(vec![0_u8, 1, 255]);
    sample.document.write(serde_json::json!({"tags": ["a", "b"]}));
    sample.note.write(Some("kept".to_string()));
    assert!(sample.save(&db).unwrap());

    let loaded = Sample::find(&db, sample.id().unwrap()).unwrap().unwrap();
    assert!(loaded.is_persisted());
    assert!(*loaded.flag.read());
    assert_eq!(*loaded.small.read(), -7);
    assert_eq!(*loaded.medium.read(), 40_000);
    assert_eq!(*loaded.large.read(), 9_000_000_000);
    assert!((*loaded.ratio.read() - 0.5).abs() < f32::EPSILON);
    assert!((*loaded.precise.read() - std::f64::consts::PI).abs() < f64::EPSILON);
    assert_eq!(loaded.label.read(), "héllo");
    assert_eq!(loaded.payload.read(), &vec![0_u8, 1, 255]);
    assert_eq!(loaded.document.read()["tags"][1], "b");
    assert_eq!(loaded.note.read().as_deref(), Some("kept"));
    assert!(!loaded.label.has_been_modified());
}

#[test]
fn test_loaded_instance_updates_in_place() {
    let (db, conn) = memory_db();
    let mut country = Country::new("JP", "Japan", 125_000_000);
    country.save(&db).unwrap();

    let mut loaded = Country::find(&db, "JP").unwrap().unwrap();
    loaded.population.write(124_000_000_i64);
    conn.clear_statements();
    assert!(loaded.save(&db).unwrap());

    assert_eq!(
        conn.statements(),
        vec!["UPDATE countries SET population = ? WHERE code = ?".to_string()]
    );
}

#[test]
fn test_find_missing_returns_none() {
    let (db, _conn) = memory_db();
    assert!(Country::find(&db, "ZZ").unwrap().is_none());
}

#[test]
fn test_query_filters_orders_and_pages() {
    let (db, _conn) = memory_db();
    for (code, name, population) in [
        ("DE", "Germany", 84),
        ("AT", "Austria", 9),
        ("CH", "Switzerland", 9),
        ("BE", "Belgium", 12),
    ] {
        Country::new(code, name, population).save(&db).unwrap();
    }

    let small = Country::query()
        .filter("population", Operator::Lt, 20_i64)
        .order_by("population", Direction::Desc)
        .order_by("code", Direction::Asc)
        .all(&db)
        .unwrap();
    let codes: Vec<String> = small.iter().map(|c| c.code.get()).collect();
    assert_eq!(codes, vec!["BE", "AT", "CH"]);

    let page = Country::query()
        .order_by("code", Direction::Asc)
        .limit(2)
        .offset(1)
        .all(&db)
        .unwrap();
    let codes: Vec<String> = page.iter().map(|c| c.code.get()).collect();
    assert_eq!(codes, vec!["BE", "CH"]);

    let like = Country::query()
        .filter("name", Operator::Like, "%land")
        .first(&db)
        .unwrap()
        .unwrap();
    assert_eq!(like.code.read(), "CH");
}

#[test]
fn test_query_rejects_unknown_column() {
    let (db, conn) = memory_db();
    let err = Country::query().eq("capital", "Lima").all(&db).unwrap_err();

    assert!(matches!(
        err,
        Error::Mapping(MappingError::UnknownColumn { ref column, .. }) if column == "capital"
    ));
    assert!(conn.statements().is_empty());
}

#[test]
fn test_first_uses_limit_one() {
    let (db, conn) = scripted_db();
    Author::query().eq("name", "Ada").first(&db).unwrap();

    assert_eq!(
        conn.statements(),
        vec!["SELECT id, name, email FROM authors WHERE name = ? LIMIT 1".to_string()]
    );
}

#[test]
fn test_first_respects_zero_limit() {
    let (db, conn) = memory_db();
    Country::new("UY", "Uruguay", 3_400_000).save(&db).unwrap();
    conn.clear_statements();

    assert!(Country::query().limit(0).first(&db).unwrap().is_none());
    assert_eq!(
        conn.statements(),
        vec!["SELECT code, name, population FROM countries LIMIT 0".to_string()]
    );
    assert!(Country::query().limit(5).first(&db).unwrap().is_some());
}

#[test]
fn test_hydration_reports_missing_column() {
    let (db, conn) = scripted_db();
    conn.push_rows(vec![Row::new(
        vec!["id".to_string(), "name".to_string()],
        vec![Value::BigInt(1), Value::Text("Ada".to_string())],
    )]);

    let err = Author::find(&db, 1_i64).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }));
}

#[test]
fn test_hydration_reports_type_mismatch() {
    let (db, conn) = scripted_db();
    conn.push_rows(vec![Row::new(
        vec!["id".to_string(), "name".to_string(), "email".to_string()],
        vec![
            Value::Text("one".to_string()),
            Value::Text("Ada".to_string()),
            Value::Null,
        ],
    )]);

    let err = Author::find(&db, 1_i64).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }));
}

#[test]
fn test_postgres_dialect_statements() {
    let conn = support::ScriptedConnection::new();
    conn.push_result(
        rowmodel::ExecuteResult::affected(1).with_generated_key(Value::BigInt(3)),
    );
    let db = Database::new(conn.clone(), PostgresDialect);

    let mut author = Author::named("Ada");
    author.save(&db).unwrap();
    author.email.write(Some("ada@example.com".to_string()));
    author.save(&db).unwrap();
    Author::query()
        .filter("id", Operator::Ge, 1_i64)
        .order_by("name", Direction::Desc)
        .all(&db)
        .unwrap();

    assert_eq!(
        conn.statements(),
        vec![
            r#"INSERT INTO "authors" ("name") VALUES ($1)"#.to_string(),
            r#"UPDATE "authors" SET "email" = $1 WHERE "id" = $2"#.to_string(),
            r#"SELECT "id", "name", "email" FROM "authors" WHERE "id" >= $1 ORDER BY "name" DESC"#
                .to_string(),
        ]
    );
}
