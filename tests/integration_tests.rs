//! Integration tests for the record mapper
//!
//! These tests drive the public API end to end:
//! - Converter reuse across structurally identical sources
//! - Null handling for value and optional targets
//! - Nested dotted names and constructor selection
//! - Custom conversions
//! - SQLite query results mapped to objects

use rust_record_mapper::mapping::ConcurrentConverterCache;
use rust_record_mapper::prelude::*;
use std::sync::Arc;

#[derive(Default, Debug, PartialEq, Clone)]
struct Person {
    id: i32,
    name: Option<String>,
}

rust_record_mapper::impl_mappable!(Person { id: "Id", name: "Name" });

#[derive(Default, Debug, PartialEq)]
struct Leaf {
    value: i32,
}

rust_record_mapper::impl_mappable!(Leaf { value: "Value" });

#[derive(Default, Debug, PartialEq)]
struct Branch {
    value: Leaf,
}

rust_record_mapper::impl_mappable!(Branch { value: "Value" });

#[derive(Default, Debug, PartialEq)]
struct Trunk {
    value: Branch,
}

rust_record_mapper::impl_mappable!(Trunk { value: "Value" });

#[derive(Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
    arity: usize,
}

impl Mappable for Point {
    fn target_type() -> TargetType {
        TargetType::composite::<Point>(|| {
            Shape::builder::<Point>()
                .constructor(&["X"], |x: i32| Point { x, y: 0, arity: 1 })
                .constructor(&["X", "Y"], |x: i32, y: i32| Point { x, y, arity: 2 })
                .build()
        })
    }
}

#[derive(Default, Debug, PartialEq)]
struct Label {
    text: String,
}

rust_record_mapper::impl_mappable!(Label { text: "Text" });

fn person_columns() -> Vec<Column> {
    vec![
        Column::new("Id", FieldType::Int),
        Column::nullable("Name", FieldType::String),
    ]
}

fn read_all<T: Mappable>(records: RecordSet) -> Result<Vec<T>> {
    ObjectReader::for_reader(records).read::<T>()?.collect()
}

#[test]
fn test_structurally_identical_sources_share_converter() {
    let factory = ConverterFactory::new(&ConverterCollection::new());
    let first = RecordSet::new(person_columns());
    let second = RecordSet::new(person_columns());

    let a = factory.get_converter::<_, Person>(&first).unwrap();
    let b = factory.get_converter::<_, Person>(&second).unwrap();
    assert!(Arc::ptr_eq(&a.compiled(), &b.compiled()));

    let other = RecordSet::new(vec![
        Column::new("Id", FieldType::Long),
        Column::nullable("Name", FieldType::String),
    ]);
    let c = factory.get_converter::<_, Person>(&other);
    assert!(c.is_err());
}

#[test]
fn test_factories_sharing_a_cache_share_converters() {
    let cache = Arc::new(ConcurrentConverterCache::new());
    let conversions = ConverterCollection::new();
    let first = ConverterFactory::with_cache(&conversions, cache.clone());
    let second = ConverterFactory::with_cache(&conversions, cache.clone());
    let records = RecordSet::new(person_columns());

    let a = first.get_converter::<_, Person>(&records).unwrap();
    let b = second.get_converter::<_, Person>(&records).unwrap();
    assert!(Arc::ptr_eq(&a.compiled(), &b.compiled()));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_converter_shared_across_threads() {
    let factory = ConverterFactory::default();
    let compiled: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = factory.clone();
                scope.spawn(move || {
                    let records = RecordSet::new(person_columns());
                    factory
                        .get_converter::<_, Person>(&records)
                        .map(|converter| converter.compiled())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread panicked").unwrap())
            .collect()
    });

    assert!(compiled.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_null_reads_default_or_absent() {
    #[derive(Default, Debug, PartialEq)]
    struct Reading {
        count: i32,
        note: Option<String>,
    }
    rust_record_mapper::impl_mappable!(Reading { count: "Count", note: "Note" });

    let records = RecordSet::new(vec![
        Column::nullable("Count", FieldType::Int),
        Column::nullable("Note", FieldType::String),
    ])
    .with_row([DatabaseValue::Null, DatabaseValue::Null])
    .unwrap()
    .with_row([DatabaseValue::Int(4), "ok".into()])
    .unwrap();

    let readings = read_all::<Reading>(records).unwrap();
    assert_eq!(
        readings,
        vec![
            Reading {
                count: 0,
                note: None
            },
            Reading {
                count: 4,
                note: Some("ok".to_string())
            },
        ]
    );
}

#[test]
fn test_unexpected_null_references_member() {
    let records = RecordSet::new(person_columns())
        .with_row([DatabaseValue::Null, DatabaseValue::Null])
        .unwrap();

    let err = read_all::<Person>(records).unwrap_err();
    match err {
        MappingError::UnexpectedNull { member, ordinal } => {
            assert_eq!(member, "Id");
            assert_eq!(ordinal, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_nested_flattened_names() {
    let records = RecordSet::new(vec![Column::new("Value.Value.Value", FieldType::Int)])
        .with_row([DatabaseValue::Int(42)])
        .unwrap();

    let trunks = read_all::<Trunk>(records).unwrap();
    assert_eq!(trunks[0].value.value.value, 42);
}

#[test]
fn test_constructor_with_most_parameters_wins() {
    let records = RecordSet::new(vec![
        Column::new("X", FieldType::Int),
        Column::new("Y", FieldType::Int),
    ])
    .with_row([3, 4])
    .unwrap();

    let points = read_all::<Point>(records).unwrap();
    assert_eq!(points, vec![Point { x: 3, y: 4, arity: 2 }]);

    let records = RecordSet::new(vec![Column::new("X", FieldType::Int)])
        .with_row([3])
        .unwrap();
    let points = read_all::<Point>(records).unwrap();
    assert_eq!(points[0].arity, 1);
}

#[test]
fn test_custom_conversion_precedence() {
    let records = || {
        RecordSet::new(vec![Column::new("Text", FieldType::Int)])
            .with_row([7])
            .unwrap()
    };

    let mut conversions = ConverterCollection::new();
    conversions.add(|v: i32| format!("#{v}"));
    let factory = ConverterFactory::new(&conversions);
    let labels: Vec<Label> = ObjectReader::with_factory(records(), factory)
        .read::<Label>()
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(labels[0].text, "#7");

    assert!(conversions.remove::<i32, String>());
    let factory = ConverterFactory::new(&conversions);
    let err = factory.get_converter::<_, Label>(&records()).unwrap_err();
    assert!(matches!(err, MappingError::InvalidConversion { .. }));
    assert!(err.is_build_error());
}

#[test]
fn test_object_reader_with_converter() {
    let records = RecordSet::new(vec![Column::new("Text", FieldType::Int)])
        .with_row([11])
        .unwrap();

    let labels: Vec<Label> = ObjectReader::for_reader(records)
        .with_converter(|v: i32| v.to_string())
        .read::<Label>()
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(labels[0].text, "11");
}

#[test]
fn test_end_to_end_example() {
    let records = RecordSet::new(person_columns())
        .with_row([DatabaseValue::Int(1), DatabaseValue::Null])
        .unwrap()
        .with_row([DatabaseValue::Int(2), "Bob".into()])
        .unwrap();

    let people = read_all::<Person>(records).unwrap();
    assert_eq!(
        people,
        vec![
            Person { id: 1, name: None },
            Person {
                id: 2,
                name: Some("Bob".to_string())
            },
        ]
    );
}

#[test]
fn test_read_arguments_and_selectors() {
    let records = RecordSet::new(person_columns())
        .with_row([DatabaseValue::Int(1), "Ann".into()])
        .unwrap()
        .with_row([DatabaseValue::Int(2), DatabaseValue::Null])
        .unwrap();

    let mut reader = ObjectReader::for_reader(records.clone());
    let args: Vec<(Option<String>, i32)> = reader
        .read_arguments::<(Option<String>, i32)>(&["Name", "Id"])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(args, vec![(Some("Ann".to_string()), 1), (None, 2)]);

    let mut reader = ObjectReader::for_reader(records);
    let names = reader
        .read_mapped(&["Id", "Name"], |id: i32, name: Option<String>| {
            format!("{id}:{}", name.unwrap_or_default())
        })
        .unwrap();
    assert_eq!(names, vec!["1:Ann", "2:"]);
}

#[test]
fn test_unknown_selector_parameter() {
    let records = RecordSet::new(person_columns());
    let factory = ConverterFactory::default();
    let err = factory
        .get_selector_converter(&records, &["Missing"], |v: i32| v)
        .unwrap_err();
    assert!(matches!(err, MappingError::ParameterUnresolved { .. }));
}

#[test]
fn test_value_not_matching_declared_type_fails_read() {
    let mut records = RecordSet::new(vec![Column::new("Id", FieldType::Int)])
        .with_row([DatabaseValue::Double(3.9)])
        .unwrap()
        .with_row(["17"])
        .unwrap();

    let factory = ConverterFactory::default();
    let read_id = factory
        .compile_selector(&records, &["Id"], |id: i32| id)
        .unwrap();
    while records.advance().unwrap() {
        let err = read_id(&records).unwrap_err();
        assert!(matches!(err, MappingError::InvalidCast { .. }), "{err}");
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Product {
        id: i64,
        name: Option<String>,
        price: f64,
        active: bool,
    }

    rust_record_mapper::impl_mappable!(Product {
        id: "id",
        name: "name",
        price: "price",
        active: "active",
    });

    async fn seeded() -> Result<SqliteDatabase> {
        let db = SqliteDatabase::new(SqliteConfig::default());
        db.connect().await?;
        db.execute(
            "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, price REAL, active BOOLEAN)",
        )
        .await?;
        let rows = [
            vec![DatabaseValue::Long(1), "Widget".into(), 2.5.into(), true.into()],
            vec![DatabaseValue::Long(2), DatabaseValue::Null, DatabaseValue::Null, false.into()],
        ];
        for row in rows {
            db.execute_with_params(
                "INSERT INTO products (id, name, price, active) VALUES (?, ?, ?, ?)",
                &row,
            )
            .await?;
        }
        Ok(db)
    }

    #[tokio::test]
    async fn test_query_results_map_to_objects() -> Result<()> {
        let db = seeded().await?;
        let records = db
            .query("SELECT id, name, price, active FROM products ORDER BY id")
            .await?;

        let products = ObjectReader::for_reader(records)
            .read::<Product>()?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(
            products,
            vec![
                Product {
                    id: 1,
                    name: Some("Widget".to_string()),
                    price: 2.5,
                    active: true,
                },
                Product {
                    id: 2,
                    name: None,
                    price: 0.0,
                    active: false,
                },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_queries_reuse_converter() -> Result<()> {
        let db = seeded().await?;
        let cache = Arc::new(ConcurrentConverterCache::new());
        let factory = ConverterFactory::with_cache(&ConverterCollection::new(), cache.clone());
        let sql = "SELECT id, name, price, active FROM products";

        let first = factory.get_converter::<_, Product>(&db.query(sql).await?)?;
        let second = factory.get_converter::<_, Product>(&db.query(sql).await?)?;
        assert!(Arc::ptr_eq(&first.compiled(), &second.compiled()));
        assert_eq!(cache.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_parameterized_query_with_selector() -> Result<()> {
        let db = seeded().await?;
        let records = db
            .query_with_params(
                "SELECT id, name FROM products WHERE id = ?",
                &[DatabaseValue::Long(1)],
            )
            .await?;

        let mut reader = ObjectReader::for_reader(records);
        let names = reader.read_mapped(&["id", "name"], |id: i64, name: Option<String>| {
            (id, name.unwrap_or_default())
        })?;
        assert_eq!(names, vec![(1, "Widget".to_string())]);
        Ok(())
    }
}
