//! Composition of views over a partitioned map

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{keys, thousand};
use keyspan::{
    Error, KeyRange, MapConfig, MemoryStore, OperatorMapper, SampleDescriptor, SortedMap, Value,
    ValueType, ViewKind,
};
use tempfile::TempDir;

#[test]
fn test_views_compose_in_order() {
    let (_, map) = thousand();
    let sample = SampleDescriptor::new("abc", 0.0, 0.5).unwrap();
    let view = map
        .sub_map(100i64, 200i64)
        .unwrap()
        .sample(&sample)
        .unwrap()
        .regex_key_filter("^1[0-4]")
        .unwrap();
    assert_eq!(view.kind(), ViewKind::Filtered);
    assert_eq!(view.priorities(), vec![100, 101]);
    for key in keys(&view) {
        let k = key.as_int().unwrap();
        assert!((100..150).contains(&k), "unexpected key {}", k);
    }
}

#[test]
fn test_three_stacked_operators_get_increasing_priorities() {
    let (_, map) = thousand();
    let first = map.sample_fraction(0.9).unwrap();
    let second = first.regex_value_filter("0$").unwrap();
    let third = second.key_to_key().unwrap();
    assert_eq!(first.priority(), Some(100));
    assert_eq!(second.priority(), Some(101));
    assert_eq!(third.priority(), Some(102));
    assert_eq!(third.priorities(), vec![100, 101, 102]);
}

#[test]
fn test_parent_unaffected_by_children() {
    let (_, map) = thousand();
    let before = map.checksum().unwrap();
    let left = map.regex_key_filter("^9").unwrap();
    let right = map.sample_fraction(0.1).unwrap();
    let left_size = left.size().unwrap();
    let _ = right.size().unwrap();
    assert_eq!(map.size().unwrap(), 1000);
    assert_eq!(map.checksum().unwrap(), before);
    assert_eq!(left.size().unwrap(), left_size);
    assert_eq!(left.priority(), right.priority());
}

#[test]
fn test_writes_visible_through_existing_views() {
    let (_, map) = thousand();
    let tail = map.tail_map(990i64).unwrap();
    assert_eq!(tail.size().unwrap(), 10);
    map.put(995i64, 0i64).unwrap();
    map.put(2000i64, 0i64).unwrap();
    assert_eq!(tail.get(995i64).unwrap(), Some(Value::Int(0)));
    assert_eq!(tail.size().unwrap(), 11);
}

#[test]
fn test_read_only_for_every_derivation() {
    let (_, map) = thousand();
    let sample = SampleDescriptor::new("abc", 0.0, 0.5).unwrap();
    let derived = vec![
        map.sub_map(0i64, 10i64).unwrap(),
        map.sample(&sample).unwrap(),
        map.regex_key_filter("1").unwrap(),
        map.key_to_key().unwrap(),
        map.aggregate_view("count", Default::default()).unwrap(),
        map.time_filter(None, None).unwrap(),
    ];
    for view in &derived {
        assert!(matches!(view.put(1i64, 2i64), Err(Error::ReadOnly { .. })), "{:?}", view);
        assert!(matches!(view.remove(1i64), Err(Error::ReadOnly { .. })));
        assert!(matches!(view.clear(), Err(Error::ReadOnly { .. })));
    }
    assert_eq!(map.get(1i64).unwrap(), Some(Value::Int(2)));
}

#[test]
fn test_disjoint_restriction_gives_empty_view() {
    let (_, map) = thousand();
    let empty = map
        .sub_map(0i64, 100i64)
        .unwrap()
        .restrict(&KeyRange::half_open(Some(common::encoded(500)), None));
    assert_eq!(empty.kind(), ViewKind::Empty);
    assert!(empty.is_empty().unwrap());
    assert_eq!(empty.size().unwrap(), 0);
    assert_eq!(empty.stats().unwrap().n(), 0);
    assert!(keys(&empty).is_empty());
    assert!(matches!(empty.put(1i64, 1i64), Err(Error::ReadOnly { .. })));
}

#[test]
fn test_derive_type_checks_at_build_time() {
    let (_, map) = thousand();
    let rows = map.row_stats().unwrap();
    assert_eq!(rows.value_type(), ValueType::Summary);
    let err = rows.derive(&OperatorMapper::new("regex_filter")).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_multi_valued_container() {
    let store = Arc::new(MemoryStore::default());
    let map = SortedMap::builder(store).max_values_per_key(3).build().unwrap();
    for v in 1..=5i64 {
        map.put_without_get("sensor", v).unwrap();
    }
    assert_eq!(map.get("sensor").unwrap(), Some(Value::Int(5)));
    assert_eq!(
        map.get_all("sensor").unwrap(),
        vec![Value::Int(5), Value::Int(4), Value::Int(3)]
    );
    let multi: Vec<_> = map.multi_entries().unwrap().map(|e| e.unwrap().value).collect();
    assert_eq!(multi.len(), 3);
    let Some(Value::Object(row)) = map.row_stats().unwrap().get("sensor").unwrap() else {
        panic!("expected a summary");
    };
    assert_eq!(row.get("n"), Some(&Value::Int(3)));
    assert_eq!(row.get("min"), Some(&Value::Float(3.0)));
}

#[test]
fn test_local_copy_and_dump() {
    let map = SortedMap::in_memory().unwrap();
    map.put_all([("b", 2i64), ("a", 1i64)]).unwrap();
    assert_eq!(
        map.local_copy().unwrap(),
        vec![
            (Value::from("a"), Value::Int(1)),
            (Value::from("b"), Value::Int(2))
        ]
    );
    let mut out = Vec::new();
    map.dump(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "k = a : v = 1\nk = b : v = 2\n");
}

#[test]
fn test_wait_for_times_out() {
    let map = SortedMap::in_memory().unwrap();
    let got = map
        .wait_for("late", Duration::from_millis(30), Some(Duration::from_millis(10)))
        .unwrap();
    assert_eq!(got, None);
}

#[test]
fn test_wait_for_sees_concurrent_write() {
    let map = SortedMap::in_memory().unwrap();
    let writer = map.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        writer.put("late", 7i64).unwrap();
    });
    let got = map
        .wait_for("late", Duration::from_secs(5), Some(Duration::from_millis(5)))
        .unwrap();
    handle.join().unwrap();
    assert_eq!(got, Some(Value::Int(7)));
}

#[test]
fn test_open_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(keyspan::CONFIG_FILE_NAME);
    std::fs::write(&path, "value_codec = \"opaque\"\nmax_values_per_key = 2\n").unwrap();
    let config = MapConfig::from_file(&path).unwrap();
    let map = SortedMap::open(Arc::new(MemoryStore::default()), config).unwrap();
    assert!(map.is_multi_valued());
    map.put("k", Value::Array(vec![Value::Int(1), Value::Null])).unwrap();
    assert_eq!(
        map.get("k").unwrap(),
        Some(Value::Array(vec![Value::Int(1), Value::Null]))
    );
}
