use mylox::backend::vm::heap::Heap;
use mylox::common::object::{GCObject, LoxString, LoxValue, fnv1a};
use mylox::common::table::Table;

fn key(heap: &mut Heap, chars: &str) -> *mut GCObject<LoxString> {
    heap.alloc_string_copy(chars)
}

#[test]
fn set_get_and_overwrite() {
    let mut heap = Heap::new();
    let mut table = Table::new();
    let k = key(&mut heap, "answer");

    assert!(table.set(k, LoxValue::Number(1.0)));
    assert_eq!(table.get(k), Some(LoxValue::Number(1.0)));

    // overwriting is not a new key
    assert!(!table.set(k, LoxValue::Number(42.0)));
    assert_eq!(table.get(k), Some(LoxValue::Number(42.0)));
    assert_eq!(table.count, 1);
}

#[test]
fn missing_keys_return_none() {
    let mut heap = Heap::new();
    let mut table = Table::new();
    let present = key(&mut heap, "present");
    let absent = key(&mut heap, "absent");

    assert_eq!(table.get(absent), None);
    table.set(present, LoxValue::Nil);
    assert_eq!(table.get(absent), None);
    // a Nil value is still a present entry
    assert_eq!(table.get(present), Some(LoxValue::Nil));
}

#[test]
fn delete_leaves_usable_tombstones() {
    let mut heap = Heap::new();
    let mut table = Table::new();
    let a = key(&mut heap, "a");
    let b = key(&mut heap, "b");
    let c = key(&mut heap, "c");

    table.set(a, LoxValue::Number(1.0));
    table.set(b, LoxValue::Number(2.0));
    table.set(c, LoxValue::Number(3.0));

    assert!(table.delete(b));
    assert!(!table.delete(b));
    assert_eq!(table.get(b), None);
    // neighbors on the probe chain stay reachable
    assert_eq!(table.get(a), Some(LoxValue::Number(1.0)));
    assert_eq!(table.get(c), Some(LoxValue::Number(3.0)));

    // the tombstone slot is reusable
    assert!(table.set(b, LoxValue::Number(4.0)));
    assert_eq!(table.get(b), Some(LoxValue::Number(4.0)));
}

#[test]
fn growth_preserves_all_entries() {
    let mut heap = Heap::new();
    let mut table = Table::new();
    let mut keys = Vec::new();
    for i in 0..100 {
        let k = key(&mut heap, &format!("key-{}", i));
        table.set(k, LoxValue::Number(i as f64));
        keys.push(k);
    }
    assert_eq!(table.count, 100);
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(table.get(*k), Some(LoxValue::Number(i as f64)));
    }
    // capacity stays a power of two
    assert!(table.entries.len().is_power_of_two());
}

#[test]
fn churn_of_deletes_and_reinserts() {
    let mut heap = Heap::new();
    let mut table = Table::new();
    let keys: Vec<_> = (0..50).map(|i| key(&mut heap, &format!("k{}", i))).collect();

    for (i, k) in keys.iter().enumerate() {
        table.set(*k, LoxValue::Number(i as f64));
    }
    for k in keys.iter().step_by(2) {
        assert!(table.delete(*k));
    }
    for (i, k) in keys.iter().enumerate() {
        let expected = if i % 2 == 0 { None } else { Some(LoxValue::Number(i as f64)) };
        assert_eq!(table.get(*k), expected);
    }
    for (i, k) in keys.iter().enumerate().step_by(2) {
        table.set(*k, LoxValue::Number(i as f64));
    }
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(table.get(*k), Some(LoxValue::Number(i as f64)));
    }
}

#[test]
fn add_all_from_copies_live_entries_only() {
    let mut heap = Heap::new();
    let mut from = Table::new();
    let mut to = Table::new();

    let kept = key(&mut heap, "kept");
    let dropped = key(&mut heap, "dropped");
    let local = key(&mut heap, "local");

    from.set(kept, LoxValue::Boolean(true));
    from.set(dropped, LoxValue::Boolean(true));
    from.delete(dropped);
    to.set(local, LoxValue::Number(1.0));

    to.add_all_from(&from);

    assert_eq!(to.get(kept), Some(LoxValue::Boolean(true)));
    assert_eq!(to.get(dropped), None);
    assert_eq!(to.get(local), Some(LoxValue::Number(1.0)));
}

#[test]
fn find_string_matches_by_content() {
    let mut heap = Heap::new();
    let mut table = Table::new();
    let k = key(&mut heap, "needle");
    table.set(k, LoxValue::Nil);

    let found = table.find_string("needle", fnv1a(b"needle"));
    assert_eq!(found, Some(k));

    assert_eq!(table.find_string("missing", fnv1a(b"missing")), None);
    // same bytes, wrong hash must not match
    assert_eq!(table.find_string("needle", fnv1a(b"needle").wrapping_add(1)), None);
}

#[test]
fn interned_keys_make_equal_strings_pointer_equal() {
    let mut heap = Heap::new();
    let first = key(&mut heap, "same");
    let second = key(&mut heap, "same");
    let other = key(&mut heap, "other");
    assert_eq!(first, second);
    assert_ne!(first, other);
}
