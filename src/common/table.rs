// Mylox hash table
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-21: Open-addressed table keyed by interned string objects;
//            linear probing over a power-of-two capacity, tombstone deletion,
//            0.75 max load factor. Shared by globals, class method tables,
//            instance field tables and the heap's string pool.
// 2026-06-29: Added find_string (content lookup for the interner) and
//            remove_white (weak-key purge run before every GC sweep).

use crate::common::object::{GCObject, LoxString, LoxValue};

const TABLE_MAX_LOAD_NUM: usize = 3;
const TABLE_MAX_LOAD_DEN: usize = 4;

#[derive(Clone, Copy)]
pub struct Entry {
    // null key + Nil value      -> 空槽
    // null key + Boolean(true)  -> tombstone，保持探测链完整
    pub key: *mut GCObject<LoxString>,
    pub value: LoxValue,
}

const EMPTY: Entry = Entry {
    key: std::ptr::null_mut(),
    value: LoxValue::Nil,
};

pub struct Table {
    pub count: usize,
    pub entries: Vec<Entry>,
}

// 探测起点由 key 预存的 hash 决定；容量总是 2 的幂，取模用位与
fn find_entry(entries: &[Entry], key: *mut GCObject<LoxString>) -> usize {
    let capacity = entries.len();
    let mut index = unsafe { (*key).data.hash } as usize & (capacity - 1);
    let mut tombstone: Option<usize> = None;

    loop {
        let entry = &entries[index];
        if entry.key.is_null() {
            if matches!(entry.value, LoxValue::Nil) {
                // true empty slot: the key is absent, reuse the first
                // tombstone on the probe chain if we passed one
                return tombstone.unwrap_or(index);
            }
            if tombstone.is_none() {
                tombstone = Some(index);
            }
        } else if entry.key == key {
            return index;
        }
        index = (index + 1) & (capacity - 1);
    }
}

impl Table {
    pub fn new() -> Self {
        Self {
            count: 0,
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: *mut GCObject<LoxString>) -> Option<LoxValue> {
        if self.count == 0 {
            return None;
        }
        let entry = &self.entries[find_entry(&self.entries, key)];
        if entry.key.is_null() { None } else { Some(entry.value) }
    }

    /// Returns true when the key was not previously present.
    pub fn set(&mut self, key: *mut GCObject<LoxString>, value: LoxValue) -> bool {
        if (self.count + 1) * TABLE_MAX_LOAD_DEN > self.entries.len() * TABLE_MAX_LOAD_NUM {
            let capacity = if self.entries.len() < 8 {
                8
            } else {
                self.entries.len() * 2
            };
            self.adjust_capacity(capacity);
        }

        let index = find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        let is_new = entry.key.is_null();
        // tombstone 槽的 count 早已计入，只有真正的空槽才加一
        if is_new && matches!(entry.value, LoxValue::Nil) {
            self.count += 1;
        }
        entry.key = key;
        entry.value = value;
        is_new
    }

    pub fn delete(&mut self, key: *mut GCObject<LoxString>) -> bool {
        if self.count == 0 {
            return false;
        }
        let index = find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_null() {
            return false;
        }
        entry.key = std::ptr::null_mut();
        entry.value = LoxValue::Boolean(true);
        true
    }

    /// Copies every live entry of `other` into `self` (INHERIT).
    pub fn add_all_from(&mut self, other: &Table) {
        for entry in &other.entries {
            if !entry.key.is_null() {
                self.set(entry.key, entry.value);
            }
        }
    }

    /// Content-based lookup used only by the string interner: the candidate
    /// string is not an object yet, so probing compares bytes, not pointers.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<*mut GCObject<LoxString>> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = hash as usize & (capacity - 1);
        loop {
            let entry = &self.entries[index];
            if entry.key.is_null() {
                if matches!(entry.value, LoxValue::Nil) {
                    return None;
                }
            } else {
                let key = unsafe { &(*entry.key).data };
                if key.hash == hash && key.chars == chars {
                    return Some(entry.key);
                }
            }
            index = (index + 1) & (capacity - 1);
        }
    }

    /// Purges entries whose key did not survive marking. The interner holds
    /// its strings weakly; this runs after tracing and before the sweep.
    pub fn remove_white(&mut self) {
        for entry in &mut self.entries {
            if !entry.key.is_null() && unsafe { !(*entry.key).mark } {
                entry.key = std::ptr::null_mut();
                entry.value = LoxValue::Boolean(true);
            }
        }
    }

    // 扩容重建会丢掉所有 tombstone，count 需要重算
    fn adjust_capacity(&mut self, capacity: usize) {
        let mut entries = vec![EMPTY; capacity];
        self.count = 0;
        for entry in &self.entries {
            if entry.key.is_null() {
                continue;
            }
            let index = find_entry(&entries, entry.key);
            entries[index] = *entry;
            self.count += 1;
        }
        self.entries = entries;
    }
}
