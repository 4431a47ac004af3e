//! Global string interner.
//!
//! An injectable pool (process-wide in production, buffer-local in tests) mapping
//! unique strings to dense, insertion-ordered indices. `sharedStrings.xml` is emitted in
//! this insertion order, so the pool itself must preserve it — `IndexSet` gives that for
//! free instead of pairing a `HashMap` with a separate `Vec`.

use std::sync::{Arc, Mutex};

use indexmap::IndexSet;

/// A handful of strings every workbook uses regardless of content; pre-interning them
/// keeps index 0 stable and avoids a cold first-insert on the hot path.
pub const EMPTY_STRING: &str = "";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
pub const TRUE_STRING: &str = "TRUE";
pub const FALSE_STRING: &str = "FALSE";
pub const ZERO_STRING: &str = "0";
pub const ONE_STRING: &str = "1";
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>";
pub const WORKSHEET_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const RELATIONSHIPS_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Thread-safe string interner with insertion-stable indices.
#[derive(Clone)]
pub struct StringPool {
    inner: Arc<Mutex<IndexSet<String>>>,
}

impl StringPool {
    pub fn new() -> Self {
        let mut set = IndexSet::new();
        for s in [
            EMPTY_STRING,
            DEFAULT_SHEET_NAME,
            TRUE_STRING,
            FALSE_STRING,
            ZERO_STRING,
            ONE_STRING,
            XML_DECLARATION,
            WORKSHEET_NAMESPACE,
            RELATIONSHIPS_NAMESPACE,
        ] {
            set.insert(s.to_string());
        }
        StringPool {
            inner: Arc::new(Mutex::new(set)),
        }
    }

    /// An empty pool with no pre-interned entries, for tests that want to assert
    /// exact index assignment from a blank slate.
    pub fn empty() -> Self {
        StringPool {
            inner: Arc::new(Mutex::new(IndexSet::new())),
        }
    }

    /// Interns `s`, returning its stable dense index. Repeated interning of an equal
    /// string returns the same index.
    pub fn intern(&self, s: &str) -> u32 {
        let mut set = self.inner.lock().expect("string pool mutex poisoned");
        if let Some(idx) = set.get_index_of(s) {
            return idx as u32;
        }
        let (idx, _) = set.insert_full(s.to_string());
        idx as u32
    }

    /// Returns the index of `s` if it has already been interned.
    pub fn index_of(&self, s: &str) -> Option<u32> {
        self.inner
            .lock()
            .expect("string pool mutex poisoned")
            .get_index_of(s)
            .map(|i| i as u32)
    }

    pub fn is_interned(&self, s: &str) -> bool {
        self.index_of(s).is_some()
    }

    /// Returns the interned string at `index`, cloned out from under the lock.
    pub fn get(&self, index: u32) -> Option<String> {
        self.inner
            .lock()
            .expect("string pool mutex poisoned")
            .get_index(index as usize)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("string pool mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all interned strings, in insertion order — the order
    /// `xl/sharedStrings.xml` must be emitted in.
    pub fn all_strings(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("string pool mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().expect("string pool mutex poisoned").clear();
    }
}

impl Default for StringPool {
    fn default() -> Self {
        StringPool::new()
    }
}
