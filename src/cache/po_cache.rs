use std::sync::RwLock;

/// Last known counter value, kept for display only.
///
/// Written by the allocator after every successful mutation. Never read
/// back to derive a number: allocation always goes through the store.
#[derive(Debug, Default)]
pub struct PoDisplayCache {
    value: RwLock<Option<i64>>,
}

impl PoDisplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<i64> {
        let guard = self.value.read().ok()?;
        *guard
    }

    pub fn set(&self, value: i64) {
        if let Ok(mut guard) = self.value.write() {
            *guard = Some(value);
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.value.write() {
            *guard = None;
        }
    }
}
