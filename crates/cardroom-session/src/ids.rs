//! Identifier generation for sessions and participants.

use std::sync::atomic::{AtomicU64, Ordering};

/// Produces collision-resistant identifiers.
///
/// Callers still check the result against the ids they already hold;
/// a generator only has to make collisions unlikely, not impossible.
pub trait IdGenerator: Send + Sync + 'static {
    fn new_id(&self) -> String;
}

/// Random v4 UUIDs, e.g. `"67e55044-10b1-426f-9247-bb680e5fe0c8"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Predictable ids (`"<prefix>1"`, `"<prefix>2"`, ...) for demos and tests.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{n}", self.prefix)
    }
}
