//! Document id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::DocumentId;

/// Source of fresh, unique document ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> DocumentId;
}

/// Random v4 UUIDs. Collisions are negligible at any realistic job rate.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> DocumentId {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `{prefix}-{n}` ids, starting at 1.
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
    fn next_id(&self) -> DocumentId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}
