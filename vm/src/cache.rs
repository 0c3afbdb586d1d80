use std::sync::Arc;

use parking_lot::Mutex;

use crate::invokable::Invokable;
use crate::object::{Class, Shape};

/// What a call site keys its cache on: classes in tier 1, shapes in tier 2.
#[derive(Clone, Debug)]
pub enum CacheKey {
    Class(Arc<Class>),
    Shape(Arc<Shape>),
}

impl CacheKey {
    pub fn matches(&self, other: &CacheKey) -> bool {
        match (self, other) {
            (CacheKey::Class(a), CacheKey::Class(b)) => Arc::ptr_eq(a, b),
            (CacheKey::Shape(a), CacheKey::Shape(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_stale(&self) -> bool {
        match self {
            CacheKey::Class(_) => false,
            CacheKey::Shape(shape) => !shape.is_latest(),
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    key: CacheKey,
    target: Invokable,
}

/// Two-entry inline cache attached to a send bytecode.
///
/// The primary slot is filled first, the secondary second. Once both hold
/// different keys, further keys are resolved on every send and never cached.
/// Only successful resolutions are stored.
#[derive(Default, Debug)]
pub struct InlineCache {
    primary: Mutex<Option<CacheEntry>>,
    secondary: Mutex<Option<CacheEntry>>,
}

impl InlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(
        &self,
        key: &CacheKey,
        resolve: impl FnOnce() -> Option<Invokable>,
    ) -> Option<Invokable> {
        if let Some(hit) = probe(&self.primary, key).or_else(|| probe(&self.secondary, key)) {
            return Some(hit);
        }
        let target = resolve()?;
        for slot in [&self.primary, &self.secondary] {
            let mut slot = slot.lock();
            if slot.is_none() {
                log::trace!("inline cache filled for {:?} -> {:?}", key, target);
                *slot = Some(CacheEntry { key: key.clone(), target: target.clone() });
                break;
            }
        }
        Some(target)
    }

    /// Target installed by a quickened super send.
    pub fn quick_target(&self) -> Option<Invokable> {
        self.primary.lock().as_ref().map(|e| e.target.clone())
    }

    /// Unconditionally binds the primary slot. Used by super sends, whose
    /// target does not depend on the receiver.
    pub fn install(&self, key: CacheKey, target: Invokable) {
        *self.primary.lock() = Some(CacheEntry { key, target });
    }

    /// Drops entries keyed on retired shapes. Returns how many were dropped.
    pub fn invalidate_stale(&self) -> usize {
        let mut dropped = 0;
        for slot in [&self.primary, &self.secondary] {
            let mut slot = slot.lock();
            if slot.as_ref().is_some_and(|e| e.key.is_stale()) {
                *slot = None;
                dropped += 1;
            }
        }
        dropped
    }

    pub fn occupancy(&self) -> usize {
        [&self.primary, &self.secondary].iter().filter(|s| s.lock().is_some()).count()
    }
}

fn probe(slot: &Mutex<Option<CacheEntry>>, key: &CacheKey) -> Option<Invokable> {
    match slot.lock().as_ref() {
        Some(entry) if entry.key.matches(key) => Some(entry.target.clone()),
        _ => None,
    }
}
