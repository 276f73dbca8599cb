//! Priority-tiered codec registration.
//!
//! [`TransferSyntaxRegistryImpl`](crate::TransferSyntaxRegistryImpl) replaces
//! an entry only when the incoming codec is strictly more capable than the
//! one already held (see its `register` method). That rule is right for
//! merging a hand-written stub with a real implementation, but it cannot
//! express "this adapter was explicitly chosen by the application and
//! should win regardless of capability", which is what a user wiring up a
//! third-party codec (GDCM, OpenJPEG, a vendor SDK) usually wants.
//!
//! [`PriorityRegistry`] provides that ordering as a small standalone
//! structure: every registration carries a numeric priority, and an entry is
//! only ever replaced by a strictly higher one. It holds plain values rather
//! than being tied to [`TransferSyntax`](dicom_encoding::TransferSyntax), so
//! it can be reused to prioritize any keyed resource, not just codecs.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// A registration priority.
///
/// Higher values win. [`Priority::DEFAULT`], [`Priority::NATIVE`] and
/// [`Priority::OVERRIDE`] are the three tiers recognized by convention;
/// any other value is accepted for finer-grained control.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u32);

impl Priority {
    /// Priority of a default or pure-Rust reference implementation.
    pub const DEFAULT: Priority = Priority(50);
    /// Priority of a codec backed by a native (non-Rust) library.
    pub const NATIVE: Priority = Priority(100);
    /// Priority of an explicit override requested by the application.
    pub const OVERRIDE: Priority = Priority(200);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

struct Slot<T> {
    value: T,
    priority: Priority,
    source: &'static str,
    order: usize,
}

/// A registry in which later registrations only take effect if their
/// priority is strictly greater than the one currently held for the same
/// key. Ties are resolved in favor of whichever registration happened
/// first.
///
/// Lookups toggle an internal freeze latch (see [`PriorityRegistry::is_frozen`]);
/// this does not prevent further registrations, but signals to callers that
/// the registry has already been consulted and changing its contents after
/// this point may affect previously taken decisions. A negative-lookup cache
/// is kept so that repeated misses on unknown keys are cheap; any
/// registration for a key clears its cached miss, so a late registration is
/// always observed by the next lookup.
pub struct PriorityRegistry<T> {
    entries: RwLock<HashMap<String, Slot<T>>>,
    misses: RwLock<std::collections::HashSet<String>>,
    frozen: AtomicBool,
    seq: AtomicUsize,
}

impl<T> std::fmt::Debug for PriorityRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityRegistry")
            .field("len", &self.entries.read().unwrap().len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl<T> Default for PriorityRegistry<T> {
    fn default() -> Self {
        PriorityRegistry {
            entries: RwLock::new(HashMap::new()),
            misses: RwLock::new(std::collections::HashSet::new()),
            frozen: AtomicBool::new(false),
            seq: AtomicUsize::new(0),
        }
    }
}

impl<T> PriorityRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `key` with the given `priority`.
    ///
    /// Returns `true` if this registration took effect, i.e. no value was
    /// previously registered under `key`, or the previous one had a
    /// strictly lower priority. On a tie, the existing registration is kept
    /// and `false` is returned.
    pub fn register(
        &self,
        key: impl Into<String>,
        value: T,
        priority: Priority,
        source: &'static str,
    ) -> bool {
        let key = key.into();
        let order = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write().unwrap();
        let replace = match entries.get(&key) {
            Some(existing) => priority > existing.priority,
            None => true,
        };
        if replace {
            entries.insert(
                key.clone(),
                Slot {
                    value,
                    priority,
                    source,
                    order,
                },
            );
            self.misses.write().unwrap().remove(&key);
        }
        replace
    }

    /// Look up the highest-priority value registered for `key`, if any.
    ///
    /// Marks the registry as frozen as a side effect.
    pub fn get(&self, key: &str) -> Option<T>
    where
        T: Clone,
    {
        self.frozen.store(true, Ordering::Relaxed);
        if let Some(slot) = self.entries.read().unwrap().get(key) {
            return Some(slot.value.clone());
        }
        self.misses.write().unwrap().insert(key.to_owned());
        None
    }

    /// Return the source label and priority of the entry at `key`, if any,
    /// without cloning the registered value.
    pub fn describe(&self, key: &str) -> Option<(Priority, &'static str)> {
        self.frozen.store(true, Ordering::Relaxed);
        self.entries
            .read()
            .unwrap()
            .get(key)
            .map(|slot| (slot.priority, slot.source))
    }

    /// The registration order assigned to the current holder of `key`, used
    /// only to confirm tie-breaking behavior in tests.
    #[cfg(test)]
    fn order_of(&self, key: &str) -> Option<usize> {
        self.entries.read().unwrap().get(key).map(|slot| slot.order)
    }

    /// Whether this registry has ever answered a lookup.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Relaxed)
    }

    /// Whether `key` is cached as a known miss (for diagnostics and tests).
    #[cfg(test)]
    fn is_cached_miss(&self, key: &str) -> bool {
        self.misses.read().unwrap().contains(key)
    }
}
