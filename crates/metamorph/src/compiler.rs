//! Per-mapper procedure cache.
//!
//! Lookups are lock-free. A miss takes the re-entrant synthesis lock, checks
//! again, and synthesizes. A pair requested again while its own synthesis is
//! running (a recursive shape) receives a deferred link to its slot.

use crate::error::Result;
use crate::procedure::{Procedure, Slot};
use crate::shape::Shape;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type PairKey = (Shape, Shape);

/// Synthesizes each (source, target) procedure at most once.
///
/// Failures are cached like successes.
#[derive(Default)]
pub struct ProcedureCache {
    slots: DashMap<PairKey, Arc<Slot>>,
    in_progress: ReentrantMutex<RefCell<HashSet<PairKey>>>,
    syntheses: AtomicUsize,
}

impl ProcedureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached procedure for the pair, running `synthesize` on first use.
    pub fn get_or_synthesize(
        &self,
        source: &Shape,
        target: &Shape,
        synthesize: impl FnOnce() -> Result<Procedure>,
    ) -> Result<Procedure> {
        let key = (source.clone(), target.clone());
        if let Some(done) = self.lookup(&key) {
            tracing::trace!(%source, %target, "procedure cache hit");
            return done;
        }

        let guard = self.in_progress.lock();
        if let Some(done) = self.lookup(&key) {
            return done;
        }
        if guard.borrow().contains(&key) {
            let slot = self.slot(&key);
            return Ok(Procedure::deferred(
                source.clone(),
                target.clone(),
                Arc::downgrade(&slot),
            ));
        }

        guard.borrow_mut().insert(key.clone());
        let slot = self.slot(&key);
        let result = synthesize();
        guard.borrow_mut().remove(&key);

        self.syntheses.fetch_add(1, Ordering::Relaxed);
        let _ = slot.set(result.clone());
        result
    }

    fn lookup(&self, key: &PairKey) -> Option<Result<Procedure>> {
        self.slots.get(key).and_then(|slot| slot.get().cloned())
    }

    fn slot(&self, key: &PairKey) -> Arc<Slot> {
        self.slots.entry(key.clone()).or_default().clone()
    }

    /// Number of completed syntheses, successful or not.
    pub fn syntheses(&self) -> usize {
        self.syntheses.load(Ordering::Relaxed)
    }

    /// Number of cached pairs.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapError;
    use crate::shape::Scalar;
    use crate::value::Value;
    use std::sync::Barrier;
    use std::thread;

    fn pair() -> (Shape, Shape) {
        (Shape::text(), Shape::scalar(Scalar::I32))
    }

    #[test]
    fn test_synthesizes_once() {
        let cache = ProcedureCache::new();
        let (source, target) = pair();
        let first = cache
            .get_or_synthesize(&source, &target, || Ok(Procedure::identity(Shape::text())))
            .expect("should synthesize");
        let second = cache
            .get_or_synthesize(&source, &target, || panic!("must not synthesize twice"))
            .expect("should hit cache");

        assert!(first.ptr_eq(&second));
        assert_eq!(cache.syntheses(), 1);
    }

    #[test]
    fn test_failures_are_cached() {
        let cache = ProcedureCache::new();
        let (source, target) = pair();
        let err = cache.get_or_synthesize(&source, &target, || {
            Err(MapError::unsupported("text", "i32", "nope"))
        });
        assert!(err.is_err());

        let again = cache.get_or_synthesize(&source, &target, || panic!("cached failure"));
        assert!(matches!(again, Err(MapError::Unsupported { .. })));
        assert_eq!(cache.syntheses(), 1);
    }

    #[test]
    fn test_reentrant_request_gets_deferred_link() {
        let cache = ProcedureCache::new();
        let (source, target) = pair();

        let outer = cache
            .get_or_synthesize(&source, &target, || {
                let inner = cache.get_or_synthesize(&source, &target, || {
                    panic!("recursive request must not synthesize")
                })?;
                Ok(Procedure::new(source.clone(), target.clone(), move |value| {
                    if value.is_null() {
                        Ok(Value::I32(0))
                    } else {
                        inner.call(Value::Null)
                    }
                }))
            })
            .expect("should synthesize");

        assert_eq!(outer.call(Value::from("x")).expect("via link"), Value::I32(0));
    }

    #[test]
    fn test_concurrent_first_use() {
        let cache = Arc::new(ProcedureCache::new());
        let barrier = Arc::new(Barrier::new(8));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    let (source, target) = pair();
                    barrier.wait();
                    cache
                        .get_or_synthesize(&source, &target, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(Procedure::identity(Shape::text()))
                        })
                        .expect("should synthesize")
                })
            })
            .collect();

        let procs: Vec<Procedure> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(procs.windows(2).all(|w| w[0].ptr_eq(&w[1])));
    }
}
