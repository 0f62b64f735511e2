//! Per-thread stack of in-flight resolutions, used to detect cycles
//! and singletons capturing scoped services.

use crate::{descriptor::ServiceLifetime, error::Error};
use std::cell::RefCell;

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// One binding under construction
#[derive(Debug, Clone, Copy)]
pub(super) struct Frame {
    /// The provider that caches the instance, or the root for transient bindings
    pub(super) owner: usize,
    /// The provider the resolution was requested from
    pub(super) requester: usize,
    /// Index of the binding in the shared snapshot
    pub(super) index: usize,
    pub(super) lifetime: ServiceLifetime,
    pub(super) name: &'static str,
}

/// Pops its frame when dropped, on success and on failure alike
#[derive(Debug)]
pub(super) struct FrameGuard(());

impl Drop for FrameGuard {
    #[inline]
    fn drop(&mut self) {
        STACK.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

/// Pushes `frame` unless the same binding of the same owner is already in flight
pub(super) fn enter(frame: Frame) -> Result<FrameGuard, Error> {
    STACK.with_borrow_mut(|stack| {
        let reentry = stack
            .iter()
            .position(|f| f.owner == frame.owner && f.index == frame.index);

        if let Some(start) = reentry {
            let mut cycle = stack[start..]
                .iter()
                .map(|f| f.name)
                .collect::<Vec<_>>();
            cycle.push(frame.name);
            return Err(Error::CyclicDependency(cycle));
        }

        stack.push(frame);
        Ok(FrameGuard(()))
    })
}

/// Returns the innermost singleton under construction on behalf of `requester`, if any
pub(super) fn captor(requester: usize) -> Option<&'static str> {
    STACK.with_borrow(|stack| {
        stack
            .iter()
            .rev()
            .find(|f| f.requester == requester && f.lifetime == ServiceLifetime::Singleton)
            .map(|f| f.name)
    })
}

#[cfg(test)]
pub(super) fn depth() -> usize {
    STACK.with_borrow(Vec::len)
}
