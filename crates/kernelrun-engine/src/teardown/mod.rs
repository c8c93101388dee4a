//! Ordered release of everything a compute flow acquired.
//!
//! Order: Buffers → Kernels → Programs → Queue → Context → Device reference.
//! Handles also release themselves when their last owner drops; this module
//! exists because the *order* is a correctness requirement.

mod ledger;

pub use ledger::{Outcome, ReleaseLedger, ReleaseStep, Stage};

use crate::session::Session;

/// A resource with an idempotent, explicitly ordered release.
pub trait Release {
    /// First stage this resource releases at; decides its teardown position.
    fn stage(&self) -> Stage;

    fn label(&self) -> String;

    /// Releases the resource, recording each step. Must be idempotent.
    fn release(&mut self, ledger: &mut ReleaseLedger);
}

/// Releases one flow's resources in dependency order.
pub fn release<S, P, K, B>(session: &mut S, mut program: P, mut kernel: K, buffers: Vec<B>) -> ReleaseLedger
where
    S: Release,
    P: Release,
    K: Release,
    B: Release,
{
    let mut ledger = ReleaseLedger::default();
    for mut buffer in buffers {
        buffer.release(&mut ledger);
    }
    kernel.release(&mut ledger);
    program.release(&mut ledger);
    session.release(&mut ledger);
    ledger
}

/// Scope guard owning a session and tracking everything created against it.
///
/// Resources are released in stage order on [`release_all`](Self::release_all)
/// or when the guard drops, so an early `?` return unwinds whatever was
/// acquired so far.
pub struct Teardown<S: Release = Session> {
    session: S,
    tracked: Vec<Box<dyn Release>>,
    ledger: ReleaseLedger,
    finished: bool,
}

impl<S: Release> Teardown<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            tracked: Vec::new(),
            ledger: ReleaseLedger::default(),
            finished: false,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Tracks a clone of `resource` and hands the resource back.
    pub fn adopt<R>(&mut self, resource: R) -> R
    where
        R: Release + Clone + 'static,
    {
        log::trace!("teardown: tracking {}", resource.label());
        self.tracked.push(Box::new(resource.clone()));
        resource
    }

    /// Releases everything in stage order. Safe to call more than once.
    pub fn release_all(&mut self) -> &ReleaseLedger {
        // Stable: equal stages keep acquisition order.
        self.tracked.sort_by_key(|r| r.stage());
        for resource in &mut self.tracked {
            resource.release(&mut self.ledger);
        }
        self.session.release(&mut self.ledger);

        if !self.finished {
            log::debug!(
                "teardown: released {} handle(s) for {}",
                self.ledger.released_count(),
                self.session.label()
            );
        }
        self.finished = true;
        &self.ledger
    }

    pub fn ledger(&self) -> &ReleaseLedger {
        &self.ledger
    }
}

impl<S: Release> Drop for Teardown<S> {
    fn drop(&mut self) {
        if !self.finished {
            self.release_all();
        }
    }
}
