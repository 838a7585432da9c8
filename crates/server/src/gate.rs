//! Single-resolution upload gate.
//!
//! The gate is the synchronization point between form validation and the
//! file stream: the handler resolves it as soon as the required metadata
//! field has been seen (or as soon as the request is known to be invalid),
//! and the continuation that releases buffered bytes to the object store
//! waits on it. It resolves exactly once; both the success and the
//! failure path may race to resolve it, so redundant resolutions are
//! benign no-ops.

use tokio::sync::watch;

/// The gate's resolved state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// The upload may proceed, carrying the validated metadata value.
    Proceed(String),
    /// The upload must be discarded without touching the object store.
    Abort,
}

/// A single-resolution synchronization cell.
///
/// Cloning the gate shares the underlying cell; any clone may resolve it
/// and any clone may wait on it.
#[derive(Clone, Debug)]
pub struct UploadGate {
    tx: watch::Sender<Option<GateDecision>>,
}

impl UploadGate {
    /// Create an unresolved gate.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Resolve the gate. The first caller wins; later calls are ignored.
    ///
    /// Returns whether this call performed the resolution.
    pub fn resolve(&self, decision: GateDecision) -> bool {
        self.tx.send_if_modified(|slot| match slot {
            Some(_) => false,
            None => {
                *slot = Some(decision);
                true
            }
        })
    }

    /// Whether the gate has resolved yet.
    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until the gate resolves and return the decision.
    ///
    /// Only suspends the calling task; resolution from any other task
    /// wakes it. A gate torn down without resolution reads as `Abort`.
    pub async fn resolved(&self) -> GateDecision {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot.clone().unwrap_or(GateDecision::Abort),
            Err(_) => GateDecision::Abort,
        }
    }
}

impl Default for UploadGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_resolution_wins() {
        let gate = UploadGate::new();

        assert!(gate.resolve(GateDecision::Proceed("chair".to_string())));
        assert!(!gate.resolve(GateDecision::Abort));
        assert!(!gate.resolve(GateDecision::Proceed("lamp".to_string())));

        assert_eq!(
            gate.resolved().await,
            GateDecision::Proceed("chair".to_string())
        );
    }

    #[tokio::test]
    async fn test_abort_sticks() {
        let gate = UploadGate::new();

        assert!(gate.resolve(GateDecision::Abort));
        assert!(!gate.resolve(GateDecision::Proceed("chair".to_string())));
        assert_eq!(gate.resolved().await, GateDecision::Abort);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_later_resolution() {
        let gate = UploadGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.resolved().await })
        };

        // Give the waiter a chance to suspend first
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!gate.is_resolved());
        gate.resolve(GateDecision::Proceed("lamp".to_string()));

        let decision = waiter.await.unwrap();
        assert_eq!(decision, GateDecision::Proceed("lamp".to_string()));
    }

    #[tokio::test]
    async fn test_resolved_after_resolution_returns_immediately() {
        let gate = UploadGate::new();
        gate.resolve(GateDecision::Abort);
        assert!(gate.is_resolved());
        assert_eq!(gate.resolved().await, GateDecision::Abort);
    }
}
