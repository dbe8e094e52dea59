//! Whether the remote store is believed reachable.
//!
//! The flag is a belief, not a measured result: it flips offline when a write
//! fails with a transport error and back online when a reachability check or a write
//! succeeds. Subscribers see every transition.

use tokio::sync::watch;

/// Shared connectivity state.
#[derive(Debug)]
pub struct Connectivity {
    state: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (state, _rx) = watch::channel(online);
        Self { state }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record a new belief. Returns true if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::warn!("Connectivity lost; writes will be queued");
            }
        }
        changed
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transitions_are_observed() {
        let connectivity = Connectivity::default();
        let mut rx = connectivity.subscribe();
        assert!(connectivity.is_online());

        assert!(connectivity.set_online(false));
        assert!(!connectivity.set_online(false));
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());

        assert!(connectivity.set_online(true));
        assert!(connectivity.is_online());
    }
}
