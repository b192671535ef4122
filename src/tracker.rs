use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::{Endpoint, EndpointStatus, ProbeResult, Transition};

/// Last-known reachability per endpoint, keyed by address.
///
/// Only the monitor loop calls [`StatusTracker::observe`]; everything else goes
/// through [`StatusTracker::snapshot`]. State is not restored from the event log
/// on restart: every endpoint starts out reachable.
pub struct StatusTracker {
    endpoints: Vec<Endpoint>,
    reachable: Mutex<HashMap<String, bool>>,
}

impl StatusTracker {
    pub fn new(endpoints: &[Endpoint]) -> Self {
        let reachable = endpoints
            .iter()
            .map(|e| (e.address.clone(), true))
            .collect();
        Self {
            endpoints: endpoints.to_vec(),
            reachable: Mutex::new(reachable),
        }
    }

    /// Folds one probe outcome into the stored state and reports a flip, if any.
    pub async fn observe(&self, address: &str, result: &ProbeResult) -> Option<Transition> {
        let now_up = result.is_up();
        let mut state = self.reachable.lock().await;
        let Some(was_up) = state.get_mut(address) else {
            warn!("Ignoring probe result for untracked address {}", address);
            return None;
        };

        match (*was_up, now_up) {
            (true, false) => {
                *was_up = false;
                Some(Transition::WentDown)
            }
            (false, true) => {
                *was_up = true;
                Some(Transition::WentUp)
            }
            _ => None,
        }
    }

    pub async fn is_reachable(&self, address: &str) -> Option<bool> {
        self.reachable.lock().await.get(address).copied()
    }

    /// Current state of every endpoint, in configuration order.
    pub async fn snapshot(&self) -> Vec<EndpointStatus> {
        let state = self.reachable.lock().await;
        self.endpoints
            .iter()
            .map(|e| EndpointStatus {
                name: e.name.clone(),
                address: e.address.clone(),
                reachable: state.get(&e.address).copied().unwrap_or(true),
            })
            .collect()
    }
}
