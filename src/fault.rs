//! Node-fault injection and the restart handshake with the app table.

use crate::app::{App, AppId};
use crate::event::{EventKind, EventQueue};
use crate::rng::SimRng;
use crate::time::SimTime;

/// Draws node-fault times from an exponential distribution with rate
/// `nb_nodes / mtbf_ind` and picks the faulted node uniformly.
pub struct FaultGenerator {
    pub nb_nodes: usize,
    pub mtbf_ind: f64,
    pub enabled: bool,
}

impl FaultGenerator {
    pub fn new(nb_nodes: usize, mtbf_ind: f64, enabled: bool) -> FaultGenerator {
        FaultGenerator {
            nb_nodes,
            mtbf_ind,
            enabled,
        }
    }

    fn lambda_per_us(&self) -> f64 {
        // mtbf_ind is in seconds; convert the rate to "per microsecond"
        // so the delay it produces is directly in simulated time units.
        (self.nb_nodes as f64 / self.mtbf_ind) / crate::time::TIME_UNIT as f64
    }

    /// Inserts the next `NodeFault` event, if fault injection is enabled.
    pub fn schedule_next(&self, now: SimTime, rng: &mut SimRng, queue: &mut EventQueue) {
        if !self.enabled {
            return;
        }
        let delay = rng.next_exponential_delay(self.lambda_per_us());
        let node = rng.uniform_node(self.nb_nodes);
        tracing::trace!(node, at = (now + SimTime(delay)).0, "next node fault scheduled");
        queue.push(now + SimTime(delay), EventKind::NodeFault { node });
    }

    /// Finds the first app (in declaration order) occupying `node` at
    /// `date`, if any.
    pub fn find_impacted<'a>(apps: &'a [App], ids_at_date: &[AppId], node: usize) -> Option<&'a App> {
        ids_at_date
            .iter()
            .filter_map(|id| apps.iter().find(|a| a.id == *id))
            .find(|a| a.nodes.contains(&node))
    }
}
