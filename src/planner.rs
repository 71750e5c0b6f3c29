//! The backfill planner: a timeline of node-occupancy snapshots and the
//! placement logic apps are fit into.

use std::collections::BTreeMap;

use crate::app::{App, AppId};
use crate::time::SimTime;

/// A snapshot of which nodes are occupied, and by which apps, valid from
/// its key time up to the next snapshot's key.
#[derive(Debug, Clone, Default)]
pub struct SchedEvent {
    pub occ: Vec<bool>,
    pub apps: Vec<AppId>,
}

impl SchedEvent {
    fn new(nb_nodes: usize) -> SchedEvent {
        SchedEvent {
            occ: vec![false; nb_nodes],
            apps: Vec::new(),
        }
    }

    fn free_count(&self) -> usize {
        self.occ.iter().filter(|b| !**b).count()
    }
}

/// Ordered mapping from time to [`SchedEvent`]. Always has an entry at
/// `t = 0` and a terminal entry with zero occupation.
pub struct Schedule {
    nb_nodes: usize,
    timeline: BTreeMap<SimTime, SchedEvent>,
}

impl Schedule {
    pub fn new(nb_nodes: usize) -> Schedule {
        let mut timeline = BTreeMap::new();
        timeline.insert(SimTime::ZERO, SchedEvent::new(nb_nodes));
        Schedule {
            nb_nodes,
            timeline,
        }
    }

    /// The snapshot effective at `t`: the entry at the greatest key ≤ t.
    fn snapshot_at(&self, t: SimTime) -> &SchedEvent {
        self.timeline
            .range(..=t)
            .next_back()
            .map(|(_, s)| s)
            .expect("schedule always has an entry at t=0")
    }

    /// Ensures a snapshot exists at `t`, cloning the preceding one if
    /// necessary, and returns a mutable reference to it.
    fn snapshot_at_mut(&mut self, t: SimTime) -> &mut SchedEvent {
        if !self.timeline.contains_key(&t) {
            let prev = self.snapshot_at(t).clone();
            self.timeline.insert(t, prev);
        }
        self.timeline.get_mut(&t).unwrap()
    }

    fn keys_in_range(&self, start: SimTime, end: SimTime) -> Vec<SimTime> {
        self.timeline
            .range(start..end)
            .map(|(t, _)| *t)
            .collect()
    }

    /// Attempts to fit `nb_nodes` nodes for the window `[t, t+duration)`.
    /// Fast pre-pass: bail out if the busiest overlapping snapshot lacks
    /// enough free nodes. Slow pass: scan every node index free at `t`
    /// (not just the first `nb_nodes` of them) and keep the ones that
    /// stay free for the whole window, stopping once enough are found.
    /// A node free at `t` but not the whole way through must not knock
    /// a later, fully-free node out of consideration.
    pub fn fit(&self, t: SimTime, duration: SimTime, nb_nodes: usize) -> Option<Vec<usize>> {
        let end = t + duration;
        let overlapping = self.keys_in_range(t, end);
        let mut keys = vec![t];
        keys.extend(overlapping);

        for k in &keys {
            if self.snapshot_at(*k).free_count() < nb_nodes {
                return None;
            }
        }

        let base = self.snapshot_at(t);
        let mut survivors = Vec::with_capacity(nb_nodes);
        for node in 0..self.nb_nodes {
            if base.occ[node] {
                continue;
            }
            let free_throughout = keys.iter().all(|k| !self.snapshot_at(*k).occ[node]);
            if free_throughout {
                survivors.push(node);
                if survivors.len() == nb_nodes {
                    break;
                }
            }
        }
        if survivors.len() < nb_nodes {
            return None;
        }
        Some(survivors)
    }

    /// Places `app` at `[start, start+duration)` on `nodes`, splicing a
    /// start snapshot (nodes marked busy, app added) and a terminator
    /// snapshot derived from the last one overlapping the window (app
    /// removed, nodes freed unless another app reuses them).
    pub fn place(&mut self, app: &App, start: SimTime, duration: SimTime, nodes: &[usize]) {
        self.place_id(app.id, start, duration, nodes);
    }

    fn place_id(&mut self, id: AppId, start: SimTime, duration: SimTime, nodes: &[usize]) {
        let end = start + duration;

        {
            let snap = self.snapshot_at_mut(start);
            for &n in nodes {
                snap.occ[n] = true;
            }
            if !snap.apps.contains(&id) {
                snap.apps.push(id);
            }
        }

        for k in self.keys_in_range(start + SimTime(1), end) {
            let snap = self.timeline.get_mut(&k).unwrap();
            for &n in nodes {
                snap.occ[n] = true;
            }
            if !snap.apps.contains(&id) {
                snap.apps.push(id);
            }
        }

        let terminator = self.snapshot_at_mut(end);
        for &n in nodes {
            terminator.occ[n] = false;
        }
        terminator.apps.retain(|a| *a != id);
    }

    /// Grows or shrinks `app`'s placement from its current `end_date` to
    /// `new_end`, re-splicing the terminator snapshot accordingly.
    /// Shrinking always succeeds: presence is simply removed from
    /// `(new_end, old_end]`. Growing fails (returning `false`, leaving
    /// the schedule untouched) if any of `app.nodes` is occupied by
    /// another app anywhere in `[old_end, new_end)`.
    pub fn update_end(&mut self, app: &App, new_end: SimTime) -> bool {
        let old_end = app.end_date;
        if new_end == old_end {
            return true;
        }

        if new_end < old_end {
            self.strip(app.id, &app.nodes, new_end, old_end);
            let terminator = self.snapshot_at_mut(new_end);
            for &n in &app.nodes {
                terminator.occ[n] = false;
            }
            terminator.apps.retain(|id| *id != app.id);
            return true;
        }

        let keys = self.keys_in_range(old_end, new_end);
        for k in &keys {
            let snap = self.snapshot_at(*k);
            for &n in &app.nodes {
                if snap.occ[n] {
                    return false;
                }
            }
        }
        for &k in &keys {
            let snap = self.snapshot_at_mut(k);
            for &n in &app.nodes {
                snap.occ[n] = true;
            }
            if !snap.apps.contains(&app.id) {
                snap.apps.push(app.id);
            }
        }
        let terminator = self.snapshot_at_mut(new_end);
        for &n in &app.nodes {
            terminator.occ[n] = false;
        }
        terminator.apps.retain(|id| *id != app.id);
        true
    }

    /// For each `(id, nb_nodes, duration)` request not already present
    /// somewhere in the timeline, finds the earliest snapshot boundary at
    /// or after `t` that [`fit`] accepts and places it there immediately.
    /// Requests already placed are left untouched (so calling this twice
    /// with the same requests is a no-op the second time); requests that
    /// fit nowhere in the existing timeline are simply absent from the
    /// result, left for the caller to retry later.
    pub fn reschedule_from(
        &mut self,
        t: SimTime,
        requests: &[(AppId, usize, SimTime)],
    ) -> Vec<(AppId, SimTime, Vec<usize>)> {
        let mut times: Vec<SimTime> = std::iter::once(t)
            .chain(self.timeline.range(t..).map(|(k, _)| *k))
            .collect();
        times.sort();
        times.dedup();

        let mut placed = Vec::new();
        for &(id, nb_nodes, duration) in requests {
            if self.is_placed(id) {
                continue;
            }
            let mut chosen = None;
            for &candidate in &times {
                if let Some(nodes) = self.fit(candidate, duration, nb_nodes) {
                    chosen = Some((candidate, nodes));
                    break;
                }
            }
            if let Some((start, nodes)) = chosen {
                self.place_id(id, start, duration, &nodes);
                placed.push((id, start, nodes));
            }
        }
        placed
    }

    fn is_placed(&self, id: AppId) -> bool {
        self.timeline.values().any(|s| s.apps.contains(&id))
    }

    /// Removes `app` from every snapshot with key in `(from, to]`,
    /// leaving its presence intact before `from`.
    pub fn strip(&mut self, app_id: AppId, nodes: &[usize], from: SimTime, to: SimTime) {
        for k in self.keys_in_range(from + SimTime(1), to + SimTime(1)) {
            let snap = self.timeline.get_mut(&k).unwrap();
            for &n in nodes {
                snap.occ[n] = false;
            }
            snap.apps.retain(|id| *id != app_id);
        }
    }

    /// Removes every placed app whose start date is `>= t`, so callers
    /// can treat them as unplaced and re-run `fit` for them.
    pub fn remove_events_at_date(&mut self, t: SimTime, apps: &[App]) -> Vec<AppId> {
        let mut removed = Vec::new();
        for app in apps {
            if app.start_date.is_defined() && app.start_date >= t {
                self.strip(app.id, &app.nodes, app.start_date.saturating_sub(SimTime(1)), app.end_date);
                removed.push(app.id);
            }
        }
        removed
    }

    pub fn nb_free(&self, t: SimTime) -> usize {
        self.snapshot_at(t).free_count()
    }

    pub fn apps_at(&self, t: SimTime) -> &[AppId] {
        &self.snapshot_at(t).apps
    }

    /// Debug-mode invariant check: the final snapshot must be empty, and
    /// no snapshot may double-book a node beyond its own bitset length.
    /// A violation here is always a bug, never a workload condition.
    pub fn check_invariants(&self) {
        if let Some((_, last)) = self.timeline.iter().next_back() {
            if last.occ.iter().any(|b| *b) || !last.apps.is_empty() {
                crate::logic_fault!("terminal schedule snapshot is not empty");
            }
        }
    }
}
