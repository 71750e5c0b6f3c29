//! Fair-share contention: every concurrently-issuing app gets a rate
//! proportional to its node count, recomputed on every start/end.

use crate::app::{App, AppId};
use crate::event::{EventKind, EventQueue};
use crate::time::SimTime;

use super::InterferenceModel;

/// Slack tolerated when checking that a rate epoch never drains more
/// bytes than an app has remaining; anything beyond this is a logic
/// fault, not rounding noise.
const RATE_EPOCH_SLACK: SimTime = SimTime(1);

#[derive(Debug, Clone)]
struct Session {
    app: AppId,
    nb_nodes: usize,
    is_ckpt: bool,
    /// This model's own authoritative view of how much (rate-weighted)
    /// I/O time the session has left. Kept independent of `App`'s own
    /// `remaining_io` field so that draining one session's progress
    /// never depends on which app happens to be the one triggering the
    /// rebalance — every session drains on every rebalance, not just
    /// the caller's.
    remaining: SimTime,
}

/// Tracks every in-flight I/O so rates can be recomputed fairly whenever
/// the set of issuers changes. A session's completion event is always
/// cancelled and re-posted whenever the set changes, regardless of
/// which app's start/end call triggered the change.
#[derive(Debug, Default)]
pub struct SimpleInterference {
    sessions: Vec<Session>,
    date_of_last_change: SimTime,
}

impl SimpleInterference {
    pub fn new() -> SimpleInterference {
        SimpleInterference::default()
    }

    fn total_nodes(&self) -> usize {
        self.sessions.iter().map(|s| s.nb_nodes).sum()
    }

    fn rate_for(total: usize, nb_nodes: usize) -> f64 {
        if total == 0 {
            1.0
        } else {
            nb_nodes as f64 / total as f64
        }
    }

    /// Drains every session's `remaining` at the rate in effect since
    /// `date_of_last_change`, then advances the clock. Touches every
    /// session in the set, not just one app's.
    fn drain_elapsed(&mut self, now: SimTime) {
        let elapsed = now.saturating_sub(self.date_of_last_change);
        if elapsed > SimTime::ZERO {
            let total = self.total_nodes();
            for session in &mut self.sessions {
                let rate = Self::rate_for(total, session.nb_nodes);
                let drained = SimTime((elapsed.0 as f64 * rate).ceil() as i64);
                if drained > session.remaining + RATE_EPOCH_SLACK {
                    crate::logic_fault!(
                        "rate epoch drained {:?} but only {:?} remained",
                        drained,
                        session.remaining
                    );
                }
                session.remaining = session.remaining.saturating_sub(drained);
            }
        }
        self.date_of_last_change = now;
    }

    /// Cancels and re-posts every session's completion event at the rate
    /// in effect after the session set changed.
    fn reschedule_all(&self, now: SimTime, queue: &mut EventQueue) {
        let total = self.total_nodes();
        for session in &self.sessions {
            let kind = if session.is_ckpt {
                EventKind::CkptEnd(session.app)
            } else {
                EventKind::IoEnd(session.app)
            };
            queue.cancel_where(|e| e.kind == kind);
            let rate = Self::rate_for(total, session.nb_nodes);
            if rate > 0.0 && session.remaining > SimTime::ZERO {
                let delay = SimTime((session.remaining.0 as f64 / rate).floor() as i64);
                queue.push(now + delay, kind);
            }
        }
    }

    fn add_session(&mut self, now: SimTime, app: &mut App, is_ckpt: bool, queue: &mut EventQueue) {
        app.stop_working(now);
        self.drain_elapsed(now);
        self.sessions.push(Session {
            app: app.id,
            nb_nodes: app.nb_nodes().max(1),
            is_ckpt,
            remaining: app.remaining_io,
        });
        self.reschedule_all(now, queue);
    }

    fn remove_session(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        self.drain_elapsed(now);
        self.sessions.retain(|s| s.app != app.id);
        app.remaining_io = SimTime::ZERO;
        self.reschedule_all(now, queue);
    }
}

impl InterferenceModel for SimpleInterference {
    fn start_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        self.add_session(now, app, false, queue);
    }

    fn end_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        self.remove_session(now, app, queue);
    }

    fn start_ckpt(
        &mut self,
        now: SimTime,
        app: &mut App,
        ckpt_time: SimTime,
        _bb_ckpt_time: SimTime,
        queue: &mut EventQueue,
    ) -> bool {
        app.remaining_io = ckpt_time;
        self.add_session(now, app, true, queue);
        true
    }

    fn end_ckpt(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) -> bool {
        self.remove_session(now, app, queue);
        app.checkpoint_success(now);
        true
    }
}

/// [`SimpleInterference`] with a burst-buffer local stage: a checkpoint
/// first writes to node-local memory at `bb_ckpt_time` with no
/// contention, then drains to the parallel filesystem contending exactly
/// like a normal checkpoint.
#[derive(Debug, Default)]
pub struct SimpleInterferenceWithBurstBuffers {
    inner: SimpleInterference,
    /// PFS drain time recorded at `start_ckpt`, consulted once the local
    /// write finishes and `start_ckpt_io` begins the contended stage.
    pfs_time: std::collections::HashMap<AppId, SimTime>,
}

impl SimpleInterferenceWithBurstBuffers {
    pub fn new() -> SimpleInterferenceWithBurstBuffers {
        SimpleInterferenceWithBurstBuffers::default()
    }
}

impl InterferenceModel for SimpleInterferenceWithBurstBuffers {
    fn start_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        self.inner.start_io(now, app, queue);
    }

    fn end_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        self.inner.end_io(now, app, queue);
    }

    /// The local (uncontended) phase: returns `false` because the real
    /// checkpoint only "completes", in the sense the app state machine
    /// cares about, once the PFS drain finishes in `end_ckpt_io`.
    fn start_ckpt(
        &mut self,
        now: SimTime,
        app: &mut App,
        ckpt_time: SimTime,
        bb_ckpt_time: SimTime,
        queue: &mut EventQueue,
    ) -> bool {
        app.stop_working(now);
        app.is_checkpointing = true;
        self.pfs_time.insert(app.id, ckpt_time);
        queue.push(now + bb_ckpt_time, EventKind::CkptIoStart(app.id));
        false
    }

    fn end_ckpt(&mut self, _now: SimTime, _app: &mut App, _queue: &mut EventQueue) -> bool {
        false
    }

    fn start_ckpt_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        app.remaining_io = self.pfs_time.remove(&app.id).unwrap_or(SimTime::ZERO);
        self.inner.add_session(now, app, true, queue);
    }

    fn end_ckpt_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) -> bool {
        self.inner.remove_session(now, app, queue);
        app.is_checkpointing = false;
        app.checkpoint_success(now);
        true
    }
}
