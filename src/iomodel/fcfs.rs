//! A single global I/O lane serialised FCFS, but compute keeps running
//! while an app waits its turn. Checkpoints are deferred to the moment
//! the lane frees up, or cancelled outright if there isn't enough
//! remaining work left to justify waiting for the lane.

use crate::app::App;
use crate::event::{EventKind, EventQueue};
use crate::time::SimTime;

use super::InterferenceModel;

#[derive(Debug, Default)]
pub struct OrderedIoFcfs {
    date_of_last_io: SimTime,
}

impl OrderedIoFcfs {
    pub fn new() -> OrderedIoFcfs {
        OrderedIoFcfs::default()
    }
}

impl InterferenceModel for OrderedIoFcfs {
    fn start_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        app.stop_working(now);
        let start = self.date_of_last_io.max(now);
        let end = start + app.remaining_io;
        self.date_of_last_io = end;
        queue.push(end, EventKind::IoEnd(app.id));
    }

    fn end_io(&mut self, _now: SimTime, app: &mut App, _queue: &mut EventQueue) {
        app.remaining_io = SimTime::ZERO;
    }

    /// Compute keeps running. If the lane is busy beyond `now`, decide
    /// whether remaining work still leaves time to complete the
    /// checkpoint once the lane frees up; if not, skip it and head
    /// straight for the final output.
    fn start_ckpt(
        &mut self,
        now: SimTime,
        app: &mut App,
        ckpt_time: SimTime,
        _bb_ckpt_time: SimTime,
        queue: &mut EventQueue,
    ) -> bool {
        let lane_free_at = self.date_of_last_io.max(now);
        let real_remaining_work = app.remaining_work_at(now);

        if lane_free_at > now && real_remaining_work < (lane_free_at - now) + ckpt_time {
            queue.push(
                app.date_start_work + app.remaining_work,
                EventKind::IoStart(app.id),
            );
            return false;
        }

        let start = lane_free_at;
        let end = start + ckpt_time;
        self.date_of_last_io = end;
        app.remaining_io = ckpt_time;
        // Only re-post `CkptStart` when the lane frees later than now --
        // this very call already *is* the dispatch for `start == now`, so
        // posting another one at the same instant would fire the handler
        // a second time for nothing.
        if start > now {
            queue.push(start, EventKind::CkptStart(app.id));
        }
        queue.push(end, EventKind::CkptEnd(app.id));
        start == now
    }

    fn end_ckpt(&mut self, now: SimTime, app: &mut App, _queue: &mut EventQueue) -> bool {
        app.stop_working(now);
        app.remaining_io = SimTime::ZERO;
        app.checkpoint_success(now);
        true
    }
}
