//! The cooperative heuristic: a single I/O lane, but the next request to
//! run is chosen by estimating how much aggregate work every other
//! waiting app would lose while it runs, not simply by arrival order.

use crate::app::{App, AppId};
use crate::event::{EventKind, EventQueue};
use crate::time::SimTime;

use super::InterferenceModel;

#[derive(Debug, Clone)]
struct PendingRequest {
    app: AppId,
    nb_nodes: usize,
    is_ckpt: bool,
    requested_at: SimTime,
    size: SimTime,
}

#[derive(Debug, Default)]
pub struct OrderedIoCoop {
    lane_busy_until: SimTime,
    queue: Vec<PendingRequest>,
    mtbf_ind: f64,
}

impl OrderedIoCoop {
    pub fn new(mtbf_ind: f64) -> OrderedIoCoop {
        OrderedIoCoop {
            lane_busy_until: SimTime::ZERO,
            queue: Vec::new(),
            mtbf_ind,
        }
    }

    /// Estimated aggregate work lost by every *other* queued request
    /// while `candidate` occupies the lane. Lower is better: it costs
    /// the rest of the fleet less to let this one go first.
    fn cost(&self, candidate: &PendingRequest, now: SimTime) -> f64 {
        let mut total = 0.0;
        for other in &self.queue {
            if other.app == candidate.app {
                continue;
            }
            let delay = now.saturating_sub(other.requested_at).as_secs_f64();
            let nodes = other.nb_nodes as f64;
            let size_s = candidate.size.as_secs_f64();
            if other.is_ckpt {
                total += nodes * (delay + size_s);
            } else {
                let ckpt_s = other.size.as_secs_f64();
                total += nodes * nodes * size_s / self.mtbf_ind.max(1.0)
                    * (ckpt_s + delay + size_s / 2.0);
            }
        }
        total
    }

    fn pick_next(&self, now: SimTime) -> Option<usize> {
        self.queue
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                self.cost(a, now)
                    .partial_cmp(&self.cost(b, now))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    fn dispatch_one(&mut self, now: SimTime, queue: &mut EventQueue) {
        if self.lane_busy_until > now {
            return;
        }
        let Some(idx) = self.pick_next(now) else {
            return;
        };
        let req = self.queue.remove(idx);
        let end = now + req.size;
        self.lane_busy_until = end;
        let kind = if req.is_ckpt {
            EventKind::CkptEnd(req.app)
        } else {
            EventKind::IoEnd(req.app)
        };
        queue.push(end, kind);
    }
}

impl InterferenceModel for OrderedIoCoop {
    fn start_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        app.stop_working(now);
        self.queue.push(PendingRequest {
            app: app.id,
            nb_nodes: app.nb_nodes().max(1),
            is_ckpt: false,
            requested_at: now,
            size: app.remaining_io,
        });
        self.dispatch_one(now, queue);
    }

    fn end_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        app.remaining_io = SimTime::ZERO;
        self.dispatch_one(now, queue);
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
        self.queue.push(PendingRequest {
            app: app.id,
            nb_nodes: app.nb_nodes().max(1),
            is_ckpt: true,
            requested_at: app.last_successful_ckpt.max(SimTime::ZERO),
            size: ckpt_time,
        });
        self.dispatch_one(now, queue);
        false
    }

    fn end_ckpt(&mut self, now: SimTime, app: &mut App, _queue: &mut EventQueue) -> bool {
        app.remaining_io = SimTime::ZERO;
        app.checkpoint_success(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppClass, ColorGradient};

    fn class() -> AppClass {
        AppClass {
            name: "t".into(),
            nb_nodes: 5,
            input_time: SimTime::ZERO,
            output_time: SimTime::ZERO,
            wall_time: SimTime(10_000),
            io_time_per_iter: SimTime::ZERO,
            ckpt_time: SimTime(100),
            bb_ckpt_time: SimTime(10),
            resource_share: 1.0,
            color: ColorGradient {
                from: (0, 0, 0),
                to: (0, 0, 0),
            },
        }
    }

    #[test]
    fn lone_request_dispatches_immediately() {
        let c = class();
        let mut app = App::new(AppId::new(0, 0), 0, &c);
        app.remaining_io = SimTime(200);
        let mut model = OrderedIoCoop::new(1_000_000.0);
        let mut q = EventQueue::new();
        model.start_io(SimTime(0), &mut app, &mut q);
        let ev = q.pop().unwrap();
        assert_eq!(ev.date, SimTime(200));
    }

    #[test]
    fn smaller_heuristic_cost_wins_the_lane() {
        // A (checkpoint, 5 nodes, size 100) and B (I/O, 5 nodes, size
        // 100) are both waiting when the lane frees up at t=50.
        // cost(A) weighs how much B (an I/O request) loses: with
        // mtbf_ind=1000, nb=5, size_s=0.1 -> 5*5*0.1/1000 * (0.1 + 0 +
        // 0.05) = 0.00075.
        // cost(B) weighs how much A (a checkpoint) loses: 5 * (0 + 0.1)
        // = 0.5. A's cost is far lower, so A (the checkpoint) must be
        // dispatched first even though both arrived at the same time.
        let mut model = OrderedIoCoop::new(1000.0);
        model.lane_busy_until = SimTime(50);
        model.queue.push(PendingRequest {
            app: AppId::new(1, 0),
            nb_nodes: 5,
            is_ckpt: true,
            requested_at: SimTime::ZERO,
            size: SimTime(100),
        });
        model.queue.push(PendingRequest {
            app: AppId::new(2, 0),
            nb_nodes: 5,
            is_ckpt: false,
            requested_at: SimTime::ZERO,
            size: SimTime(100),
        });

        let mut q = EventQueue::new();
        model.dispatch_one(SimTime(50), &mut q);

        let ev = q.pop().unwrap();
        assert_eq!(ev.kind, EventKind::CkptEnd(AppId::new(1, 0)));
        assert_eq!(ev.date, SimTime(150));
        // The I/O request is still waiting, not dispatched.
        assert_eq!(model.queue.len(), 1);
        assert_eq!(model.queue[0].app, AppId::new(2, 0));
    }
}
