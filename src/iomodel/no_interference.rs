//! Every I/O completes in exactly `remaining_io` time, regardless of
//! what else is in flight. The optimistic baseline.

use crate::app::App;
use crate::event::{EventKind, EventQueue};
use crate::time::SimTime;

use super::InterferenceModel;

#[derive(Debug, Default)]
pub struct NoInterference;

impl NoInterference {
    pub fn new() -> NoInterference {
        NoInterference
    }
}

impl InterferenceModel for NoInterference {
    fn start_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        app.stop_working(now);
        queue.push(now + app.remaining_io, EventKind::IoEnd(app.id));
    }

    fn end_io(&mut self, _now: SimTime, app: &mut App, _queue: &mut EventQueue) {
        app.remaining_io = SimTime::ZERO;
    }

    fn start_ckpt(
        &mut self,
        now: SimTime,
        app: &mut App,
        ckpt_time: SimTime,
        _bb_ckpt_time: SimTime,
        queue: &mut EventQueue,
    ) -> bool {
        app.stop_working(now);
        app.remaining_io = ckpt_time;
        queue.push(now + ckpt_time, EventKind::CkptEnd(app.id));
        true
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
    use crate::app::AppId;

    fn sample_app() -> App {
        let class = crate::app::AppClass {
            name: "t".into(),
            nb_nodes: 1,
            input_time: SimTime(1000),
            output_time: SimTime(1000),
            wall_time: SimTime(10_000),
            io_time_per_iter: SimTime::ZERO,
            ckpt_time: SimTime(500),
            bb_ckpt_time: SimTime(50),
            resource_share: 1.0,
            color: crate::app::ColorGradient {
                from: (0, 0, 0),
                to: (0, 0, 0),
            },
        };
        App::new(AppId::new(0, 0), 0, &class)
    }

    #[test]
    fn io_end_is_at_now_plus_remaining() {
        let mut model = NoInterference::new();
        let mut app = sample_app();
        let mut q = EventQueue::new();
        app.remaining_io = SimTime(1000);
        model.start_io(SimTime(100), &mut app, &mut q);
        let ev = q.pop().unwrap();
        assert_eq!(ev.date, SimTime(1100));
        assert_eq!(ev.kind, EventKind::IoEnd(app.id));
    }

    #[test]
    fn end_io_zeroes_remaining() {
        let mut model = NoInterference::new();
        let mut app = sample_app();
        app.remaining_io = SimTime(500);
        let mut q = EventQueue::new();
        model.end_io(SimTime(0), &mut app, &mut q);
        assert_eq!(app.remaining_io, SimTime::ZERO);
    }
}
