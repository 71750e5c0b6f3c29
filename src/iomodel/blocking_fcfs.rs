//! A single global I/O lane, serialised strictly FCFS. Compute stops for
//! the app's entire wait behind the queue — the pessimistic baseline
//! against which the smarter ordered models are compared.

use crate::app::App;
use crate::event::{EventKind, EventQueue};
use crate::time::SimTime;

use super::InterferenceModel;

#[derive(Debug, Default)]
pub struct OrderedIoBlockingFcfs {
    date_of_last_io: SimTime,
}

impl OrderedIoBlockingFcfs {
    pub fn new() -> OrderedIoBlockingFcfs {
        OrderedIoBlockingFcfs::default()
    }

    fn enqueue(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue, kind_end: EventKind) {
        app.stop_working(now);
        let start = self.date_of_last_io.max(now);
        let end = start + app.remaining_io;
        self.date_of_last_io = end;
        queue.push(end, kind_end);
    }
}

impl InterferenceModel for OrderedIoBlockingFcfs {
    fn start_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        let id = app.id;
        self.enqueue(now, app, queue, EventKind::IoEnd(id));
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
        app.remaining_io = ckpt_time;
        let id = app.id;
        self.enqueue(now, app, queue, EventKind::CkptEnd(id));
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
    use crate::app::{AppClass, AppId, ColorGradient};

    fn class() -> AppClass {
        AppClass {
            name: "t".into(),
            nb_nodes: 5,
            input_time: SimTime::ZERO,
            output_time: SimTime::ZERO,
            wall_time: SimTime(1000),
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
    fn second_request_serialises_behind_first() {
        let c = class();
        let mut a = App::new(AppId::new(0, 0), 0, &c);
        let mut b = App::new(AppId::new(1, 0), 0, &c);
        a.remaining_io = SimTime(100);
        b.remaining_io = SimTime(50);

        let mut model = OrderedIoBlockingFcfs::new();
        let mut q = EventQueue::new();
        model.start_io(SimTime(0), &mut a, &mut q);
        model.start_io(SimTime(0), &mut b, &mut q);

        let first = q.pop().unwrap();
        let second = q.pop().unwrap();
        assert_eq!(first.date, SimTime(100));
        assert_eq!(second.date, SimTime(150));
    }
}
