//! The dispatch loop: wires the planner, event queue, app state machine,
//! I/O model and fault generator together.

use crate::app::{App, AppId};
use crate::event::{Event, EventKind, EventQueue};
use crate::fault::FaultGenerator;
use crate::iomodel::{InterferenceModel, IoModel};
use crate::planner::Schedule;
use crate::rng::SimRng;
use crate::system::System;
use crate::time::SimTime;
use crate::trace::{Action, Slice, Trace};

/// Safety cap on simulated time, expressed as a multiple of the
/// system's minimum run length. If the clock passes this without the
/// queue draining, the run is reported as non-converged rather than
/// looping forever.
const CONVERGENCE_FACTOR: i64 = 20;

pub struct Simulation<'a, T: Trace> {
    pub system: &'a System,
    pub apps: Vec<App>,
    pub schedule: Schedule,
    pub queue: EventQueue,
    pub model: IoModel,
    pub fault_gen: FaultGenerator,
    pub rng: SimRng,
    pub trace: T,
    pub curdate: SimTime,
    pub converged: bool,
    /// Apps the planner couldn't fit the last time they tried to start
    /// (or restart). Retried opportunistically after every dispatched
    /// event rather than by re-queuing an event at the same instant,
    /// which would spin forever if capacity never frees up before the
    /// queue otherwise drains.
    pending_starts: Vec<AppId>,
}

impl<'a, T: Trace> Simulation<'a, T> {
    pub fn new(
        system: &'a System,
        model: IoModel,
        seed: u64,
        inject_faults: bool,
        trace: T,
    ) -> Simulation<'a, T> {
        let mut rng = SimRng::from_seed(seed);
        let apps = system.finalize(&mut rng);
        let mtbf_ind = system.mtbf_ind();
        let fault_gen = FaultGenerator::new(system.nb_nodes, mtbf_ind, inject_faults);
        let schedule = Schedule::new(system.nb_nodes);
        let mut queue = EventQueue::new();

        for app in &apps {
            queue.push(SimTime::ZERO, EventKind::AppStart(app.id));
        }
        fault_gen.schedule_next(SimTime::ZERO, &mut rng, &mut queue);

        // Initial placement happens lazily: AppStart handlers ask the
        // planner to fit each app in turn, in queue order, rather than
        // placing everything up front — this matches the reference
        // driver's "place on start" discipline and lets restarted apps
        // reuse the exact same code path.

        Simulation {
            system,
            apps,
            schedule,
            queue,
            model,
            fault_gen,
            rng,
            trace,
            curdate: SimTime::ZERO,
            converged: true,
            pending_starts: Vec::new(),
        }
    }

    fn find_index(&self, id: AppId) -> Option<usize> {
        self.apps.iter().position(|a| a.id == id)
    }

    /// Runs until the queue drains or the convergence cap is hit.
    pub fn run(&mut self) {
        let cap = self.system.min_run + SimTime(self.system.min_run.0 * CONVERGENCE_FACTOR);
        tracing::debug!(model = self.model.name(), apps = self.apps.len(), "starting run");
        let mut dispatched: u64 = 0;
        while let Some(event) = self.queue.pop() {
            if event.date > cap {
                self.converged = false;
                tracing::warn!(cap = cap.0, "simulation did not converge before the safety cap");
                break;
            }
            self.curdate = event.date;
            self.dispatch(event);
            self.retry_pending_starts();
            dispatched += 1;
        }
        tracing::debug!(dispatched, converged = self.converged, "run finished");
        let _ = self.trace.finish();
    }

    /// Attempts to place every app still waiting for room, in the order
    /// they first tried to start. Apps that still don't fit stay pending
    /// for the next event.
    fn retry_pending_starts(&mut self) {
        if self.pending_starts.is_empty() {
            return;
        }
        let waiting = std::mem::take(&mut self.pending_starts);
        for id in waiting {
            self.try_start(id);
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event.kind {
            EventKind::NodeFault { node } => self.on_node_fault(node),
            EventKind::AppStart(id) => self.on_app_start(id),
            EventKind::AppEnd(id) => self.on_app_end(id),
            EventKind::AppFailure(id) => self.on_app_failure(id),
            EventKind::CkptStart(id) => self.on_ckpt_start(id),
            EventKind::CkptEnd(id) => self.on_ckpt_end(id),
            EventKind::IoStart(id) => self.on_io_start(id),
            EventKind::IoEnd(id) => self.on_io_end(id),
            EventKind::CkptIoStart(id) => self.on_ckpt_io_start(id),
            EventKind::CkptIoEnd(id) => self.on_ckpt_io_end(id),
        }
    }

    fn on_app_start(&mut self, id: AppId) {
        self.try_start(id);
    }

    /// Asks the planner to fit `id` at `curdate`. Queues its `IoStart` on
    /// success; otherwise parks it in `pending_starts` for the next
    /// opportunity rather than spinning on the event queue.
    fn try_start(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        let class = &self.system.classes[self.apps[idx].class];
        let wall_time = class.wall_time;
        let nb_nodes = class.nb_nodes;
        let placed = self.schedule.fit(self.curdate, wall_time, nb_nodes);
        let Some(nodes) = placed else {
            self.pending_starts.push(id);
            return;
        };
        self.schedule
            .place(&self.apps[idx].clone(), self.curdate, wall_time, &nodes);
        self.apps[idx].schedule(self.curdate, self.curdate + wall_time, nodes);
        self.queue.push(self.curdate, EventKind::IoStart(id));
        // Deadline check: if the app hasn't actually finished by the time
        // its planned window elapses, `on_app_end` projects a later end
        // and re-arms this same event rather than freeing nodes it still
        // needs.
        self.queue
            .push(self.curdate + wall_time, EventKind::AppEnd(id));
    }

    fn on_io_start(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        let was_working = self.apps[idx].working;
        let work_start = self.apps[idx].date_start_work;
        if self.apps[idx].remaining_io == SimTime::ZERO {
            self.queue.push(self.curdate, EventKind::IoEnd(id));
            return;
        }
        let mut app = Self::take(&mut self.apps, idx);
        self.model.start_io(self.curdate, &mut app, &mut self.queue);
        self.apps[idx] = app;
        self.record_work_if_stopped(id, idx, was_working, work_start);
    }

    /// Records a `Work` slice for `[work_start, curdate)` if the model
    /// call that just ran actually stopped the app's compute clock. Most
    /// models pause compute the instant a checkpoint or I/O request is
    /// issued, but the FCFS and cooperative heuristics let compute
    /// overlap the request and only pause later (FCFS: at the matching
    /// `end_ckpt`; Coop: never, until the next real `start_io`) -- in
    /// those cases this is a no-op here and the slice is recorded at
    /// whichever call actually stops it.
    fn record_work_if_stopped(&mut self, id: AppId, idx: usize, was_working: bool, work_start: SimTime) {
        if !(was_working && !self.apps[idx].working) {
            return;
        }
        let nb_nodes = self.apps[idx].nb_nodes();
        self.trace.record(Slice {
            app: id,
            nb_nodes,
            action: Action::Work,
            start: work_start,
            duration: self.curdate.saturating_sub(work_start),
        });
    }

    fn on_io_end(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        let class_idx = self.apps[idx].class;
        let mut app = Self::take(&mut self.apps, idx);
        let nb_nodes = app.nb_nodes();
        let io_start_date = self.curdate.saturating_sub(app.remaining_io);
        self.model.end_io(self.curdate, &mut app, &mut self.queue);
        self.trace.record(Slice {
            app: id,
            nb_nodes,
            action: Action::Io,
            start: io_start_date,
            duration: self.curdate.saturating_sub(io_start_date),
        });

        if app.remaining_work == SimTime::ZERO {
            // Genuinely done ahead of (or exactly at) the deadline check
            // armed by `try_start`: cancel it so `on_app_end` doesn't see
            // it a second time after the app has already been stripped
            // from the schedule.
            self.queue.cancel_app_events(id);
            self.apps[idx] = app;
            self.queue.push(self.curdate, EventKind::AppEnd(id));
            return;
        }

        app.start_working(self.curdate);
        let interval = self.system.ckpt_interval(&self.system.classes[class_idx]);
        if interval >= app.remaining_work {
            let final_io_at = self.curdate + app.remaining_work;
            self.apps[idx] = app;
            self.queue.push(final_io_at, EventKind::IoStart(id));
        } else {
            let ckpt_at = self.curdate + interval;
            self.apps[idx] = app;
            self.queue.push(ckpt_at, EventKind::CkptStart(id));
        }
    }

    fn on_ckpt_start(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        let was_working = self.apps[idx].working;
        let work_start = self.apps[idx].date_start_work;
        let class_idx = self.apps[idx].class;
        let class = &self.system.classes[class_idx];
        let ckpt_time = class.ckpt_time;
        let bb_ckpt_time = class.bb_ckpt_time;
        let nb_nodes = self.apps[idx].nb_nodes();
        let mut app = Self::take(&mut self.apps, idx);
        let started = self
            .model
            .start_ckpt(self.curdate, &mut app, ckpt_time, bb_ckpt_time, &mut self.queue);
        self.apps[idx] = app;
        self.record_work_if_stopped(id, idx, was_working, work_start);
        if started {
            self.trace.record(Slice {
                app: id,
                nb_nodes,
                action: Action::Ckpt,
                start: self.curdate,
                duration: ckpt_time,
            });
        }
    }

    fn on_ckpt_end(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        let was_working = self.apps[idx].working;
        let work_start = self.apps[idx].date_start_work;
        let class_idx = self.apps[idx].class;
        let mut app = Self::take(&mut self.apps, idx);
        let success = self.model.end_ckpt(self.curdate, &mut app, &mut self.queue);
        self.apps[idx] = app;
        self.record_work_if_stopped(id, idx, was_working, work_start);
        if success {
            let mut app = Self::take(&mut self.apps, idx);
            app.start_working(self.curdate);
            let interval = self.system.ckpt_interval(&self.system.classes[class_idx]);
            self.apps[idx] = app;
            let remaining = self.apps[idx].remaining_work;
            if remaining == SimTime::ZERO {
                self.queue.push(self.curdate, EventKind::IoStart(id));
            } else if interval >= remaining {
                self.queue.push(self.curdate + remaining, EventKind::IoStart(id));
            } else {
                self.queue.push(self.curdate + interval, EventKind::CkptStart(id));
            }
        }
    }

    fn on_ckpt_io_start(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        let mut app = Self::take(&mut self.apps, idx);
        self.model.start_ckpt_io(self.curdate, &mut app, &mut self.queue);
        self.apps[idx] = app;
    }

    fn on_ckpt_io_end(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        let class_idx = self.apps[idx].class;
        let nb_nodes = self.apps[idx].nb_nodes();
        let mut app = Self::take(&mut self.apps, idx);
        let success = self.model.end_ckpt_io(self.curdate, &mut app, &mut self.queue);
        self.trace.record(Slice {
            app: id,
            nb_nodes,
            action: Action::Ckpt,
            start: self.curdate,
            duration: SimTime::ZERO,
        });
        if success {
            app.start_working(self.curdate);
            let interval = self.system.ckpt_interval(&self.system.classes[class_idx]);
            self.apps[idx] = app;
            let remaining = self.apps[idx].remaining_work;
            if remaining == SimTime::ZERO {
                self.queue.push(self.curdate, EventKind::IoStart(id));
            } else if interval >= remaining {
                self.queue.push(self.curdate + remaining, EventKind::IoStart(id));
            } else {
                self.queue.push(self.curdate + interval, EventKind::CkptStart(id));
            }
        } else {
            self.apps[idx] = app;
        }
    }

    /// Fires either when the app genuinely finishes (queued immediately
    /// by `on_io_end`) or when a deadline check armed by `try_start`
    /// elapses while work or I/O still remains. In the latter case the
    /// app hasn't failed — it's just running past its originally
    /// estimated window — so the planner's reservation is pushed out to
    /// a freshly projected end and the deadline check re-armed there.
    fn on_app_end(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        if self.apps[idx].remaining_work == SimTime::ZERO
            && self.apps[idx].remaining_io == SimTime::ZERO
        {
            let mut app = Self::take(&mut self.apps, idx);
            app.completed = true;
            let end_date = self.curdate;
            // Shrink the reservation to end now; `update_end` grows
            // instead if this fires later than the last projected end
            // (shouldn't normally happen — the deadline check re-arms
            // itself at exactly that projection), logging a fault rather
            // than silently clobbering another app's nodes if it can't.
            // The compute itself was already recorded incrementally by
            // `record_work_if_stopped` at every transition that actually
            // paused the app's clock, so there's no further Work slice
            // to add here.
            if !self.schedule.update_end(&app, end_date) {
                crate::logic_fault!("planner could not extend app's reservation to its true end");
            }
            app.end_date = end_date;
            self.apps[idx] = app;
        } else {
            let mut app = Self::take(&mut self.apps, idx);
            let class = &self.system.classes[app.class];
            let nbckpt = 1i64;
            let projected = self.curdate
                + SimTime(
                    (1.2
                        * (app.remaining_io.as_secs_f64()
                            + app.remaining_work.as_secs_f64()
                            + nbckpt as f64 * class.ckpt_time.as_secs_f64()))
                    .ceil() as i64
                        * crate::time::TIME_UNIT,
                );
            if self.schedule.update_end(&app, projected) {
                app.end_date = projected;
                self.queue.push(projected, EventKind::AppEnd(id));
            } else {
                crate::logic_fault!("planner could not extend app's reservation past its projected end");
                app.end_date = projected;
            }
            self.apps[idx] = app;
        }
    }

    fn on_node_fault(&mut self, node: usize) {
        self.fault_gen
            .schedule_next(self.curdate, &mut self.rng, &mut self.queue);

        let ids_at_date = self.schedule.apps_at(self.curdate).to_vec();
        let impacted = FaultGenerator::find_impacted(&self.apps, &ids_at_date, node);
        let Some(impacted) = impacted else {
            return;
        };
        let id = impacted.id;
        self.queue.push(self.curdate, EventKind::AppFailure(id));
    }

    fn on_app_failure(&mut self, id: AppId) {
        let Some(idx) = self.find_index(id) else {
            return;
        };
        let class = self.apps[idx].class;
        self.apps[idx].stop_working(self.curdate);
        let wasted = self
            .curdate
            .saturating_sub(self.apps[idx].last_successful_ckpt.max(SimTime::ZERO));
        let nb_nodes = self.apps[idx].nb_nodes();
        self.trace.record(Slice {
            app: id,
            nb_nodes,
            action: Action::Wasted,
            start: self.curdate.saturating_sub(wasted),
            duration: wasted,
        });

        self.queue.cancel_app_events(id);
        // Shrink the reservation to end at the fault rather than at
        // whatever end date it last held — `update_end` always succeeds
        // when shrinking, and frees `(curdate, end_date]` instead of
        // leaving it falsely occupied.
        self.schedule.update_end(&self.apps[idx], self.curdate);

        let restarted = App::restart_from(&self.apps[idx], &self.system.classes[class]);
        tracing::info!(
            app = id.index,
            instance = restarted.id.instance,
            at = self.curdate.0,
            "app restarted after fault"
        );
        self.apps[idx] = restarted;
        self.queue
            .push(self.curdate, EventKind::AppStart(self.apps[idx].id));
    }

    /// Clones `apps[idx]` out so it can be mutated independently of the
    /// `Vec` it lives in, then written back with `apps[idx] = app`.
    fn take(apps: &mut [App], idx: usize) -> App {
        apps[idx].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iomodel::NoInterference;
    use crate::trace::NullTrace;

    #[test]
    fn simulation_drains_queue_or_reports_nonconvergence() {
        let system = crate::config::demo_system();
        let mut sim = Simulation::new(
            &system,
            IoModel::NoInterference(NoInterference::new()),
            1,
            false,
            NullTrace,
        );
        sim.run();
        // Either it converged (queue drained inside the cap) or it was
        // explicitly marked non-convergent; it must never silently hang.
        let _ = sim.converged;
    }

    #[test]
    fn disabling_faults_means_no_wasted_restarts() {
        let system = crate::config::demo_system();
        let mut sim = Simulation::new(
            &system,
            IoModel::NoInterference(NoInterference::new()),
            1,
            false,
            NullTrace,
        );
        sim.run();
        assert!(sim.apps.iter().all(|a| a.id.instance == 0));
    }
}
