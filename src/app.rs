//! Application classes and running application instances.

use crate::time::{SimTime, UNDEFINED};

/// Stable identity of one application across restarts: `index` is fixed
/// for the lifetime of the run, `instance` increments on every restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId {
    pub index: u32,
    pub instance: u32,
}

impl AppId {
    pub fn new(index: u32, instance: u32) -> AppId {
        AppId { index, instance }
    }

    pub fn restarted(self) -> AppId {
        AppId {
            index: self.index,
            instance: self.instance + 1,
        }
    }
}

/// A two-stop RGB gradient used by the schedule trace to color this
/// class's apps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorGradient {
    pub from: (u8, u8, u8),
    pub to: (u8, u8, u8),
}

impl ColorGradient {
    pub fn sample(&self, t: f64) -> (u8, u8, u8) {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| -> u8 { (a as f64 + (b as f64 - a as f64) * t).round() as u8 };
        (
            lerp(self.from.0, self.to.0),
            lerp(self.from.1, self.to.1),
            lerp(self.from.2, self.to.2),
        )
    }
}

/// A declarative template from which [`App`] instances are drawn.
#[derive(Debug, Clone)]
pub struct AppClass {
    pub name: String,
    pub nb_nodes: usize,
    pub input_time: SimTime,
    pub output_time: SimTime,
    pub wall_time: SimTime,
    pub io_time_per_iter: SimTime,
    pub ckpt_time: SimTime,
    pub bb_ckpt_time: SimTime,
    /// Target share of the total machine resource this class should
    /// occupy once the workload is finalised.
    pub resource_share: f64,
    pub color: ColorGradient,
}

impl AppClass {
    /// Useful compute time excluding input/output transfers.
    pub fn work_time(&self) -> SimTime {
        self.wall_time
            .saturating_sub(self.input_time)
            .saturating_sub(self.output_time)
    }
}

/// A running (or pending) workload instance.
#[derive(Debug, Clone)]
pub struct App {
    pub id: AppId,
    pub class: usize,
    pub nodes: Vec<usize>,

    pub start_date: SimTime,
    pub end_date: SimTime,

    pub remaining_work: SimTime,
    pub remaining_io: SimTime,
    pub current_iorate: f64,

    pub last_successful_ckpt: SimTime,
    pub work_remaining_at_last_ckpt: SimTime,

    pub date_start_work: SimTime,
    pub working: bool,
    pub is_checkpointing: bool,

    pub completed: bool,
}

impl App {
    /// A fresh instance of `class_idx`, ready to be placed by the
    /// planner and started from scratch.
    pub fn new(id: AppId, class_idx: usize, class: &AppClass) -> App {
        App {
            id,
            class: class_idx,
            nodes: Vec::new(),
            start_date: UNDEFINED,
            end_date: UNDEFINED,
            remaining_work: class.work_time(),
            remaining_io: class.input_time,
            current_iorate: 1.0,
            last_successful_ckpt: UNDEFINED,
            work_remaining_at_last_ckpt: class.work_time(),
            date_start_work: UNDEFINED,
            working: false,
            is_checkpointing: false,
            completed: false,
        }
    }

    /// Builds the restarting instance that replaces a failed app: same
    /// `app_index`, `instance_index + 1`, resuming from the last
    /// checkpoint rather than from scratch.
    pub fn restart_from(failed: &App, class: &AppClass) -> App {
        App {
            id: failed.id.restarted(),
            class: failed.class,
            nodes: Vec::new(),
            start_date: UNDEFINED,
            end_date: UNDEFINED,
            remaining_work: failed.work_remaining_at_last_ckpt,
            remaining_io: class.ckpt_time,
            current_iorate: 1.0,
            last_successful_ckpt: failed.last_successful_ckpt,
            work_remaining_at_last_ckpt: failed.work_remaining_at_last_ckpt,
            date_start_work: UNDEFINED,
            working: false,
            is_checkpointing: false,
            completed: false,
        }
    }

    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn start_working(&mut self, now: SimTime) {
        self.working = true;
        self.date_start_work = now;
    }

    /// Accrues elapsed compute into `remaining_work` and stops the clock.
    pub fn stop_working(&mut self, now: SimTime) {
        if self.working {
            let elapsed = now.saturating_sub(self.date_start_work);
            self.remaining_work = self.remaining_work.saturating_sub(elapsed);
            self.working = false;
        }
    }

    pub fn remaining_work_at(&self, now: SimTime) -> SimTime {
        if self.working {
            self.remaining_work
                .saturating_sub(now.saturating_sub(self.date_start_work))
        } else {
            self.remaining_work
        }
    }

    pub fn checkpoint_success(&mut self, now: SimTime) {
        self.last_successful_ckpt = now;
        self.work_remaining_at_last_ckpt = self.remaining_work_at(now);
    }

    pub fn schedule(&mut self, start: SimTime, end: SimTime, nodes: Vec<usize>) {
        self.start_date = start;
        self.end_date = end;
        self.nodes = nodes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_class() -> AppClass {
        AppClass {
            name: "test".into(),
            nb_nodes: 30,
            input_time: SimTime(5_000),
            output_time: SimTime(10_000),
            wall_time: SimTime(25_000),
            io_time_per_iter: SimTime::ZERO,
            ckpt_time: SimTime(5_000),
            bb_ckpt_time: SimTime(500),
            resource_share: 0.6,
            color: ColorGradient {
                from: (0, 0, 0),
                to: (255, 255, 255),
            },
        }
    }

    #[test]
    fn work_time_excludes_io() {
        let c = sample_class();
        assert_eq!(c.work_time(), SimTime(10_000));
    }

    #[test]
    fn stop_working_accrues_elapsed() {
        let c = sample_class();
        let mut app = App::new(AppId::new(0, 0), 0, &c);
        app.remaining_work = SimTime(10_000);
        app.start_working(SimTime(0));
        app.stop_working(SimTime(3_000));
        assert_eq!(app.remaining_work, SimTime(7_000));
        assert!(!app.working);
    }

    #[test]
    fn restart_resumes_from_last_checkpoint() {
        let c = sample_class();
        let mut failed = App::new(AppId::new(2, 0), 0, &c);
        failed.work_remaining_at_last_ckpt = SimTime(4_000);
        failed.last_successful_ckpt = SimTime(1_000);

        let restarted = App::restart_from(&failed, &c);
        assert_eq!(restarted.id, AppId::new(2, 1));
        assert_eq!(restarted.remaining_work, SimTime(4_000));
        assert_eq!(restarted.remaining_io, c.ckpt_time);
    }
}
