//! The six interchangeable I/O interference models.
//!
//! All share one capability set. Modeled as an enum carrying each
//! variant's private state, dispatched through the [`InterferenceModel`]
//! trait implemented once per variant, so the app state machine never
//! matches on the variant itself.

mod blocking_fcfs;
mod coop;
mod fcfs;
mod no_interference;
mod simple;

pub use blocking_fcfs::OrderedIoBlockingFcfs;
pub use coop::OrderedIoCoop;
pub use fcfs::OrderedIoFcfs;
pub use no_interference::NoInterference;
pub use simple::{SimpleInterference, SimpleInterferenceWithBurstBuffers};

use crate::app::App;
use crate::event::EventQueue;
use crate::time::SimTime;

/// Shared capability set of every I/O interference model.
///
/// `start_ckpt`/`end_ckpt` return whether a checkpoint actually started
/// or completed now: fixed-order models may defer the real event, in
/// which case the app state machine must not treat it as having
/// happened.
pub trait InterferenceModel {
    fn start_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue);
    fn end_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue);
    ///
    /// `bb_ckpt_time` is only consulted by burst-buffer-aware variants,
    /// for the uncontended local-write stage; plain variants ignore it.
    fn start_ckpt(
        &mut self,
        now: SimTime,
        app: &mut App,
        ckpt_time: SimTime,
        bb_ckpt_time: SimTime,
        queue: &mut EventQueue,
    ) -> bool;
    fn end_ckpt(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) -> bool;

    /// Burst-buffer-aware models split a checkpoint into a local write
    /// (instantaneous w.r.t. contention) and a contended drain to the
    /// parallel filesystem. Models without burst buffers never call
    /// these; the default no-ops so only BB variants need to override.
    fn start_ckpt_io(&mut self, _now: SimTime, _app: &mut App, _queue: &mut EventQueue) {}
    fn end_ckpt_io(&mut self, _now: SimTime, _app: &mut App, _queue: &mut EventQueue) -> bool {
        true
    }
}

/// Tagged union of the six models, so the simulation can own one trait
/// object-free value and switch on CLI flags.
pub enum IoModel {
    NoInterference(NoInterference),
    Simple(SimpleInterference),
    SimpleWithBurstBuffers(SimpleInterferenceWithBurstBuffers),
    OrderedBlockingFcfs(OrderedIoBlockingFcfs),
    OrderedFcfs(OrderedIoFcfs),
    OrderedCoop(OrderedIoCoop),
}

impl IoModel {
    pub fn name(&self) -> &'static str {
        match self {
            IoModel::NoInterference(_) => "NoInterference",
            IoModel::Simple(_) => "Simple",
            IoModel::SimpleWithBurstBuffers(_) => "SimpleBB",
            IoModel::OrderedBlockingFcfs(_) => "BlockingFCFS",
            IoModel::OrderedFcfs(_) => "FCFS",
            IoModel::OrderedCoop(_) => "Coop",
        }
    }
}

impl InterferenceModel for IoModel {
    fn start_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        match self {
            IoModel::NoInterference(m) => m.start_io(now, app, queue),
            IoModel::Simple(m) => m.start_io(now, app, queue),
            IoModel::SimpleWithBurstBuffers(m) => m.start_io(now, app, queue),
            IoModel::OrderedBlockingFcfs(m) => m.start_io(now, app, queue),
            IoModel::OrderedFcfs(m) => m.start_io(now, app, queue),
            IoModel::OrderedCoop(m) => m.start_io(now, app, queue),
        }
    }

    fn end_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        match self {
            IoModel::NoInterference(m) => m.end_io(now, app, queue),
            IoModel::Simple(m) => m.end_io(now, app, queue),
            IoModel::SimpleWithBurstBuffers(m) => m.end_io(now, app, queue),
            IoModel::OrderedBlockingFcfs(m) => m.end_io(now, app, queue),
            IoModel::OrderedFcfs(m) => m.end_io(now, app, queue),
            IoModel::OrderedCoop(m) => m.end_io(now, app, queue),
        }
    }

    fn start_ckpt(
        &mut self,
        now: SimTime,
        app: &mut App,
        ckpt_time: SimTime,
        bb_ckpt_time: SimTime,
        queue: &mut EventQueue,
    ) -> bool {
        match self {
            IoModel::NoInterference(m) => m.start_ckpt(now, app, ckpt_time, bb_ckpt_time, queue),
            IoModel::Simple(m) => m.start_ckpt(now, app, ckpt_time, bb_ckpt_time, queue),
            IoModel::SimpleWithBurstBuffers(m) => {
                m.start_ckpt(now, app, ckpt_time, bb_ckpt_time, queue)
            }
            IoModel::OrderedBlockingFcfs(m) => {
                m.start_ckpt(now, app, ckpt_time, bb_ckpt_time, queue)
            }
            IoModel::OrderedFcfs(m) => m.start_ckpt(now, app, ckpt_time, bb_ckpt_time, queue),
            IoModel::OrderedCoop(m) => m.start_ckpt(now, app, ckpt_time, bb_ckpt_time, queue),
        }
    }

    fn end_ckpt(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) -> bool {
        match self {
            IoModel::NoInterference(m) => m.end_ckpt(now, app, queue),
            IoModel::Simple(m) => m.end_ckpt(now, app, queue),
            IoModel::SimpleWithBurstBuffers(m) => m.end_ckpt(now, app, queue),
            IoModel::OrderedBlockingFcfs(m) => m.end_ckpt(now, app, queue),
            IoModel::OrderedFcfs(m) => m.end_ckpt(now, app, queue),
            IoModel::OrderedCoop(m) => m.end_ckpt(now, app, queue),
        }
    }

    fn start_ckpt_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) {
        if let IoModel::SimpleWithBurstBuffers(m) = self {
            m.start_ckpt_io(now, app, queue)
        }
    }

    fn end_ckpt_io(&mut self, now: SimTime, app: &mut App, queue: &mut EventQueue) -> bool {
        match self {
            IoModel::SimpleWithBurstBuffers(m) => m.end_ckpt_io(now, app, queue),
            _ => true,
        }
    }
}
