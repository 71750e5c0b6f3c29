//! Machine description and workload generation.

use rand::seq::SliceRandom;

use crate::app::{App, AppClass, AppId};
use crate::rng::SimRng;
use crate::time::SimTime;

/// How the per-checkpoint interval is derived.
#[derive(Debug, Clone, Copy)]
pub enum CheckpointPolicy {
    Fixed(SimTime),
    Daly,
}

/// Immutable machine + workload description, finalised once before the
/// simulation starts.
pub struct System {
    pub nb_nodes: usize,
    pub cores_per_node: usize,
    pub bandwidth: f64,
    pub bb_bandwidth: f64,
    pub memory_per_node: f64,
    pub mtbf_system: f64,
    pub min_run: SimTime,
    pub ckpt_policy: CheckpointPolicy,
    pub classes: Vec<AppClass>,
}

impl System {
    pub fn mtbf_ind(&self) -> f64 {
        // Per-node MTBF implied by the system-wide figure.
        self.mtbf_system * self.nb_nodes as f64
    }

    pub fn mtbf_per_app(&self, nb_nodes_app: usize) -> f64 {
        self.mtbf_ind() / nb_nodes_app as f64
    }

    /// Daly's optimal checkpoint interval: `sqrt(2 * mtbf_per_app * ckpt_time)`.
    pub fn ckpt_interval(&self, class: &AppClass) -> SimTime {
        match self.ckpt_policy {
            CheckpointPolicy::Fixed(t) => t,
            CheckpointPolicy::Daly => {
                let mtbf = self.mtbf_per_app(class.nb_nodes);
                let ckpt_s = class.ckpt_time.as_secs_f64();
                SimTime::from_secs((2.0 * mtbf * ckpt_s).sqrt())
            }
        }
    }

    /// Builds the initial workload: enough instances of each class, in
    /// proportion to `resource_share`, to saturate the machine, shuffled
    /// by the app-order stream so placement order isn't an artifact of
    /// declaration order.
    pub fn finalize(&self, rng: &mut SimRng) -> Vec<App> {
        let mut apps = Vec::new();
        let mut next_index: u32 = 0;

        let total_share: f64 = self.classes.iter().map(|c| c.resource_share).sum();
        for (class_idx, class) in self.classes.iter().enumerate() {
            if class.nb_nodes == 0 {
                continue;
            }
            let share = if total_share > 0.0 {
                class.resource_share / total_share
            } else {
                1.0 / self.classes.len() as f64
            };
            let target_nodes = share * self.nb_nodes as f64;
            let count = (target_nodes / class.nb_nodes as f64).round().max(1.0) as u32;
            for _ in 0..count {
                let id = AppId::new(next_index, 0);
                next_index += 1;
                apps.push(App::new(id, class_idx, class));
            }
        }

        apps.shuffle(&mut rng.app_order);
        apps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ColorGradient;

    fn demo_system() -> System {
        System {
            nb_nodes: 300,
            cores_per_node: 1,
            bandwidth: 1e6,
            bb_bandwidth: 0.0,
            memory_per_node: 1e3,
            mtbf_system: 100.0,
            min_run: SimTime::from_secs(3600.0),
            ckpt_policy: CheckpointPolicy::Fixed(SimTime::from_secs(10.0)),
            classes: vec![
                AppClass {
                    name: "A".into(),
                    nb_nodes: 30,
                    input_time: SimTime::from_secs(12.5),
                    output_time: SimTime::from_secs(50.0),
                    wall_time: SimTime::from_secs(25.0),
                    io_time_per_iter: SimTime::ZERO,
                    ckpt_time: SimTime::from_secs(5.0),
                    bb_ckpt_time: SimTime::from_secs(0.5),
                    resource_share: 0.6,
                    color: ColorGradient {
                        from: (200, 0, 0),
                        to: (255, 150, 150),
                    },
                },
                AppClass {
                    name: "B".into(),
                    nb_nodes: 50,
                    input_time: SimTime::from_secs(9.0),
                    output_time: SimTime::from_secs(30.0),
                    wall_time: SimTime::from_secs(30.0),
                    io_time_per_iter: SimTime::ZERO,
                    ckpt_time: SimTime::from_secs(6.0),
                    bb_ckpt_time: SimTime::from_secs(0.6),
                    resource_share: 0.4,
                    color: ColorGradient {
                        from: (0, 0, 200),
                        to: (150, 150, 255),
                    },
                },
            ],
        }
    }

    #[test]
    fn finalize_produces_apps_for_each_class() {
        let sys = demo_system();
        let mut rng = SimRng::from_seed(1);
        let apps = sys.finalize(&mut rng);
        assert!(apps.iter().any(|a| a.class == 0));
        assert!(apps.iter().any(|a| a.class == 1));
    }

    #[test]
    fn daly_interval_matches_formula() {
        let mut sys = demo_system();
        sys.ckpt_policy = CheckpointPolicy::Daly;
        let interval = sys.ckpt_interval(&sys.classes[0]);
        let expected = SimTime::from_secs(
            (2.0 * sys.mtbf_per_app(30) * sys.classes[0].ckpt_time.as_secs_f64()).sqrt(),
        );
        assert_eq!(interval, expected);
    }

    #[test]
    fn finalize_is_deterministic_for_same_seed() {
        let sys = demo_system();
        let mut r1 = SimRng::from_seed(42);
        let mut r2 = SimRng::from_seed(42);
        let a1: Vec<_> = sys.finalize(&mut r1).iter().map(|a| a.id).collect();
        let a2: Vec<_> = sys.finalize(&mut r2).iter().map(|a| a.id).collect();
        assert_eq!(a1, a2);
    }
}
