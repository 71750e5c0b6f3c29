//! Optional TOML overrides for the machine description and workload mix.
//! Loading hierarchy: file overrides the built-in demo defaults; nothing
//! is read from the environment beyond `RUST_LOG`.

use std::path::Path;

use serde::Deserialize;

use crate::app::{AppClass, ColorGradient};
use crate::error::{Result, SimError};
use crate::system::{CheckpointPolicy, System};
use crate::time::SimTime;

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub nb_nodes: Option<usize>,
    pub cores_per_node: Option<usize>,
    pub bandwidth: Option<f64>,
    pub bb_bandwidth: Option<f64>,
    pub memory_per_node: Option<f64>,
    pub mtbf_system: Option<f64>,
    pub min_run_secs: Option<f64>,
    pub fixed_ckpt_interval_secs: Option<f64>,
    #[serde(default)]
    pub classes: Vec<AppClassConfig>,
}

#[derive(Debug, Deserialize)]
pub struct AppClassConfig {
    pub name: String,
    pub nb_nodes: usize,
    pub input_time_secs: f64,
    pub output_time_secs: f64,
    pub wall_time_secs: f64,
    #[serde(default)]
    pub io_time_per_iter_secs: f64,
    pub ckpt_time_secs: f64,
    #[serde(default)]
    pub bb_ckpt_time_secs: f64,
    pub resource_share: f64,
}

pub fn load_from_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SimError::Config(format!("reading {}: {e}", path.display())))?;
    toml::from_str(&content).map_err(|e| SimError::Config(format!("parsing {}: {e}", path.display())))
}

pub fn validate(cfg: &ConfigFile) -> Result<()> {
    if let Some(n) = cfg.nb_nodes {
        if n == 0 {
            return Err(SimError::Config("nb_nodes must be > 0".into()));
        }
    }
    for class in &cfg.classes {
        if class.resource_share < 0.0 {
            return Err(SimError::Config(format!(
                "class {} has negative resource_share",
                class.name
            )));
        }
        if class.nb_nodes == 0 {
            return Err(SimError::Config(format!(
                "class {} has zero nb_nodes",
                class.name
            )));
        }
    }
    Ok(())
}

/// Derives a class time from a fraction of app size: `fraction ×
/// memory_per_node × nb_nodes`, the volume moved, divided by `bandwidth`.
fn derived_time(fraction: f64, nb_nodes: usize, memory_per_node: f64, bandwidth: f64) -> SimTime {
    SimTime::from_secs(fraction * memory_per_node * nb_nodes as f64 / bandwidth)
}

/// Builds the demo system described in the end-to-end scenarios:
/// 300 nodes, 1 core/node, 1e6 B/s bandwidth, 1e3 B memory/node, 100s
/// system MTBF, two app classes, fixed 10s checkpoint interval.
/// Input/output/checkpoint times are derived from volumes (a memory
/// fraction of the class's app size) divided by bandwidth, not given as
/// literal durations: class A moves 50% in / 200% out / 20% ckpt of
/// `memory_per_node × nb_nodes`, class B moves 30%/100%/20%.
pub fn demo_system() -> System {
    let bandwidth = 1e6;
    let memory_per_node = 1e3;
    let a_nb_nodes = 30;
    let b_nb_nodes = 50;

    System {
        nb_nodes: 300,
        cores_per_node: 1,
        bandwidth,
        bb_bandwidth: 0.0,
        memory_per_node,
        mtbf_system: 100.0,
        min_run: SimTime::from_secs(3600.0),
        ckpt_policy: CheckpointPolicy::Fixed(SimTime::from_secs(10.0)),
        classes: vec![
            {
                let ckpt_time = derived_time(0.20, a_nb_nodes, memory_per_node, bandwidth);
                AppClass {
                    name: "A".into(),
                    nb_nodes: a_nb_nodes,
                    input_time: derived_time(0.50, a_nb_nodes, memory_per_node, bandwidth),
                    output_time: derived_time(2.00, a_nb_nodes, memory_per_node, bandwidth),
                    wall_time: SimTime::from_secs(25.0),
                    io_time_per_iter: SimTime::ZERO,
                    bb_ckpt_time: SimTime::from_secs(ckpt_time.as_secs_f64() * 0.1),
                    ckpt_time,
                    resource_share: 0.6,
                    color: ColorGradient {
                        from: (200, 0, 0),
                        to: (255, 150, 150),
                    },
                }
            },
            {
                let ckpt_time = derived_time(0.20, b_nb_nodes, memory_per_node, bandwidth);
                AppClass {
                    name: "B".into(),
                    nb_nodes: b_nb_nodes,
                    input_time: derived_time(0.30, b_nb_nodes, memory_per_node, bandwidth),
                    output_time: derived_time(1.00, b_nb_nodes, memory_per_node, bandwidth),
                    wall_time: SimTime::from_secs(30.0),
                    io_time_per_iter: SimTime::ZERO,
                    bb_ckpt_time: SimTime::from_secs(ckpt_time.as_secs_f64() * 0.1),
                    ckpt_time,
                    resource_share: 0.4,
                    color: ColorGradient {
                        from: (0, 0, 200),
                        to: (150, 150, 255),
                    },
                }
            },
        ],
    }
}

/// Applies a parsed config file on top of the demo defaults.
pub fn apply_overrides(mut system: System, cfg: ConfigFile) -> System {
    if let Some(n) = cfg.nb_nodes {
        system.nb_nodes = n;
    }
    if let Some(c) = cfg.cores_per_node {
        system.cores_per_node = c;
    }
    if let Some(b) = cfg.bandwidth {
        system.bandwidth = b;
    }
    if let Some(b) = cfg.bb_bandwidth {
        system.bb_bandwidth = b;
    }
    if let Some(m) = cfg.memory_per_node {
        system.memory_per_node = m;
    }
    if let Some(m) = cfg.mtbf_system {
        system.mtbf_system = m;
    }
    if let Some(s) = cfg.min_run_secs {
        system.min_run = SimTime::from_secs(s);
    }
    if let Some(s) = cfg.fixed_ckpt_interval_secs {
        system.ckpt_policy = CheckpointPolicy::Fixed(SimTime::from_secs(s));
    }
    if !cfg.classes.is_empty() {
        system.classes = cfg
            .classes
            .into_iter()
            .map(|c| AppClass {
                name: c.name,
                nb_nodes: c.nb_nodes,
                input_time: SimTime::from_secs(c.input_time_secs),
                output_time: SimTime::from_secs(c.output_time_secs),
                wall_time: SimTime::from_secs(c.wall_time_secs),
                io_time_per_iter: SimTime::from_secs(c.io_time_per_iter_secs),
                ckpt_time: SimTime::from_secs(c.ckpt_time_secs),
                bb_ckpt_time: SimTime::from_secs(c.bb_ckpt_time_secs),
                resource_share: c.resource_share,
                color: ColorGradient {
                    from: (0, 0, 0),
                    to: (255, 255, 255),
                },
            })
            .collect();
    }
    system
}
