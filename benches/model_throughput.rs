use criterion::{criterion_group, criterion_main, Criterion};

use ckpt_sim::config::demo_system;
use ckpt_sim::iomodel::{IoModel, NoInterference, OrderedIoCoop, SimpleInterference};
use ckpt_sim::trace::NullTrace;
use ckpt_sim::Simulation;

fn run_once(model: IoModel) {
    let system = demo_system();
    let mut sim = Simulation::new(&system, model, 1, true, NullTrace);
    sim.run();
}

fn bench_models(c: &mut Criterion) {
    c.bench_function("no_interference", |b| {
        b.iter(|| run_once(IoModel::NoInterference(NoInterference::new())))
    });
    c.bench_function("simple_interference", |b| {
        b.iter(|| run_once(IoModel::Simple(SimpleInterference::new())))
    });
    c.bench_function("coop", |b| {
        let system = demo_system();
        let mtbf = system.mtbf_ind();
        b.iter(|| run_once(IoModel::OrderedCoop(OrderedIoCoop::new(mtbf))))
    });
}

criterion_group!(benches, bench_models);
criterion_main!(benches);
