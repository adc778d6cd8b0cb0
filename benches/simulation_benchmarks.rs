//! Simulation benchmarks with 95% confidence intervals.
//!
//! - Sample size: criterion default unless noted
//! - Confidence intervals: 95%
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use racesim::domains::markov;
use racesim::domains::race::RaceSetup;
use racesim::prelude::*;

fn season() -> Season {
    Season::load(concat!(env!("CARGO_MANIFEST_DIR"), "/seasons/sample_season.yaml")).unwrap_or_else(|e| {
        eprintln!("sample season: {e}");
        std::process::exit(1)
    })
}

/// One standard race trial on a full 22-car field.
fn bench_single_trial(c: &mut Criterion) {
    let season = season();
    let state = EngineState::for_season(&season);
    let config = EngineConfig::default();
    let caps = Capabilities::none();

    let mut group = c.benchmark_group("race_trial");
    group.confidence_level(0.95);

    for event_id in ["bahrain", "monaco", "spa"] {
        let Ok(event) = season.event(event_id) else { continue };
        let Ok(setup) = RaceSetup::prepare(&season, &state, &config, &caps, event) else { continue };
        group.bench_with_input(BenchmarkId::new("standard", event_id), &setup, |b, setup| {
            let mut trial = 0u64;
            b.iter(|| {
                trial += 1;
                let mut rng = SimRng::for_trial(42, event_id, trial);
                black_box(setup.simulate(&mut rng))
            });
        });
        group.bench_with_input(BenchmarkId::new("lap_model", event_id), &setup, |b, setup| {
            let mut trial = 0u64;
            b.iter(|| {
                trial += 1;
                let mut rng = SimRng::for_trial(42, event_id, trial);
                let run = setup.simulate(&mut rng);
                black_box(markov::simulate(setup, &run, &mut rng))
            });
        });
    }

    group.finish();
}

/// Full Monte Carlo run by trial count.
fn bench_monte_carlo(c: &mut Criterion) {
    let season = season();
    let state = EngineState::for_season(&season);
    let caps = Capabilities::none();

    let mut group = c.benchmark_group("monte_carlo");
    group.sample_size(20);
    group.confidence_level(0.95);

    for trials in [250usize, 1000, 4000] {
        let config = EngineConfig::builder().seed(42).trials(trials).build();
        group.bench_with_input(BenchmarkId::new("run", trials), &config, |b, config| {
            let engine = MonteCarloEngine::new(&season, &state, config, &caps);
            b.iter(|| black_box(engine.run("silverstone")));
        });
    }

    group.finish();
}

/// Worker pool scaling at a fixed trial count.
fn bench_worker_scaling(c: &mut Criterion) {
    let season = season();
    let state = EngineState::for_season(&season);
    let caps = Capabilities::none();

    let mut group = c.benchmark_group("worker_scaling");
    group.sample_size(20);
    group.confidence_level(0.95);

    for workers in [1usize, 2, 4, 8] {
        let config = EngineConfig::builder().seed(42).trials(2000).workers(workers).worker_share(0.8).build();
        group.bench_with_input(BenchmarkId::new("workers", workers), &config, |b, config| {
            let engine = MonteCarloEngine::new(&season, &state, config, &caps);
            b.iter(|| black_box(engine.run("bahrain")));
        });
    }

    group.finish();
}

/// Synchronous full-season projection.
fn bench_season_projection(c: &mut Criterion) {
    let season = season();
    let state = EngineState::for_season(&season);
    let caps = Capabilities::none();
    let config = EngineConfig::builder().seed(42).sync_trials(100).build();

    let mut group = c.benchmark_group("season_projection");
    group.sample_size(10);
    group.confidence_level(0.95);
    group.bench_function("project_season", |b| {
        b.iter(|| black_box(racesim::domains::championship::project_season(&season, &state, &config, &caps)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_single_trial,
    bench_monte_carlo,
    bench_worker_scaling,
    bench_season_projection
);
criterion_main!(benches);
