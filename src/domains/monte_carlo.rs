//! Monte Carlo orchestration.
//!
//! Runs N independent race trials per event and aggregates them into
//! per-competitor probabilities.
//!
//! # Scheduling
//!
//! Trials are cut into fixed-size partitions. A configurable share of the
//! partitions is pushed onto a `crossbeam-deque` injector and drained by a
//! scoped work-stealing pool; the calling thread runs the rest itself and
//! then steals from the pool until it is empty.
//! Partition reports come back over a channel and are merged in partition
//! index order, so the aggregate does not depend on the worker count or on
//! which thread ran what.
//!
//! A partition that panics or never reports is retried on the calling
//! thread. Trial streams depend only on (seed, event, trial index), so a
//! retry reproduces exactly the counters the lost partition would have had.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::EngineConfig;
use crate::domains::markov;
use crate::domains::qualifying::GridEntry;
use crate::domains::race::{RaceSetup, SimulationRun};
use crate::domains::weather::Weather;
use crate::engine::capabilities::Capabilities;
use crate::engine::rng::SimRng;
use crate::engine::state::EngineState;
use crate::error::{SimError, SimResult};
use crate::model::{EventDescriptor, Season};

/// Fewer competitors than this short-circuit to a skill ranking.
pub const MIN_FIELD: usize = 3;

/// Cooperative cancellation flag shared with a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Abandon the batch; partial results are discarded.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-competitor aggregate of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorOutcome {
    pub competitor: String,
    pub team: String,
    pub win_probability: f64,
    /// Binomial standard error of the win probability.
    pub win_sigma: f64,
    pub podium_probability: f64,
    pub podium_sigma: f64,
    pub dnf_probability: f64,
    pub dnf_sigma: f64,
    pub avg_finish: f64,
    /// Probability of each finishing position, P1 first; sums to 1.
    pub positions: Vec<f64>,
}

/// Aggregate of all trials of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub event_id: String,
    pub trials: usize,
    /// Trials blended with the lap model.
    pub markov_trials: usize,
    /// Partitions re-run on the calling thread.
    pub retried_partitions: usize,
    /// Reference weather (dedicated seed, not trial 0).
    pub weather: Weather,
    /// Reference qualifying grid.
    pub grid: Vec<GridEntry>,
    /// Prediction confidence score (28-94).
    pub confidence: f64,
    /// Share of trials won from pole.
    pub pole_conversion: f64,
    /// Outcomes by average finish, best first.
    pub outcomes: Vec<CompetitorOutcome>,
}

impl AggregateResult {
    #[must_use]
    pub fn outcome(&self, competitor: &str) -> Option<&CompetitorOutcome> {
        self.outcomes.iter().find(|o| o.competitor == competitor)
    }

    /// Predicted winner.
    #[must_use]
    pub fn favourite(&self) -> Option<&CompetitorOutcome> {
        self.outcomes
            .iter()
            .max_by(|a, b| a.win_probability.total_cmp(&b.win_probability))
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Weighted counters of a set of trials, indexed by roster position.
#[derive(Debug, Clone, PartialEq)]
struct Tally {
    trials: usize,
    markov_trials: usize,
    wins: Vec<f64>,
    podiums: Vec<f64>,
    finish_sum: Vec<f64>,
    dnfs: Vec<f64>,
    pole_wins: usize,
}

impl Tally {
    fn new(field: usize) -> Self {
        Self {
            trials: 0,
            markov_trials: 0,
            wins: vec![0.0; field],
            podiums: vec![0.0; field],
            finish_sum: vec![0.0; field],
            dnfs: vec![0.0; field],
            pole_wins: 0,
        }
    }

    fn add(&mut self, profile: usize, position: usize, retired: bool, weight: f64) {
        if position == 0 {
            self.wins[profile] += weight;
        }
        if position < 3 {
            self.podiums[profile] += weight;
        }
        self.finish_sum[profile] += weight * (position + 1) as f64;
        if retired {
            self.dnfs[profile] += weight;
        }
    }

    fn record_standard(&mut self, run: &SimulationRun, weight: f64) {
        for (pos, entry) in run.order.iter().enumerate() {
            self.add(entry.profile, pos, entry.is_retired(), weight);
        }
    }

    fn record_lap(&mut self, run: &markov::LapRun, weight: f64) {
        for (pos, entry) in run.order.iter().enumerate() {
            self.add(entry.profile, pos, entry.retired_on.is_some(), weight);
        }
    }

    fn merge(&mut self, other: &Self) {
        self.trials += other.trials;
        self.markov_trials += other.markov_trials;
        self.pole_wins += other.pole_wins;
        for (dst, src) in [
            (&mut self.wins, &other.wins),
            (&mut self.podiums, &other.podiums),
            (&mut self.finish_sum, &other.finish_sum),
            (&mut self.dnfs, &other.dnfs),
        ] {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
    }
}

/// Contiguous block of trial indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Partition {
    index: usize,
    start: usize,
    end: usize,
}

fn partitions(trials: usize, size: usize) -> Vec<Partition> {
    let size = size.max(1);
    (0..trials)
        .step_by(size)
        .enumerate()
        .map(|(index, start)| Partition {
            index,
            start,
            end: (start + size).min(trials),
        })
        .collect()
}

struct PartitionReport {
    index: usize,
    outcome: Result<Tally, String>,
}

/// Binomial standard error of a probability estimated from `n` trials.
#[must_use]
pub fn binomial_sigma(p: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (p * (1.0 - p) / n as f64).max(0.0).sqrt()
}

/// Position distribution of one competitor over a field of `n`.
///
/// P1 is the win probability, P2 and P3 split the rest of the podium mass,
/// the remaining finishing mass follows a Gaussian around the average
/// finish, and half the DNF mass lands on each of the last two places.
/// In a field of three the podium already holds every outcome, so there is
/// no tail to fold DNFs into.
#[must_use]
pub fn position_row(n: usize, win: f64, podium: f64, dnf: f64, avg_finish: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let mut row = vec![0.0; n];
    row[0] = win;
    let rest_of_podium = ((podium - win) / 2.0).max(0.0);
    for slot in row.iter_mut().take(3).skip(1) {
        *slot = rest_of_podium;
    }

    if n > 3 {
        let remaining = (1.0 - podium - dnf).max(0.0);
        let sigma = 3.0 + (avg_finish - 1.0) * 0.2;
        let weights: Vec<f64> = (4..=n)
            .map(|pos| {
                let z = (pos as f64 - avg_finish) / sigma;
                (-0.5 * z * z).exp()
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for (slot, w) in row[3..].iter_mut().zip(&weights) {
                *slot += remaining * w / total;
            }
        }
        for slot in &mut row[n - 2..] {
            *slot += dnf / 2.0;
        }
    }

    let sum: f64 = row.iter().sum();
    if sum > 0.0 {
        for slot in &mut row {
            *slot /= sum;
        }
    } else {
        row.fill(1.0 / n as f64);
    }
    row
}

type FaultHook = Arc<dyn Fn(usize) -> bool + Send + Sync>;

/// Monte Carlo engine over a snapshot of season and rolling state.
///
/// Trials only read the snapshot; [`EngineState`] changes only through
/// confirmed-result ingestion.
#[derive(Clone)]
pub struct MonteCarloEngine<'a> {
    season: &'a Season,
    state: &'a EngineState,
    config: &'a EngineConfig,
    capabilities: &'a Capabilities,
    fault_hook: Option<FaultHook>,
}

impl std::fmt::Debug for MonteCarloEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonteCarloEngine")
            .field("season", &self.season.data().name)
            .field("trials", &self.config.monte_carlo.trials)
            .field("fault_hook", &self.fault_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> MonteCarloEngine<'a> {
    #[must_use]
    pub const fn new(
        season: &'a Season,
        state: &'a EngineState,
        config: &'a EngineConfig,
        capabilities: &'a Capabilities,
    ) -> Self {
        Self {
            season,
            state,
            config,
            capabilities,
            fault_hook: None,
        }
    }

    /// Fail every partition attempt for which `hook(partition)` is true.
    ///
    /// Only first attempts consult the hook, so failed partitions recover
    /// through the calling-thread retry.
    #[must_use]
    pub fn with_fault_hook(mut self, hook: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        self.fault_hook = Some(Arc::new(hook));
        self
    }

    /// Full run for an event id.
    ///
    /// # Errors
    ///
    /// `UnknownEvent` for an id not on the calendar, plus the errors of
    /// [`MonteCarloEngine::run_event`].
    pub fn run(&self, event_id: &str) -> SimResult<AggregateResult> {
        let event = self.season.event(event_id)?;
        self.run_event(event)
    }

    /// Full run for an event descriptor (possibly a what-if variant).
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed descriptor, `PartitionFailed` when a
    /// retried partition fails again.
    pub fn run_event(&self, event: &EventDescriptor) -> SimResult<AggregateResult> {
        self.run_cancellable_event(event, &CancelToken::new())
    }

    /// Full run that stops early once `cancel` is set.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token was set before the merge, plus the errors
    /// of [`MonteCarloEngine::run_event`].
    pub fn run_cancellable(&self, event_id: &str, cancel: &CancelToken) -> SimResult<AggregateResult> {
        let event = self.season.event(event_id)?;
        self.run_cancellable_event(event, cancel)
    }

    fn run_cancellable_event(&self, event: &EventDescriptor, cancel: &CancelToken) -> SimResult<AggregateResult> {
        event.validate()?;
        let setup = RaceSetup::prepare(self.season, self.state, self.config, self.capabilities, event)?;
        if setup.profiles.len() < MIN_FIELD {
            return Ok(self.ranked_by_skill(&setup));
        }

        let trials = self.config.monte_carlo.trials;
        let workers = self.config.worker_count().max(1);
        info!(event = %event.id, trials, workers, "monte carlo run started");

        let (tally, retried) = self.execute(&setup, trials, workers, cancel)?;
        let result = self.finalize(&setup, &tally, retried);
        info!(
            event = %event.id,
            trials = result.trials,
            markov = result.markov_trials,
            retried = result.retried_partitions,
            favourite = result.favourite().map_or("", |o| o.competitor.as_str()),
            "monte carlo run finished"
        );
        Ok(result)
    }

    /// Reduced run on the calling thread, for nested computations.
    ///
    /// # Errors
    ///
    /// `UnknownEvent` for an id not on the calendar.
    pub fn run_sync(&self, event_id: &str) -> SimResult<AggregateResult> {
        let event = self.season.event(event_id)?;
        self.run_sync_event(event)
    }

    /// Reduced run on the calling thread; never spawns threads.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed descriptor.
    pub fn run_sync_event(&self, event: &EventDescriptor) -> SimResult<AggregateResult> {
        event.validate()?;
        let setup = RaceSetup::prepare(self.season, self.state, self.config, self.capabilities, event)?;
        if setup.profiles.len() < MIN_FIELD {
            return Ok(self.ranked_by_skill(&setup));
        }
        let trials = self.config.monte_carlo.sync_trials;
        let mut tally = Tally::new(setup.profiles.len());
        for part in partitions(trials, self.config.monte_carlo.partition_size) {
            tally.merge(&self.run_partition(&setup, part));
        }
        Ok(self.finalize(&setup, &tally, 0))
    }

    fn run_partition(&self, setup: &RaceSetup<'_>, part: Partition) -> Tally {
        let seed = self.config.reproducibility.seed;
        let markov_cfg = self.config.markov;
        let mut tally = Tally::new(setup.profiles.len());
        for trial in part.start..part.end {
            let mut rng = SimRng::for_trial(seed, &setup.event.id, trial as u64);
            let run = setup.simulate(&mut rng);
            if run.winner().is_some() && run.winner() == run.pole_profile() {
                tally.pole_wins += 1;
            }
            if markov_cfg.selects(trial as u64) {
                let lap = markov::simulate(setup, &run, &mut rng);
                let w = markov_cfg.blend_weight;
                tally.record_standard(&run, 1.0 - w);
                tally.record_lap(&lap, w);
                tally.markov_trials += 1;
            } else {
                tally.record_standard(&run, 1.0);
            }
            tally.trials += 1;
        }
        tally
    }

    fn attempt(&self, setup: &RaceSetup<'_>, part: Partition) -> Result<Tally, String> {
        if self.fault_hook.as_ref().is_some_and(|hook| hook(part.index)) {
            return Err("injected fault".to_string());
        }
        std::panic::catch_unwind(AssertUnwindSafe(|| self.run_partition(setup, part))).map_err(|payload| {
            payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "partition panicked".to_string())
        })
    }

    /// Run all partitions; returns the merged tally and the retry count.
    fn execute(
        &self,
        setup: &RaceSetup<'_>,
        trials: usize,
        workers: usize,
        cancel: &CancelToken,
    ) -> SimResult<(Tally, usize)> {
        let parts = partitions(trials, self.config.monte_carlo.partition_size);
        let pooled = ((parts.len() as f64 * self.config.monte_carlo.worker_share).round() as usize).min(parts.len());
        let mut slots: Vec<Option<Tally>> = vec![None; parts.len()];

        let injector: Injector<Partition> = Injector::new();
        for part in &parts[..pooled] {
            injector.push(*part);
        }
        let locals: Vec<Worker<Partition>> = (0..if pooled > 0 { workers } else { 0 })
            .map(|_| Worker::new_fifo())
            .collect();
        let stealers: Vec<Stealer<Partition>> = locals.iter().map(Worker::stealer).collect();
        let (tx, rx) = crossbeam_channel::unbounded::<PartitionReport>();

        std::thread::scope(|s| {
            for (worker_id, local) in locals.into_iter().enumerate() {
                let injector = &injector;
                let stealers = &stealers;
                let tx = tx.clone();

                s.spawn(move || {
                    while !cancel.is_cancelled() {
                        let Some(part) = next_task(&local, injector, stealers, worker_id) else {
                            break;
                        };
                        let outcome = self.attempt(setup, part);
                        debug!(partition = part.index, worker = worker_id, ok = outcome.is_ok(), "partition done");
                        if tx.send(PartitionReport {
                            index: part.index,
                            outcome,
                        })
                        .is_err()
                        {
                            break;
                        }
                    }
                });
            }

            for part in &parts[pooled..] {
                if cancel.is_cancelled() {
                    break;
                }
                match self.attempt(setup, *part) {
                    Ok(tally) => slots[part.index] = Some(tally),
                    Err(message) => warn!(partition = part.index, %message, "partition failed"),
                }
            }

            let own = Worker::new_fifo();
            while !cancel.is_cancelled() {
                let Some(part) = next_task(&own, &injector, &stealers, stealers.len()) else {
                    break;
                };
                debug!(partition = part.index, "partition stolen by calling thread");
                match self.attempt(setup, part) {
                    Ok(tally) => slots[part.index] = Some(tally),
                    Err(message) => warn!(partition = part.index, %message, "partition failed"),
                }
            }
        });
        drop(tx);

        for report in rx.iter() {
            match report.outcome {
                Ok(tally) => slots[report.index] = Some(tally),
                Err(message) => warn!(partition = report.index, %message, "partition failed"),
            }
        }

        if cancel.is_cancelled() {
            info!(event = %setup.event.id, "monte carlo run cancelled");
            return Err(SimError::Cancelled);
        }

        let mut retried = 0;
        let mut merged = Tally::new(setup.profiles.len());
        for (part, slot) in parts.iter().zip(slots) {
            let tally = match slot {
                Some(tally) => tally,
                None => {
                    warn!(partition = part.index, "retrying partition on calling thread");
                    retried += 1;
                    std::panic::catch_unwind(AssertUnwindSafe(|| self.run_partition(setup, *part))).map_err(|_| {
                        SimError::PartitionFailed {
                            partition: part.index,
                            message: "retry on calling thread panicked".to_string(),
                        }
                    })?
                }
            };
            merged.merge(&tally);
        }
        Ok((merged, retried))
    }

    fn reference(&self, setup: &RaceSetup<'_>) -> (Weather, Vec<GridEntry>) {
        let seed = self.config.reproducibility.seed;
        let event = setup.event;
        let mut weather_rng = SimRng::for_purpose(seed, &event.id, "reference-weather");
        let weather = Weather::draw(event.rain_probability, &mut weather_rng);
        let mut grid_rng = SimRng::for_purpose(seed, &event.id, "reference-grid");
        (weather, setup.grid(weather, &mut grid_rng))
    }

    fn finalize(&self, setup: &RaceSetup<'_>, tally: &Tally, retried: usize) -> AggregateResult {
        let n = tally.trials;
        let field = setup.profiles.len();
        let denom = n.max(1) as f64;

        let mut outcomes: Vec<(usize, CompetitorOutcome)> = setup
            .profiles
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let win = tally.wins[i] / denom;
                let podium = tally.podiums[i] / denom;
                let dnf = tally.dnfs[i] / denom;
                let avg_finish = if n == 0 { (i + 1) as f64 } else { tally.finish_sum[i] / denom };
                (
                    i,
                    CompetitorOutcome {
                        competitor: p.competitor.id.clone(),
                        team: p.team.id.clone(),
                        win_probability: win,
                        win_sigma: binomial_sigma(win, n),
                        podium_probability: podium,
                        podium_sigma: binomial_sigma(podium, n),
                        dnf_probability: dnf,
                        dnf_sigma: binomial_sigma(dnf, n),
                        avg_finish,
                        positions: position_row(field, win, podium, dnf, avg_finish),
                    },
                )
            })
            .collect();
        outcomes.sort_by(|(ia, a), (ib, b)| a.avg_finish.total_cmp(&b.avg_finish).then(ia.cmp(ib)));

        let (weather, grid) = self.reference(setup);
        AggregateResult {
            event_id: setup.event.id.clone(),
            trials: n,
            markov_trials: tally.markov_trials,
            retried_partitions: retried,
            weather,
            grid,
            confidence: setup.confidence_score,
            pole_conversion: tally.pole_wins as f64 / denom,
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
        }
    }

    /// Deterministic ranking for fields too small to simulate.
    fn ranked_by_skill(&self, setup: &RaceSetup<'_>) -> AggregateResult {
        let mut order: Vec<usize> = (0..setup.profiles.len()).collect();
        order.sort_by(|&a, &b| {
            let sa = setup.profiles[a].competitor.base_skill;
            let sb = setup.profiles[b].competitor.base_skill;
            sb.total_cmp(&sa).then(a.cmp(&b))
        });
        let n = order.len();
        let (weather, grid) = self.reference(setup);
        let outcomes = order
            .iter()
            .enumerate()
            .map(|(rank, &i)| {
                let p = &setup.profiles[i];
                let mut positions = vec![0.0; n];
                positions[rank] = 1.0;
                CompetitorOutcome {
                    competitor: p.competitor.id.clone(),
                    team: p.team.id.clone(),
                    win_probability: if rank == 0 { 1.0 } else { 0.0 },
                    win_sigma: 0.0,
                    podium_probability: if rank < 3 { 1.0 } else { 0.0 },
                    podium_sigma: 0.0,
                    dnf_probability: 0.0,
                    dnf_sigma: 0.0,
                    avg_finish: (rank + 1) as f64,
                    positions,
                }
            })
            .collect();
        AggregateResult {
            event_id: setup.event.id.clone(),
            trials: 0,
            markov_trials: 0,
            retried_partitions: 0,
            weather,
            grid,
            confidence: setup.confidence_score,
            pole_conversion: 0.0,
            outcomes,
        }
    }
}

fn next_task(
    local: &Worker<Partition>,
    injector: &Injector<Partition>,
    stealers: &[Stealer<Partition>],
    worker_id: usize,
) -> Option<Partition> {
    local
        .pop()
        .or_else(|| loop {
            match injector.steal_batch_and_pop(local) {
                Steal::Success(part) => return Some(part),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        })
        .or_else(|| {
            // round-robin over the other workers
            for i in 0..stealers.len() {
                let victim = (worker_id + i + 1) % stealers.len();
                loop {
                    match stealers[victim].steal() {
                        Steal::Success(part) => return Some(part),
                        Steal::Empty => break,
                        Steal::Retry => {}
                    }
                }
            }
            None
        })
}

/// Owned inputs of a background run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub season: Arc<Season>,
    pub state: Arc<EngineState>,
    pub config: EngineConfig,
    pub capabilities: Capabilities,
    pub event_id: String,
}

/// Handle to a run on a background thread.
///
/// Dropping the handle without joining cancels the run.
#[derive(Debug)]
pub struct RunHandle {
    cancel: CancelToken,
    thread: Option<JoinHandle<SimResult<AggregateResult>>>,
}

impl RunHandle {
    /// Start a full run on its own thread.
    #[must_use]
    pub fn spawn(request: RunRequest) -> Self {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let thread = std::thread::spawn(move || {
            let RunRequest {
                season,
                state,
                config,
                capabilities,
                event_id,
            } = request;
            MonteCarloEngine::new(&season, &state, &config, &capabilities).run_cancellable(&event_id, &token)
        });
        Self {
            cancel,
            thread: Some(thread),
        }
    }

    /// Token that cancels this run.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the aggregate.
    ///
    /// # Errors
    ///
    /// The run's own error, or `PartitionFailed` if the run thread died.
    pub fn join(mut self) -> SimResult<AggregateResult> {
        match self.thread.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(SimError::PartitionFailed {
                    partition: 0,
                    message: "run thread panicked".to_string(),
                })
            }),
            None => Err(SimError::Cancelled),
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel.cancel();
        }
    }
}
