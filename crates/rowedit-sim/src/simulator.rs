//! Edit controller simulator
//!
//! Drives one controller with a seeded random interleaving of stage, cancel
//! and commit across many rows. Commits go through a persist call with random
//! latency and random failures, and several stay in flight at once. A plain
//! shadow model predicts every outcome.
//!
//! Invariants checked after every operation:
//! - Stage/cancel/commit are rejected exactly when the model says so
//! - Base, staged and committing state match the model
//! - No row is committing without a staged value

use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rowedit_core::{
    CommitError, ConfigError, ControllerConfig, EditError, EditSessionController, MemberId,
    RoleId, SessionStats,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Role pool the simulator assigns from; every row starts at the first one
pub const ROLES: [&str; 5] = ["read", "triage", "write", "maintain", "admin"];

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Rows in the simulated table
    pub rows: usize,
    /// Operations to generate
    pub operations: u64,
    /// Probability that a persist call fails
    pub failure_rate: f64,
    /// Upper bound of simulated persist latency
    pub max_delay_ms: u64,
    /// Probability that an operation waits for the next in-flight commit
    pub drain_probability: f64,
    /// Stop at the first violation instead of collecting them all
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            rows: 16,
            operations: 2_000,
            failure_rate: 0.2,
            max_delay_ms: 5,
            drain_probability: 0.1,
            stop_on_first_violation: false,
        }
    }
}

/// Simulator setup errors
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{field} must be a probability between 0 and 1, got {value}")]
    InvalidProbability { field: &'static str, value: f64 },
}

impl From<toml::de::Error> for SimulatorError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(ConfigError::from(err))
    }
}

impl From<std::io::Error> for SimulatorError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(ConfigError::from(err))
    }
}

impl SimulatorConfig {
    /// Load from a TOML file; missing keys take their defaults
    ///
    /// # Errors
    /// Unreadable or malformed file, or settings rejected by [`validate`](Self::validate)
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SimulatorError> {
        let source = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that probabilities lie in `[0, 1]`; NaN is rejected
    ///
    /// # Errors
    /// `SimulatorError::InvalidProbability` naming the offending field
    pub fn validate(&self) -> Result<(), SimulatorError> {
        for (field, value) in [
            ("failure_rate", self.failure_rate),
            ("drain_probability", self.drain_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimulatorError::InvalidProbability { field, value });
            }
        }
        Ok(())
    }
}

/// Generated operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SimulatedOperation {
    /// Stage a role for a row
    Stage { row: MemberId, role: RoleId },
    /// Cancel a row's pending role
    Cancel { row: MemberId },
    /// Commit a row; the persist call sleeps, then fails or succeeds
    Commit {
        row: MemberId,
        fail: bool,
        delay_ms: u64,
    },
    /// Wait for the next in-flight commit to resolve
    Drain,
}

/// Outcome the shadow model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpectedResult {
    Accepted,
    ConcurrentEdit,
    NothingToCommit,
}

/// A violation detected during simulation
#[derive(Debug, Clone, Serialize)]
pub enum Violation {
    /// Operation outcome differs from the model
    UnexpectedOutcome {
        operation: SimulatedOperation,
        expected: ExpectedResult,
        actual: String,
    },
    /// Controller state differs from the model
    StateDivergence {
        row: MemberId,
        expected: String,
        actual: String,
    },
    /// Row committing with nothing staged
    InvariantBroken { row: MemberId },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulatorStats {
    pub stages: u64,
    pub cancels: u64,
    pub commits_requested: u64,
    pub commits_succeeded: u64,
    pub commits_failed: u64,
    pub rejected_concurrent: u64,
    pub rejected_nothing_to_commit: u64,
    pub max_in_flight: usize,
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub session: SessionStats,
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Edit Controller Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Rows: {}\n", self.config.rows));
        report.push_str(&format!("Stages: {}\n", self.stats.stages));
        report.push_str(&format!("Cancels: {}\n", self.stats.cancels));
        report.push_str(&format!("Commits Requested: {}\n", self.stats.commits_requested));
        report.push_str(&format!("Commits Succeeded: {}\n", self.stats.commits_succeeded));
        report.push_str(&format!("Commits Failed: {}\n", self.stats.commits_failed));
        report.push_str(&format!(
            "Rejected (in flight): {}\n",
            self.stats.rejected_concurrent
        ));
        report.push_str(&format!(
            "Rejected (nothing staged): {}\n",
            self.stats.rejected_nothing_to_commit
        ));
        report.push_str(&format!("Max In Flight: {}\n", self.stats.max_in_flight));
        report.push_str(&format!("Rows Still Pending: {}\n", self.session.pending));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ShadowRow {
    base: RoleId,
    staged: Option<RoleId>,
    committing: bool,
}

impl ShadowRow {
    fn expect_edit(&self) -> ExpectedResult {
        if self.committing {
            ExpectedResult::ConcurrentEdit
        } else {
            ExpectedResult::Accepted
        }
    }

    fn expect_commit(&self) -> ExpectedResult {
        if self.committing {
            ExpectedResult::ConcurrentEdit
        } else if self.staged.is_none() {
            ExpectedResult::NothingToCommit
        } else {
            ExpectedResult::Accepted
        }
    }

    fn settle(&mut self, succeeded: bool) {
        self.committing = false;
        if succeeded {
            if let Some(value) = self.staged.take() {
                self.base = value;
            }
        }
    }
}

type InFlightCommit<'a> = LocalBoxFuture<'a, (MemberId, bool, Result<(), EditError>)>;

async fn simulated_persist(fail: bool, delay_ms: u64) -> Result<(), CommitError> {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    if fail {
        Err(CommitError::rejected("simulated backend failure"))
    } else {
        Ok(())
    }
}

fn classify(result: &Result<(), EditError>) -> ExpectedResult {
    match result {
        Err(EditError::ConcurrentEdit { .. }) => ExpectedResult::ConcurrentEdit,
        Err(EditError::NothingToCommit { .. }) => ExpectedResult::NothingToCommit,
        _ => ExpectedResult::Accepted,
    }
}

fn describe(result: &Result<(), EditError>) -> String {
    match result {
        Ok(()) => "accepted".to_string(),
        Err(e) => e.to_string(),
    }
}

struct Simulation<'a> {
    controller: &'a EditSessionController<MemberId, RoleId>,
    shadow: HashMap<MemberId, ShadowRow>,
    in_flight: FuturesUnordered<InFlightCommit<'a>>,
    stats: SimulatorStats,
    violations: Vec<Violation>,
}

impl<'a> Simulation<'a> {
    fn check(
        &mut self,
        operation: &SimulatedOperation,
        expected: ExpectedResult,
        result: &Result<(), EditError>,
    ) -> bool {
        match classify(result) {
            ExpectedResult::ConcurrentEdit => self.stats.rejected_concurrent += 1,
            ExpectedResult::NothingToCommit => self.stats.rejected_nothing_to_commit += 1,
            ExpectedResult::Accepted => {}
        }
        if classify(result) == expected {
            return true;
        }
        self.violations.push(Violation::UnexpectedOutcome {
            operation: operation.clone(),
            expected,
            actual: describe(result),
        });
        false
    }

    fn settle(&mut self, row: &MemberId, fail: bool, result: &Result<(), EditError>) {
        let succeeded = result.is_ok();
        if succeeded {
            self.stats.commits_succeeded += 1;
        } else {
            self.stats.commits_failed += 1;
        }
        if succeeded == fail {
            self.violations.push(Violation::UnexpectedOutcome {
                operation: SimulatedOperation::Drain,
                expected: ExpectedResult::Accepted,
                actual: format!("row {row}: persist fail={fail} but {}", describe(result)),
            });
        }
        if let Some(shadow) = self.shadow.get_mut(row) {
            shadow.settle(succeeded);
        }
    }

    fn apply(&mut self, operation: SimulatedOperation) {
        match &operation {
            SimulatedOperation::Stage { row, role } => {
                self.stats.stages += 1;
                let expected = self.shadow[row].expect_edit();
                let result = self.controller.stage(row, role.clone());
                if self.check(&operation, expected, &result) && result.is_ok() {
                    if let Some(shadow) = self.shadow.get_mut(row) {
                        shadow.staged = (*role != shadow.base).then(|| role.clone());
                    }
                }
            }
            SimulatedOperation::Cancel { row } => {
                self.stats.cancels += 1;
                let expected = self.shadow[row].expect_edit();
                let result = self.controller.cancel(row);
                if self.check(&operation, expected, &result) && result.is_ok() {
                    if let Some(shadow) = self.shadow.get_mut(row) {
                        shadow.staged = None;
                    }
                }
            }
            SimulatedOperation::Commit {
                row,
                fail,
                delay_ms,
            } => {
                self.stats.commits_requested += 1;
                let expected = self.shadow[row].expect_commit();
                let target = row.clone();
                let (row, fail, delay_ms) = (row.clone(), *fail, *delay_ms);
                let controller = self.controller;

                let mut commit: InFlightCommit<'a> = async move {
                    let result = controller
                        .commit(&row, move |_, _| simulated_persist(fail, delay_ms))
                        .await;
                    (row, fail, result)
                }
                .boxed_local();

                let ready = commit.as_mut().now_or_never();
                match ready {
                    Some((row, fail, result)) => {
                        // rejected up front, or persisted without suspending
                        let rejected = classify(&result) != ExpectedResult::Accepted;
                        if expected == ExpectedResult::Accepted && !rejected {
                            self.settle(&row, fail, &result);
                        } else {
                            self.check(&operation, expected, &result);
                        }
                    }
                    None => {
                        if expected != ExpectedResult::Accepted {
                            self.violations.push(Violation::UnexpectedOutcome {
                                operation: operation.clone(),
                                expected,
                                actual: "commit suspended".to_string(),
                            });
                        }
                        if let Some(shadow) = self.shadow.get_mut(&target) {
                            shadow.committing = true;
                        }
                        self.in_flight.push(commit);
                        self.stats.max_in_flight =
                            self.stats.max_in_flight.max(self.in_flight.len());
                    }
                }
            }
            SimulatedOperation::Drain => {}
        }
    }

    async fn drain_one(&mut self) {
        if let Some((row, fail, result)) = self.in_flight.next().await {
            self.settle(&row, fail, &result);
        }
    }

    fn verify(&mut self) {
        for (row, expected) in &self.shadow {
            let Some(view) = self.controller.row(row) else {
                self.violations.push(Violation::StateDivergence {
                    row: row.clone(),
                    expected: format!("{expected:?}"),
                    actual: "row missing".to_string(),
                });
                continue;
            };
            if view.is_committing() && !view.is_dirty() {
                self.violations.push(Violation::InvariantBroken { row: row.clone() });
            }
            let actual = ShadowRow {
                base: view.base,
                staged: view.staged,
                committing: view.status == rowedit_core::RowStatus::Committing,
            };
            if actual != *expected {
                self.violations.push(Violation::StateDivergence {
                    row: row.clone(),
                    expected: format!("{expected:?}"),
                    actual: format!("{actual:?}"),
                });
            }
        }
    }
}

fn generate_operation(
    rng: &mut StdRng,
    config: &SimulatorConfig,
    rows: &[MemberId],
) -> SimulatedOperation {
    if rng.random_bool(config.drain_probability) {
        return SimulatedOperation::Drain;
    }
    let row = rows[rng.random_range(0..rows.len())].clone();
    match rng.random_range(0..10) {
        0..=4 => SimulatedOperation::Stage {
            row,
            role: RoleId::from(ROLES[rng.random_range(0..ROLES.len())]),
        },
        5..=6 => SimulatedOperation::Cancel { row },
        _ => SimulatedOperation::Commit {
            row,
            fail: rng.random_bool(config.failure_rate),
            delay_ms: rng.random_range(0..=config.max_delay_ms),
        },
    }
}

/// Run the simulator
///
/// # Errors
/// Settings rejected by [`SimulatorConfig::validate`]
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, SimulatorError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let rows: Vec<MemberId> = (0..config.rows.max(1))
        .map(|i| MemberId::new(format!("m{i}")))
        .collect();

    let controller = EditSessionController::with_rows(
        ControllerConfig::new(),
        rows.iter().map(|id| (id.clone(), RoleId::from(ROLES[0]))),
    );
    let mut sim = Simulation {
        controller: &controller,
        shadow: rows
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    ShadowRow {
                        base: RoleId::from(ROLES[0]),
                        staged: None,
                        committing: false,
                    },
                )
            })
            .collect(),
        in_flight: FuturesUnordered::new(),
        stats: SimulatorStats::default(),
        violations: Vec::new(),
    };

    tracing::info!(
        seed = config.seed,
        rows = rows.len(),
        operations = config.operations,
        "simulation started"
    );

    for _ in 0..config.operations {
        match generate_operation(&mut rng, &config, &rows) {
            SimulatedOperation::Drain => sim.drain_one().await,
            operation => sim.apply(operation),
        }
        sim.verify();
        if config.stop_on_first_violation && !sim.violations.is_empty() {
            break;
        }
    }

    while !sim.in_flight.is_empty() {
        sim.drain_one().await;
    }
    sim.verify();

    let Simulation {
        stats, violations, ..
    } = sim;
    let report = SimulatorReport {
        config,
        stats,
        session: controller.stats(),
        violations,
    };
    tracing::info!(violations = report.violations.len(), "simulation finished");
    Ok(report)
}
