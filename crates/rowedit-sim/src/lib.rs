//! rowedit simulator
//!
//! Seeded random workloads that hammer one edit controller with overlapping
//! commits and check it against a shadow model, plus the scripted
//! role-column walkthrough used by `rowedit-sim demo`.

#![allow(missing_docs)]

pub mod demo;
pub mod simulator;

pub use demo::{run_demo, DemoStep};
pub use simulator::{
    run_simulator, ExpectedResult, SimulatedOperation, SimulatorConfig, SimulatorError,
    SimulatorReport, SimulatorStats, Violation,
};
