#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_panics_doc, clippy::module_name_repetitions)]

use std::{
    fmt::Display,
    process::{ExitCode, Termination},
};

#[macro_use]
pub mod cnf;
mod clause;
pub mod cli;
mod datastructure;
pub mod dimacs;
mod limit;
mod literal;
pub mod params;
pub mod pb;
mod proof;
pub mod solver;
pub mod symmetry;
mod trail;

// Re-export
pub use literal::{Lit, Var};
pub use params::SatParameters;
pub use pb::{Coefficient, CoefficientOverflow, LiteralWithCoeff};
pub use solver::{SatSolver, Statistics};
pub use symmetry::SparsePermutation;

/// Outcome of [`SatSolver::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// All constraints are satisfied by [`SatSolver::assignment`].
    ModelSat,
    /// The constraints are unsat independently of the assumptions.
    ModelUnsat,
    /// The constraints are unsat under the current assumptions.
    AssumptionsUnsat,
    LimitReached,
}

impl Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverStatus::ModelSat => write!(f, "SATISFIABLE"),
            SolverStatus::ModelUnsat | SolverStatus::AssumptionsUnsat => write!(f, "UNSATISFIABLE"),
            SolverStatus::LimitReached => write!(f, "UNKNOWN"),
        }
    }
}

impl Termination for SolverStatus {
    fn report(self) -> ExitCode {
        match self {
            SolverStatus::ModelSat => ExitCode::from(10),
            SolverStatus::ModelUnsat | SolverStatus::AssumptionsUnsat => ExitCode::from(20),
            SolverStatus::LimitReached => ExitCode::from(0),
        }
    }
}
