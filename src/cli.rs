//! Command-line interface of the `pbsat` binary.

use crate::params::{BinaryMinimization, ConflictMinimization, SatParameters, VariableBranching};
use clap::Parser;
use miette::{Diagnostic, Result};
use std::{io::Read, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ArgError {
    #[error("Path {} does not exist", path.display())]
    FileDoesNotExist { path: PathBuf },

    #[error("{} is not a file", path.display())]
    NotAFile { path: PathBuf },

    #[error("Cannot read file {}: {}", path.display(), err)]
    CannotReadFile { path: PathBuf, err: std::io::Error },

    #[error("Cannot read from stdin: {}", err)]
    CannotReadStdIn { err: std::io::Error },
}

/// Solves a DIMACS CNF instance.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// The instance in DIMACS CNF format, read from stdin if missing.
    pub instance_path: Option<PathBuf>,

    /// Wall clock limit of the search.
    #[arg(long)]
    pub time_limit: Option<f64>,

    /// Maximal number of conflicts of the search.
    #[arg(long)]
    pub conflict_limit: Option<i64>,

    #[arg(long, default_value_t = 4096)]
    pub memory_limit_mb: u64,

    /// Base number of conflicts between restarts, scaled by the Luby sequence; 0 disables
    /// restarts.
    #[arg(long, default_value_t = 50)]
    pub restart_period: i64,

    #[arg(long, value_enum, default_value_t)]
    pub branching: VariableBranching,

    #[arg(long, default_value_t = 0.0)]
    pub random_branches_ratio: f64,

    #[arg(long, value_enum, default_value_t)]
    pub minimization: ConflictMinimization,

    #[arg(long, value_enum, default_value_t)]
    pub binary_minimization: BinaryMinimization,

    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Store binary clauses with the other clauses instead of the implication graph.
    #[arg(long)]
    pub no_binary_graph: bool,

    /// Log search progress at each restart.
    #[arg(long)]
    pub progress: bool,

    /// Do not print the model.
    #[arg(long)]
    pub no_model: bool,
}

impl Args {
    /// The search parameters selected by the arguments, defaults for everything else.
    #[must_use]
    pub fn parameters(&self) -> SatParameters {
        SatParameters {
            max_time_in_seconds: self.time_limit.unwrap_or(f64::INFINITY),
            max_number_of_conflicts: self.conflict_limit.unwrap_or(i64::MAX),
            max_memory_in_mb: self.memory_limit_mb,
            restart_period: self.restart_period,
            variable_branching: self.branching,
            random_branches_ratio: self.random_branches_ratio,
            minimization_algorithm: self.minimization,
            binary_minimization_algorithm: self.binary_minimization,
            random_seed: self.seed,
            treat_binary_clauses_separately: !self.no_binary_graph,
            log_search_progress: self.progress,
            ..SatParameters::default()
        }
    }

    /// Reads the instance from the given path, or from stdin if there is none.
    ///
    /// # Errors
    ///
    /// Returns an [`ArgError`] if the input cannot be read.
    pub fn read_instance(&self) -> Result<Vec<u8>> {
        let Some(file_path) = &self.instance_path else {
            tracing::info!("No instance path provided, read from stdin");
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer).map_err(|err| ArgError::CannotReadStdIn { err })?;
            return Ok(buffer);
        };
        if !file_path.exists() {
            return Err(ArgError::FileDoesNotExist { path: file_path.clone() }.into());
        }
        if !file_path.is_file() {
            return Err(ArgError::NotAFile { path: file_path.clone() }.into());
        }
        let contents =
            std::fs::read(file_path).map_err(|err| ArgError::CannotReadFile { path: file_path.clone(), err })?;
        Ok(contents)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_parameters() {
        let args = Args::parse_from(["pbsat"]);
        assert_eq!(args.instance_path, None);
        assert_eq!(args.parameters(), SatParameters::default());
    }

    #[test]
    fn flags_are_mapped() {
        let args = Args::parse_from([
            "pbsat",
            "input.cnf",
            "--conflict-limit",
            "100",
            "--branching",
            "fixed-negative",
            "--minimization",
            "simple",
            "--no-binary-graph",
        ]);
        let params = args.parameters();
        assert_eq!(args.instance_path, Some(PathBuf::from("input.cnf")));
        assert_eq!(params.max_number_of_conflicts, 100);
        assert_eq!(params.variable_branching, VariableBranching::FixedNegative);
        assert_eq!(params.minimization_algorithm, ConflictMinimization::Simple);
        assert!(!params.treat_binary_clauses_separately);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn missing_file() {
        let args = Args::parse_from(["pbsat", "/nonexistent/instance.cnf"]);
        assert!(args.read_instance().is_err());
    }
}
