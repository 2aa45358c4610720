use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pbsat::{
    cli::Args,
    cnf::Cnf,
    dimacs::{DimacsParser, ExtendedParseError},
    SatSolver, SolverStatus,
};
use std::io::{Cursor, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<SolverStatus> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let contents = args.read_instance()?;
    let reader = Cursor::new(&contents);

    let cnf: Cnf = match DimacsParser::new(reader).parse() {
        Ok(cnf) => cnf,
        Err(err) => Err(ExtendedParseError { source_code: contents, related: vec![err] })?,
    };

    let mut solver = SatSolver::new();
    solver.set_parameters(args.parameters()).into_diagnostic()?;
    cnf.add_to(&mut solver);
    let result = solver.solve();

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "s {result}").into_diagnostic()?;
    if result == SolverStatus::ModelSat && !args.no_model {
        write!(stdout, "v").into_diagnostic()?;
        for lit in solver.assignment() {
            write!(stdout, " {lit}").into_diagnostic()?;
        }
        writeln!(stdout, " 0").into_diagnostic()?;
    }
    Ok(result)
}
