//! Runalloc CLI

use std::{
    io::{self, Write},
    process::ExitCode,
};

use runalloc::{
    config::AllocateConfig,
    io::{
        ExportError, ExportPaths, LoadError, load_data, write_allocations, write_door_size_units,
        write_pool, write_slacks,
    },
    logging::{self, LoggingError},
    model::{ModelBuilder, ModelError, observer::TracingObserver},
    report::ReportError,
    solver::SolveStatus,
};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("failed to write to stdout: {0}")]
    Io(#[from] io::Error),

    #[error("solve finished without a solution ({0})")]
    NoSolution(SolveStatus),
}

fn main() -> ExitCode {
    let config = match AllocateConfig::load() {
        Ok(config) => config,
        Err(err) => {
            _ = err.print();

            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(err) = logging::init_subscriber(&config.logging) {
        eprintln!("{err}");

        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "allocation failed");

            ExitCode::FAILURE
        }
    }
}

fn run(config: &AllocateConfig) -> Result<(), RunError> {
    let data = load_data(&config.data_dir, config.formulation)?;
    let builder = ModelBuilder::new(&data);

    let mut model = if config.logging.log_formulation {
        let mut observer = TracingObserver::new(&data);

        builder.build_with_observer(&mut observer)?
    } else {
        builder.build()?
    };

    let pool_config = config.solver.pool_config();

    if let Some(pool_config) = pool_config {
        model.enable_solution_pool(pool_config);
    }

    let status = model.optimize(&config.solver.solve_options());

    if !status.has_solution() {
        return Err(RunError::NoSolution(status));
    }

    let summary = model.summarize_allocations()?;
    let pool = model.solution_pool()?;
    let mut out = io::stdout().lock();

    summary.write_to(&mut out)?;

    writeln!(
        out,
        "Status: {status}   Objective: {}",
        model.objective_value().unwrap_or_default()
    )?;

    if pool_config.is_some() {
        for (rank, solution) in pool.solutions().iter().enumerate() {
            writeln!(out, "  #{}: {}", rank + 1, solution.objective())?;
        }
    }

    let paths = ExportPaths::from_prefix(&config.output_prefix);

    write_allocations(&paths.allocations, &summary)?;
    write_door_size_units(&paths.door_size_units, &summary)?;
    write_slacks(&paths.slacks, &model.constraint_slacks()?)?;

    if pool_config.is_some() {
        write_pool(&paths.pool, &data, pool)?;
    }

    info!(prefix = %config.output_prefix.display(), "exported results");

    Ok(())
}
