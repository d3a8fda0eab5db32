//! Subcommand handlers. Each returns the process exit code.

use std::path::PathBuf;
use std::str::FromStr;

use clap::ArgMatches;
use tracing::{error, info};
use txmatrix_core::{
    BeginStrategy, DeleteMethod, InsertMethod, ScenarioOutcome, ScenarioPoint, SessionMode, Step,
    Verdict,
};
use txmatrix_harness::{
    lifecycle_for, run_point, HarnessConfig, HarnessError, InProcessExecutor, MatrixSpec,
    Orchestrator, ScenarioExecutor, SubprocessExecutor, Variant, MULTIPLEXED_SESSIONS_ENV,
};

/// Every point passed, or the scenario passed
pub const EXIT_PASS: i32 = 0;
/// At least one point is a BUG, or the scenario did not pass
pub const EXIT_BUG: i32 = 1;
/// The run could not complete (setup or configuration)
pub const EXIT_FATAL: i32 = 2;

fn config_path(matches: &ArgMatches) -> Option<PathBuf> {
    matches.get_one::<String>("config").map(PathBuf::from)
}

/// Load the harness config and apply the `--data-dir` override
fn load_config(matches: &ArgMatches) -> Result<HarnessConfig, HarnessError> {
    let path = config_path(matches);
    let config = HarnessConfig::load(path.as_deref())?;
    Ok(match matches.get_one::<String>("data-dir") {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}

fn parse_arg<T: FromStr>(matches: &ArgMatches, id: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    let raw = matches
        .get_one::<String>(id)
        .ok_or_else(|| format!("missing --{}", id))?;
    raw.parse::<T>().map_err(|e| e.to_string())
}

/// `txmatrix matrix`
pub fn matrix(matches: &ArgMatches) -> i32 {
    let config = match load_config(matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FATAL;
        }
    };
    let variant: Variant = match parse_arg(matches, "variant") {
        Ok(variant) => variant,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FATAL;
        }
    };

    let spec = MatrixSpec::for_variant(variant);
    let lifecycle = match lifecycle_for(&config) {
        Ok(lifecycle) => lifecycle,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FATAL;
        }
    };
    let executor: Box<dyn ScenarioExecutor> = if matches.get_flag("in-process") {
        Box::new(InProcessExecutor::new(config.clone()))
    } else {
        match SubprocessExecutor::current_exe(&config.backend.data_dir) {
            Ok(exec) => Box::new(exec.with_config_path(config_path(matches))),
            Err(e) => {
                eprintln!("{}", e);
                return EXIT_FATAL;
            }
        }
    };

    let report = match Orchestrator::new(&*lifecycle, &*executor).run(&spec) {
        Ok(report) => report,
        Err(HarnessError::Setup {
            point,
            source,
            completed,
        }) => {
            error!(%point, completed = completed.len(), error = %source, "backend setup failed, aborting run");
            eprintln!("setup failed before point [{}]: {}", point, source);
            return EXIT_FATAL;
        }
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FATAL;
        }
    };

    if matches.get_flag("json") {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("failed to encode report: {}", e);
                return EXIT_FATAL;
            }
        }
    } else {
        print!("{}", report.render_table());
    }

    if report.has_bugs() {
        EXIT_BUG
    } else {
        EXIT_PASS
    }
}

fn scenario_point(matches: &ArgMatches) -> Result<ScenarioPoint, String> {
    let toggle = std::env::var(MULTIPLEXED_SESSIONS_ENV).ok();
    let session = SessionMode::from_env_value(toggle.as_deref())
        .map_err(|e| format!("{}: {}", MULTIPLEXED_SESSIONS_ENV, e))?;
    Ok(ScenarioPoint {
        session,
        insert: parse_arg::<InsertMethod>(matches, "insert")?,
        delete: parse_arg::<DeleteMethod>(matches, "delete")?,
        begin: parse_arg::<BeginStrategy>(matches, "begin")?,
    })
}

fn run_scenario(config: &HarnessConfig, matches: &ArgMatches) -> ScenarioOutcome {
    match scenario_point(matches) {
        Ok(point) => {
            info!(%point, "scenario started");
            run_point(config, &point, matches.get_flag("skip-setup"))
        }
        Err(message) => ScenarioOutcome::StepFailed {
            step: Step::Setup,
            message,
        },
    }
}

/// `txmatrix scenario`
///
/// Always prints exactly one verdict line to stdout, even when the
/// configuration is unusable.
pub fn scenario(matches: &ArgMatches) -> i32 {
    let outcome = match load_config(matches) {
        Ok(config) => run_scenario(&config, matches),
        Err(e) => ScenarioOutcome::StepFailed {
            step: Step::Setup,
            message: e.to_string(),
        },
    };
    println!("{}", outcome.final_line());
    match outcome.verdict() {
        Verdict::Pass => EXIT_PASS,
        Verdict::Bug => EXIT_BUG,
    }
}

/// `txmatrix reset`
pub fn reset(matches: &ArgMatches) -> i32 {
    let config = match load_config(matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FATAL;
        }
    };
    let lifecycle = match lifecycle_for(&config) {
        Ok(lifecycle) => lifecycle,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FATAL;
        }
    };
    match lifecycle.reset() {
        Ok(database) => {
            println!("{}", database);
            EXIT_PASS
        }
        Err(e) => {
            eprintln!("setup failed: {}", e);
            EXIT_FATAL
        }
    }
}
