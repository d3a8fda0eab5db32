//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("txmatrix")
        .about("Matrix-driven verification of transactional delete durability")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log warnings and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Harness config file (default: ./txmatrix.toml if present)")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .help("Backend data directory (overrides the config file)")
                .global(true),
        )
        .subcommand(build_matrix())
        .subcommand(build_scenario())
        .subcommand(build_reset())
}

fn build_matrix() -> Command {
    Command::new("matrix")
        .about("Run every point of a matrix variant and print the report")
        .arg(
            Arg::new("variant")
                .long("variant")
                .help("Matrix variant")
                .value_parser(["insert-delete", "delete-begin", "mixed-write"])
                .required(true),
        )
        .arg(
            Arg::new("in-process")
                .long("in-process")
                .help("Run scenarios inside this process instead of one child per point")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the report as JSON")
                .action(ArgAction::SetTrue),
        )
}

fn build_scenario() -> Command {
    Command::new("scenario")
        .about("Run one scenario point; the last stdout line is the verdict")
        .arg(
            Arg::new("insert")
                .long("insert")
                .help("Insert method")
                .value_parser(["rw-dml", "stmt-dml"])
                .default_value("rw-dml"),
        )
        .arg(
            Arg::new("delete")
                .long("delete")
                .help("Delete method")
                .value_parser(["stmt-mutation", "rw-mutation", "apply", "stmt-dml", "stmt-mixed"])
                .default_value("stmt-mutation"),
        )
        .arg(
            Arg::new("begin")
                .long("begin")
                .help("Begin strategy")
                .value_parser(["default", "inlined", "explicit"])
                .default_value("default"),
        )
        .arg(
            Arg::new("skip-setup")
                .long("skip-setup")
                .help("Assume instance and database already exist")
                .action(ArgAction::SetTrue),
        )
}

fn build_reset() -> Command {
    Command::new("reset").about("Stop, start and bootstrap the backend")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_scenario_defaults() {
        let matches = build_cli()
            .try_get_matches_from(["txmatrix", "scenario"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "scenario");
        assert_eq!(sub.get_one::<String>("insert").unwrap(), "rw-dml");
        assert_eq!(sub.get_one::<String>("delete").unwrap(), "stmt-mutation");
        assert_eq!(sub.get_one::<String>("begin").unwrap(), "default");
        assert!(!sub.get_flag("skip-setup"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from([
                "txmatrix",
                "matrix",
                "--variant",
                "delete-begin",
                "--data-dir",
                "/tmp/b",
                "--quiet",
            ])
            .unwrap();
        let sub = matches.subcommand_matches("matrix").unwrap();
        assert_eq!(sub.get_one::<String>("data-dir").unwrap(), "/tmp/b");
        assert!(sub.get_flag("quiet"));
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let err = build_cli()
            .try_get_matches_from(["txmatrix", "matrix", "--variant", "all"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn test_matrix_requires_variant() {
        assert!(build_cli()
            .try_get_matches_from(["txmatrix", "matrix"])
            .is_err());
    }
}
