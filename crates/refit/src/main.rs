//! Binary entry point for `migrate-fixtures`.
//!
//! Rewrites test files from the old foundation fixture shape to the v2
//! schema in place.
//!
//! ## Usage
//!
//! ```bash
//! # Migrate files with the built-in rules
//! migrate-fixtures src/a/__tests__/a.test.ts src/b/__tests__/b.test.ts
//!
//! # Keep going past failures, report everything as JSON
//! migrate-fixtures --on-error collect-all --format json src/**/*.test.ts
//!
//! # Use a custom rule file; dump the effective rules
//! migrate-fixtures --rules rules.json --print-rules
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use refit::cli::{
    print_rules, report_error, run_migrate, DriverOptions, FailurePolicy, OutputFormat, USAGE,
};
use refit::logging::{init_tracing, LogFormat, LogLevel};
use refit_core::config::load_rule_set;
use refit_core::error::RefitError;
use refit_core::migrate::{MigrateOptions, Migrator};

/// Migrate test fixtures to the foundation v2 schema.
#[derive(Parser, Debug)]
#[command(
    name = "migrate-fixtures",
    version,
    about = "Migrate test fixtures to the foundation v2 schema"
)]
struct Cli {
    /// Files to rewrite in place.
    locations: Vec<PathBuf>,

    /// JSON rule file to use instead of the built-in rules.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Print the effective rules as JSON and exit.
    #[arg(long)]
    print_rules: bool,

    /// Report what would change without writing files.
    #[arg(long)]
    dry_run: bool,

    /// What to do when a file fails.
    #[arg(long, value_enum, default_value = "fail-fast")]
    on_error: FailurePolicy,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level for tracing output.
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format.
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.log_level, cli.log_format);

    let format = cli.format;
    match execute(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            // Nothing more can be reported if stdout or stderr is gone.
            let _ = report_error(&err, format, &mut io::stdout(), &mut io::stderr());
            ExitCode::from(err.kind().exit_code())
        }
    }
}

/// Execute the CLI command, returning the exit status.
fn execute(cli: Cli) -> Result<u8, RefitError> {
    if cli.locations.is_empty() && !cli.print_rules {
        return Err(RefitError::invalid_args(format!("no files given\n{}", USAGE)));
    }

    let rules = load_rule_set(cli.rules.as_deref())?;

    if cli.print_rules {
        print_rules(&rules, &mut io::stdout())?;
        return Ok(0);
    }

    let migrator = Migrator::new(rules).with_options(MigrateOptions {
        dry_run: cli.dry_run,
    });
    let options = DriverOptions {
        policy: cli.on_error,
        format: cli.format,
    };

    run_migrate(
        &migrator,
        &cli.locations,
        options,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )
    .map_err(|e| RefitError::internal(format!("failed to write output: {}", e)))
}
