use std::env;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};

use permtrace::posix::report::write_report;
use permtrace::{
    infer, log_set_stderr, resolve_path, CheckConfig, CheckError, Context, Follow, HostProbe, Identity,
    MountTable, PermissionRequest, ReportMode, Verbosity,
};

/// Checks, one path component at a time, whether a user may access a file.
#[derive(Parser, Debug)]
#[command(name = "permtrace", version)]
struct Cli {
    /// User name or uid to check for (defaults to the invoking user)
    #[arg(short = 'u', long = "user", value_name = "USER|UID")]
    users: Vec<String>,

    /// Any combination of r, w, x, c (create) and d (delete); default r
    #[arg(short = 'p', long = "perms", value_name = "PERMS")]
    perms: Vec<String>,

    /// Print every path segment (-v), more detail (-vv), blocking descendants (-vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Paths to check
    #[arg(value_name = "FILE")]
    paths: Vec<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = err.print();
                }
                _ => {
                    if let Some(reason) = err.kind().as_str() {
                        eprintln!("{reason}");
                    }
                    let _ = Cli::command().print_help();
                }
            }
            return ExitCode::SUCCESS;
        }
    };

    let verbosity = Verbosity::try_from(cli.verbose.min(Verbosity::MAX)).unwrap_or_default();
    if let Err(err) = log_set_stderr(verbosity.level_filter()) {
        eprintln!("ERR {err}");
    }

    if cli.paths.is_empty() {
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::FAILURE;
    }

    match run(&cli, verbosity) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("ERR {err}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when at least one path hit a fatal error. Denials are
/// reported in the output only.
fn run(cli: &Cli, verbosity: Verbosity) -> Result<bool, CheckError> {
    if cli.users.len() > 1 {
        return Err(CheckError::DuplicateUser);
    }
    let identity = match cli.users.first() {
        Some(user) => Identity::load(user)?,
        None => Identity::current()?,
    };
    log::info!("checking as user '{}' (uid {})", identity.name, identity.uid);

    let request = if cli.perms.is_empty() {
        PermissionRequest::default()
    } else {
        PermissionRequest::parse(&cli.perms.concat())
    };
    log::info!("checking perms '{}'", request.rendered());
    log::info!("verbosity level {}", verbosity as u8);

    let config = CheckConfig::from_env();
    let mounts = MountTable::load(&config)?;
    let ctx = Context::new(identity, mounts, config, Box::new(HostProbe::new())).with_verbosity(verbosity);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut all_checked = true;
    for raw in &cli.paths {
        log::debug!("checking file '{raw}'");
        if let Err(err) = check_path(&ctx, raw, &request, &mut out) {
            let _ = out.flush();
            eprintln!("ERR {err}");
            all_checked = false;
        }
    }
    Ok(all_checked)
}

fn check_path(ctx: &Context, raw: &str, request: &PermissionRequest, out: &mut impl Write) -> Result<(), CheckError> {
    let cwd = if raw.starts_with('/') {
        String::new()
    } else {
        current_dir(raw)?
    };
    let chain = resolve_path(ctx, raw, &cwd, Follow::Symlinks)?;
    let assessment = infer(ctx, &chain, request, ReportMode::Full);
    log::debug!(
        "{raw}: {} segments, allowed={}",
        assessment.verdicts.len(),
        assessment.allowed
    );
    if let Err(err) = write_report(out, &assessment, &ctx.identity, request, ctx.verbosity) {
        log::error!("failed to write report for {raw}: {err}");
    }
    Ok(())
}

fn current_dir(raw: &str) -> Result<String, CheckError> {
    let cwd = env::current_dir().map_err(|err| CheckError::from_io(raw, &err))?;
    cwd.to_str()
        .map(str::to_string)
        .ok_or_else(|| CheckError::invalid_path(raw, "is relative to a working directory that is not valid UTF-8"))
}
