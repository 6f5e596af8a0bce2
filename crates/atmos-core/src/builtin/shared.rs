//! Shared dispatch helper for the built-in component providers: run a
//! tool's subcommand in a component's working directory, honoring the
//! resolved `AuthContext`'s exported environment and the execution
//! context's cancellation token.

use anyhow::Result;
use atmos_process::RunOptions;

use crate::provider::ExecutionContext;

/// Run `program subcommand args…` in `ctx.working_directory`, injecting
/// `ctx.auth`'s exported environment variables so the subprocess inherits
/// whatever credentials authentication resolved. A `dry_run` context logs
/// the command that would have run and returns without spawning anything.
pub fn dispatch(program: &str, ctx: &ExecutionContext) -> Result<()> {
    let mut args: Vec<&str> = vec![ctx.subcommand.as_str()];
    args.extend(ctx.args.iter().map(String::as_str));

    if ctx.dry_run {
        tracing::info!(program, args = ?args, component = ctx.component, "dry run, not executing");
        return Ok(());
    }

    let mut opts = RunOptions::new().in_dir(&ctx.working_directory).with_cancellation(ctx.cancellation.clone());
    if let Some(auth) = ctx.auth {
        for (k, v) in &auth.env {
            opts = opts.with_env(k, v);
        }
    }

    atmos_process::run_checked(program, &args, &opts)?;
    Ok(())
}
