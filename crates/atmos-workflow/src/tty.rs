//! TTY detection and the `ATMOS_FORCE_TTY` override ("if a
//! step's `RequiresTTY()` is true and no TTY is attached and
//! `ATMOS_FORCE_TTY` is unset, the step fails with `ErrTTYRequired`").
//! Grounded directly on the teacher's `shipper-cli::progress::is_tty`
//! (`atty::is(Stream::Stdout)`).

use atty::Stream;

const FORCE_TTY_ENV: &str = "ATMOS_FORCE_TTY";

/// Whether stdout is attached to a real terminal.
pub fn is_tty() -> bool {
    atty::is(Stream::Stdout)
}

/// Whether the workflow may proceed past a TTY-requiring step: either a
/// real terminal is attached, or the operator opted in with
/// `ATMOS_FORCE_TTY` (used in CI to run workflows with scripted defaults).
pub fn tty_available() -> bool {
    is_tty() || std::env::var(FORCE_TTY_ENV).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn force_tty_env_overrides_detection() {
        temp_env::with_var(FORCE_TTY_ENV, Some("1"), || {
            assert!(tty_available());
        });
    }

    #[test]
    #[serial_test::serial]
    fn without_override_falls_back_to_real_detection() {
        temp_env::with_var_unset([FORCE_TTY_ENV], || {
            assert_eq!(tty_available(), is_tty());
        });
    }
}
