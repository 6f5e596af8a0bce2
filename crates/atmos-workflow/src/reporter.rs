//! Non-interactive output for workflow steps (output/UI-message/
//! terminal categories: `table`, `pager`, `log`, `toast`, `alert`, `title`,
//! `clear`, and the begin/end log-framing `log` output mode uses).
//! Grounded on the teacher's `shipper-cli::progress::ProgressReporter`
//! TTY-detect-then-fall-back shape, generalized from a package-publish
//! progress bar to an arbitrary labeled line/spinner sink.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::tty::is_tty;

/// A handle to an in-progress spinner; dropping it without calling
/// [`SpinnerHandle::finish`] leaves the bar in its last state.
pub struct SpinnerHandle(Option<ProgressBar>);

impl SpinnerHandle {
    pub fn finish(self, message: &str) {
        if let Some(bar) = self.0 {
            bar.finish_with_message(message.to_string());
        } else {
            eprintln!("{message}");
        }
    }
}

/// Where step output goes. One instance is shared across a whole workflow
/// run (engine owns it), so `log`-mode framing can count begin/end pairs.
pub trait Reporter: Send + Sync {
    fn line(&self, text: &str);
    fn begin_framed(&self, label: &str);
    fn end_framed(&self, label: &str, success: bool);
    fn spinner(&self, label: &str) -> SpinnerHandle;
}

/// Writes to real stdout/stderr, with an `indicatif` spinner when a TTY is
/// attached and a plain `eprintln!` fallback otherwise — the same
/// TTY-branch the teacher's progress bar uses.
#[derive(Default)]
pub struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn line(&self, text: &str) {
        println!("{text}");
    }

    fn begin_framed(&self, label: &str) {
        println!("── begin {label} ──");
    }

    fn end_framed(&self, label: &str, success: bool) {
        let marker = if success { "ok" } else { "failed" };
        println!("── end {label} ({marker}) ──");
    }

    fn spinner(&self, label: &str) -> SpinnerHandle {
        if is_tty() {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
                bar.set_style(style);
            }
            bar.set_message(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            SpinnerHandle(Some(bar))
        } else {
            eprintln!("… {label}");
            SpinnerHandle(None)
        }
    }
}

/// Captures every line for assertions instead of printing. Test-only.
#[derive(Default)]
pub struct RecordingReporter {
    pub lines: Mutex<Vec<String>>,
}

impl Reporter for RecordingReporter {
    fn line(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }

    fn begin_framed(&self, label: &str) {
        self.lines.lock().unwrap().push(format!("begin:{label}"));
    }

    fn end_framed(&self, label: &str, success: bool) {
        self.lines.lock().unwrap().push(format!("end:{label}:{success}"));
    }

    fn spinner(&self, label: &str) -> SpinnerHandle {
        self.lines.lock().unwrap().push(format!("spin:{label}"));
        SpinnerHandle(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_reporter_captures_lines_in_order() {
        let reporter = RecordingReporter::default();
        reporter.begin_framed("plan");
        reporter.line("applying...");
        reporter.end_framed("plan", true);
        assert_eq!(*reporter.lines.lock().unwrap(), vec!["begin:plan", "applying...", "end:plan:true"]);
    }
}
