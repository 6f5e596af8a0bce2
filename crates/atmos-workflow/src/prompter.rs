//! Interactive step I/O (`input`/`choose`/`confirm`/`filter`),
//! abstracted behind a trait the same way `atmos-auth::posthook` abstracts
//! the ECR token exchange — so step handlers are exercised in tests without
//! a real terminal attached.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};

/// Reads operator input. Steps that need a human answer call through this
/// rather than touching stdin directly.
pub trait Prompter: Send + Sync {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String>;
    fn choose(&self, prompt: &str, options: &[String]) -> Result<String>;
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
    fn filter(&self, prompt: &str, options: &[String]) -> Result<String> {
        self.choose(prompt, options)
    }
}

/// Reads from real stdin/stdout. Used outside of tests; callers must have
/// already checked [`crate::tty::tty_available`] before invoking a step
/// that requires one.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(d) => print!("{prompt} [{d}]: "),
            None => print!("{prompt}: "),
        }
        io::stdout().flush().ok();

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let answer = line.trim();
        if answer.is_empty() {
            default.map(str::to_string).ok_or_else(|| no_answer(prompt))
        } else {
            Ok(answer.to_string())
        }
    }

    fn choose(&self, prompt: &str, options: &[String]) -> Result<String> {
        println!("{prompt}");
        for (i, opt) in options.iter().enumerate() {
            println!("  {}) {opt}", i + 1);
        }
        let answer = self.input("select", None)?;
        match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => Ok(options[n - 1].clone()),
            _ if options.contains(&answer) => Ok(answer),
            _ => Err(AtmosError::new(ErrorKind::InvalidConfig, format!("not a valid choice: {answer}"))
                .with_hint(format!("choose one of: {}", options.join(", ")))
                .into()),
        }
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        let suffix = if default { "Y/n" } else { "y/N" };
        let answer = self.input(&format!("{prompt} [{suffix}]"), Some(if default { "y" } else { "n" }))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

fn no_answer(prompt: &str) -> anyhow::Error {
    AtmosError::new(ErrorKind::InvalidConfig, format!("no answer given for prompt: {prompt}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedPrompter;

    #[test]
    fn scripted_prompter_replays_answers_in_order() {
        let prompter = ScriptedPrompter::new(["prod", "y"]);
        assert_eq!(prompter.input("env", None).unwrap(), "prod");
        assert!(prompter.confirm("go?", false).unwrap());
    }
}
