//! Shared test doubles for step-handler unit tests across this crate.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;

use crate::prompter::Prompter;

/// Replays a fixed script of answers, in call order, regardless of which
/// `Prompter` method is invoked. Panics if asked for more answers than
/// scripted, which surfaces a wrong call count as a loud test failure.
pub struct ScriptedPrompter(Mutex<VecDeque<String>>);

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = &'static str>) -> Self {
        Self(Mutex::new(answers.into_iter().map(str::to_string).collect()))
    }

    fn next(&self) -> String {
        self.0.lock().unwrap().pop_front().expect("prompter script exhausted")
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, _prompt: &str, _default: Option<&str>) -> Result<String> {
        Ok(self.next())
    }

    fn choose(&self, _prompt: &str, _options: &[String]) -> Result<String> {
        Ok(self.next())
    }

    fn confirm(&self, _prompt: &str, _default: bool) -> Result<bool> {
        Ok(self.next() == "y")
    }
}
