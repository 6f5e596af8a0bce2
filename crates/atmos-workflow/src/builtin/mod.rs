//! Built-in step handlers, grouped by the five categories names.

mod command;
mod interactive;
mod messages;
mod output;
mod terminal;

use std::sync::Arc;

use crate::handler::{StepHandler, StepRegistry};

fn register(registry: &StepRegistry, kind: &'static str, handler: Arc<dyn StepHandler>) {
    registry.register(kind, Arc::new(move |_kind, _config| Ok(handler.clone())));
}

/// Registers every built-in step kind. Call once at process startup
/// (`atmos-core::RegisterAll`, per init-time self-registration
/// design note); re-registration is last-wins so tests may call this
/// against a fresh registry freely.
pub fn register_builtins(registry: &StepRegistry) {
    register(registry, "input", Arc::new(interactive::InputStep));
    register(registry, "choose", Arc::new(interactive::ChooseStep));
    register(registry, "confirm", Arc::new(interactive::ConfirmStep));
    register(registry, "filter", Arc::new(interactive::FilterStep));
    register(registry, "file", Arc::new(interactive::FileStep));
    register(registry, "write", Arc::new(interactive::WriteStep));

    register(registry, "spin", Arc::new(output::SpinStep));
    register(registry, "table", Arc::new(output::TableStep));
    register(registry, "pager", Arc::new(output::PagerStep));
    register(registry, "format", Arc::new(output::FormatStep));
    register(registry, "join", Arc::new(output::JoinStep));
    register(registry, "style", Arc::new(output::StyleStep));
    register(registry, "linebreak", Arc::new(output::LinebreakStep));
    register(registry, "log", Arc::new(output::LogStep));

    register(registry, "toast", Arc::new(messages::ToastStep));
    register(registry, "markdown", Arc::new(messages::MarkdownStep));
    register(registry, "sleep", Arc::new(messages::SleepStep));
    register(registry, "stage", Arc::new(messages::StageStep));

    register(registry, "alert", Arc::new(terminal::AlertStep));
    register(registry, "title", Arc::new(terminal::TitleStep));
    register(registry, "clear", Arc::new(terminal::ClearStep));
    register(registry, "env", Arc::new(terminal::EnvStep));
    register(registry, "exit", Arc::new(terminal::ExitStep));

    register(registry, "atmos", Arc::new(command::AtmosStep));
    register(registry, "shell", Arc::new(command::ShellStep));
}
