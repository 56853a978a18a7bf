//! Invocation coordinator: ordered fallback across strategies.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::strategy::InvocationStrategy;
use crate::core::types::{InvocationOutcome, status};
use crate::io::locate::ExecutableLocator;
use crate::io::strategy::{ExecSettings, ProcessStrategy, Strategy};

pub const NOT_FOUND_DIAGNOSTIC: &str = "ollama executable not found in PATH or known locations";
const COORDINATOR: &str = "coordinator";

/// Owns the fixed-priority strategy list for the model CLI.
#[derive(Debug, Clone)]
pub struct Coordinator {
    locator: ExecutableLocator,
    strategies: Vec<InvocationStrategy>,
    settings: ExecSettings,
}

impl Coordinator {
    pub fn new(
        locator: ExecutableLocator,
        strategies: Vec<InvocationStrategy>,
        settings: ExecSettings,
    ) -> Self {
        Self {
            locator,
            strategies,
            settings,
        }
    }

    /// Try each strategy in order for `model`; never returns an error.
    #[instrument(skip_all, fields(model = model, timeout_ms = timeout.as_millis() as u64))]
    pub fn invoke(&self, prompt: &str, model: &str, timeout: Duration) -> InvocationOutcome {
        let Some(program) = self.locator.locate() else {
            warn!(executable = %self.locator.executable, "model executable not found");
            return InvocationOutcome::failure(
                COORDINATOR,
                status::EXECUTABLE_NOT_FOUND,
                NOT_FOUND_DIAGNOSTIC,
            );
        };
        let strategies: Vec<Box<dyn Strategy>> = self
            .strategies
            .iter()
            .map(|strategy| {
                Box::new(ProcessStrategy::new(
                    strategy.clone(),
                    program.clone(),
                    model,
                    self.settings.clone(),
                )) as Box<dyn Strategy>
            })
            .collect();
        first_success(&strategies, prompt, timeout)
    }
}

/// Run `strategies` in order and return the first successful outcome.
///
/// Each strategy gets the full `timeout`. A faulting strategy is recorded as
/// the last error and the chain continues.
pub fn first_success(
    strategies: &[Box<dyn Strategy>],
    prompt: &str,
    timeout: Duration,
) -> InvocationOutcome {
    let mut last_error: Option<String> = None;
    for strategy in strategies {
        debug!(strategy = strategy.name(), "trying strategy");
        match strategy.invoke(prompt, timeout) {
            Ok(outcome) if outcome.is_success() => {
                info!(strategy = strategy.name(), "strategy succeeded");
                return outcome;
            }
            Ok(outcome) => {
                warn!(
                    strategy = strategy.name(),
                    status = outcome.status,
                    "strategy failed, falling through"
                );
                last_error = Some(format!(
                    "{} (status {}): {}",
                    strategy.name(),
                    outcome.status,
                    outcome.diagnostic_or_default()
                ));
            }
            Err(err) => {
                warn!(strategy = strategy.name(), err = %format!("{err:#}"), "strategy faulted");
                last_error = Some(format!("{} runtime error: {err:#}", strategy.name()));
            }
        }
    }
    InvocationOutcome::failure(
        COORDINATOR,
        status::ALL_FAILED,
        format!(
            "All invocation strategies failed ({} attempted). Last error: {}",
            strategies.len(),
            last_error.as_deref().unwrap_or("no strategies configured")
        ),
    )
}
