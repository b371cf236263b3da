//! Validator / unit / reporter wrapper for composites that may already
//! partially exist or fail non-fatally.
//!
//! The wrapper forces `validator -> unit -> reporter`. Validator and reporter
//! are advisory: on `Delete` they short-circuit to success without running,
//! and on `Create`/`Update` any error or panic inside them becomes
//! [`Status::SuccessWithWarning`](super::Status::SuccessWithWarning). Only the
//! unit's own error is returned as an error.

use super::event::ReconciliationEvent;
use super::result::{Data, ReconciliationResult};
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, warn};

/// Phases of one wrapped run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Phase {
    Pending,
    Validating,
    Provisioning,
    /// `Delete`: advisory checks were skipped; the unit handles deletion.
    SkippedOnDelete,
    Reporting,
    Done,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "{self:?}")
    }
}

/// What an advisory step sees.
#[derive(Debug, Clone, Copy)]
pub struct AdvisoryContext<'a> {
    pub event: &'a ReconciliationEvent,
    pub phase: Phase,
    /// The unit's output, serialized, once the unit has run.
    pub unit_output: Option<&'a Value>,
}

/// A validator or reporter. Errors are downgraded to warnings by the wrapper.
pub trait AdvisoryStep: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Any error is recorded as a warning; it never fails the run.
    fn run(&self, ctx: &AdvisoryContext<'_>) -> Result<Data>;
}

/// Advisory step that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopStep;

impl AdvisoryStep for NoopStep {
    fn name(&self) -> &str {
        "noop"
    }

    fn run(&self, _ctx: &AdvisoryContext<'_>) -> Result<Data> {
        Ok(Data::new())
    }
}

/// Advisory step from a closure.
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> AdvisoryStep for FnStep<F>
where
    F: Fn(&AdvisoryContext<'_>) -> Result<Data> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &AdvisoryContext<'_>) -> Result<Data> {
        (self.f)(ctx)
    }
}

pub fn advisory_fn<F>(name: impl Into<String>, f: F) -> FnStep<F>
where
    F: Fn(&AdvisoryContext<'_>) -> Result<Data> + Send + Sync,
{
    FnStep { name: name.into(), f }
}

/// The wrapped provisioning itself.
pub trait ProvisioningUnit {
    type Output: Serialize;
    type Error;

    /// # Errors
    ///
    /// Provisioning errors are propagated unchanged by the wrapper.
    fn apply(&mut self, event: &ReconciliationEvent) -> Result<Self::Output, Self::Error>;
}

impl<F, T, E> ProvisioningUnit for F
where
    F: FnMut(&ReconciliationEvent) -> Result<T, E>,
    T: Serialize,
{
    type Output = T;
    type Error = E;

    fn apply(&mut self, event: &ReconciliationEvent) -> Result<T, E> {
        self(event)
    }
}

/// `{ validator, unit, reporter }` with forced ordering.
pub struct ResilientUnit<U> {
    validator: Arc<dyn AdvisoryStep>,
    unit: U,
    reporter: Arc<dyn AdvisoryStep>,
}

/// Wrap `unit` with no-op advisory steps; attach real ones with
/// [`ResilientUnit::validator`] and [`ResilientUnit::reporter`].
pub fn wrap<U: ProvisioningUnit>(unit: U) -> ResilientUnit<U> {
    ResilientUnit {
        validator: Arc::new(NoopStep),
        unit,
        reporter: Arc::new(NoopStep),
    }
}

/// Everything one wrapped run produced.
#[derive(Debug)]
pub struct WrappedRun<T> {
    pub validation: ReconciliationResult,
    pub output: T,
    pub report: ReconciliationResult,
    pub phases: Vec<Phase>,
}

impl<T> WrappedRun<T> {
    /// Warnings from both advisory steps.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        [&self.validation, &self.report]
            .into_iter()
            .filter_map(|r| r.warning.clone())
            .collect()
    }

    /// Combined result: validator data then reporter data, with all warnings
    /// joined under `Warning`.
    #[must_use]
    pub fn result(&self) -> ReconciliationResult {
        let mut data = self.validation.data.clone();
        data.extend(self.report.data.clone());
        let warnings = self.warnings();
        let id = self.report.physical_resource_id.clone();
        if warnings.is_empty() {
            ReconciliationResult::success(id, data)
        } else {
            ReconciliationResult::with_warning(id, data, warnings.join("; "))
        }
    }
}

impl<U: ProvisioningUnit> ResilientUnit<U> {
    pub fn new(validator: Arc<dyn AdvisoryStep>, unit: U, reporter: Arc<dyn AdvisoryStep>) -> Self {
        Self {
            validator,
            unit,
            reporter,
        }
    }

    #[must_use]
    pub fn validator(mut self, step: Arc<dyn AdvisoryStep>) -> Self {
        self.validator = step;
        self
    }

    #[must_use]
    pub fn reporter(mut self, step: Arc<dyn AdvisoryStep>) -> Self {
        self.reporter = step;
        self
    }

    /// Run validator, unit, reporter in that order.
    ///
    /// # Errors
    ///
    /// Returns the unit's error if provisioning fails; the reporter does not
    /// run in that case. Advisory failures never produce an error.
    pub fn run(&mut self, event: &ReconciliationEvent) -> Result<WrappedRun<U::Output>, U::Error> {
        let mut phases = vec![Phase::Pending, Phase::Validating];
        let validation = run_advisory(self.validator.as_ref(), event, Phase::Validating, None);

        phases.push(if event.is_delete() {
            Phase::SkippedOnDelete
        } else {
            Phase::Provisioning
        });
        debug!(
            logical_id = %event.logical_resource_id,
            request = %event.request_type,
            phase = %phases[phases.len() - 1],
            "applying wrapped unit"
        );
        let output = self.unit.apply(event)?;

        phases.push(Phase::Reporting);
        let serialized = serde_json::to_value(&output).ok();
        let report = run_advisory(self.reporter.as_ref(), event, Phase::Reporting, serialized.as_ref());
        phases.push(Phase::Done);

        Ok(WrappedRun {
            validation,
            output,
            report,
            phases,
        })
    }
}

fn run_advisory(
    step: &dyn AdvisoryStep,
    event: &ReconciliationEvent,
    phase: Phase,
    unit_output: Option<&Value>,
) -> ReconciliationResult {
    let physical_id = event.physical_id_or_logical().to_string();
    if event.is_delete() {
        return ReconciliationResult::success(physical_id, Data::new());
    }

    let ctx = AdvisoryContext {
        event,
        phase,
        unit_output,
    };
    let outcome = catch_unwind(AssertUnwindSafe(|| step.run(&ctx)));
    let message = match outcome {
        Ok(Ok(data)) => return ReconciliationResult::success(physical_id, data),
        Ok(Err(err)) => format!("{}: {err:#}", step.name()),
        Err(panic) => format!("{}: panicked: {}", step.name(), panic_message(panic.as_ref())),
    };
    warn!(
        logical_id = %event.logical_resource_id,
        %phase,
        step = step.name(),
        warning = %message,
        "advisory step failed; continuing"
    );
    ReconciliationResult::with_warning(physical_id, Data::new(), message)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{RequestType, Status};
    use anyhow::bail;
    use serde_json::json;
    use std::sync::Mutex;

    fn event(request: RequestType) -> ReconciliationEvent {
        ReconciliationEvent::new(request, "SearchDomain", "req-1")
    }

    fn recording(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn AdvisoryStep> {
        Arc::new(advisory_fn(name, move |ctx| {
            log.lock().unwrap().push(format!("{name}:{}", ctx.phase));
            Ok(Data::new())
        }))
    }

    #[test]
    fn runs_validator_unit_reporter_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let unit_log = Arc::clone(&log);
        let mut unit = wrap(move |_: &ReconciliationEvent| {
            unit_log.lock().unwrap().push("unit".to_string());
            Ok::<_, String>(json!({"endpoint": "search.internal"}))
        })
        .validator(recording("validator", Arc::clone(&log)))
        .reporter(recording("reporter", Arc::clone(&log)));

        let run = unit.run(&event(RequestType::Create)).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["validator:Validating", "unit", "reporter:Reporting"]
        );
        assert_eq!(
            run.phases,
            vec![Phase::Pending, Phase::Validating, Phase::Provisioning, Phase::Reporting, Phase::Done]
        );
        assert_eq!(run.result().status, Status::Success);
    }

    #[test]
    fn reporter_sees_unit_output() {
        let reporter: Arc<dyn AdvisoryStep> = Arc::new(advisory_fn("reporter", |ctx| {
            let mut data = Data::new();
            data.insert("Seen".into(), ctx.unit_output.cloned().unwrap_or_default());
            Ok(data)
        }));
        let mut unit = wrap(|_: &ReconciliationEvent| Ok::<_, String>(7)).reporter(reporter);
        let run = unit.run(&event(RequestType::Update)).unwrap();
        assert_eq!(run.result().data["Seen"], json!(7));
    }

    #[test]
    fn panicking_reporter_becomes_a_warning() {
        let reporter: Arc<dyn AdvisoryStep> =
            Arc::new(advisory_fn("reporter", |_ctx| -> Result<Data> { panic!("metrics sink down") }));
        let mut unit = wrap(|_: &ReconciliationEvent| Ok::<_, String>(())).reporter(reporter);
        let run = unit.run(&event(RequestType::Create)).unwrap();
        let result = run.result();
        assert!(result.is_warning());
        assert!(result.warning.unwrap().contains("metrics sink down"));
    }

    #[test]
    fn unit_failure_propagates_and_skips_reporter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut unit = wrap(|_: &ReconciliationEvent| Err::<(), _>("quota exceeded".to_string()))
            .reporter(recording("reporter", Arc::clone(&log)));
        assert_eq!(unit.run(&event(RequestType::Create)).unwrap_err(), "quota exceeded");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn delete_short_circuits_advisory_steps() {
        let validator: Arc<dyn AdvisoryStep> = Arc::new(advisory_fn("validator", |_ctx| bail!("must not run")));
        let mut unit = wrap(|_: &ReconciliationEvent| Ok::<_, String>("deleted")).validator(validator);
        let run = unit.run(&event(RequestType::Delete)).unwrap();
        assert_eq!(run.output, "deleted");
        assert_eq!(run.validation.status, Status::Success);
        assert!(run.phases.contains(&Phase::SkippedOnDelete));
        assert!(!run.phases.contains(&Phase::Provisioning));
    }
}
