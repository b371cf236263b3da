use anyhow::{Result, bail};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tiergraph::reconcile::{AdvisoryStep, Data, advisory_fn};
use tiergraph::testing::*;
use tiergraph::{
    CloudError, CloudResult, Composer, ErrorKind, ExternalObject, ExternalSyncHandler, GroupDirectory, NotFoundPolicy, Phase, ReconciliationEvent,
    ReconciliationResult, RequestType, RetryConfig, Status, SyncError, reconcile_batch, wrap,
};

/// Directory whose calls are slow and which records how many overlap.
#[derive(Default)]
struct SlowDirectory {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    groups: Mutex<BTreeMap<String, ExternalObject>>,
}

impl SlowDirectory {
    fn timed<T>(&self, call: impl FnOnce() -> T) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        let out = call();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

impl GroupDirectory for SlowDirectory {
    fn lookup(&self, name: &str) -> CloudResult<ExternalObject> {
        self.timed(|| {
            self.groups
                .lock()
                .expect("groups mutex poisoned")
                .get(name)
                .cloned()
                .ok_or_else(|| CloudError::not_found(format!("group {name} not found")))
        })
    }

    fn create(&self, name: &str, _properties: &BTreeMap<String, String>) -> CloudResult<ExternalObject> {
        self.timed(|| {
            let object = ExternalObject {
                name: name.to_string(),
                id: "grp-1".to_string(),
            };
            self.groups
                .lock()
                .expect("groups mutex poisoned")
                .insert(name.to_string(), object.clone());
            Ok(object)
        })
    }
}

fn no_wait(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 0,
        max_delay_ms: 0,
        backoff_multiplier: 1.0,
    }
}

#[test]
fn delete_has_no_side_effects_anywhere() -> Result<()> {
    let handler = ExternalSyncHandler::new(FakeGroupDirectory::new());
    let event = group_event(RequestType::Delete, "admins", "req-del").with_physical_id("admins");
    let result = handler.reconcile(&event)?;
    assert_eq!(result.status, Status::Success);
    assert_eq!(result.physical_resource_id, "admins");
    assert_eq!(handler.directory().lookup_calls(), 0);
    assert_eq!(handler.directory().create_calls(), 0);

    let advisory_calls = Arc::new(Mutex::new(0));
    let counting = |calls: Arc<Mutex<i32>>| -> Arc<dyn AdvisoryStep> {
        Arc::new(advisory_fn("counting", move |_ctx| {
            *calls.lock().unwrap() += 1;
            Ok(Data::new())
        }))
    };
    let mut unit = wrap(|_: &ReconciliationEvent| Ok::<_, String>("removed"))
        .validator(counting(Arc::clone(&advisory_calls)))
        .reporter(counting(Arc::clone(&advisory_calls)));
    let run = unit.run(&event).map_err(anyhow::Error::msg)?;

    assert_eq!(*advisory_calls.lock().unwrap(), 0);
    assert_eq!(run.validation.status, Status::Success);
    assert_eq!(run.report.status, Status::Success);
    assert_eq!(
        run.phases,
        vec![Phase::Pending, Phase::Validating, Phase::SkippedOnDelete, Phase::Reporting, Phase::Done]
    );
    Ok(())
}

#[test]
fn duplicate_create_delivers_one_external_object() -> Result<()> {
    let handler = ExternalSyncHandler::new(FakeGroupDirectory::new());
    let event = group_event(RequestType::Create, "platform-admins-prod", "req-1");

    let first = handler.reconcile(&event)?;
    let second = handler.reconcile(&event)?;

    assert_eq!(handler.directory().create_calls(), 1);
    assert_eq!(handler.directory().len(), 1);
    assert_eq!(first.data["Id"], second.data["Id"]);
    assert_eq!(first.data["Created"], json!(true));
    assert_eq!(second.data["Created"], json!(false));
    Ok(())
}

#[test]
fn validator_failure_still_runs_unit_and_reporter() -> Result<()> {
    let reporter_ran = Arc::new(Mutex::new(false));
    let reporter_flag = Arc::clone(&reporter_ran);
    let validator: Arc<dyn AdvisoryStep> =
        Arc::new(advisory_fn("preflight", |_ctx| -> Result<Data> { bail!("capacity API unreachable") }));
    let reporter: Arc<dyn AdvisoryStep> = Arc::new(advisory_fn("report", move |_ctx| {
        *reporter_flag.lock().unwrap() = true;
        Ok(Data::new())
    }));

    let mut unit_ran = false;
    let mut unit = wrap(|_: &ReconciliationEvent| {
        unit_ran = true;
        Ok::<_, String>(json!({"endpoint": "search.internal"}))
    })
    .validator(validator)
    .reporter(reporter);

    let event = ReconciliationEvent::new(RequestType::Create, "SearchDomain", "req-7");
    let run = unit.run(&event).map_err(anyhow::Error::msg)?;
    let result = run.result();
    drop(unit);

    assert!(unit_ran);
    assert!(*reporter_ran.lock().unwrap());
    assert_eq!(result.status, Status::SuccessWithWarning);
    assert!(result.warning.as_deref().is_some_and(|w| w.contains("capacity API unreachable")));

    let wire = serde_json::to_value(&result)?;
    assert_eq!(wire["Status"], "SUCCESS");
    assert_eq!(wire["Data"]["Warning"], "preflight: capacity API unreachable");
    Ok(())
}

#[test]
fn composer_routes_resilient_components_through_the_wrapper() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_validator = Arc::clone(&seen);
    let validator: Arc<dyn AdvisoryStep> = Arc::new(advisory_fn("record", move |ctx| {
        seen_by_validator
            .lock()
            .unwrap()
            .push((ctx.event.logical_resource_id.clone(), ctx.event.property("GroupName").map(String::from)));
        Ok(Data::new())
    }));

    let deployment = Composer::new(tiergraph::stack::reference_stack()?)
        .with_validator(validator)
        .compose(&profile_for("prod"), &FakeResourceProvider::new())?;

    assert_present(&deployment, "identity-group");
    let seen = seen.lock().unwrap();
    let names: Vec<&str> = seen.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["search", "identity-group"]);
    assert_eq!(seen[1].1.as_deref(), Some("platform-admins-prod"));
    Ok(())
}

#[test]
fn lookup_errors_other_than_not_found_are_hard_failures() {
    let directory = FakeGroupDirectory::new();
    directory.fail_lookups(ErrorKind::Authorization);
    let handler = ExternalSyncHandler::new(directory);

    let err = handler
        .reconcile(&group_event(RequestType::Create, "admins", "req-2"))
        .unwrap_err();
    assert!(matches!(err, SyncError::Lookup { ref key, .. } if key == "admins"));
    assert_eq!(handler.directory().create_calls(), 0);
}

#[test]
fn transient_lookup_errors_are_retried() {
    let directory = FakeGroupDirectory::new();
    directory.fail_lookups(ErrorKind::ServiceUnavailable);
    let handler = ExternalSyncHandler::new(directory).transient_retry(no_wait(4));

    assert!(handler.reconcile(&group_event(RequestType::Update, "admins", "req-3")).is_err());
    assert_eq!(handler.directory().lookup_calls(), 4);
}

#[test]
fn confirm_policy_rides_out_eventual_consistency() -> Result<()> {
    let directory = FakeGroupDirectory::new();
    let existing = directory.insert_hidden("admins", 2);
    let handler = ExternalSyncHandler::new(directory).not_found_policy(NotFoundPolicy::Confirm(no_wait(3)));

    let result = handler.reconcile(&group_event(RequestType::Create, "admins", "req-4"))?;
    assert_eq!(result.data["Created"], json!(false));
    assert_eq!(result.data["Id"], json!(existing.id));
    assert_eq!(handler.directory().create_calls(), 0);
    Ok(())
}

#[test]
fn authoritative_policy_falls_back_to_already_exists() -> Result<()> {
    let directory = FakeGroupDirectory::new();
    directory.insert_hidden("admins", 1);
    let handler = ExternalSyncHandler::new(directory);

    let result = handler.reconcile(&group_event(RequestType::Create, "admins", "req-5"))?;
    assert_eq!(result.data["Created"], json!(false));
    assert_eq!(handler.directory().create_calls(), 1);
    Ok(())
}

#[test]
fn events_parse_from_orchestrator_json() -> Result<()> {
    let event: ReconciliationEvent = serde_json::from_value(json!({
        "RequestType": "Create",
        "ResourceProperties": { "GroupName": "readers" },
        "LogicalResourceId": "ReadersGroup",
        "RequestId": "3f1c",
        "Timestamp": "2024-05-01T12:00:00Z"
    }))?;
    assert_eq!(event.request_type, RequestType::Create);
    assert!(event.physical_resource_id.is_none());

    let handler = ExternalSyncHandler::new(FakeGroupDirectory::new());
    let wire = handler.reconcile(&event)?.to_wire();
    assert_eq!(wire["PhysicalResourceId"], "readers");
    assert_eq!(wire["Data"]["GroupName"], "readers");

    let back: ReconciliationResult = serde_json::from_value(wire)?;
    assert_eq!(back.status, Status::Success);
    Ok(())
}

#[test]
fn batch_serializes_per_object_and_keeps_input_order() {
    let handler = ExternalSyncHandler::new(FakeGroupDirectory::new());
    let events: Vec<ReconciliationEvent> = (0..20)
        .map(|i| group_event(RequestType::Create, &format!("group-{}", i % 5), &format!("req-{i}")))
        .collect();

    let outcomes = reconcile_batch(&handler, &events);
    assert_eq!(outcomes.len(), events.len());
    assert_eq!(handler.directory().create_calls(), 5);

    for (event, outcome) in events.iter().zip(&outcomes) {
        let result = outcome.as_ref().expect("reconciled");
        assert_eq!(Some(result.physical_resource_id.as_str()), event.property("GroupName"));
    }
    let created = outcomes
        .iter()
        .filter(|o| o.as_ref().is_ok_and(|r| r.data["Created"] == Value::Bool(true)))
        .count();
    assert_eq!(created, 5);
    assert!(handler.directory().lookup("group-3").is_ok());
}

#[test]
fn events_sharing_a_physical_id_never_overlap() -> Result<()> {
    let handler = ExternalSyncHandler::new(SlowDirectory::default());
    // an update that renames the group keeps its physical id
    let events = vec![
        group_event(RequestType::Update, "a", "req-1").with_physical_id("grp-1"),
        group_event(RequestType::Update, "b", "req-2").with_physical_id("grp-1"),
    ];

    let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build()?;
    let outcomes = pool.install(|| reconcile_batch(&handler, &events));

    assert_eq!(handler.directory().max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes.len(), 2);
    for outcome in outcomes {
        assert_eq!(outcome?.physical_resource_id, "grp-1");
    }
    Ok(())
}
