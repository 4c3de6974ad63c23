//! Integration tests for the invocation entry points.
//!
//! These drive the orchestrator end to end with mocked collaborators and a
//! scripted model, covering routing, stream ordering and cancellation.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use rmm_agents::{
    IncidentPipeline, ModelClient, Orchestrator, RemediationRule, RemediationRules, ScriptedModel,
    SeededIncidentIds, CANCELLED_MESSAGE,
};
use rmm_core::{
    check_sequence, collect_text, metric, ActionType, Prompt, RemediationAction, RiskLevel, Route,
    StreamEvent, INCIDENT_ID_KEY,
};
use rmm_tools::MockToolkit;

fn build(mock: &MockToolkit, model: &ScriptedModel) -> Orchestrator {
    let model: Arc<dyn ModelClient> = Arc::new(model.clone());
    let pipeline = IncidentPipeline::new(mock.toolkit(), model.clone())
        .with_id_generator(Arc::new(SeededIncidentIds::new(99)));
    Orchestrator::new(mock.toolkit(), model).with_pipeline(pipeline)
}

/// Test the CPU incident scenario through the request/response entry point.
#[tokio::test]
async fn test_cpu_incident_end_to_end() {
    let mock = MockToolkit::new().with_anomaly(metric::CPU_UTILIZATION);
    let model = ScriptedModel::new().with_response("httpd worker leak on prod-web-01.");
    let orch = build(&mock, &model);

    let result = orch
        .invoke(Prompt::new("High CPU alert on server prod-web-01, diagnose and fix").with_client("acme-01"))
        .await
        .unwrap();

    assert_eq!(result.route(), Route::Incident);
    let incident = result.incident().unwrap();
    assert_eq!(incident.tools_used, vec!["query_client_inventory", "analyze_cloudwatch_metrics"]);
    assert_eq!(incident.remediation_plan.actions()[0].action_type, ActionType::RestartService);
    assert_eq!(incident.remediation_plan.risk(), RiskLevel::Low);
    assert!(!incident.requires_approval);
    assert!(incident.response.contains("**Risk Level:** LOW"));
    assert!(!incident.response.contains("Manual approval required"));

    let calls = mock.get_method_calls("analyze_metric");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].client_id, "acme-01");
}

/// Test the serialized envelopes of both routes.
#[tokio::test]
async fn test_result_envelopes_serialize() {
    let mock = MockToolkit::new();
    let orch = build(&mock, &ScriptedModel::new());

    let general = orch.invoke(Prompt::new("What's the weather today?")).await.unwrap();
    let value = serde_json::to_value(&general).unwrap();
    assert_eq!(value["routed_to"], "general");
    assert_eq!(value["orchestrator"], "main");
    assert_eq!(value["tools_used"], serde_json::json!([]));
    assert!(value.get("incident_id").is_none());

    let incident = orch
        .invoke(Prompt::new("outage on db-1").with_context(INCIDENT_ID_KEY, serde_json::json!("INC-42424242")))
        .await
        .unwrap();
    let value = serde_json::to_value(&incident).unwrap();
    assert_eq!(value["routed_to"], "incident_agent");
    assert_eq!(value["incident_id"], "INC-42424242");
    assert_eq!(value["remediation_plan"]["requires_approval"], false);
    assert_eq!(value["stage_trace"].as_array().unwrap().len(), 4);
}

/// Test that a high-risk plan carries the approval flag through both entry points.
#[tokio::test]
async fn test_high_risk_plan_requires_approval() {
    let mock = MockToolkit::new().with_anomaly(metric::DISK_READ_OPS);
    let model = ScriptedModel::new().with_response("Disk queue saturated.");
    let mut rules = RemediationRules::standard();
    rules.register(RemediationRule::new(
        metric::DISK_READ_OPS,
        RemediationAction::new(ActionType::IncreaseMemory, "db-1", "Absorb read pressure in page cache"),
        RiskLevel::High,
    ));

    let shared: Arc<dyn ModelClient> = Arc::new(model.clone());
    let pipeline = IncidentPipeline::new(mock.toolkit(), shared.clone())
        .with_rules(rules)
        .with_id_generator(Arc::new(SeededIncidentIds::new(3)));
    let orch = Orchestrator::new(mock.toolkit(), shared).with_pipeline(pipeline);

    let events: Vec<StreamEvent> = orch
        .invoke_stream(Prompt::new("disk latency incident on db-1"))
        .unwrap()
        .collect()
        .await;

    check_sequence(&events).unwrap();
    assert!(collect_text(&events).ends_with("⚠️ **Manual approval required before executing remediation.**"));
    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::Metadata { requires_approval: true, .. })));
}

/// Test that cancelling mid-pipeline ends the stream with a single error.
#[tokio::test]
async fn test_cancel_incident_stream() {
    let mock = MockToolkit::new().with_delay(metric::CPU_UTILIZATION, Duration::from_secs(30));
    let model = ScriptedModel::new();
    let orch = build(&mock, &model);

    let cancel = CancellationToken::new();
    let mut stream = orch
        .invoke_stream_with_cancel(Prompt::new("cpu outage on web tier"), cancel.clone())
        .unwrap();

    let first = stream.next().await.unwrap();
    assert!(matches!(first, StreamEvent::Routing { .. }));
    cancel.cancel();

    let mut events = vec![first];
    while let Some(event) = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
    {
        events.push(event);
    }

    check_sequence(&events).unwrap();
    assert_eq!(events.last(), Some(&StreamEvent::error(CANCELLED_MESSAGE)));
    assert_eq!(model.call_count(), 0);
}

/// Test that cancelling a general stream stops token delivery.
#[tokio::test]
async fn test_cancel_general_stream() {
    let model = ScriptedModel::new()
        .with_response("a b c d e f g h i j")
        .with_token_delay(Duration::from_millis(50));
    let orch = build(&MockToolkit::new(), &model);

    let mut stream = orch.invoke_stream(Prompt::new("Explain S3 storage classes")).unwrap();
    let mut events = vec![stream.next().await.unwrap(), stream.next().await.unwrap()];
    stream.cancel();

    while let Some(event) = stream.next().await {
        events.push(event);
    }

    check_sequence(&events).unwrap();
    assert_eq!(events.last(), Some(&StreamEvent::error(CANCELLED_MESSAGE)));
    assert!(collect_text(&events).len() < "a b c d e f g h i j".len());
}

/// Test that invocations sharing a parent token are isolated from each other's drops.
#[tokio::test]
async fn test_shared_parent_token_isolates_invocations() {
    let mock = MockToolkit::new().with_delay(metric::CPU_UTILIZATION, Duration::from_millis(300));
    let orch = build(&mock, &ScriptedModel::new());
    let shutdown = CancellationToken::new();

    let slow = orch
        .invoke_stream_with_cancel(Prompt::new("cpu incident on prod-web-01"), shutdown.clone())
        .unwrap();
    let quick = orch
        .invoke_stream_with_cancel(Prompt::new("Explain S3 storage classes"), shutdown.clone())
        .unwrap();

    let quick_events: Vec<StreamEvent> = quick.collect().await;
    assert!(matches!(quick_events.last(), Some(StreamEvent::Complete { .. })));
    assert!(!shutdown.is_cancelled());

    let slow_events: Vec<StreamEvent> = tokio::time::timeout(Duration::from_secs(5), slow.collect())
        .await
        .unwrap();
    check_sequence(&slow_events).unwrap();
    assert!(matches!(slow_events.last(), Some(StreamEvent::Complete { .. })));
    assert!(!shutdown.is_cancelled());
}

/// Test that cancelling a shared parent token stops every invocation under it.
#[tokio::test]
async fn test_parent_token_cancels_all_invocations() {
    let mock = MockToolkit::new().with_delay(metric::CPU_UTILIZATION, Duration::from_secs(30));
    let orch = build(&mock, &ScriptedModel::new());
    let shutdown = CancellationToken::new();

    let first = orch
        .invoke_stream_with_cancel(Prompt::new("cpu outage on web tier"), shutdown.clone())
        .unwrap();
    let second = orch
        .invoke_stream_with_cancel(Prompt::new("cpu incident on db tier"), shutdown.clone())
        .unwrap();
    shutdown.cancel();

    for stream in [first, second] {
        let events: Vec<StreamEvent> = tokio::time::timeout(Duration::from_secs(5), stream.collect())
            .await
            .unwrap();
        check_sequence(&events).unwrap();
        assert_eq!(events.last(), Some(&StreamEvent::error(CANCELLED_MESSAGE)));
    }
}

/// Test that dropping the consumer halts the pipeline before the model call.
#[tokio::test]
async fn test_dropped_consumer_halts_pipeline() {
    let mock = MockToolkit::new().with_delay(metric::CPU_UTILIZATION, Duration::from_millis(200));
    let model = ScriptedModel::new();
    let orch = build(&mock, &model);

    let mut stream = orch.invoke_stream(Prompt::new("cpu incident")).unwrap();
    stream.next().await;
    drop(stream);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(model.call_count(), 0);
}

/// Test that concurrent invocations keep independent contexts.
#[tokio::test]
async fn test_concurrent_invocations() {
    let mock = MockToolkit::new().with_anomaly(metric::MEMORY_UTILIZATION);
    let orch = build(&mock, &ScriptedModel::new());

    let (a, b) = tokio::join!(
        orch.invoke(Prompt::new("memory leak incident").with_client("client-a")),
        orch.invoke(Prompt::new("network outage").with_client("client-b")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.incident().unwrap().incident_context.client_id, "client-a");
    assert_eq!(b.incident().unwrap().incident_context.client_id, "client-b");
    assert_eq!(
        a.incident().unwrap().remediation_plan.actions()[0].action_type,
        ActionType::ClearCache
    );
    assert_eq!(
        b.incident().unwrap().remediation_plan.actions()[0].action_type,
        ActionType::Investigate
    );
    assert_ne!(a.incident_id(), b.incident_id());
}
