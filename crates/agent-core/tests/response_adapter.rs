use agent_core::{
    adapt_response, encode_action, tool_history_records, ParsedToolResult, ProviderResponse,
    WireFormat,
};
use serde_json::json;
use tabpilot_core_types::{ActionKind, ActionPlan, ActionStep, RiskLevel, WaitFor};

fn checkout_step() -> ActionStep {
    ActionStep::new(ActionKind::Input, "#email")
        .with_value("ada@example.test")
        .with_confidence(0.65)
        .with_risk(RiskLevel::Medium)
        .with_wait_for(WaitFor::DomStable)
        .with_description("Email address")
}

#[test]
fn action_survives_both_dialects() {
    let plan = ActionPlan::single("Fill in the email", checkout_step());
    for format in [WireFormat::OpenAi, WireFormat::Gemini] {
        let response = encode_action(format, "call_7", &plan).unwrap();
        let raw = response.to_value();
        let reread = ProviderResponse::from_raw_as(format, raw).unwrap();

        let ParsedToolResult::Action { plan: parsed } = adapt_response(&reread) else {
            panic!("{format}: expected an action");
        };
        assert_eq!(parsed.explanation, "Fill in the email", "{format}");
        let step = &parsed.actions[0];
        assert_eq!(step.action, ActionKind::Input);
        assert_eq!(step.selector, "#email");
        assert_eq!(step.value.as_deref(), Some("ada@example.test"));
        assert!((step.confidence - 0.65).abs() < 1e-9);
        assert_eq!(step.risk, RiskLevel::Medium);
        assert_eq!(step.wait_for, Some(WaitFor::DomStable));
        assert_eq!(step.description.as_deref(), Some("Email address"));
    }
}

#[test]
fn openai_completion_envelope() {
    let raw = json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {
                        "name": "click",
                        "arguments": "{\"selector\":\"button.buy\",\"risk\":\"HIGH\",\"confidence\":3}"
                    }
                }]
            }
        }]
    });
    let response = ProviderResponse::from_raw("gpt-4o-mini", raw).unwrap();
    assert_eq!(response.format(), WireFormat::OpenAi);

    let parsed = adapt_response(&response);
    let step = parsed.first_step().unwrap();
    assert_eq!(step.selector, "button.buy");
    assert_eq!(step.risk, RiskLevel::High);
    assert_eq!(step.confidence, 1.0);
    assert_eq!(step.wait_for, None);
}

#[test]
fn gemini_candidate_envelope_keeps_preamble() {
    let raw = json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "text": "The search box is at the top." },
                    { "functionCall": { "name": "input", "args": { "selector": "#q", "text": "rust" } } }
                ]
            }
        }]
    });
    let response = ProviderResponse::from_raw("gemini-2.0-flash", raw).unwrap();

    let ParsedToolResult::Action { plan } = adapt_response(&response) else {
        panic!("expected an action");
    };
    assert_eq!(plan.explanation, "The search box is at the top.");
    assert_eq!(plan.actions[0].value.as_deref(), Some("rust"));
}

#[test]
fn control_tools_map_to_control_results() {
    let format = WireFormat::OpenAi;
    let complete = ProviderResponse::tool_call(
        format,
        "c1",
        "task_complete",
        json!({ "summary": "Booked", "nextSteps": ["Check email"] }),
    );
    let ParsedToolResult::Complete { block } = adapt_response(&complete) else {
        panic!("expected completion");
    };
    assert_eq!(block.summary, "Booked");
    assert_eq!(block.next_steps, vec!["Check email".to_string()]);

    let checkpoint = ProviderResponse::tool_call(
        WireFormat::Gemini,
        "checkpoint",
        "checkpoint",
        json!({ "reason": "captcha", "message": "Solve the captcha", "canSkip": true }),
    );
    let ParsedToolResult::Checkpoint { block } = adapt_response(&checkpoint) else {
        panic!("expected checkpoint");
    };
    assert_eq!(block.reason, "captcha");
    assert!(block.can_skip);
}

#[test]
fn malformed_responses_become_errors() {
    let cases = [
        ProviderResponse::text(WireFormat::OpenAi, "Sure, I'll do that."),
        ProviderResponse::tool_call(WireFormat::OpenAi, "c", "fly", json!({})),
        ProviderResponse::tool_call(WireFormat::Gemini, "ask_user", "ask_user", json!({})),
        ProviderResponse::tool_call(WireFormat::OpenAi, "c", "click", json!("not an object")),
    ];
    for response in cases {
        let parsed = adapt_response(&response);
        assert!(parsed.is_error(), "{parsed:?}");
    }

    let bad_arguments = json!({
        "tool_calls": [{
            "id": "c",
            "type": "function",
            "function": { "name": "click", "arguments": "{selector:" }
        }]
    });
    let response = ProviderResponse::from_raw_as(WireFormat::OpenAi, bad_arguments).unwrap();
    let ParsedToolResult::Error { error } = adapt_response(&response) else {
        panic!("expected an error");
    };
    assert!(error.starts_with("Could not parse arguments for click"), "{error}");
}

#[test]
fn unrecognisable_payload_is_rejected() {
    assert!(ProviderResponse::from_raw_as(WireFormat::Gemini, json!(42)).is_err());
}

#[test]
fn history_records_pair_call_and_result() {
    let plan = ActionPlan::single("go", ActionStep::new(ActionKind::Click, "#go"));

    let openai = encode_action(WireFormat::OpenAi, "call_1", &plan).unwrap();
    let records = tool_history_records(&openai, "ok (12ms)");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["role"], "tool");
    assert_eq!(records[1]["tool_call_id"], "call_1");
    assert_eq!(records[1]["content"], "ok (12ms)");

    let gemini = encode_action(WireFormat::Gemini, "ignored", &plan).unwrap();
    let records = tool_history_records(&gemini, "ok (12ms)");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["parts"][0]["functionResponse"]["name"], "click");

    let chatter = ProviderResponse::text(WireFormat::OpenAi, "hello");
    assert!(tool_history_records(&chatter, "n/a").is_empty());
}
