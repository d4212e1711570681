use std::sync::Arc;
use std::time::Duration;

use action_primitives::{EngineConfig, ExecutionEngine, FixtureElement, FixturePage, WaitConfig};
use agent_core::agent_loop::DECLINED_BY_USER;
use agent_core::{
    AgentError, AgentRunner, ModelClient, OrchestratorConfig, RunPause, ScriptedModelClient,
    TaskOrchestrator, TaskPhase,
};
use serde_json::json;
use tabpilot_core_types::{
    ActionKind, ActionPlan, ActionStep, AskUserBlock, CheckpointBlock, TaskCompleteBlock, WaitFor,
};
use tabpilot_policy_center::{PolicyCenter, PolicyTier};

fn shop_page() -> FixturePage {
    FixturePage::blank("https://shop.example.test/cart")
        .with_element(FixtureElement::new("#next", "button").with_text("Next"))
        .with_element(FixtureElement::new("#place-order", "button").with_text("Place order"))
        .with_element(
            FixtureElement::new("#password", "input")
                .with_input_type("password")
                .with_text("Password"),
        )
}

fn runner_for(
    model: &ScriptedModelClient,
    page: &FixturePage,
    config: OrchestratorConfig,
) -> AgentRunner {
    let engine = ExecutionEngine::new(Arc::new(page.clone()), EngineConfig::minimal());
    AgentRunner::new(
        TaskOrchestrator::new(config),
        Arc::new(model.clone()),
        Arc::new(page.clone()),
        Arc::new(engine),
        Arc::new(PolicyCenter::with_defaults().unwrap()),
    )
}

fn click(selector: &str) -> ActionPlan {
    ActionPlan::single(
        format!("click {selector}"),
        ActionStep::new(ActionKind::Click, selector),
    )
}

fn clicked(page: &FixturePage, selector: &str) -> bool {
    page.events().iter().any(|event| event.selector == selector)
}

fn done(summary: &str) -> TaskCompleteBlock {
    TaskCompleteBlock::new(summary)
}

fn request_dump(model: &ScriptedModelClient, index: usize) -> String {
    serde_json::to_string(&model.requests()[index].messages).unwrap()
}

#[tokio::test]
async fn ready_click_complete() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    model
        .push_task_ready("Click next, then finish")
        .push_action(&click("#next"))
        .push_complete(&done("Moved to the next step"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());

    runner.start("click next").unwrap();
    let pause = runner.run().await.unwrap();

    assert_eq!(
        pause,
        RunPause::Completed {
            block: done("Moved to the next step")
        }
    );
    assert!(pause.is_terminal());
    let state = runner.state();
    assert_eq!(state.phase, TaskPhase::Completed);
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.history[0].iteration, 1);
    assert!(state.history[0].results[0].success);
    assert!(clicked(&page, "#next"));

    let requests = model.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].last_user_text().unwrap().contains("call task_ready"));
    assert!(requests[1].last_user_text().unwrap().contains("Iteration 1 of"));
    // The click and its outcome are threaded into the next call.
    assert!(request_dump(&model, 2).contains("\"role\":\"tool\""));

    let audit = runner.audit().entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].verdict, PolicyTier::Auto);
}

#[tokio::test]
async fn purchase_click_waits_for_approval() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    model
        .push_action(&ActionPlan::single(
            "Place the order",
            ActionStep::new(ActionKind::Click, "#place-order").with_description("Place order"),
        ))
        .push_complete(&done("Order placed"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    runner.start("buy the items in my cart").unwrap();

    let pause = runner.run().await.unwrap();
    let RunPause::AwaitingApproval { step, verdict } = pause else {
        panic!("expected approval pause, got {pause:?}");
    };
    assert_eq!(step.selector, "#place-order");
    assert_eq!(verdict.tier, PolicyTier::Confirm);
    assert_eq!(page.touch_count(), 0);

    // Asking again does not consult the model.
    assert!(matches!(
        runner.run().await.unwrap(),
        RunPause::AwaitingApproval { .. }
    ));
    assert_eq!(model.requests().len(), 1);

    let pause = runner.approve_pending(true).await.unwrap();
    assert!(matches!(pause, RunPause::Completed { .. }));
    assert!(clicked(&page, "#place-order"));
    let audit = runner.audit().entries();
    assert_eq!(audit[0].user_approved, Some(true));
    assert!(audit[0].result.as_ref().unwrap().success);
}

#[tokio::test]
async fn declined_action_is_recorded_as_failure() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    model
        .push_action(&click("#place-order"))
        .push_complete(&done("Stopped before ordering"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    runner.start("buy the items in my cart").unwrap();

    assert!(matches!(
        runner.run().await.unwrap(),
        RunPause::AwaitingApproval { .. }
    ));
    let pause = runner.approve_pending(false).await.unwrap();

    assert!(matches!(pause, RunPause::Completed { .. }));
    assert_eq!(page.touch_count(), 0);
    let history = runner.state().history;
    assert_eq!(history[0].results[0].error.as_deref(), Some(DECLINED_BY_USER));
    assert_eq!(runner.audit().entries()[0].user_approved, Some(false));
    assert!(request_dump(&model, 1).contains(DECLINED_BY_USER));
}

#[tokio::test]
async fn approving_with_nothing_pending_is_rejected() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    runner.start("anything").unwrap();
    assert!(matches!(
        runner.approve_pending(true).await,
        Err(AgentError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn password_input_is_blocked() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    model
        .push_action(&ActionPlan::single(
            "Type the password",
            ActionStep::new(ActionKind::Input, "#password").with_value("hunter2"),
        ))
        .push_complete(&done("Handed login to the user"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    runner.start("log in to my account").unwrap();

    let pause = runner.run().await.unwrap();

    assert!(matches!(pause, RunPause::Completed { .. }));
    assert_eq!(page.touch_count(), 0);
    assert_eq!(page.element("#password").unwrap().value, None);
    let state = runner.state();
    let result = &state.history[0].results[0];
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .starts_with("Blocked by policy:"));
    assert_eq!(runner.audit().entries()[0].verdict, PolicyTier::Block);
    assert!(request_dump(&model, 1).contains("Blocked by policy"));
}

#[tokio::test]
async fn budget_exhaustion_stops_the_loop() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    for _ in 0..3 {
        model.push_action(&click("#next"));
    }
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal().max_loops(2));
    runner.start("keep clicking next").unwrap();

    let pause = runner.run().await.unwrap();

    assert_eq!(pause, RunPause::BudgetExhausted { loops: 2 });
    assert_eq!(model.remaining(), 1);
    assert_eq!(runner.state().phase, TaskPhase::Error);
    // Terminal: running again reports the same outcome without a model call.
    assert_eq!(runner.run().await.unwrap(), RunPause::BudgetExhausted { loops: 2 });
    assert_eq!(model.requests().len(), 2);
}

#[tokio::test]
async fn repeated_no_progress_warns_the_model() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    for _ in 0..4 {
        model.push_action(&click("#next"));
    }
    model.push_complete(&done("gave up"));
    let config = OrchestratorConfig::minimal().max_loops(10).stuck_window(3);
    let mut runner = runner_for(&model, &page, config);
    runner.start("find the hidden coupon").unwrap();

    assert!(matches!(runner.run().await.unwrap(), RunPause::Completed { .. }));

    let requests = model.requests();
    assert!(!requests[2].last_user_text().unwrap().contains("## Warning"));
    assert!(requests[3].last_user_text().unwrap().contains("## Warning"));
    assert!(requests[4].last_user_text().unwrap().contains("## Warning"));
}

#[tokio::test]
async fn console_errors_reach_the_prompt() {
    let page = shop_page();
    page.push_console("error", "TypeError: cart is undefined");
    page.push_console("log", "loaded");
    let model = ScriptedModelClient::new("gpt-4o");
    model.push_complete(&done("nothing to do"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    runner.start("check the cart").unwrap();

    runner.run().await.unwrap();

    let text = model.requests()[0].last_user_text().unwrap().to_string();
    assert!(text.contains("## Console Errors"));
    assert!(text.contains("TypeError: cart is undefined"));
    assert!(!text.contains("loaded\n"));
    assert_eq!(runner.sessions().recent(runner.tab(), 10).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn model_timeouts_fail_the_task() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o").with_delay(Duration::from_secs(5));
    model.push_complete(&done("too late"));
    let config = OrchestratorConfig::minimal()
        .model_timeout(50)
        .max_consecutive_failures(2);
    let mut runner = runner_for(&model, &page, config);
    runner.start("check the cart").unwrap();

    let pause = runner.run().await.unwrap();

    let RunPause::Failed { status } = pause else {
        panic!("expected failure, got {pause:?}");
    };
    assert!(status.contains("2 times in a row"), "{status}");
    assert!(status.contains("timed out"), "{status}");
    assert_eq!(model.requests().len(), 2);
}

#[tokio::test]
async fn unusable_responses_are_reported_back() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    model
        .push_text("I would click the button.")
        .push_tool("teleport", json!({ "selector": "#next" }))
        .push_text("still chatting");
    let mut runner = runner_for(
        &model,
        &page,
        OrchestratorConfig::minimal().max_consecutive_failures(3),
    );
    runner.start("click next").unwrap();

    let pause = runner.run().await.unwrap();

    assert!(matches!(pause, RunPause::Failed { .. }));
    let requests = model.requests();
    let second = requests[1].last_user_text().unwrap();
    assert!(second.contains("## Last Response Problem"));
    assert!(second.contains("no tool call"));
    assert!(requests[2]
        .last_user_text()
        .unwrap()
        .contains("Unknown action: teleport"));
}

#[tokio::test]
async fn successful_turn_resets_the_failure_count() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    model
        .push_failure("rate limited")
        .push_action(&click("#next"))
        .push_failure("rate limited")
        .push_complete(&done("done"));
    let mut runner = runner_for(
        &model,
        &page,
        OrchestratorConfig::minimal().max_consecutive_failures(2),
    );
    runner.start("click next").unwrap();

    assert!(matches!(runner.run().await.unwrap(), RunPause::Completed { .. }));
}

#[tokio::test(start_paused = true)]
async fn abort_discards_the_inflight_reply() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o").with_delay(Duration::from_secs(5));
    model.push_action(&click("#next"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::default());
    runner.start("click next").unwrap();
    let handle = runner.abort_handle();

    let (pause, _) = tokio::join!(runner.run(), async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort("user pressed stop");
    });

    assert_eq!(
        pause.unwrap(),
        RunPause::Aborted {
            reason: "Aborted: user pressed stop".to_string()
        }
    );
    assert_eq!(page.touch_count(), 0);
    assert_eq!(runner.state().phase, TaskPhase::Idle);
    assert_eq!(runner.orchestrator().lock().epoch(), 1);
}

#[tokio::test(start_paused = true)]
async fn abort_during_execution_discards_the_result() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    model.push_action(&ActionPlan::single(
        "click #next",
        ActionStep::new(ActionKind::Click, "#next").with_wait_for(WaitFor::UrlChange),
    ));
    let engine = ExecutionEngine::new(
        Arc::new(page.clone()),
        EngineConfig::minimal().with_wait(WaitConfig::minimal().with_url_timeout_ms(5_000)),
    );
    let mut runner = AgentRunner::new(
        TaskOrchestrator::new(OrchestratorConfig::minimal()),
        Arc::new(model.clone()),
        Arc::new(page.clone()),
        Arc::new(engine),
        Arc::new(PolicyCenter::with_defaults().unwrap()),
    );
    runner.start("click next").unwrap();
    let handle = runner.abort_handle();

    let (pause, _) = tokio::join!(runner.run(), async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort("user pressed stop");
    });

    assert_eq!(
        pause.unwrap(),
        RunPause::Aborted {
            reason: "Aborted: user pressed stop".to_string()
        }
    );
    // the click went out before the abort; its settle wait did not finish
    assert!(clicked(&page, "#next"));
    let state = runner.state();
    assert_eq!(state.phase, TaskPhase::Idle);
    assert!(state.history.is_empty());
    assert!(runner.audit().entries().is_empty());
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn clarifying_question_round_trip() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    model
        .push_ask_user(&AskUserBlock::new("Which shipping speed?"))
        .push_task_ready("Order with express shipping")
        .push_complete(&done("Chose express"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    runner.start("ship my order").unwrap();

    let pause = runner.run().await.unwrap();
    assert_eq!(
        pause,
        RunPause::NeedsUser {
            block: AskUserBlock::new("Which shipping speed?")
        }
    );
    assert!(runner.run().await.is_ok());
    assert_eq!(model.requests().len(), 1);

    runner.answer("Express").unwrap();
    assert!(matches!(runner.run().await.unwrap(), RunPause::Completed { .. }));

    let second = model.requests()[1].last_user_text().unwrap().to_string();
    assert!(second.contains("Q: Which shipping speed?\nA: Express"));
}

#[tokio::test]
async fn checkpoint_pauses_until_resumed() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    let block = CheckpointBlock::new("login", "Please sign in, then continue", false);
    model
        .push_checkpoint(&block)
        .push_complete(&done("Signed in"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    runner.start("open my orders").unwrap();

    assert_eq!(
        runner.run().await.unwrap(),
        RunPause::Checkpoint {
            block: block.clone()
        }
    );
    assert_eq!(runner.state().phase, TaskPhase::Checkpoint);

    runner.resume().unwrap();
    assert!(matches!(runner.run().await.unwrap(), RunPause::Completed { .. }));
}

#[tokio::test]
async fn gemini_models_speak_gemini() {
    let page = shop_page();
    let model = ScriptedModelClient::new("models/gemini-1.5-pro");
    model
        .push_action(&click("#next"))
        .push_complete(&done("clicked"));
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    runner.start("click next").unwrap();

    assert!(matches!(runner.run().await.unwrap(), RunPause::Completed { .. }));
    assert!(clicked(&page, "#next"));

    let requests = model.requests();
    assert_eq!(requests[0].tools.len(), 1);
    let dump = request_dump(&model, 1);
    assert!(dump.contains("functionCall"));
    assert!(dump.contains("functionResponse"));
}

#[tokio::test]
async fn run_without_a_task_is_rejected() {
    let page = shop_page();
    let model = ScriptedModelClient::new("gpt-4o");
    let mut runner = runner_for(&model, &page, OrchestratorConfig::minimal());
    assert!(matches!(
        runner.run().await,
        Err(AgentError::InvalidTransition { .. })
    ));
    assert_eq!(model.model_id(), "gpt-4o");
}
