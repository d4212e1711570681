use std::sync::Arc;
use std::time::Duration;

use action_primitives::{
    ActionError, ClickEffect, DomEvent, EngineConfig, ExecCtx, ExecutionEngine, FixtureElement,
    FixturePage, PrivilegedHandler, WaitConfig,
};
use async_trait::async_trait;
use tabpilot_core_types::{ActionKind, ActionStep, WaitFor};
use tokio_util::sync::CancellationToken;

fn engine_for(page: &FixturePage) -> ExecutionEngine {
    ExecutionEngine::new(Arc::new(page.clone()), EngineConfig::minimal())
}

fn plan_page() -> FixturePage {
    FixturePage::blank("https://shop.example.test/signup")
        .with_element(FixtureElement::new("#plan", "select").with_options(["Basic", "Pro Plan"]))
        .with_element(
            FixtureElement::new("#q", "input")
                .with_input_type("text")
                .with_value("old"),
        )
        .with_element(FixtureElement::new("#terms", "input").with_input_type("checkbox"))
        .with_element(
            FixtureElement::new("button.next", "button")
                .with_text("Next")
                .off_screen(),
        )
}

#[tokio::test]
async fn select_matches_case_insensitively() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Select, "#plan").with_value("pro plan");

    let result = engine.execute(&step, &CancellationToken::new()).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.extracted_data.as_deref(), Some("Pro Plan"));
    let select = page.element("#plan").unwrap();
    assert_eq!(select.selected_index, Some(1));
    assert_eq!(select.value.as_deref(), Some("pro-plan"));
}

#[tokio::test]
async fn select_without_any_match_reports_option_not_found() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Select, "#plan").with_value("Gold");
    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Option not found"));
}

#[tokio::test]
async fn input_without_value_never_touches_the_page() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Input, "#q");

    let result = engine.execute(&step, &CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Input action requires a value"));
    assert_eq!(page.touch_count(), 0);
    assert!(page.events().is_empty());
}

#[tokio::test]
async fn missing_element_is_reported_with_selector() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Click, "#does-not-exist");
    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Element not found: #does-not-exist")
    );
    assert_eq!(result.action, ActionKind::Click);
    assert_eq!(result.selector, "#does-not-exist");
}

#[tokio::test]
async fn input_types_one_keystroke_at_a_time() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Input, "#q").with_value("abc");

    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(page.element("#q").unwrap().value.as_deref(), Some("abc"));

    let events: Vec<DomEvent> = page.events().into_iter().map(|e| e.event).collect();
    assert_eq!(events.first(), Some(&DomEvent::Focus));
    assert_eq!(events.last(), Some(&DomEvent::Change));
    let keydowns = events
        .iter()
        .filter(|e| matches!(e, DomEvent::KeyDown { .. }))
        .count();
    assert_eq!(keydowns, 3);
    assert!(events.contains(&DomEvent::Input {
        data: Some("b".into())
    }));
}

#[tokio::test]
async fn input_can_append_without_clearing() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Input, "#q")
        .with_value("er")
        .with_clear_first(false);
    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(result.success);
    assert_eq!(page.element("#q").unwrap().value.as_deref(), Some("older"));
}

#[tokio::test]
async fn click_toggles_checkbox_directly() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Click, "#terms");
    assert!(engine.execute(&step, &CancellationToken::new()).await.success);
    assert_eq!(page.element("#terms").unwrap().checked, Some(true));
    assert!(!page
        .events()
        .iter()
        .any(|e| e.event == DomEvent::PointerDown));
}

#[tokio::test]
async fn click_scrolls_into_view_and_dispatches_pointer_sequence() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Click, "button.next");
    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(result.success);
    assert!(page.element("button.next").unwrap().in_viewport);
    let events: Vec<DomEvent> = page.events().into_iter().map(|e| e.event).collect();
    assert_eq!(
        events,
        vec![DomEvent::PointerDown, DomEvent::PointerUp, DomEvent::Click]
    );
}

#[tokio::test]
async fn custom_dropdown_clicks_visible_item() {
    let page = FixturePage::blank("https://example.test/plans")
        .with_element(
            FixtureElement::new("div.plan-picker", "div").on_click(ClickEffect {
                reveal: vec!["li.basic".into(), "li.pro".into()],
                ..ClickEffect::default()
            }),
        )
        .with_element(FixtureElement::new("li.basic", "li").with_text("Basic").hidden())
        .with_element(FixtureElement::new("li.pro", "li").with_text("Pro Plan").hidden());
    let engine = engine_for(&page);

    let step = ActionStep::new(ActionKind::Select, "div.plan-picker").with_value("pro");
    let result = engine.execute(&step, &CancellationToken::new()).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.extracted_data.as_deref(), Some("Pro Plan"));
    assert!(page
        .events()
        .iter()
        .any(|e| e.selector == "li.pro" && e.event == DomEvent::Click));
}

#[tokio::test]
async fn extract_is_read_only() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Extract, "#q");
    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(result.success);
    assert_eq!(result.extracted_data.as_deref(), Some("old"));
    assert!(page.events().is_empty());
}

#[tokio::test]
async fn restricted_page_only_allows_navigate() {
    let page = plan_page();
    page.set_restricted(true);
    let engine = engine_for(&page);

    let click = ActionStep::new(ActionKind::Click, "button.next");
    let result = engine.execute(&click, &CancellationToken::new()).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("only navigate is allowed"));

    let navigate =
        ActionStep::new(ActionKind::Navigate, "").with_value("https://example.test/home");
    let result = engine.execute(&navigate, &CancellationToken::new()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(page.current_url(), "https://example.test/home");
}

#[tokio::test]
async fn url_change_wait_follows_delayed_navigation() {
    let page = FixturePage::blank("https://example.test/cart").with_element(
        FixtureElement::new("a.checkout", "a").on_click(ClickEffect {
            navigate: Some("https://example.test/checkout".into()),
            delay_ms: 40,
            ..ClickEffect::default()
        }),
    );
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Click, "a.checkout").with_wait_for(WaitFor::UrlChange);
    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(page.current_url(), "https://example.test/checkout");
}

#[tokio::test]
async fn url_change_timeout_surfaces_as_error() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Click, "button.next")
        .with_wait_for(WaitFor::UrlChange)
        .with_timeout_ms(30);
    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Timed out"));
}

#[tokio::test]
async fn cancelled_token_interrupts_before_dispatch() {
    let page = plan_page();
    let engine = engine_for(&page);
    let token = CancellationToken::new();
    token.cancel();
    let result = engine
        .execute(&ActionStep::new(ActionKind::Click, "button.next"), &token)
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Operation interrupted"));
    assert!(page.events().is_empty());
}

/// Engine whose waits would run for seconds unless interrupted.
fn slow_settling_engine(page: &FixturePage) -> ExecutionEngine {
    let config = EngineConfig::minimal().with_step_timeout_ms(30_000).with_wait(
        WaitConfig::minimal()
            .with_dom_timeout_ms(5_000)
            .with_url_timeout_ms(5_000),
    );
    ExecutionEngine::new(Arc::new(page.clone()), config)
}

fn cancel_after(ms: u64) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        trigger.cancel();
    });
    token
}

#[tokio::test(start_paused = true)]
async fn cancelling_interrupts_a_pending_settle_wait() {
    for wait_for in [WaitFor::DomStable, WaitFor::NetworkIdle] {
        let page = plan_page();
        let busy = page.clone();
        let mutator = tokio::spawn(async move {
            loop {
                busy.touch();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let engine = slow_settling_engine(&page);
        let step = ActionStep::new(ActionKind::Click, "#terms").with_wait_for(wait_for);
        let result = engine.execute(&step, &cancel_after(10)).await;
        mutator.abort();

        assert!(!result.success, "{wait_for:?} settled on a mutating page");
        assert!(
            result.error.as_deref().unwrap_or_default().starts_with("Operation interrupted"),
            "{wait_for:?}: {:?}",
            result.error
        );
        assert!(result.duration_ms < 100, "{wait_for:?} took {}ms", result.duration_ms);
    }
}

#[tokio::test(start_paused = true)]
async fn cancelling_interrupts_a_pending_url_change_wait() {
    let page = plan_page();
    let engine = slow_settling_engine(&page);
    let step = ActionStep::new(ActionKind::Click, "button.next").with_wait_for(WaitFor::UrlChange);

    let result = engine.execute(&step, &cancel_after(10)).await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Operation interrupted"));
    assert!(result.duration_ms < 100, "took {}ms", result.duration_ms);
    assert_eq!(page.current_url(), "https://shop.example.test/signup");
}

struct EchoHandler;

#[async_trait]
impl PrivilegedHandler for EchoHandler {
    async fn handle(
        &self,
        step: &ActionStep,
        _ctx: &ExecCtx,
    ) -> Result<Option<String>, ActionError> {
        Ok(step.value.clone())
    }
}

#[tokio::test]
async fn privileged_actions_route_to_handlers() {
    let page = plan_page();
    let engine = engine_for(&page);
    let eval = ActionStep::new(ActionKind::Eval, "").with_value("document.title");
    let result = engine.execute(&eval, &CancellationToken::new()).await;
    assert_eq!(result.error.as_deref(), Some("No handler available for eval"));

    let engine = engine_for(&page).with_handler(ActionKind::Eval, Arc::new(EchoHandler));
    let result = engine.execute(&eval, &CancellationToken::new()).await;
    assert!(result.success);
    assert_eq!(result.extracted_data.as_deref(), Some("document.title"));

    let empty = ActionStep::new(ActionKind::Eval, "");
    let result = engine.execute(&empty, &CancellationToken::new()).await;
    assert_eq!(
        result.error.as_deref(),
        Some("Eval action requires a script value")
    );
}

#[tokio::test(start_paused = true)]
async fn duration_covers_settlement() {
    let page = plan_page();
    let engine = ExecutionEngine::new(Arc::new(page.clone()), EngineConfig::default());
    let step = ActionStep::new(ActionKind::Scroll, "").with_value("bottom");
    let result = engine.execute(&step, &CancellationToken::new()).await;
    assert!(result.success);
    // scroll settle plus the default post-action delay
    assert!(result.duration_ms >= 300);
}

#[test]
fn engine_runs_on_a_blocking_test_runtime() {
    let page = plan_page();
    let engine = engine_for(&page);
    let step = ActionStep::new(ActionKind::Extract, "#plan");
    let result = tokio_test::block_on(engine.execute(&step, &CancellationToken::new()));
    assert!(result.success);
    // nothing selected yet
    assert_eq!(result.extracted_data.as_deref(), Some(""));
}
