//! In-memory [`LivePage`] backed by a declarative page description.
//!
//! Used by tests and by the CLI's scripted runs. Elements are addressed by
//! their exact selector string; there is no CSS engine.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::ActionError;
use crate::page::LivePage;
use crate::types::{DomEvent, ElementInfo, ItemHandle, ScrollDirection, SelectOption};

const VIEWPORT_HEIGHT: i64 = 800;

/// Side effects of clicking a fixture element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickEffect {
    /// Location after the click
    pub navigate: Option<String>,
    /// Delay before `navigate` takes effect
    pub delay_ms: u64,
    /// Selectors that become visible
    pub reveal: Vec<String>,
    /// Selectors that become hidden
    pub hide: Vec<String>,
    /// New step indicator label
    pub step_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureElement {
    pub selector: String,
    pub tag: String,
    pub role: Option<String>,
    pub input_type: Option<String>,
    pub label: Option<String>,
    pub text: String,
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub disabled: bool,
    pub visible: bool,
    pub in_viewport: bool,
    pub editable: Option<bool>,
    pub alt: Option<String>,
    pub href: Option<String>,
    pub options: Vec<SelectOption>,
    pub selected_index: Option<usize>,
    pub on_click: Option<ClickEffect>,
}

impl Default for FixtureElement {
    fn default() -> Self {
        Self {
            selector: String::new(),
            tag: "div".to_string(),
            role: None,
            input_type: None,
            label: None,
            text: String::new(),
            value: None,
            checked: None,
            disabled: false,
            visible: true,
            in_viewport: true,
            editable: None,
            alt: None,
            href: None,
            options: Vec::new(),
            selected_index: None,
            on_click: None,
        }
    }
}

impl FixtureElement {
    pub fn new(selector: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options
            .into_iter()
            .map(|text| {
                let text = text.into();
                SelectOption {
                    value: text.to_lowercase().replace(' ', "-"),
                    text,
                }
            })
            .collect();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn off_screen(mut self) -> Self {
        self.in_viewport = false;
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }

    /// Form fields counted by flow-progress tracking.
    pub fn is_form_field(&self) -> bool {
        match self.tag.as_str() {
            "select" | "textarea" => true,
            "input" => !matches!(
                self.input_type.as_deref(),
                Some("submit") | Some("button") | Some("hidden") | Some("reset")
            ),
            _ => false,
        }
    }

    pub fn is_filled(&self) -> bool {
        match (self.checked, &self.value, self.selected_index) {
            (Some(checked), _, _) => checked,
            (_, Some(value), _) => !value.is_empty(),
            (_, _, Some(idx)) => idx > 0,
            _ => false,
        }
    }

    fn is_editable(&self) -> bool {
        self.editable.unwrap_or_else(|| match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.input_type.as_deref(),
                Some("checkbox")
                    | Some("radio")
                    | Some("submit")
                    | Some("button")
                    | Some("hidden")
                    | Some("reset")
            ),
            _ => false,
        })
    }

    fn is_item(&self) -> bool {
        matches!(
            self.role.as_deref(),
            Some("option") | Some("menuitem") | Some("listitem") | Some("treeitem")
        ) || self.tag == "li"
    }

    fn info(&self) -> ElementInfo {
        ElementInfo {
            tag: self.tag.to_ascii_lowercase(),
            input_type: self.input_type.clone(),
            text: self.text.clone(),
            value: self.value.clone(),
            checked: self.checked,
            disabled: self.disabled,
            visible: self.visible,
            in_viewport: self.in_viewport,
            editable: self.is_editable(),
            alt: self.alt.clone(),
            href: self.href.clone(),
            options: self.options.clone(),
            selected_index: self.selected_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub level: String,
    pub text: String,
}

/// Serialized form of a fixture page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFixture {
    pub url: String,
    pub title: String,
    pub restricted: bool,
    pub loading: bool,
    pub text: String,
    pub step_label: Option<String>,
    pub page_height: i64,
    pub elements: Vec<FixtureElement>,
    pub console: Vec<ConsoleLine>,
}

/// Event dispatched against a fixture element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub selector: String,
    pub event: DomEvent,
}

#[derive(Debug)]
struct FixtureState {
    page: PageFixture,
    scroll_y: i64,
    events: Vec<RecordedEvent>,
    visits: Vec<String>,
}

/// Shared handle to an in-memory page. Clones observe the same page.
#[derive(Debug, Clone)]
pub struct FixturePage {
    state: Arc<Mutex<FixtureState>>,
    mutations: Arc<AtomicU64>,
    touches: Arc<AtomicUsize>,
}

impl FixturePage {
    pub fn new(page: PageFixture) -> Self {
        Self {
            state: Arc::new(Mutex::new(FixtureState {
                page,
                scroll_y: 0,
                events: Vec::new(),
                visits: Vec::new(),
            })),
            mutations: Arc::new(AtomicU64::new(0)),
            touches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn blank(url: impl Into<String>) -> Self {
        Self::new(PageFixture {
            url: url.into(),
            ..PageFixture::default()
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, ActionError> {
        let page: PageFixture = serde_yaml::from_str(content)
            .map_err(|err| ActionError::InvalidInput(format!("invalid page fixture: {err}")))?;
        Ok(Self::new(page))
    }

    pub fn load(path: &Path) -> Result<Self, ActionError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| ActionError::PageIo(format!("{}: {err}", path.display())))?;
        Self::from_yaml(&content)
    }

    pub fn with_element(self, element: FixtureElement) -> Self {
        self.state.lock().page.elements.push(element);
        self
    }

    /// Record an out-of-band DOM mutation.
    pub fn touch(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        let mut state = self.state.lock();
        state.visits.push(url.clone());
        state.page.url = url;
        drop(state);
        self.touch();
    }

    pub fn set_restricted(&self, restricted: bool) {
        self.state.lock().page.restricted = restricted;
    }

    pub fn current_url(&self) -> String {
        self.state.lock().page.url.clone()
    }

    pub fn title(&self) -> String {
        self.state.lock().page.title.clone()
    }

    pub fn text(&self) -> String {
        self.state.lock().page.text.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().page.loading
    }

    pub fn restricted(&self) -> bool {
        self.state.lock().page.restricted
    }

    pub fn step_label(&self) -> Option<String> {
        self.state.lock().page.step_label.clone()
    }

    pub fn elements(&self) -> Vec<FixtureElement> {
        self.state.lock().page.elements.clone()
    }

    pub fn element(&self, selector: &str) -> Option<FixtureElement> {
        self.state
            .lock()
            .page
            .elements
            .iter()
            .find(|el| el.selector == selector)
            .cloned()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.state.lock().events.clone()
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().visits.clone()
    }

    pub fn scroll_y(&self) -> i64 {
        self.state.lock().scroll_y
    }

    /// Number of element-level reads and writes issued against the page.
    pub fn touch_count(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }

    pub fn push_console(&self, level: impl Into<String>, text: impl Into<String>) {
        self.state.lock().page.console.push(ConsoleLine {
            level: level.into(),
            text: text.into(),
        });
    }

    /// Take console lines emitted since the last call.
    pub fn drain_console(&self) -> Vec<ConsoleLine> {
        std::mem::take(&mut self.state.lock().page.console)
    }

    fn with_element_mut<T>(
        &self,
        selector: &str,
        apply: impl FnOnce(&mut FixtureElement) -> T,
    ) -> Result<T, ActionError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        let element = state
            .page
            .elements
            .iter_mut()
            .find(|el| el.selector == selector)
            .ok_or_else(|| ActionError::TargetNotFound(selector.to_string()))?;
        Ok(apply(element))
    }

    fn apply_click(&self, effect: ClickEffect) {
        let mut state = self.state.lock();
        for element in state.page.elements.iter_mut() {
            if effect.reveal.contains(&element.selector) {
                element.visible = true;
            }
            if effect.hide.contains(&element.selector) {
                element.visible = false;
            }
        }
        if let Some(label) = effect.step_label.clone() {
            state.page.step_label = Some(label);
        }
        drop(state);
        self.touch();

        if let Some(target) = effect.navigate {
            if effect.delay_ms == 0 {
                self.set_url(target);
            } else {
                let page = self.clone();
                let delay = Duration::from_millis(effect.delay_ms);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    page.set_url(target);
                });
            }
        }
    }
}

#[async_trait]
impl LivePage for FixturePage {
    async fn url(&self) -> Result<String, ActionError> {
        Ok(self.current_url())
    }

    async fn is_restricted(&self) -> Result<bool, ActionError> {
        Ok(self.restricted())
    }

    async fn describe(&self, selector: &str) -> Result<Option<ElementInfo>, ActionError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        Ok(self.element(selector).map(|el| el.info()))
    }

    async fn scroll_into_view(&self, selector: &str, smooth: bool) -> Result<(), ActionError> {
        debug!(selector, smooth, "fixture scroll into view");
        self.with_element_mut(selector, |el| el.in_viewport = true)
    }

    async fn scroll_page(&self, direction: ScrollDirection) -> Result<(), ActionError> {
        let mut state = self.state.lock();
        let max = (state.page.page_height - VIEWPORT_HEIGHT).max(0);
        state.scroll_y = match direction {
            ScrollDirection::Top => 0,
            ScrollDirection::Bottom => max,
            ScrollDirection::Up => (state.scroll_y - VIEWPORT_HEIGHT).max(0),
            ScrollDirection::Down => (state.scroll_y + VIEWPORT_HEIGHT).min(max),
        };
        Ok(())
    }

    async fn dispatch(&self, selector: &str, event: DomEvent) -> Result<(), ActionError> {
        let effect = self.with_element_mut(selector, |el| match &event {
            DomEvent::Click => el.on_click.clone(),
            _ => None,
        })?;
        let mutates = matches!(event, DomEvent::Input { .. } | DomEvent::Change);
        self.state.lock().events.push(RecordedEvent {
            selector: selector.to_string(),
            event,
        });
        if mutates {
            self.touch();
        }
        if let Some(effect) = effect {
            self.apply_click(effect);
        }
        Ok(())
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<(), ActionError> {
        self.with_element_mut(selector, |el| el.value = Some(value.to_string()))?;
        self.touch();
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), ActionError> {
        self.with_element_mut(selector, |el| el.checked = Some(checked))?;
        self.touch();
        Ok(())
    }

    async fn select_index(&self, selector: &str, index: usize) -> Result<(), ActionError> {
        self.with_element_mut(selector, |el| match el.options.get(index) {
            Some(option) => {
                el.value = Some(option.value.clone());
                el.selected_index = Some(index);
                Ok(())
            }
            None => Err(ActionError::OptionNotFound {
                requested: index.to_string(),
            }),
        })??;
        self.touch();
        Ok(())
    }

    async fn visible_items(&self) -> Result<Vec<ItemHandle>, ActionError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .page
            .elements
            .iter()
            .filter(|el| el.visible && el.is_item())
            .map(|el| ItemHandle {
                selector: el.selector.clone(),
                text: el.text.clone(),
            })
            .collect())
    }

    async fn navigate(&self, url: &str) -> Result<(), ActionError> {
        self.set_url(url);
        Ok(())
    }

    async fn mutation_count(&self) -> Result<u64, ActionError> {
        Ok(self.mutations.load(Ordering::SeqCst))
    }
}
