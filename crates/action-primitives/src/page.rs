//! Live page handle used by the primitives.

use async_trait::async_trait;

use crate::errors::ActionError;
use crate::types::{DomEvent, ElementInfo, ItemHandle, ScrollDirection};

/// DOM access for a single live tab.
///
/// Implementations wrap whatever channel reaches the page (content script,
/// DevTools session, in-memory fixture). Every method may fail with
/// [`ActionError::PageIo`] when the channel drops.
#[async_trait]
pub trait LivePage: Send + Sync {
    /// Current location.
    async fn url(&self) -> Result<String, ActionError>;

    /// Pages where script injection is not possible (browser internals,
    /// extension stores). Only navigation is honored there.
    async fn is_restricted(&self) -> Result<bool, ActionError>;

    /// Resolve `selector`; `None` when nothing matches.
    async fn describe(&self, selector: &str) -> Result<Option<ElementInfo>, ActionError>;

    async fn scroll_into_view(&self, selector: &str, smooth: bool) -> Result<(), ActionError>;

    async fn scroll_page(&self, direction: ScrollDirection) -> Result<(), ActionError>;

    async fn dispatch(&self, selector: &str, event: DomEvent) -> Result<(), ActionError>;

    /// Write the element's value property without firing events.
    async fn set_value(&self, selector: &str, value: &str) -> Result<(), ActionError>;

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), ActionError>;

    /// Select the option at `index` of a native select.
    async fn select_index(&self, selector: &str, index: usize) -> Result<(), ActionError>;

    /// Visible elements that look like dropdown or listbox items.
    async fn visible_items(&self) -> Result<Vec<ItemHandle>, ActionError>;

    async fn navigate(&self, url: &str) -> Result<(), ActionError>;

    /// Monotonic counter of observed DOM mutations.
    async fn mutation_count(&self) -> Result<u64, ActionError>;
}
