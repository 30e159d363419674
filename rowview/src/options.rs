use crate::Layout;

/// Configuration for [`crate::Viewer`].
///
/// Pixel margins are in the render surface's units.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ViewerOptions {
    /// Upper bound on rows revealed from the cache in one pass.
    pub batch_size: usize,
    /// Extra distance beyond the viewport edges that should already be rendered.
    pub preload_margin: i64,
    /// Distance beyond which the far half of the rendered window is evicted.
    ///
    /// Never smaller than `preload_margin`; see [`Self::effective_overscroll_margin`].
    pub overscroll_margin: i64,
    /// Gap kept above a seeked row so earlier content stays visible.
    pub seek_lead_in: i64,
    /// The primary key field. Replaced by the source's own key when one is bound.
    pub primary_key: Option<String>,
    pub layout: Layout,
    /// Forget learned columns (counts, widths, collapsed state) when the order changes.
    pub reset_schema_on_reorder: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            preload_margin: 100,
            overscroll_margin: 1000,
            seek_lead_in: 20,
            primary_key: Some("id".to_string()),
            layout: Layout::Table,
            reset_schema_on_reorder: false,
        }
    }
}

impl ViewerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_preload_margin(mut self, px: i64) -> Self {
        self.preload_margin = px.max(0);
        self
    }

    pub fn with_overscroll_margin(mut self, px: i64) -> Self {
        self.overscroll_margin = px.max(0);
        self
    }

    pub fn with_seek_lead_in(mut self, px: i64) -> Self {
        self.seek_lead_in = px.max(0);
        self
    }

    pub fn with_primary_key(mut self, primary_key: Option<String>) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_reset_schema_on_reorder(mut self, reset: bool) -> Self {
        self.reset_schema_on_reorder = reset;
        self
    }

    /// The overscroll margin actually used: eviction must never drop rows the preload margin
    /// would fetch straight back.
    pub fn effective_overscroll_margin(&self) -> i64 {
        self.overscroll_margin.max(self.preload_margin)
    }
}
