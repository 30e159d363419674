use core::ops::Range;

use crate::{DesiredWindow, Generation};

/// A lightweight snapshot of the viewer's window bookkeeping.
///
/// Useful for debugging overlays and for asserting on engine state without borrowing the
/// viewer. With `feature = "serde"`, this type implements `Serialize`/`Deserialize`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewerState {
    pub generation: Generation,
    pub applied: Generation,
    pub cached: Range<usize>,
    pub desired: DesiredWindow,
    pub rendered: Range<usize>,
    pub forward_end: bool,
    pub backward_end: bool,
    pub highlight: Option<Range<usize>>,
}

impl ViewerState {
    /// True when the rendered window covers the whole desired window and sits inside the cache.
    pub fn is_settled(&self) -> bool {
        self.rendered == self.desired.range()
            && (self.rendered.is_empty()
                || (self.rendered.start >= self.cached.start
                    && self.rendered.end <= self.cached.end))
    }
}
