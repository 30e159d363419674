use crate::{RequestId, SourceError};

/// Per-direction fetch state.
///
/// `idle -> pending -> idle`. `hit_end` and `blocked` are sticky until [`Self::reset`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoaderState {
    pending: Option<RequestId>,
    /// The index the pending (or last) request was issued for.
    bound: Option<usize>,
    hit_end: bool,
    blocked: bool,
    last_error: Option<SourceError>,
}

impl LoaderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending
    }

    pub fn bound(&self) -> Option<usize> {
        self.bound
    }

    pub fn hit_end(&self) -> bool {
        self.hit_end
    }

    /// Parked after an unsupported-operation failure.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn last_error(&self) -> Option<&SourceError> {
        self.last_error.as_ref()
    }

    /// True when a new request may be issued in this direction.
    pub fn can_issue(&self) -> bool {
        self.pending.is_none() && !self.hit_end && !self.blocked
    }

    pub(crate) fn begin(&mut self, id: RequestId, bound: usize) {
        debug_assert!(self.pending.is_none(), "loader already pending");
        self.pending = Some(id);
        self.bound = Some(bound);
    }

    /// Clears `pending` if `id` is the outstanding request. Returns false for duplicates.
    pub(crate) fn settle(&mut self, id: RequestId) -> bool {
        if self.pending != Some(id) {
            return false;
        }
        self.pending = None;
        true
    }

    pub(crate) fn succeed(&mut self, is_end: bool) {
        self.last_error = None;
        self.hit_end = is_end;
    }

    pub(crate) fn fail(&mut self, error: SourceError) {
        if error.is_unsupported() {
            self.blocked = true;
        }
        self.last_error = Some(error);
    }

    /// New rows exist past a previous end (external append, or rows evicted on this side).
    ///
    /// Clears `hit_end` only. A blocked direction stays parked until [`Self::reset`].
    pub(crate) fn reopen(&mut self) {
        self.hit_end = false;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
