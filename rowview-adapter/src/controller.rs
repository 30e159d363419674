use std::collections::VecDeque;

use rowview::{
    Applied, FetchRequest, OrderSpec, RenderSurface, RequestId, RowSource, Viewer, ViewerOptions,
};

use crate::{SeekParseError, parse_seek_input};

/// Upper bound on follow-up passes per event. A settled viewer needs far fewer.
const MAX_PUMP_PASSES: usize = 1024;

/// When queued requests reach the row source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dispatch {
    /// Run each request as soon as the viewer queues it.
    #[default]
    Immediate,
    /// Hold requests until the host resolves them (simulates network latency and races).
    Deferred,
}

/// A framework-neutral controller that wires a [`Viewer`] to a row source.
///
/// This type does not hold any UI objects. Adapters drive it by calling:
/// - `on_scroll` / `on_resize` when UI events occur
/// - `submit_seek_input` and `on_header_activated` for user input
/// - `resolve_*` when running in [`Dispatch::Deferred`] mode
///
/// Sources are bound to one order. On an order change the controller cancels the current
/// source and builds a new one with `factory`.
pub struct Controller<S: RowSource, F> {
    viewer: Viewer,
    source: S,
    factory: F,
    dispatch: Dispatch,
    queue: VecDeque<FetchRequest>,
}

impl<S: RowSource, F: FnMut(&OrderSpec) -> S> Controller<S, F> {
    pub fn new(options: ViewerOptions, order: OrderSpec, mut factory: F) -> Self {
        let source = factory(&order);
        let primary_key = source
            .primary_key()
            .map(str::to_owned)
            .or_else(|| options.primary_key.clone());
        let viewer = Viewer::new(options.with_primary_key(primary_key), order);
        Self {
            viewer,
            source,
            factory,
            dispatch: Dispatch::Immediate,
            queue: VecDeque::new(),
        }
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }

    pub fn set_dispatch(&mut self, dispatch: Dispatch) {
        self.dispatch = dispatch;
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut Viewer {
        &mut self.viewer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Requests held back in [`Dispatch::Deferred`] mode, oldest first.
    pub fn queued(&self) -> impl Iterator<Item = &FetchRequest> {
        self.queue.iter()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Call this when the UI reports a scroll position change.
    pub fn on_scroll<R: RenderSurface + ?Sized>(&mut self, surface: &mut R) {
        self.viewer.reconcile(surface);
        self.pump(surface);
    }

    /// Call this when the viewport changes size.
    pub fn on_resize<R: RenderSurface + ?Sized>(&mut self, surface: &mut R) {
        self.viewer.reconcile(surface);
        self.pump(surface);
    }

    /// Dispatches queued requests and runs scheduled passes until the viewer is idle.
    ///
    /// Returns the number of passes run.
    pub fn pump<R: RenderSurface + ?Sized>(&mut self, surface: &mut R) -> usize {
        let mut passes = 0;
        loop {
            for request in self.viewer.drain_requests() {
                match self.dispatch {
                    Dispatch::Immediate => {
                        let response = request.execute(&mut self.source);
                        self.viewer.apply_response(response, surface);
                    }
                    Dispatch::Deferred => {
                        vtrace!(id = request.id.0, "deferring request");
                        self.queue.push_back(request);
                    }
                }
            }
            if !self.viewer.needs_pass() && !self.viewer.has_requests() {
                return passes;
            }
            if passes == MAX_PUMP_PASSES {
                vwarn!(passes, "viewer did not settle; yielding to the next event");
                return passes;
            }
            if self.viewer.needs_pass() {
                self.viewer.reconcile(surface);
                passes += 1;
            }
        }
    }

    /// Runs the oldest held request.
    pub fn resolve_next<R: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut R,
    ) -> Option<Applied> {
        self.resolve_at(0, surface)
    }

    /// Runs the newest held request.
    pub fn resolve_latest<R: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut R,
    ) -> Option<Applied> {
        let last = self.queue.len().checked_sub(1)?;
        self.resolve_at(last, surface)
    }

    /// Runs the held request at `index` (in queue order) against the current source.
    pub fn resolve_at<R: RenderSurface + ?Sized>(
        &mut self,
        index: usize,
        surface: &mut R,
    ) -> Option<Applied> {
        let request = self.queue.remove(index)?;
        let response = request.execute(&mut self.source);
        let applied = self.viewer.apply_response(response, surface);
        vtrace!(id = request.id.0, ?applied, "resolved request");
        self.pump(surface);
        Some(applied)
    }

    /// Resolves held requests oldest first until none remain.
    pub fn resolve_all<R: RenderSurface + ?Sized>(&mut self, surface: &mut R) -> usize {
        let mut n = 0;
        while self.resolve_next(surface).is_some() {
            n += 1;
        }
        n
    }

    /// Parses seek box text and starts a seek. Parse failures never reach the viewer.
    pub fn submit_seek_input<R: RenderSurface + ?Sized>(
        &mut self,
        text: &str,
        surface: &mut R,
    ) -> Result<RequestId, SeekParseError> {
        let key = match parse_seek_input(text) {
            Ok(key) => key,
            Err(err) => {
                vwarn!(%err, "rejected seek input");
                return Err(err);
            }
        };
        let id = self.viewer.seek(key);
        self.pump(surface);
        Ok(id)
    }

    /// Header double-activation on the displayed column `column`.
    ///
    /// Flips the direction when it is the active sort column, otherwise sorts by it ascending.
    /// Returns the new order, or `None` when no such column exists.
    pub fn on_header_activated<R: RenderSurface + ?Sized>(
        &mut self,
        column: usize,
        surface: &mut R,
    ) -> Option<OrderSpec> {
        let path = self.viewer.columns().get(column)?.path.clone();
        let order = self
            .viewer
            .order()
            .toggled(&path, self.viewer.primary_key());
        self.set_order(order.clone(), surface);
        Some(order)
    }

    /// Binds a fresh source for `order` and resets the viewer.
    pub fn set_order<R: RenderSurface + ?Sized>(&mut self, order: OrderSpec, surface: &mut R) {
        vdebug!(?order, "rebinding source");
        self.source.cancel_pending_requests();
        self.source = (self.factory)(&order);
        let primary_key = self
            .source
            .primary_key()
            .map(str::to_owned)
            .or_else(|| self.viewer.options().primary_key.clone());
        self.viewer.reset(order, primary_key);
        self.viewer.reconcile(surface);
        self.pump(surface);
    }

    /// The source gained rows past its previous end.
    pub fn notify_appended<R: RenderSurface + ?Sized>(&mut self, surface: &mut R) {
        self.viewer.notify_appended();
        self.pump(surface);
    }

    /// Invalidates everything in flight and releases the source's pending work.
    pub fn shutdown(&mut self) {
        self.viewer.invalidate();
        self.queue.clear();
        self.source.cancel_pending_requests();
    }
}

impl<S: RowSource, F> Drop for Controller<S, F> {
    fn drop(&mut self) {
        self.source.cancel_pending_requests();
    }
}
