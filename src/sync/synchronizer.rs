use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{trace, warn};

use crate::registration::SpatialRegistration;
use crate::render::RenderQueue;
use crate::viewport::{ListenerId, ViewportCell, ViewportEvent, ViewportEventKind, ViewportKey, ViewportRef};

/// What a callback gets to work with besides the two viewports.
pub struct CallbackContext<'a> {
    pub synchronizer_id: &'a str,
    pub registration: &'a SpatialRegistration,
    render: &'a RenderQueue,
}

impl CallbackContext<'_> {
    pub fn request_render(&self, viewport: &ViewportCell) {
        self.render.request(viewport.key());
    }
}

/// Propagation policy invoked once per (source, target) pair.
pub type SyncCallback = Rc<
    dyn Fn(&CallbackContext<'_>, &ViewportCell, &ViewportCell, &ViewportEvent) -> anyhow::Result<()>,
>;

/// Wraps a closure as a [`SyncCallback`].
pub fn sync_callback<F>(f: F) -> SyncCallback
where
    F: Fn(&CallbackContext<'_>, &ViewportCell, &ViewportCell, &ViewportEvent) -> anyhow::Result<()>
        + 'static,
{
    Rc::new(f)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

struct AttachedSource {
    key: ViewportKey,
    viewport: Weak<ViewportCell>,
    listener: ListenerId,
}

struct DispatchGuard<'a>(&'a Cell<bool>);

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Fans change events of its source viewports out to its target viewports.
///
/// A source never receives its own event back, even when it is also a target.
/// Events fired while a dispatch is in flight are ignored, so a target that
/// re-announces a propagated change cannot bounce it back to the source.
pub struct Synchronizer {
    id: String,
    event_kind: ViewportEventKind,
    callback: SyncCallback,
    registration: Rc<SpatialRegistration>,
    render: RenderQueue,
    sources: RefCell<Vec<AttachedSource>>,
    targets: RefCell<Vec<(ViewportKey, Weak<ViewportCell>)>>,
    enabled: Cell<bool>,
    dispatching: Cell<bool>,
    this: Weak<Synchronizer>,
}

impl Synchronizer {
    pub fn new(
        id: impl Into<String>,
        event_kind: ViewportEventKind,
        callback: SyncCallback,
        registration: Rc<SpatialRegistration>,
        render: RenderQueue,
    ) -> Rc<Self> {
        let id = id.into();
        Rc::new_cyclic(|this| Self {
            id,
            event_kind,
            callback,
            registration,
            render,
            sources: RefCell::new(Vec::new()),
            targets: RefCell::new(Vec::new()),
            enabled: Cell::new(true),
            dispatching: Cell::new(false),
            this: this.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_kind(&self) -> ViewportEventKind {
        self.event_kind
    }

    pub fn add_source(&self, viewport: &ViewportRef) {
        if self.has_source(viewport.key()) {
            return;
        }
        let this = self.this.clone();
        let listener = viewport.events().subscribe(
            self.event_kind,
            move |event: &ViewportEvent| {
                if let Some(synchronizer) = this.upgrade() {
                    synchronizer.fire(event);
                }
            },
        );
        self.sources.borrow_mut().push(AttachedSource {
            key: viewport.key().clone(),
            viewport: Rc::downgrade(viewport),
            listener,
        });
    }

    pub fn remove_source(&self, key: &ViewportKey) {
        let mut sources = self.sources.borrow_mut();
        if let Some(at) = sources.iter().position(|s| &s.key == key) {
            let source = sources.remove(at);
            if let Some(viewport) = source.viewport.upgrade() {
                viewport.events().unsubscribe(source.listener);
            }
        }
    }

    pub fn add_target(&self, viewport: &ViewportRef) {
        if self.has_target(viewport.key()) {
            return;
        }
        self.targets
            .borrow_mut()
            .push((viewport.key().clone(), Rc::downgrade(viewport)));
    }

    pub fn remove_target(&self, key: &ViewportKey) {
        self.targets.borrow_mut().retain(|(k, _)| k != key);
    }

    /// Adds every viewport as both source and target.
    pub fn add_viewports<'a>(&self, viewports: impl IntoIterator<Item = &'a ViewportRef>) {
        for viewport in viewports {
            self.add_source(viewport);
            self.add_target(viewport);
        }
    }

    pub fn has_source(&self, key: &ViewportKey) -> bool {
        self.sources.borrow().iter().any(|s| &s.key == key)
    }

    pub fn has_target(&self, key: &ViewportKey) -> bool {
        self.targets.borrow().iter().any(|(k, _)| k == key)
    }

    /// Whether any source matches all of the given non-empty filters.
    pub fn has_source_viewport(
        &self,
        rendering_engine_id: Option<&str>,
        group_id: Option<&str>,
        viewport_id: Option<&str>,
    ) -> bool {
        self.sources
            .borrow()
            .iter()
            .any(|s| s.key.matches(rendering_engine_id, group_id, viewport_id))
    }

    pub fn source_keys(&self) -> Vec<ViewportKey> {
        self.sources.borrow().iter().map(|s| s.key.clone()).collect()
    }

    pub fn target_keys(&self) -> Vec<ViewportKey> {
        self.targets.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Disabled synchronizers stay attached but drop every event.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Detaches all listeners and forgets sources and targets. Safe to call
    /// more than once.
    pub fn destroy(&self) {
        for source in self.sources.borrow_mut().drain(..) {
            if let Some(viewport) = source.viewport.upgrade() {
                viewport.events().unsubscribe(source.listener);
            }
        }
        self.targets.borrow_mut().clear();
    }

    /// Runs the callback for every target other than the event's source.
    pub fn fire(&self, event: &ViewportEvent) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        if !self.enabled.get() {
            trace!(synchronizer = %self.id, "disabled, dropping event");
            return summary;
        }
        if self.dispatching.get() {
            trace!(
                synchronizer = %self.id,
                viewport = %event.viewport,
                "ignoring event raised during dispatch"
            );
            return summary;
        }

        let source = self
            .sources
            .borrow()
            .iter()
            .find(|s| s.key == event.viewport)
            .map(|s| s.viewport.clone());
        let Some(source) = source.and_then(|weak| weak.upgrade()) else {
            warn!(
                synchronizer = %self.id,
                viewport = %event.viewport,
                "event from a viewport that is not a live source"
            );
            return summary;
        };

        let _guard = DispatchGuard::enter(&self.dispatching);
        let targets = self.targets.borrow().clone();
        let context = CallbackContext {
            synchronizer_id: &self.id,
            registration: &self.registration,
            render: &self.render,
        };

        for (key, target) in targets {
            if key == *source.key() {
                continue;
            }
            let Some(target) = target.upgrade() else {
                warn!(synchronizer = %self.id, target = %key, "target viewport no longer exists");
                continue;
            };
            trace!(synchronizer = %self.id, source = %source.key(), target = %key, "dispatch");
            match (self.callback)(&context, &*source, &*target, event) {
                Ok(()) => summary.delivered += 1,
                Err(err) => {
                    summary.failed += 1;
                    warn!(
                        synchronizer = %self.id,
                        target = %key,
                        error = %err,
                        "synchronizer callback failed"
                    );
                }
            }
        }
        summary
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("id", &self.id)
            .field("event_kind", &self.event_kind)
            .field("sources", &self.source_keys())
            .field("targets", &self.target_keys())
            .field("enabled", &self.enabled.get())
            .finish()
    }
}
