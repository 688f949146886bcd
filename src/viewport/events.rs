use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::{Camera, PanZoom, ViewportKey, VoiRange};

/// The change classes a viewport announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportEventKind {
    CameraModified,
    VoiModified,
    PanZoomModified,
    StackImageChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Camera {
        previous: Option<Camera>,
        current: Camera,
    },
    Voi(VoiRange),
    PanZoom(PanZoom),
    StackImage {
        index: usize,
        image_id: Option<String>,
    },
}

/// A "viewport modified" notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportEvent {
    pub viewport: ViewportKey,
    pub payload: EventPayload,
}

impl ViewportEvent {
    pub fn kind(&self) -> ViewportEventKind {
        match self.payload {
            EventPayload::Camera { .. } => ViewportEventKind::CameraModified,
            EventPayload::Voi(_) => ViewportEventKind::VoiModified,
            EventPayload::PanZoom(_) => ViewportEventKind::PanZoomModified,
            EventPayload::StackImage { .. } => ViewportEventKind::StackImageChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Rc<dyn Fn(&ViewportEvent)>;

/// Subscriber list for one viewport, called in subscription order.
#[derive(Default)]
pub struct EventChannel {
    listeners: RefCell<Vec<(ListenerId, ViewportEventKind, Listener)>>,
    next_id: Cell<u64>,
}

impl EventChannel {
    pub fn subscribe<F>(&self, kind: ViewportEventKind, listener: F) -> ListenerId
    where
        F: Fn(&ViewportEvent) + 'static,
    {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .push((id, kind, Rc::new(listener)));
        id
    }

    /// Returns `false` if the listener was not attached.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, kind: ViewportEventKind) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    pub fn emit(&self, event: &ViewportEvent) {
        // listeners may (un)subscribe while being called
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();
        for listener in matching {
            listener(event);
        }
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod event_tests {
    use super::*;

    fn voi_event() -> ViewportEvent {
        ViewportEvent {
            viewport: ViewportKey::new("engine", "vp"),
            payload: EventPayload::Voi(VoiRange::new(0.0, 100.0)),
        }
    }

    #[test]
    fn test_emit_only_reaches_matching_kind() {
        let channel = EventChannel::default();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        channel.subscribe(
            ViewportEventKind::VoiModified,
            move |_| h.set(h.get() + 1),
        );
        let h = Rc::clone(&hits);
        channel.subscribe(
            ViewportEventKind::CameraModified,
            move |_| h.set(h.get() + 100),
        );

        channel.emit(&voi_event());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let channel = EventChannel::default();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let id = channel.subscribe(
            ViewportEventKind::VoiModified,
            move |_| h.set(h.get() + 1),
        );
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        assert_eq!(channel.listener_count(ViewportEventKind::VoiModified), 0);

        channel.emit(&voi_event());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself_during_emit() {
        let channel = Rc::new(EventChannel::default());
        let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let (c, s) = (Rc::clone(&channel), Rc::clone(&slot));
        let id = channel.subscribe(
            ViewportEventKind::VoiModified,
            move |_| {
                if let Some(id) = s.get() {
                    c.unsubscribe(id);
                }
            },
        );
        slot.set(Some(id));
        channel.emit(&voi_event());
        assert_eq!(channel.listener_count(ViewportEventKind::VoiModified), 0);
    }
}
