use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::viewport::ViewportKey;

/// Sending half: callbacks ask for a redraw and move on.
#[derive(Debug, Clone)]
pub struct RenderQueue {
    sender: Sender<ViewportKey>,
}

/// Receiving half, drained by the host's render loop.
#[derive(Debug)]
pub struct RenderRequests {
    receiver: Receiver<ViewportKey>,
}

pub fn render_queue() -> (RenderQueue, RenderRequests) {
    let (sender, receiver) = unbounded();
    (RenderQueue { sender }, RenderRequests { receiver })
}

impl RenderQueue {
    pub fn request(&self, viewport: &ViewportKey) {
        if self.sender.send(viewport.clone()).is_err() {
            debug!(viewport = %viewport, "render loop is gone, dropping render request");
        }
    }
}

impl RenderRequests {
    /// Pending requests in arrival order, one per viewport.
    pub fn drain(&self) -> Vec<ViewportKey> {
        let mut pending: Vec<ViewportKey> = Vec::new();
        for key in self.receiver.try_iter() {
            if !pending.contains(&key) {
                pending.push(key);
            }
        }
        pending
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
