use std::rc::Rc;

use super::synchronizer::Synchronizer;
use crate::error::SyncError;
use crate::viewport::non_empty;

/// Directory of live synchronizers, kept in registration order.
#[derive(Debug, Default)]
pub struct SynchronizerManager {
    synchronizers: Vec<Rc<Synchronizer>>,
}

impl SynchronizerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, synchronizer: Rc<Synchronizer>) -> Result<Rc<Synchronizer>, SyncError> {
        if self.get_synchronizer(synchronizer.id()).is_some() {
            return Err(SyncError::DuplicateSynchronizer(
                synchronizer.id().to_string(),
            ));
        }
        self.synchronizers.push(Rc::clone(&synchronizer));
        Ok(synchronizer)
    }

    pub fn get_synchronizer(&self, id: &str) -> Option<Rc<Synchronizer>> {
        self.synchronizers
            .iter()
            .find(|s| s.id() == id)
            .map(Rc::clone)
    }

    pub fn get_all_synchronizers(&self) -> Vec<Rc<Synchronizer>> {
        self.synchronizers.clone()
    }

    /// Enabled synchronizers with a source matching every given filter.
    ///
    /// Empty strings count as absent; at least one filter must be present.
    pub fn get_synchronizers(
        &self,
        rendering_engine_id: Option<&str>,
        group_id: Option<&str>,
        viewport_id: Option<&str>,
    ) -> Result<Vec<Rc<Synchronizer>>, SyncError> {
        if non_empty(rendering_engine_id).is_none()
            && non_empty(group_id).is_none()
            && non_empty(viewport_id).is_none()
        {
            return Err(SyncError::MissingScope);
        }

        Ok(self
            .synchronizers
            .iter()
            .filter(|s| s.is_enabled())
            .filter(|s| s.has_source_viewport(rendering_engine_id, group_id, viewport_id))
            .map(Rc::clone)
            .collect())
    }

    pub fn set_all_enabled(&self, enabled: bool) {
        for synchronizer in &self.synchronizers {
            synchronizer.set_enabled(enabled);
        }
    }

    pub fn destroy_synchronizer(&mut self, id: &str) -> Result<(), SyncError> {
        let at = self
            .synchronizers
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| SyncError::UnknownSynchronizer(id.to_string()))?;
        let synchronizer = self.synchronizers.remove(at);
        synchronizer.destroy();
        Ok(())
    }

    /// Destroys every synchronizer and empties the directory.
    pub fn destroy(&mut self) {
        for synchronizer in self.synchronizers.drain(..) {
            synchronizer.destroy();
        }
    }

    pub fn len(&self) -> usize {
        self.synchronizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synchronizers.is_empty()
    }
}
