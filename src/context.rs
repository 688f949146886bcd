use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

use crate::config::{SyncConfig, SynchronizerKind};
use crate::error::SyncError;
use crate::metadata::{InMemoryMetadataProvider, MetadataRegistry};
use crate::registration::SpatialRegistration;
use crate::render::{render_queue, RenderQueue, RenderRequests};
use crate::sync::factories::{
    create_camera_position_synchronizer, create_stack_image_synchronizer,
    create_voi_synchronizer, create_zoom_pan_synchronizer,
};
use crate::sync::{SyncCallback, Synchronizer, SynchronizerManager};
use crate::viewport::{ViewportEventKind, ViewportKey, ViewportRef};

/// One synchronization session: metadata providers, the transform cache and
/// the synchronizer directory. Independent sessions don't share state.
#[derive(Debug)]
pub struct SyncContext {
    config: SyncConfig,
    metadata: Rc<MetadataRegistry>,
    registration: Rc<SpatialRegistration>,
    manager: RefCell<SynchronizerManager>,
    render_queue: RenderQueue,
    render_requests: RenderRequests,
}

impl SyncContext {
    pub fn new(config: SyncConfig) -> Self {
        let metadata = Rc::new(MetadataRegistry::new());
        let registration = Rc::new(SpatialRegistration::new(
            Rc::clone(&metadata),
            &config.registration,
        ));
        let (render_queue, render_requests) = render_queue();
        Self {
            config,
            metadata,
            registration,
            manager: RefCell::new(SynchronizerManager::new()),
            render_queue,
            render_requests,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }

    pub fn registration(&self) -> &SpatialRegistration {
        &self.registration
    }

    /// Registers an empty in-memory provider and hands it back for filling.
    pub fn add_in_memory_metadata(&self) -> Rc<InMemoryMetadataProvider> {
        let provider = Rc::new(InMemoryMetadataProvider::new());
        self.metadata.add_provider(provider.clone(), 0);
        provider
    }

    pub fn create_synchronizer(
        &self,
        id: &str,
        event_kind: ViewportEventKind,
        callback: SyncCallback,
    ) -> Result<Rc<Synchronizer>, SyncError> {
        let synchronizer = Synchronizer::new(
            id,
            event_kind,
            callback,
            Rc::clone(&self.registration),
            self.render_queue.clone(),
        );
        self.manager.borrow_mut().add(synchronizer)
    }

    pub fn get_synchronizer(&self, id: &str) -> Option<Rc<Synchronizer>> {
        self.manager.borrow().get_synchronizer(id)
    }

    pub fn get_all_synchronizers(&self) -> Vec<Rc<Synchronizer>> {
        self.manager.borrow().get_all_synchronizers()
    }

    pub fn get_synchronizers(
        &self,
        rendering_engine_id: Option<&str>,
        group_id: Option<&str>,
        viewport_id: Option<&str>,
    ) -> Result<Vec<Rc<Synchronizer>>, SyncError> {
        self.manager
            .borrow()
            .get_synchronizers(rendering_engine_id, group_id, viewport_id)
    }

    pub fn set_all_enabled(&self, enabled: bool) {
        self.manager.borrow().set_all_enabled(enabled);
    }

    pub fn destroy_synchronizer(&self, id: &str) -> Result<(), SyncError> {
        self.manager.borrow_mut().destroy_synchronizer(id)
    }

    /// Builds the `[[synchronizer]]` groups of the configuration, resolving
    /// viewport ids through `resolve`.
    ///
    /// All or nothing: on error no synchronizer from the configuration stays
    /// registered.
    pub fn apply_config<F>(&self, resolve: F) -> Result<Vec<Rc<Synchronizer>>, SyncError>
    where
        F: Fn(&str) -> Option<ViewportRef>,
    {
        let lookup = |ids: &[String]| {
            ids.iter()
                .map(|id| {
                    resolve(id.as_str())
                        .ok_or_else(|| SyncError::UnresolvedViewportId(id.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let mut planned = Vec::with_capacity(self.config.synchronizers.len());
        let mut seen: HashSet<&str> = HashSet::new();
        for declared in &self.config.synchronizers {
            let taken = self.get_synchronizer(&declared.id).is_some();
            if taken || !seen.insert(declared.id.as_str()) {
                return Err(SyncError::DuplicateSynchronizer(declared.id.clone()));
            }
            let sources = lookup(declared.sources.as_slice())?;
            let targets = lookup(declared.targets.as_slice())?;
            planned.push((declared, sources, targets));
        }

        let mut created: Vec<Rc<Synchronizer>> = Vec::with_capacity(planned.len());
        for (declared, sources, targets) in planned {
            let synchronizer = match declared.kind {
                SynchronizerKind::Camera => create_camera_position_synchronizer(self, &declared.id),
                SynchronizerKind::Voi => create_voi_synchronizer(self, &declared.id),
                SynchronizerKind::ZoomPan => create_zoom_pan_synchronizer(self, &declared.id),
                SynchronizerKind::StackImage => create_stack_image_synchronizer(self, &declared.id),
            };
            let synchronizer = match synchronizer {
                Ok(synchronizer) => synchronizer,
                Err(err) => {
                    for done in &created {
                        // registered above, so this cannot miss
                        let _ = self.destroy_synchronizer(done.id());
                    }
                    return Err(err);
                }
            };
            for viewport in &sources {
                synchronizer.add_source(viewport);
            }
            for viewport in &targets {
                synchronizer.add_target(viewport);
            }
            debug!(
                synchronizer = %declared.id,
                sources = sources.len(),
                targets = targets.len(),
                "synchronizer created from configuration"
            );
            created.push(synchronizer);
        }
        Ok(created)
    }

    /// Viewports that asked for a redraw since the last call.
    pub fn drain_render_requests(&self) -> Vec<ViewportKey> {
        self.render_requests.drain()
    }

    /// Destroys all synchronizers and forgets cached registrations.
    pub fn teardown(&self) {
        self.manager.borrow_mut().destroy();
        self.registration.clear();
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}
