use nalgebra::Matrix4;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;

use crate::config::StalenessPolicy;
use crate::metadata::{MetadataProvider, MetadataQuery, MetadataValue};

/// Cache of registration matrices between pairs of viewports.
///
/// One direction is stored per pair; asking for the other direction returns
/// the inverse. Every entry keeps the frame identifiers it was computed for,
/// and an entry whose frames no longer match the query is treated as absent.
/// Each viewport also remembers the frame identifier it was last registered
/// with.
#[derive(Debug, Default)]
pub struct TransformRegistry {
    transforms: RefCell<HashMap<(String, String), CachedTransform>>,
    frames: RefCell<HashMap<String, String>>,
    staleness: StalenessPolicy,
}

#[derive(Debug, Clone)]
struct CachedTransform {
    transform: Matrix4<f64>,
    frame_ids: (String, String),
}

impl TransformRegistry {
    pub fn new(staleness: StalenessPolicy) -> Self {
        Self {
            staleness,
            ..Self::default()
        }
    }

    pub fn put(
        &self,
        viewport_id1: &str,
        viewport_id2: &str,
        frame_id1: &str,
        frame_id2: &str,
        transform: Matrix4<f64>,
    ) {
        let mut transforms = self.transforms.borrow_mut();
        transforms.remove(&(viewport_id2.to_string(), viewport_id1.to_string()));
        transforms.insert(
            (viewport_id1.to_string(), viewport_id2.to_string()),
            CachedTransform {
                transform,
                frame_ids: (frame_id1.to_string(), frame_id2.to_string()),
            },
        );

        let mut frames = self.frames.borrow_mut();
        frames.insert(viewport_id1.to_string(), frame_id1.to_string());
        frames.insert(viewport_id2.to_string(), frame_id2.to_string());
    }

    pub fn get(
        &self,
        viewport_id1: &str,
        viewport_id2: &str,
        frame_id1: &str,
        frame_id2: &str,
    ) -> Option<Matrix4<f64>> {
        if self.is_stale(
            self.frame_id(viewport_id1).as_deref(),
            self.frame_id(viewport_id2).as_deref(),
            frame_id1,
            frame_id2,
        ) {
            debug!(
                viewport_id1,
                viewport_id2, "viewport frames changed since registration, ignoring cache"
            );
            return None;
        }

        let transforms = self.transforms.borrow();
        if let Some(forward) =
            transforms.get(&(viewport_id1.to_string(), viewport_id2.to_string()))
        {
            let (stored1, stored2) = &forward.frame_ids;
            if self.is_stale(
                Some(stored1.as_str()),
                Some(stored2.as_str()),
                frame_id1,
                frame_id2,
            ) {
                debug!(viewport_id1, viewport_id2, "cached registration is stale, ignoring it");
                return None;
            }
            return Some(forward.transform);
        }

        let reverse = transforms.get(&(viewport_id2.to_string(), viewport_id1.to_string()))?;
        let (stored2, stored1) = &reverse.frame_ids;
        if self.is_stale(
            Some(stored1.as_str()),
            Some(stored2.as_str()),
            frame_id1,
            frame_id2,
        ) {
            debug!(viewport_id1, viewport_id2, "cached registration is stale, ignoring it");
            return None;
        }
        let inverse = reverse.transform.try_inverse();
        if inverse.is_none() {
            debug!(viewport_id1, viewport_id2, "stored registration is not invertible");
        }
        inverse
    }

    /// Frame identifier the viewport was last registered with.
    pub fn frame_id(&self, viewport_id: &str) -> Option<String> {
        self.frames.borrow().get(viewport_id).cloned()
    }

    pub fn clear(&self) {
        self.transforms.borrow_mut().clear();
        self.frames.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.transforms.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_stale(
        &self,
        recorded1: Option<&str>,
        recorded2: Option<&str>,
        frame_id1: &str,
        frame_id2: &str,
    ) -> bool {
        let changed1 = recorded1 != Some(frame_id1);
        let changed2 = recorded2 != Some(frame_id2);
        match self.staleness {
            StalenessPolicy::Either => changed1 || changed2,
            StalenessPolicy::Both => changed1 && changed2,
        }
    }
}

impl MetadataProvider for TransformRegistry {
    fn get(&self, query: &MetadataQuery<'_>) -> Option<MetadataValue> {
        let MetadataQuery::SpatialRegistration {
            viewport_ids: [viewport_id1, viewport_id2],
            series_instance_uids: [series1, series2],
        } = *query
        else {
            return None;
        };
        TransformRegistry::get(self, viewport_id1, viewport_id2, series1, series2)
            .map(MetadataValue::SpatialRegistration)
    }
}
