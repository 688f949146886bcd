pub mod calculator;
pub mod registry;

pub use calculator::{
    calculate_image_ids_spatial_registration, compute_transform, is_same_image_plane,
    series_instance_information, SeriesInstanceInformation,
};
pub use registry::TransformRegistry;

use nalgebra::Matrix4;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

use crate::config::RegistrationConfig;
use crate::metadata::MetadataRegistry;
use crate::viewport::ViewportCell;

/// Priority the transform registry is registered with as a metadata provider.
pub const SPATIAL_REGISTRATION_PROVIDER_PRIORITY: i32 = 0;

/// Why the last attempt to register a (source, target) viewport pair failed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Unregistrable {
    /// No series information for these current images.
    MissingSeries { image_ids: (String, String) },
    /// Geometry of these two series cannot be registered.
    Geometry { series_uids: (String, String) },
}

/// Resolves the geometric correction between two viewports, computing and
/// caching it on first use.
#[derive(Debug)]
pub struct SpatialRegistration {
    metadata: Rc<MetadataRegistry>,
    registry: Rc<TransformRegistry>,
    tolerance: f64,
    unregistrable: RefCell<HashMap<(String, String), Unregistrable>>,
}

impl SpatialRegistration {
    pub fn new(metadata: Rc<MetadataRegistry>, config: &RegistrationConfig) -> Self {
        let registry = Rc::new(TransformRegistry::new(config.staleness));
        metadata.add_provider(registry.clone(), SPATIAL_REGISTRATION_PROVIDER_PRIORITY);
        Self {
            metadata,
            registry,
            tolerance: config.orientation_tolerance,
            unregistrable: RefCell::new(HashMap::new()),
        }
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Computes the registration between the current images of two viewports
    /// and stores it, keyed by viewport ids and series instance UIDs.
    pub fn calculate_viewports_spatial_registration(
        &self,
        viewport1: &ViewportCell,
        viewport2: &ViewportCell,
    ) -> Option<Matrix4<f64>> {
        let image_id1 = viewport1.current_image_id()?;
        let image_id2 = viewport2.current_image_id()?;

        let matrix = calculate_image_ids_spatial_registration(
            &self.metadata,
            &image_id1,
            &image_id2,
            self.tolerance,
        )?;
        let series = series_instance_information(&self.metadata, &image_id1, &image_id2)?;

        self.registry.put(
            viewport1.id(),
            viewport2.id(),
            &series.series_instance_uid1,
            &series.series_instance_uid2,
            matrix,
        );
        Some(matrix)
    }

    /// Transform mapping `source` world coordinates into `target`'s frame, or
    /// `None` when no correction applies or none can be computed.
    ///
    /// Metadata providers are asked first, so a host provider registered above
    /// [`SPATIAL_REGISTRATION_PROVIDER_PRIORITY`] can supply its own matrices.
    /// The service's own cache answers even if the providers were removed.
    ///
    /// Only the last failure per viewport pair is remembered. A pair is not
    /// retried while it shows the same series, or the same images when series
    /// information was missing.
    pub fn transform_between(
        &self,
        source: &ViewportCell,
        target: &ViewportCell,
    ) -> Option<Matrix4<f64>> {
        if let (Some(a), Some(b)) = (
            source.frame_of_reference_id(),
            target.frame_of_reference_id(),
        ) {
            if a == b {
                return None;
            }
        }

        let (Some(image_id1), Some(image_id2)) =
            (source.current_image_id(), target.current_image_id())
        else {
            debug!(
                source = %source.key(),
                target = %target.key(),
                "no current image, skipping spatial registration"
            );
            return None;
        };

        let pair = (source.id().to_string(), target.id().to_string());
        let image_ids = (image_id1, image_id2);
        if let Some(Unregistrable::MissingSeries { image_ids: known }) =
            self.unregistrable.borrow().get(&pair)
        {
            if *known == image_ids {
                return None;
            }
        }

        let Some(series) = series_instance_information(&self.metadata, &image_ids.0, &image_ids.1)
        else {
            self.unregistrable
                .borrow_mut()
                .insert(pair, Unregistrable::MissingSeries { image_ids });
            return None;
        };
        let series_uids = (series.series_instance_uid1, series.series_instance_uid2);

        let cached = self
            .metadata
            .spatial_registration(
                [source.id(), target.id()],
                [series_uids.0.as_str(), series_uids.1.as_str()],
            )
            .or_else(|| {
                self.registry
                    .get(source.id(), target.id(), &series_uids.0, &series_uids.1)
            });
        if cached.is_some() {
            return cached;
        }

        if let Some(Unregistrable::Geometry { series_uids: known }) =
            self.unregistrable.borrow().get(&pair)
        {
            if *known == series_uids {
                return None;
            }
        }

        let matrix = self.calculate_viewports_spatial_registration(source, target);
        match matrix {
            Some(_) => {
                self.unregistrable.borrow_mut().remove(&pair);
            }
            None => {
                debug!(
                    source = %source.key(),
                    target = %target.key(),
                    "viewports cannot be registered, propagating uncorrected"
                );
                self.unregistrable
                    .borrow_mut()
                    .insert(pair, Unregistrable::Geometry { series_uids });
            }
        }
        matrix
    }

    /// Number of viewport pairs currently remembered as unregistrable.
    pub fn unregistrable_pairs(&self) -> usize {
        self.unregistrable.borrow().len()
    }

    /// Forgets cached transforms and unregistrable pairs.
    pub fn clear(&self) {
        self.registry.clear();
        self.unregistrable.borrow_mut().clear();
    }
}

#[cfg(test)]
mod spatial_registration_tests {
    use super::*;
    use crate::utils::test_utils::{
        add_image, metadata_registry, plane, stack_viewport, AXIAL, CORONAL,
    };
    use crate::metadata::{
        InMemoryMetadataProvider, MetadataProvider, MetadataQuery, MetadataValue,
    };
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::cell::Cell;

    /// Forwards to an in-memory provider and counts image lookups.
    struct CountingProvider {
        inner: Rc<InMemoryMetadataProvider>,
        lookups: Rc<Cell<usize>>,
    }

    impl MetadataProvider for CountingProvider {
        fn get(&self, query: &MetadataQuery<'_>) -> Option<MetadataValue> {
            if let MetadataQuery::Image { .. } = query {
                self.lookups.set(self.lookups.get() + 1);
            }
            self.inner.get(query)
        }
    }

    fn service() -> (SpatialRegistration, Rc<crate::metadata::InMemoryMetadataProvider>) {
        let (metadata, provider) = metadata_registry();
        add_image(&provider, "ct-0", "ct-series", AXIAL, [0.0, 0.0, 0.0]);
        add_image(&provider, "pet-0", "pet-series", AXIAL, [10.0, 0.0, 5.0]);
        add_image(&provider, "mr-0", "mr-series", CORONAL, [0.0, 0.0, 0.0]);
        (
            SpatialRegistration::new(metadata, &RegistrationConfig::default()),
            provider,
        )
    }

    #[test]
    fn test_same_frame_of_reference_needs_no_correction() {
        let (service, _) = service();
        let a = stack_viewport("a", "for-1", &["ct-0"]);
        let b = stack_viewport("b", "for-1", &["pet-0"]);
        assert_eq!(service.transform_between(&a, &b), None);
        assert!(service.registry().is_empty());
    }

    #[test]
    fn test_first_use_computes_and_caches() {
        let (service, _) = service();
        let ct = stack_viewport("ct", "for-ct", &["ct-0"]);
        let pet = stack_viewport("pet", "for-pet", &["pet-0"]);

        let forward = service.transform_between(&ct, &pet).unwrap();
        assert_relative_eq!(
            forward,
            Matrix4::new_translation(&Vector3::new(-10.0, 0.0, -5.0))
        );
        assert_eq!(service.registry().len(), 1);

        let backward = service.transform_between(&pet, &ct).unwrap();
        assert_relative_eq!(
            backward,
            Matrix4::new_translation(&Vector3::new(10.0, 0.0, 5.0))
        );
        assert_eq!(service.registry().len(), 1);
    }

    #[test]
    fn test_unregistrable_pair_is_not_retried() {
        let (service, provider) = service();
        let ct = stack_viewport("ct", "for-ct", &["ct-0"]);
        let mr = stack_viewport("mr", "for-mr", &["mr-0"]);

        assert_eq!(service.transform_between(&ct, &mr), None);
        // Even once the geometry would allow it, the pair stays uncorrected.
        add_image(&provider, "mr-0", "mr-series", AXIAL, [0.0, 0.0, 1.0]);
        assert_eq!(service.transform_between(&ct, &mr), None);

        service.clear();
        assert!(service.transform_between(&ct, &mr).is_some());
    }

    #[test]
    fn test_switching_series_recomputes() {
        let (service, provider) = service();
        add_image(&provider, "pet2-0", "pet2-series", AXIAL, [0.0, 20.0, 0.0]);
        let ct = stack_viewport("ct", "for-ct", &["ct-0"]);
        let pet = stack_viewport("pet", "for-pet", &["pet-0"]);
        service.transform_between(&ct, &pet).unwrap();

        pet.replace(crate::viewport::StackViewport::new(
            "for-pet2",
            vec!["pet2-0".to_string()],
        ));
        let updated = service.transform_between(&ct, &pet).unwrap();
        assert_relative_eq!(
            updated,
            Matrix4::new_translation(&Vector3::new(0.0, -20.0, 0.0))
        );
    }

    #[test]
    fn test_missing_metadata_resolves_to_none() {
        let (service, _) = service();
        let ct = stack_viewport("ct", "for-ct", &["ct-0"]);
        let unknown = stack_viewport("x", "for-x", &["unknown-0"]);
        let empty = stack_viewport("e", "for-e", &[]);
        assert_eq!(service.transform_between(&ct, &unknown), None);
        assert_eq!(service.transform_between(&ct, &empty), None);
        assert_eq!(
            service.calculate_viewports_spatial_registration(&ct, &unknown),
            None
        );
    }

    #[test]
    fn test_scrolling_unregistrable_stacks_keeps_one_entry_per_pair() {
        let (service, provider) = service();
        let ct_ids: Vec<String> = (0..5).map(|i| format!("ct-s{}", i)).collect();
        let mr_ids: Vec<String> = (0..5).map(|i| format!("mr-s{}", i)).collect();
        for (i, (ct_id, mr_id)) in ct_ids.iter().zip(&mr_ids).enumerate() {
            let z = i as f64 * 2.5;
            add_image(&provider, ct_id, "ct-series", AXIAL, [0.0, 0.0, z]);
            add_image(&provider, mr_id, "mr-series", CORONAL, [0.0, z, 0.0]);
        }
        let ct_refs: Vec<&str> = ct_ids.iter().map(String::as_str).collect();
        let mr_refs: Vec<&str> = mr_ids.iter().map(String::as_str).collect();
        let ct = stack_viewport("ct", "for-ct", &ct_refs);
        let mr = stack_viewport("mr", "for-mr", &mr_refs);

        for index in 0..5 {
            ct.set_image_index_silently(index);
            mr.set_image_index_silently(4 - index);
            assert_eq!(service.transform_between(&ct, &mr), None);
        }
        assert_eq!(service.unregistrable_pairs(), 1);
    }

    #[test]
    fn test_missing_series_is_not_looked_up_again() {
        let provider = Rc::new(InMemoryMetadataProvider::new());
        let lookups = Rc::new(Cell::new(0));
        let metadata = Rc::new(MetadataRegistry::new());
        metadata.add_provider(
            Rc::new(CountingProvider {
                inner: Rc::clone(&provider),
                lookups: Rc::clone(&lookups),
            }),
            10,
        );
        let service = SpatialRegistration::new(metadata, &RegistrationConfig::default());
        add_image(&provider, "ct-0", "ct-series", AXIAL, [0.0, 0.0, 0.0]);
        // Geometry but no series information.
        provider.insert_image_plane("us-0", plane(AXIAL, [1.0, 0.0, 0.0]));
        let ct = stack_viewport("ct", "for-ct", &["ct-0"]);
        let us = stack_viewport("us", "for-us", &["us-0"]);

        assert_eq!(service.transform_between(&ct, &us), None);
        let after_first = lookups.get();
        assert!(after_first > 0);
        assert_eq!(service.transform_between(&ct, &us), None);
        assert_eq!(lookups.get(), after_first);
        assert_eq!(service.unregistrable_pairs(), 1);
    }

    #[test]
    fn test_cache_survives_provider_reset() {
        let (service, provider) = service();
        let ct = stack_viewport("ct", "for-ct", &["ct-0"]);
        let pet = stack_viewport("pet", "for-pet", &["pet-0"]);
        let expected = Matrix4::new_translation(&Vector3::new(-10.0, 0.0, -5.0));
        assert_relative_eq!(service.transform_between(&ct, &pet).unwrap(), expected);

        service.metadata().remove_all_providers();
        service.metadata().add_provider(provider.clone(), 0);
        // A recompute would now pick up the moved image.
        add_image(&provider, "pet-0", "pet-series", AXIAL, [50.0, 0.0, 0.0]);
        assert_relative_eq!(service.transform_between(&ct, &pet).unwrap(), expected);
    }
}
