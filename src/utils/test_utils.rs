use std::rc::Rc;

use crate::metadata::{
    GeneralSeriesModule, ImagePlaneModule, InMemoryMetadataProvider, MetadataRegistry,
};
use crate::viewport::{StackViewport, ViewportCell, ViewportKey, ViewportRef, VolumeViewport};

pub const RENDERING_ENGINE: &str = "engine";

pub const AXIAL: [f64; 6] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
pub const CORONAL: [f64; 6] = [1.0, 0.0, 0.0, 0.0, 0.0, -1.0];

/// Builds an image plane module from orientation and position arrays
pub fn plane(orientation: [f64; 6], position: [f64; 3]) -> ImagePlaneModule {
    ImagePlaneModule {
        image_orientation_patient: orientation,
        image_position_patient: position,
    }
}

/// Metadata registry with one empty in-memory provider registered
pub fn metadata_registry() -> (Rc<MetadataRegistry>, Rc<InMemoryMetadataProvider>) {
    let registry = Rc::new(MetadataRegistry::new());
    let provider = Rc::new(InMemoryMetadataProvider::new());
    registry.add_provider(provider.clone(), 0);
    (registry, provider)
}

/// Adds image plane and series metadata for one image
pub fn add_image(
    provider: &InMemoryMetadataProvider,
    image_id: &str,
    series_instance_uid: &str,
    orientation: [f64; 6],
    position: [f64; 3],
) {
    provider.insert_image_plane(image_id, plane(orientation, position));
    provider.insert_general_series(
        image_id,
        GeneralSeriesModule {
            series_instance_uid: series_instance_uid.to_string(),
        },
    );
}

pub fn stack_viewport(id: &str, frame_of_reference_id: &str, image_ids: &[&str]) -> ViewportRef {
    ViewportCell::new(
        ViewportKey::new(RENDERING_ENGINE, id),
        StackViewport::new(
            frame_of_reference_id,
            image_ids.iter().map(|s| s.to_string()).collect(),
        ),
    )
}

pub fn grouped_stack_viewport(
    id: &str,
    group_id: &str,
    frame_of_reference_id: &str,
    image_ids: &[&str],
) -> ViewportRef {
    ViewportCell::new(
        ViewportKey::new(RENDERING_ENGINE, id).with_group(group_id),
        StackViewport::new(
            frame_of_reference_id,
            image_ids.iter().map(|s| s.to_string()).collect(),
        ),
    )
}

pub fn volume_viewport(id: &str, frame_of_reference_id: &str) -> ViewportRef {
    ViewportCell::new(
        ViewportKey::new(RENDERING_ENGINE, id),
        VolumeViewport::new(frame_of_reference_id, format!("{}-volume", id)),
    )
}
