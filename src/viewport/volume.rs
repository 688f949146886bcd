use super::{Camera, PanZoom, Viewport, VoiRange};

/// A viewport rendering a reconstructed volume.
///
/// Has no stack position, and no single current image, so it never takes
/// part in image-based spatial registration.
#[derive(Debug, Clone)]
pub struct VolumeViewport {
    frame_of_reference_id: String,
    volume_id: String,
    camera: Camera,
    voi: VoiRange,
    pan_zoom: PanZoom,
}

impl VolumeViewport {
    pub fn new(frame_of_reference_id: impl Into<String>, volume_id: impl Into<String>) -> Self {
        Self {
            frame_of_reference_id: frame_of_reference_id.into(),
            volume_id: volume_id.into(),
            camera: Camera::default(),
            voi: VoiRange::new(0.0, 255.0),
            pan_zoom: PanZoom::default(),
        }
    }

    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }
}

impl Viewport for VolumeViewport {
    fn frame_of_reference_id(&self) -> Option<&str> {
        Some(&self.frame_of_reference_id)
    }

    fn current_image_id(&self) -> Option<&str> {
        None
    }

    fn camera(&self) -> Option<Camera> {
        Some(self.camera)
    }

    fn set_camera(&mut self, camera: Camera) -> bool {
        self.camera = camera;
        true
    }

    fn voi(&self) -> Option<VoiRange> {
        Some(self.voi)
    }

    fn set_voi(&mut self, voi: VoiRange) -> bool {
        self.voi = voi;
        true
    }

    fn pan_zoom(&self) -> Option<PanZoom> {
        Some(self.pan_zoom)
    }

    fn set_pan_zoom(&mut self, pan_zoom: PanZoom) -> bool {
        self.pan_zoom = pan_zoom;
        true
    }
}
