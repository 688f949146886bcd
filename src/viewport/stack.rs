use super::{Camera, PanZoom, Viewport, VoiRange};

/// A viewport paging through an ordered list of 2-D images.
#[derive(Debug, Clone)]
pub struct StackViewport {
    frame_of_reference_id: String,
    image_ids: Vec<String>,
    current_index: usize,
    camera: Camera,
    voi: VoiRange,
    pan_zoom: PanZoom,
}

impl StackViewport {
    pub fn new(frame_of_reference_id: impl Into<String>, image_ids: Vec<String>) -> Self {
        Self {
            frame_of_reference_id: frame_of_reference_id.into(),
            image_ids,
            current_index: 0,
            camera: Camera::default(),
            voi: VoiRange::new(0.0, 255.0),
            pan_zoom: PanZoom::default(),
        }
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    /// Replaces the stack, e.g. when a different series is dropped in.
    pub fn set_stack(
        &mut self,
        frame_of_reference_id: impl Into<String>,
        image_ids: Vec<String>,
        index: usize,
    ) {
        self.frame_of_reference_id = frame_of_reference_id.into();
        self.current_index = index.min(image_ids.len().saturating_sub(1));
        self.image_ids = image_ids;
    }
}

impl Viewport for StackViewport {
    fn frame_of_reference_id(&self) -> Option<&str> {
        Some(&self.frame_of_reference_id)
    }

    fn current_image_id(&self) -> Option<&str> {
        self.image_ids.get(self.current_index).map(String::as_str)
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

    fn image_index(&self) -> Option<usize> {
        Some(self.current_index)
    }

    fn image_count(&self) -> Option<usize> {
        Some(self.image_ids.len())
    }

    fn set_image_index(&mut self, index: usize) -> bool {
        if index >= self.image_ids.len() {
            return false;
        }
        self.current_index = index;
        true
    }
}
