pub mod events;
pub mod stack;
pub mod volume;

pub use events::{EventChannel, EventPayload, ListenerId, ViewportEvent, ViewportEventKind};
pub use stack::StackViewport;
pub use volume::VolumeViewport;

use nalgebra::{Matrix4, Point3, Vector2, Vector3};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identifies a viewport inside the host toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewportKey {
    pub rendering_engine_id: String,
    pub group_id: Option<String>,
    pub viewport_id: String,
}

impl ViewportKey {
    pub fn new(rendering_engine_id: impl Into<String>, viewport_id: impl Into<String>) -> Self {
        Self {
            rendering_engine_id: rendering_engine_id.into(),
            group_id: None,
            viewport_id: viewport_id.into(),
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Every non-empty filter must match; empty filters match anything.
    pub fn matches(
        &self,
        rendering_engine_id: Option<&str>,
        group_id: Option<&str>,
        viewport_id: Option<&str>,
    ) -> bool {
        let engine_ok = non_empty(rendering_engine_id)
            .map_or(true, |id| id == self.rendering_engine_id);
        let group_ok = non_empty(group_id).map_or(true, |id| self.group_id.as_deref() == Some(id));
        let viewport_ok = non_empty(viewport_id).map_or(true, |id| id == self.viewport_id);
        engine_ok && group_ok && viewport_ok
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl fmt::Display for ViewportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group_id {
            Some(group) => write!(
                f,
                "{}/{}/{}",
                self.rendering_engine_id, group, self.viewport_id
            ),
            None => write!(f, "{}/{}", self.rendering_engine_id, self.viewport_id),
        }
    }
}

/// World-space camera pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Point3<f64>,
    pub focal_point: Point3<f64>,
    pub view_up: Vector3<f64>,
    pub parallel_scale: f64,
}

impl Camera {
    /// Moves position and focal point into another frame. The view-up
    /// direction only picks up the rotational part.
    pub fn transformed(&self, transform: &Matrix4<f64>) -> Camera {
        Camera {
            position: transform.transform_point(&self.position),
            focal_point: transform.transform_point(&self.focal_point),
            view_up: transform.transform_vector(&self.view_up),
            parallel_scale: self.parallel_scale,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 1.0),
            focal_point: Point3::origin(),
            view_up: Vector3::y(),
            parallel_scale: 1.0,
        }
    }
}

/// Display intensity range (window/level).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiRange {
    pub lower: f64,
    pub upper: f64,
}

impl VoiRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn from_window(width: f64, center: f64) -> Self {
        Self {
            lower: center - width / 2.0,
            upper: center + width / 2.0,
        }
    }

    pub fn window_width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn window_center(&self) -> f64 {
        (self.upper + self.lower) / 2.0
    }
}

/// View-plane pan offset and zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanZoom {
    pub pan: Vector2<f64>,
    pub zoom: f64,
}

impl Default for PanZoom {
    fn default() -> Self {
        Self {
            pan: Vector2::zeros(),
            zoom: 1.0,
        }
    }
}

/// Capabilities a viewport exposes to synchronizers.
///
/// Properties a variant does not carry keep the default implementation: the
/// getter yields `None` and the setter reports `false`.
pub trait Viewport {
    fn frame_of_reference_id(&self) -> Option<&str>;

    fn current_image_id(&self) -> Option<&str>;

    fn camera(&self) -> Option<Camera> {
        None
    }

    fn set_camera(&mut self, _camera: Camera) -> bool {
        false
    }

    fn voi(&self) -> Option<VoiRange> {
        None
    }

    fn set_voi(&mut self, _voi: VoiRange) -> bool {
        false
    }

    fn pan_zoom(&self) -> Option<PanZoom> {
        None
    }

    fn set_pan_zoom(&mut self, _pan_zoom: PanZoom) -> bool {
        false
    }

    fn image_index(&self) -> Option<usize> {
        None
    }

    fn image_count(&self) -> Option<usize> {
        None
    }

    fn set_image_index(&mut self, _index: usize) -> bool {
        false
    }
}

pub type ViewportRef = Rc<ViewportCell>;

/// Shared handle the host toolkit owns; synchronizers only keep weak
/// references to it.
///
/// The plain setters notify subscribers, the `_silently` variants don't.
/// Callbacks write through the silent path so a propagated update never
/// re-enters the synchronizer that produced it.
pub struct ViewportCell {
    key: ViewportKey,
    inner: RefCell<Box<dyn Viewport>>,
    events: EventChannel,
}

impl ViewportCell {
    pub fn new<V: Viewport + 'static>(key: ViewportKey, viewport: V) -> ViewportRef {
        Rc::new(Self {
            key,
            inner: RefCell::new(Box::new(viewport)),
            events: EventChannel::default(),
        })
    }

    pub fn key(&self) -> &ViewportKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.key.viewport_id
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn read<R>(&self, f: impl FnOnce(&dyn Viewport) -> R) -> R {
        f(self.inner.borrow().as_ref())
    }

    /// Swaps the displayed content, e.g. when the user drops another series
    /// onto the viewport. Subscribers stay attached.
    pub fn replace<V: Viewport + 'static>(&self, viewport: V) {
        *self.inner.borrow_mut() = Box::new(viewport);
    }

    pub fn frame_of_reference_id(&self) -> Option<String> {
        self.read(|vp| vp.frame_of_reference_id().map(str::to_owned))
    }

    pub fn current_image_id(&self) -> Option<String> {
        self.read(|vp| vp.current_image_id().map(str::to_owned))
    }

    pub fn camera(&self) -> Option<Camera> {
        self.read(|vp| vp.camera())
    }

    pub fn voi(&self) -> Option<VoiRange> {
        self.read(|vp| vp.voi())
    }

    pub fn pan_zoom(&self) -> Option<PanZoom> {
        self.read(|vp| vp.pan_zoom())
    }

    pub fn image_index(&self) -> Option<usize> {
        self.read(|vp| vp.image_index())
    }

    pub fn image_count(&self) -> Option<usize> {
        self.read(|vp| vp.image_count())
    }

    pub fn set_camera(&self, camera: Camera) -> bool {
        let previous = self.camera();
        self.notify_if(self.set_camera_silently(camera), || EventPayload::Camera {
            previous,
            current: camera,
        })
    }

    pub fn set_camera_silently(&self, camera: Camera) -> bool {
        self.inner.borrow_mut().set_camera(camera)
    }

    pub fn set_voi(&self, voi: VoiRange) -> bool {
        self.notify_if(self.set_voi_silently(voi), || EventPayload::Voi(voi))
    }

    pub fn set_voi_silently(&self, voi: VoiRange) -> bool {
        self.inner.borrow_mut().set_voi(voi)
    }

    pub fn set_pan_zoom(&self, pan_zoom: PanZoom) -> bool {
        self.notify_if(self.set_pan_zoom_silently(pan_zoom), || {
            EventPayload::PanZoom(pan_zoom)
        })
    }

    pub fn set_pan_zoom_silently(&self, pan_zoom: PanZoom) -> bool {
        self.inner.borrow_mut().set_pan_zoom(pan_zoom)
    }

    pub fn set_image_index(&self, index: usize) -> bool {
        let accepted = self.set_image_index_silently(index);
        self.notify_if(accepted, || EventPayload::StackImage {
            index,
            image_id: self.current_image_id(),
        })
    }

    pub fn set_image_index_silently(&self, index: usize) -> bool {
        self.inner.borrow_mut().set_image_index(index)
    }

    fn notify_if(&self, accepted: bool, payload: impl FnOnce() -> EventPayload) -> bool {
        if accepted {
            self.events.emit(&ViewportEvent {
                viewport: self.key.clone(),
                payload: payload(),
            });
        }
        accepted
    }
}

impl fmt::Debug for ViewportCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportCell")
            .field("key", &self.key)
            .field("events", &self.events)
            .finish()
    }
}
