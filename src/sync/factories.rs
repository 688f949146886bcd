use std::rc::Rc;

use super::callbacks::{
    camera_sync_callback, stack_image_sync_callback, voi_sync_callback, zoom_pan_sync_callback,
};
use super::synchronizer::Synchronizer;
use crate::context::SyncContext;
use crate::error::SyncError;
use crate::viewport::ViewportEventKind;

pub fn create_camera_position_synchronizer(
    ctx: &SyncContext,
    id: &str,
) -> Result<Rc<Synchronizer>, SyncError> {
    ctx.create_synchronizer(id, ViewportEventKind::CameraModified, camera_sync_callback())
}

pub fn create_voi_synchronizer(
    ctx: &SyncContext,
    id: &str,
) -> Result<Rc<Synchronizer>, SyncError> {
    ctx.create_synchronizer(id, ViewportEventKind::VoiModified, voi_sync_callback())
}

/// Uses the session's `[zoom_pan]` options.
pub fn create_zoom_pan_synchronizer(
    ctx: &SyncContext,
    id: &str,
) -> Result<Rc<Synchronizer>, SyncError> {
    ctx.create_synchronizer(
        id,
        ViewportEventKind::PanZoomModified,
        zoom_pan_sync_callback(ctx.config().zoom_pan),
    )
}

pub fn create_stack_image_synchronizer(
    ctx: &SyncContext,
    id: &str,
) -> Result<Rc<Synchronizer>, SyncError> {
    ctx.create_synchronizer(
        id,
        ViewportEventKind::StackImageChanged,
        stack_image_sync_callback(),
    )
}
