//! Named propagation policies.
//!
//! Each reads one property off the source, writes it onto the target through
//! the silent path and requests a render. A target without the property is
//! skipped without failing the dispatch.

use anyhow::{bail, ensure};
use tracing::trace;

use super::synchronizer::{sync_callback, SyncCallback};
use crate::config::ZoomPanOptions;
use crate::viewport::{Camera, PanZoom, ViewportCell};

/// Copies the camera pose, moved into the target's frame when the two
/// viewports are spatially registered.
pub fn camera_sync_callback() -> SyncCallback {
    sync_callback(|ctx, source, target, _event| {
        let Some(camera) = source.camera() else {
            return Ok(());
        };
        let camera = match ctx.registration.transform_between(source, target) {
            Some(transform) => camera.transformed(&transform),
            None => camera,
        };
        ensure!(
            is_finite_camera(&camera),
            "refusing to apply non-finite camera to {}",
            target.key()
        );
        write_or_skip(ctx, target, "camera", |t| t.set_camera_silently(camera));
        Ok(())
    })
}

/// Copies the display window verbatim.
pub fn voi_sync_callback() -> SyncCallback {
    sync_callback(|ctx, source, target, _event| {
        let Some(voi) = source.voi() else {
            return Ok(());
        };
        if !(voi.lower.is_finite() && voi.upper.is_finite()) || voi.lower > voi.upper {
            bail!("invalid VOI range [{}, {}] on {}", voi.lower, voi.upper, source.key());
        }
        write_or_skip(ctx, target, "voi", |t| t.set_voi_silently(voi));
        Ok(())
    })
}

/// Copies pan offset and/or zoom factor verbatim; both are view-plane
/// quantities, so no spatial correction applies.
pub fn zoom_pan_sync_callback(options: ZoomPanOptions) -> SyncCallback {
    sync_callback(move |ctx, source, target, _event| {
        let (Some(from), Some(to)) = (source.pan_zoom(), target.pan_zoom()) else {
            return Ok(());
        };
        let merged = PanZoom {
            pan: if options.sync_pan { from.pan } else { to.pan },
            zoom: if options.sync_zoom { from.zoom } else { to.zoom },
        };
        ensure!(
            merged.zoom.is_finite() && merged.zoom > 0.0,
            "invalid zoom factor {} from {}",
            merged.zoom,
            source.key()
        );
        if merged != to {
            write_or_skip(ctx, target, "pan/zoom", |t| t.set_pan_zoom_silently(merged));
        }
        Ok(())
    })
}

/// Moves the target to the source's stack position, clamped to the target's
/// stack. Purely positional: the stacks need not show the same anatomy.
pub fn stack_image_sync_callback() -> SyncCallback {
    sync_callback(|ctx, source, target, _event| {
        let (Some(index), Some(count)) = (source.image_index(), target.image_count()) else {
            return Ok(());
        };
        if count == 0 {
            return Ok(());
        }
        let index = index.min(count - 1);
        if target.image_index() != Some(index) {
            write_or_skip(ctx, target, "stack index", |t| {
                t.set_image_index_silently(index)
            });
        }
        Ok(())
    })
}

fn write_or_skip(
    ctx: &super::CallbackContext<'_>,
    target: &ViewportCell,
    property: &str,
    write: impl FnOnce(&ViewportCell) -> bool,
) {
    if write(target) {
        ctx.request_render(target);
    } else {
        trace!(
            synchronizer = ctx.synchronizer_id,
            target = %target.key(),
            property,
            "target does not carry property, skipped"
        );
    }
}

fn is_finite_camera(camera: &Camera) -> bool {
    camera.position.iter().all(|v| v.is_finite())
        && camera.focal_point.iter().all(|v| v.is_finite())
        && camera.view_up.iter().all(|v| v.is_finite())
        && camera.parallel_scale.is_finite()
}
