pub mod callbacks;
pub mod factories;
pub mod manager;
pub mod synchronizer;

pub use callbacks::{
    camera_sync_callback, stack_image_sync_callback, voi_sync_callback, zoom_pan_sync_callback,
};
pub use factories::{
    create_camera_position_synchronizer, create_stack_image_synchronizer,
    create_voi_synchronizer, create_zoom_pan_synchronizer,
};
pub use manager::SynchronizerManager;
pub use synchronizer::{sync_callback, CallbackContext, DispatchSummary, SyncCallback, Synchronizer};
