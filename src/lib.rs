//! Viewport synchronization for multi-viewport medical image viewers.
//!
//! Viewports publish change events; synchronizers listen on source viewports
//! and replay the change onto their targets. Camera changes between series in
//! different frames of reference are corrected by a spatial registration
//! computed from image plane metadata.
//!
//! ```no_run
//! use viewsyncrs::{SyncConfig, SyncContext};
//! use viewsyncrs::sync::create_voi_synchronizer;
//! use viewsyncrs::viewport::{StackViewport, ViewportCell, ViewportKey, VoiRange};
//!
//! let ctx = SyncContext::new(SyncConfig::default());
//! let ct = ViewportCell::new(
//!     ViewportKey::new("engine", "ct"),
//!     StackViewport::new("for-1", vec!["ct-0".into()]),
//! );
//! let pet = ViewportCell::new(
//!     ViewportKey::new("engine", "pet"),
//!     StackViewport::new("for-1", vec!["pet-0".into()]),
//! );
//!
//! let voi = create_voi_synchronizer(&ctx, "voi").unwrap();
//! voi.add_viewports(&[ct.clone(), pet.clone()]);
//! ct.set_voi(VoiRange::from_window(400.0, 40.0));
//! assert_eq!(pet.voi(), ct.voi());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod metadata;
pub mod registration;
pub mod render;
pub mod sync;
pub mod viewport;

mod utils;

pub use config::SyncConfig;
pub use context::SyncContext;
pub use error::SyncError;
