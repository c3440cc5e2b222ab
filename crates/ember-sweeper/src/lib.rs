pub mod store;
pub mod sweeps;

pub use store::{DiskStore, ObjectStore, StorageError};
pub use sweeps::{
    run_ephemeral_photo_loop, run_moment_expiry_loop, run_stale_content_loop,
    sweep_ephemeral_photos, sweep_stale_content,
};
