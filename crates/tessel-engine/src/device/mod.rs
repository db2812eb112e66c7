//! Headless GPU device management.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue that texture uploads run
//! against. Window surfaces belong to the host application.

mod context;
mod init;

pub use context::GpuContext;
pub use init::GpuInit;
