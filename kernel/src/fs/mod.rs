//! The filesystem layout on the IDE partition (spec §1: "treated as an opaque
//! block-backed name lookup service") plus the boot catalogue `exec` resolves names
//! against (spec §6).

pub mod blockdev;
pub mod catalogue;
pub mod layout;

pub use blockdev::BlockDevice;
pub use catalogue::{BootCatalogue, DiskCatalogue, ExecCatalogue};
pub use layout::{readfile, sizefile};
