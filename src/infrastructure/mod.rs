pub mod clock_os;
pub mod fs_fat;
pub mod fs_os;
pub mod panel;

pub use clock_os::SystemClock;
pub use fs_fat::FatFileIo;
pub use fs_os::OsFileIo;
pub use panel::{BlitEngine, PanelDisplay, RefreshLine, SoftBlitEngine};
