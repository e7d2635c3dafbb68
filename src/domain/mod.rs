pub mod clock;
pub mod event;
pub mod fio;
pub mod framebuffer;

pub use clock::{Clock, SubTickCounter, TickClock, ZeroSubTick};
pub use event::{
    EVENT_QUEUE_CAPACITY, EventQueue, InputSource, KeyEvent, NullInput, PointerPosition, keys,
};
pub use fio::{FileError, FileIo, Handle, HandleTable, MAX_OPEN_FILES};
pub use framebuffer::{
    Display, DisplayError, Framebuffer, PALETTE_LEN, Palette, Rect, check_blit, resolve_blit,
};
