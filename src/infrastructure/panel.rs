use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{Display, DisplayError, Framebuffer, Palette, Rect, check_blit, resolve_blit};

/// Poll iterations granted to each engine wait and to the refresh
/// handshake before the pipeline reports a timeout.
pub const DEFAULT_POLL_BUDGET: u32 = 1_000_000;

/// Hardware 2-D block-transfer engine. Palette load and pixel transfer
/// are asynchronous sub-operations; the pipeline polls `is_busy` with a
/// bounded budget between them. `request_refresh` issues the panel
/// refresh command whose completion the refresh line signals.
pub trait BlitEngine {
    fn load_palette(&mut self, palette: &Palette);
    fn start_transfer(&mut self, src: &[u8], framebuffer: &mut Framebuffer, rect: Rect);
    fn is_busy(&self) -> bool;
    fn request_refresh(&mut self);
}

/// Refresh handshake shared with the end-of-refresh interrupt handler:
/// the pipeline raises the line, the interrupt clears it.
#[derive(Debug, Default)]
pub struct RefreshLine {
    pending: AtomicBool,
}

impl RefreshLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Called from the end-of-refresh interrupt context.
    pub fn complete(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Display pipeline for the serial panel target: palette load and block
/// transfer through the engine, refresh through the interrupt handshake.
/// Every wait is bounded; a stuck engine or panel surfaces as an error
/// instead of hanging the frame loop.
pub struct PanelDisplay<E> {
    framebuffer: Framebuffer,
    engine: E,
    refresh: Arc<RefreshLine>,
    poll_budget: u32,
}

impl<E: BlitEngine> PanelDisplay<E> {
    pub fn new(width: u32, height: u32, engine: E, refresh: Arc<RefreshLine>) -> Self {
        Self {
            framebuffer: Framebuffer::new(width, height),
            engine,
            refresh,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }

    pub fn with_poll_budget(mut self, poll_budget: u32) -> Self {
        self.poll_budget = poll_budget;
        self
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    fn wait_engine(&self) -> Result<(), DisplayError> {
        for _ in 0..self.poll_budget {
            if !self.engine.is_busy() {
                return Ok(());
            }
            std::hint::spin_loop();
        }
        Err(DisplayError::TransferTimeout)
    }
}

impl<E: BlitEngine> Display for PanelDisplay<E> {
    fn width(&self) -> u32 {
        self.framebuffer.width()
    }

    fn height(&self) -> u32 {
        self.framebuffer.height()
    }

    fn blit(&mut self, src: &[u8], palette: &Palette, rect: Rect) -> Result<(), DisplayError> {
        check_blit(self.framebuffer.width(), self.framebuffer.height(), src.len(), rect)?;

        self.engine.load_palette(palette);
        self.wait_engine()?;
        self.engine.start_transfer(src, &mut self.framebuffer, rect);
        self.wait_engine()
    }

    fn present(&mut self) -> Result<(), DisplayError> {
        self.refresh.raise();
        self.engine.request_refresh();
        for _ in 0..self.poll_budget {
            if !self.refresh.is_pending() {
                return Ok(());
            }
            std::hint::spin_loop();
        }
        Err(DisplayError::RefreshTimeout)
    }
}

/// Software stand-in for the block-transfer engine: transfers complete
/// synchronously and a refresh request completes its own handshake.
pub struct SoftBlitEngine {
    palette: Palette,
    refresh: Arc<RefreshLine>,
}

impl SoftBlitEngine {
    pub fn new(refresh: Arc<RefreshLine>) -> Self {
        Self {
            palette: [0; crate::domain::PALETTE_LEN],
            refresh,
        }
    }
}

impl BlitEngine for SoftBlitEngine {
    fn load_palette(&mut self, palette: &Palette) {
        self.palette = *palette;
    }

    fn start_transfer(&mut self, src: &[u8], framebuffer: &mut Framebuffer, rect: Rect) {
        resolve_blit(framebuffer, src, &self.palette, rect);
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn request_refresh(&mut self) {
        self.refresh.complete();
    }
}
