use std::fmt;

pub const PALETTE_LEN: usize = 256;

/// Color lookup table mapping every source index to a packed
/// `0x00RRGGBB` pixel. Supplied on each blit call so callers can animate
/// the palette between frames.
pub type Palette = [u32; PALETTE_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x
            .checked_add(self.width)
            .is_some_and(|right| right <= width)
            && self
                .y
                .checked_add(self.height)
                .is_some_and(|bottom| bottom <= height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    OutOfBounds { rect: Rect },
    SourceTooSmall { expected: usize, actual: usize },
    TransferTimeout,
    RefreshTimeout,
    Present(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { rect } => write!(
                f,
                "blit rectangle {}x{} at ({}, {}) exceeds the canvas",
                rect.width, rect.height, rect.x, rect.y
            ),
            Self::SourceTooSmall { expected, actual } => write!(
                f,
                "source buffer holds {actual} bytes, canvas needs {expected}"
            ),
            Self::TransferTimeout => write!(f, "block transfer did not complete in time"),
            Self::RefreshTimeout => write!(f, "display refresh did not complete in time"),
            Self::Present(reason) => write!(f, "present failed: {reason}"),
        }
    }
}

/// The blit-and-present contract every display backend implements.
/// Construction doubles as video init; a backend that cannot come up
/// fails at the composition root.
pub trait Display {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Resolve each index byte of the source sub-rectangle through the
    /// palette and write the pixels into the framebuffer at the same
    /// offset. `src` is a full-canvas indexed buffer.
    fn blit(&mut self, src: &[u8], palette: &Palette, rect: Rect) -> Result<(), DisplayError>;

    /// Make the most recent blits visible.
    fn present(&mut self) -> Result<(), DisplayError>;
}

/// Visible pixel storage, one packed `0x00RRGGBB` value per screen
/// position. Owned by the display pipeline and written only through blit.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.pixels
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// Validate a blit request against the canvas before any pixel moves.
pub fn check_blit(
    width: u32,
    height: u32,
    src_len: usize,
    rect: Rect,
) -> Result<(), DisplayError> {
    if !rect.fits_within(width, height) {
        return Err(DisplayError::OutOfBounds { rect });
    }
    let expected = width as usize * height as usize;
    if src_len < expected {
        return Err(DisplayError::SourceTooSmall {
            expected,
            actual: src_len,
        });
    }
    Ok(())
}

/// Software palette resolve shared by the window backend and the
/// simulated block-transfer engine. Source and framebuffer share the
/// same full-width addressing, so the rectangle indexes both at the same
/// offsets. Callers validate bounds with [`check_blit`] first.
pub fn resolve_blit(framebuffer: &mut Framebuffer, src: &[u8], palette: &Palette, rect: Rect) {
    let stride = framebuffer.width as usize;
    let pixels = framebuffer.pixels.as_mut_slice();
    for row in 0..rect.height as usize {
        let offset = (rect.y as usize + row) * stride + rect.x as usize;
        for col in 0..rect.width as usize {
            pixels[offset + col] = palette[src[offset + col] as usize];
        }
    }
}
