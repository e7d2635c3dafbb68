use crate::application::{DriverError, Engine, FrameOutcome, Platform};
use crate::domain::{Clock, Display, FileIo, InputSource, Palette, Rect, keys};

/// Stand-in application core: draws an indexed test pattern and cycles
/// the palette every frame, exercising blit, present, timing, and the
/// event queue through the engine-facing surface only.
pub struct DemoEngine {
    canvas: Vec<u8>,
    phase: u8,
}

impl DemoEngine {
    pub fn new() -> Self {
        Self {
            canvas: Vec::new(),
            phase: 0,
        }
    }

    fn palette(&self) -> Palette {
        let mut palette = [0u32; 256];
        for (index, entry) in palette.iter_mut().enumerate() {
            let level = (index as u8).wrapping_add(self.phase);
            let r = u32::from(level);
            let g = u32::from(level.wrapping_mul(3));
            let b = u32::from(255 - level);
            *entry = r << 16 | g << 8 | b;
        }
        palette
    }
}

impl Default for DemoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, D, I, F> Engine<Platform<C, D, I, F>> for DemoEngine
where
    C: Clock,
    D: Display,
    I: InputSource,
    F: FileIo,
{
    fn init(&mut self, platform: &mut Platform<C, D, I, F>) -> Result<(), DriverError> {
        let width = platform.width() as usize;
        let height = platform.height() as usize;
        self.canvas = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                self.canvas[y * width + x] = (x ^ y) as u8;
            }
        }
        Ok(())
    }

    fn frame(
        &mut self,
        platform: &mut Platform<C, D, I, F>,
        _dt: f64,
    ) -> Result<FrameOutcome, DriverError> {
        while let Some(event) = platform.dequeue_key_event() {
            if event.code == keys::ESCAPE && event.down {
                return Ok(FrameOutcome::Exit);
            }
        }

        self.phase = self.phase.wrapping_add(1);
        let palette = self.palette();
        let rect = Rect::new(0, 0, platform.width(), platform.height());
        platform.blit(&self.canvas, &palette, rect)?;
        platform.present()?;
        Ok(FrameOutcome::Continue)
    }
}
