use std::fmt;
use std::sync::Arc;

use log::info;

use crate::domain::{
    Clock, Display, DisplayError, EventQueue, FileError, FileIo, InputSource, KeyEvent, Palette,
    PointerPosition, Rect,
};

pub const DEFAULT_ARENA_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_TIC_RATE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Size of the single allocation handed to the engine at start-up.
    pub arena_bytes: usize,
    /// Minimum seconds between engine frames.
    pub tic_rate: f64,
    /// Directory the engine roots its data files under.
    pub base_dir: String,
    /// Process arguments forwarded verbatim to the engine. Empty on
    /// targets with no argument mechanism.
    pub args: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            arena_bytes: DEFAULT_ARENA_BYTES,
            tic_rate: DEFAULT_TIC_RATE,
            base_dir: "baseplate".to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum DriverError {
    ArenaAllocation { bytes: usize },
    Display(DisplayError),
    File(FileError),
    Engine(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArenaAllocation { bytes } => {
                write!(f, "cannot allocate {bytes} byte memory arena")
            }
            Self::Display(err) => write!(f, "display: {err}"),
            Self::File(err) => write!(f, "file access: {err}"),
            Self::Engine(reason) => write!(f, "engine fault: {reason}"),
        }
    }
}

impl From<DisplayError> for DriverError {
    fn from(err: DisplayError) -> Self {
        Self::Display(err)
    }
}

impl From<FileError> for DriverError {
    fn from(err: FileError) -> Self {
        Self::File(err)
    }
}

/// The engine-facing surface: the four services, the event queue, and
/// the memory arena, bundled per target at the composition root.
pub struct Platform<C, D, I, F> {
    config: DriverConfig,
    clock: C,
    display: D,
    input: I,
    files: F,
    events: Arc<EventQueue>,
    arena: Vec<u8>,
}

impl<C, D, I, F> Platform<C, D, I, F>
where
    C: Clock,
    D: Display,
    I: InputSource,
    F: FileIo,
{
    pub fn new(
        config: DriverConfig,
        clock: C,
        display: D,
        input: I,
        files: F,
    ) -> Result<Self, DriverError> {
        let bytes = config.arena_bytes;
        let mut arena = Vec::new();
        arena
            .try_reserve_exact(bytes)
            .map_err(|_| DriverError::ArenaAllocation { bytes })?;
        arena.resize(bytes, 0);
        Ok(Self {
            config,
            clock,
            display,
            input,
            files,
            events: Arc::new(EventQueue::new()),
            arena,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn args(&self) -> &[String] {
        &self.config.args
    }

    pub fn width(&self) -> u32 {
        self.display.width()
    }

    pub fn height(&self) -> u32 {
        self.display.height()
    }

    pub fn blit(&mut self, src: &[u8], palette: &Palette, rect: Rect) -> Result<(), DisplayError> {
        self.display.blit(src, palette, rect)
    }

    pub fn present(&mut self) -> Result<(), DisplayError> {
        self.display.present()
    }

    pub fn now_micros(&self) -> u64 {
        self.clock.now_micros()
    }

    pub fn delay_micros(&self, micros: u64) {
        self.clock.delay_micros(micros);
    }

    /// The single pre-sized allocation the engine owns for its lifetime.
    pub fn arena(&mut self) -> &mut [u8] {
        &mut self.arena
    }

    pub fn dequeue_key_event(&self) -> Option<KeyEvent> {
        self.events.pop()
    }

    pub fn pointer_position(&self) -> Option<PointerPosition> {
        self.input.pointer_position()
    }

    /// Shared queue handle for wiring asynchronous producers such as
    /// input interrupt handlers.
    pub fn events(&self) -> Arc<EventQueue> {
        Arc::clone(&self.events)
    }

    pub fn files(&mut self) -> &mut F {
        &mut self.files
    }

    fn poll_input(&mut self) {
        self.input.poll(&self.events);
    }

    fn quit_requested(&self) -> bool {
        self.input.quit_requested()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Exit,
}

/// The application core, seen only through its three entry points.
pub trait Engine<P> {
    fn init(&mut self, platform: &mut P) -> Result<(), DriverError>;
    fn frame(&mut self, platform: &mut P, dt: f64) -> Result<FrameOutcome, DriverError>;
    fn shutdown(&mut self, _platform: &mut P) {}
}

/// Owns the frame-timing loop and is the sole consumer of the platform
/// services. Fatal conditions come back as errors; the composition root
/// decides how the process ends.
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn run<C, D, I, F, E>(
        &self,
        clock: C,
        display: D,
        input: I,
        files: F,
        engine: &mut E,
    ) -> Result<(), DriverError>
    where
        C: Clock,
        D: Display,
        I: InputSource,
        F: FileIo,
        E: Engine<Platform<C, D, I, F>>,
    {
        let mut platform = Platform::new(self.config.clone(), clock, display, input, files)?;
        info!(
            "driver up: {}x{} display, {} byte arena",
            platform.width(),
            platform.height(),
            self.config.arena_bytes
        );
        engine.init(&mut platform)?;
        let result = self.frame_loop(&mut platform, engine);
        engine.shutdown(&mut platform);
        result
    }

    fn frame_loop<C, D, I, F, E>(
        &self,
        platform: &mut Platform<C, D, I, F>,
        engine: &mut E,
    ) -> Result<(), DriverError>
    where
        C: Clock,
        D: Display,
        I: InputSource,
        F: FileIo,
        E: Engine<Platform<C, D, I, F>>,
    {
        let mut oldtime = seconds(platform.now_micros());
        loop {
            platform.poll_input();
            if platform.quit_requested() {
                return Ok(());
            }

            let newtime = seconds(platform.now_micros());
            let elapsed = newtime - oldtime;
            if elapsed < self.config.tic_rate {
                let remaining = (self.config.tic_rate - elapsed) * 1_000_000.0;
                platform.delay_micros(remaining as u64);
                continue;
            }
            oldtime = newtime;

            // A frame that overran badly is reported as two tics at most
            // so the engine never tries to catch up a huge gap at once.
            let dt = elapsed.min(self.config.tic_rate * 2.0);
            match engine.frame(platform, dt)? {
                FrameOutcome::Continue => {}
                FrameOutcome::Exit => return Ok(()),
            }
        }
    }
}

fn seconds(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::{Driver, DriverConfig, DriverError, Engine, FrameOutcome, Platform};
    use crate::domain::{NullInput, Rect};
    use crate::infrastructure::{OsFileIo, PanelDisplay, RefreshLine, SoftBlitEngine, SystemClock};
    use std::sync::Arc;

    type TestPlatform =
        Platform<SystemClock, PanelDisplay<SoftBlitEngine>, NullInput, OsFileIo>;

    fn test_display() -> PanelDisplay<SoftBlitEngine> {
        let refresh = Arc::new(RefreshLine::new());
        PanelDisplay::new(32, 16, SoftBlitEngine::new(Arc::clone(&refresh)), refresh)
    }

    fn test_config() -> DriverConfig {
        DriverConfig {
            arena_bytes: 4 * 1024,
            tic_rate: 0.001,
            ..DriverConfig::default()
        }
    }

    struct CountingEngine {
        frames: u32,
        limit: u32,
        last_dt: f64,
    }

    impl Engine<TestPlatform> for CountingEngine {
        fn init(&mut self, platform: &mut TestPlatform) -> Result<(), DriverError> {
            assert_eq!(platform.arena().len(), 4 * 1024);
            Ok(())
        }

        fn frame(
            &mut self,
            platform: &mut TestPlatform,
            dt: f64,
        ) -> Result<FrameOutcome, DriverError> {
            self.frames += 1;
            self.last_dt = dt;

            let src = vec![0u8; 32 * 16];
            let palette = [0x0000_FF00u32; 256];
            platform.blit(&src, &palette, Rect::new(0, 0, 32, 16))?;
            platform.present()?;

            if self.frames >= self.limit {
                Ok(FrameOutcome::Exit)
            } else {
                Ok(FrameOutcome::Continue)
            }
        }
    }

    #[test]
    fn runs_frames_until_engine_exits() {
        let mut engine = CountingEngine {
            frames: 0,
            limit: 3,
            last_dt: 0.0,
        };
        let driver = Driver::new(test_config());
        driver
            .run(
                SystemClock::new(),
                test_display(),
                NullInput,
                OsFileIo::new(),
                &mut engine,
            )
            .expect("driver run");

        assert_eq!(engine.frames, 3);
        assert!(engine.last_dt > 0.0);
        assert!(engine.last_dt <= 0.002 + f64::EPSILON);
    }

    #[test]
    fn oversized_arena_is_a_reported_failure() {
        let config = DriverConfig {
            arena_bytes: usize::MAX,
            ..DriverConfig::default()
        };
        let result = TestPlatform::new(
            config,
            SystemClock::new(),
            test_display(),
            NullInput,
            OsFileIo::new(),
        );

        assert!(matches!(
            result,
            Err(DriverError::ArenaAllocation { bytes: usize::MAX })
        ));
    }

    #[test]
    fn engine_frame_errors_stop_the_loop() {
        struct FailingEngine;
        impl Engine<TestPlatform> for FailingEngine {
            fn init(&mut self, _platform: &mut TestPlatform) -> Result<(), DriverError> {
                Ok(())
            }
            fn frame(
                &mut self,
                _platform: &mut TestPlatform,
                _dt: f64,
            ) -> Result<FrameOutcome, DriverError> {
                Err(DriverError::Engine("deliberate fault".to_string()))
            }
        }

        let driver = Driver::new(test_config());
        let result = driver.run(
            SystemClock::new(),
            test_display(),
            NullInput,
            OsFileIo::new(),
            &mut FailingEngine,
        );

        assert!(matches!(result, Err(DriverError::Engine(_))));
    }
}
