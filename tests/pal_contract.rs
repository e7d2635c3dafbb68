use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use baseplate::application::{Driver, DriverConfig, DriverError, Engine, FrameOutcome, Platform};
use baseplate::domain::{
    EventQueue, FileError, FileIo, NullInput, Rect, TickClock, ZeroSubTick, keys,
};
use baseplate::infrastructure::{
    FatFileIo, OsFileIo, PanelDisplay, RefreshLine, SoftBlitEngine, SystemClock,
};
use fatfs::{FileSystem, FormatVolumeOptions, FsOptions};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_dir() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("baseplate_it_{}_{}", std::process::id(), id));
    std::fs::create_dir_all(&dir).expect("temp dir");
    dir
}

fn fat_volume() -> FileSystem<Cursor<Vec<u8>>> {
    let mut image = Cursor::new(vec![0u8; 1024 * 1024]);
    fatfs::format_volume(&mut image, FormatVolumeOptions::new()).expect("format volume");
    FileSystem::new(image, FsOptions::new()).expect("mount volume")
}

/// Behavior every file backend must share, whatever sits underneath.
fn exercise_file_backend<F: FileIo>(io: &mut F, base: &str) {
    io.make_dir(base).expect("make dir");

    let path = format!("{base}/config.cfg");
    let handle = io.open_write(&path).expect("open write");
    io.write(handle, b"volume 7\nsensitivity 3\n").expect("write");
    io.sync(handle).expect("sync");
    io.close(handle);

    let (handle, size) = io.open_read(&path).expect("open read");
    assert_eq!(size, 23);

    let mut line = String::new();
    io.read_line(handle, &mut line, 64).expect("first line");
    assert_eq!(line, "volume 7\n");
    line.clear();
    io.read_line(handle, &mut line, 64).expect("second line");
    assert_eq!(line, "sensitivity 3\n");

    io.seek(handle, 7).expect("seek");
    let mut buf = [0u8; 1];
    io.read(handle, &mut buf).expect("read");
    assert_eq!(&buf, b"7");
    io.close(handle);

    let mut buf = [0u8; 1];
    assert!(matches!(io.read(handle, &mut buf), Err(FileError::BadHandle)));
    assert!(matches!(
        io.open_read(&format!("{base}/absent")),
        Err(FileError::NotFound)
    ));
    assert!(io.modified_time(&path).expect("modified time") > 0);
}

#[test]
fn os_backend_honors_the_file_contract() {
    let dir = temp_dir();
    let base = dir.join("data");
    let mut io = OsFileIo::new();
    exercise_file_backend(&mut io, base.to_str().expect("utf8 path"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn fat_backend_honors_the_file_contract() {
    let fs = fat_volume();
    let mut io = FatFileIo::new(&fs);
    exercise_file_backend(&mut io, "data");
}

#[test]
fn key_events_flow_from_source_to_engine_in_order() {
    let queue = EventQueue::new();
    queue.push(keys::ENTER, true);
    queue.push(keys::ENTER, false);
    queue.push(keys::COMMA, true);

    let first = queue.pop().expect("first");
    assert_eq!((first.code, first.down), (keys::ENTER, true));
    let second = queue.pop().expect("second");
    assert_eq!((second.code, second.down), (keys::ENTER, false));
    let third = queue.pop().expect("third");
    assert_eq!((third.code, third.down), (keys::COMMA, true));
    assert!(queue.pop().is_none());
}

#[test]
fn interrupt_driven_clock_runs_a_full_session() {
    type P = Platform<
        Arc<TickClock<ZeroSubTick>>,
        PanelDisplay<SoftBlitEngine>,
        NullInput,
        OsFileIo,
    >;

    struct PatternEngine {
        frames: u32,
        canvas: Vec<u8>,
    }

    impl Engine<P> for PatternEngine {
        fn init(&mut self, platform: &mut P) -> Result<(), DriverError> {
            self.canvas = vec![7u8; (platform.width() * platform.height()) as usize];
            Ok(())
        }

        fn frame(&mut self, platform: &mut P, dt: f64) -> Result<FrameOutcome, DriverError> {
            assert!(dt > 0.0);
            self.frames += 1;
            let palette = [0x00AA_5500u32; 256];
            let rect = Rect::new(0, 0, platform.width(), platform.height());
            platform.blit(&self.canvas, &palette, rect)?;
            platform.present()?;
            if self.frames >= 4 {
                return Ok(FrameOutcome::Exit);
            }
            Ok(FrameOutcome::Continue)
        }
    }

    // 1ms period ticked from a side thread, standing in for the timer
    // interrupt.
    let clock = Arc::new(TickClock::new(ZeroSubTick, 1_000));
    let ticker = Arc::clone(&clock);
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let handle = thread::spawn(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            ticker.interrupt_tick();
            thread::sleep(Duration::from_micros(200));
        }
    });

    let refresh = Arc::new(RefreshLine::new());
    let display = PanelDisplay::new(32, 16, SoftBlitEngine::new(Arc::clone(&refresh)), refresh);
    let driver = Driver::new(DriverConfig {
        arena_bytes: 4 * 1024,
        tic_rate: 0.002,
        ..DriverConfig::default()
    });
    let mut engine = PatternEngine {
        frames: 0,
        canvas: Vec::new(),
    };
    let result = driver.run(clock, display, NullInput, OsFileIo::new(), &mut engine);

    stop.store(true, Ordering::Relaxed);
    handle.join().expect("ticker thread");
    result.expect("driver run");
    assert_eq!(engine.frames, 4);
}

#[test]
fn wall_clock_session_saves_and_reloads_state() {
    type P = Platform<SystemClock, PanelDisplay<SoftBlitEngine>, NullInput, OsFileIo>;

    struct SavingEngine {
        save_path: String,
        frames: u32,
    }

    impl Engine<P> for SavingEngine {
        fn init(&mut self, _platform: &mut P) -> Result<(), DriverError> {
            Ok(())
        }

        fn frame(&mut self, platform: &mut P, _dt: f64) -> Result<FrameOutcome, DriverError> {
            self.frames += 1;
            if self.frames == 2 {
                let files = platform.files();
                let handle = files.open_write(&self.save_path)?;
                files.write(handle, b"frame two checkpoint")?;
                files.sync(handle)?;
                files.close(handle);
                return Ok(FrameOutcome::Exit);
            }
            Ok(FrameOutcome::Continue)
        }
    }

    let dir = temp_dir();
    let save_path = dir
        .join("checkpoint")
        .to_str()
        .expect("utf8 path")
        .to_string();

    let refresh = Arc::new(RefreshLine::new());
    let display = PanelDisplay::new(16, 8, SoftBlitEngine::new(Arc::clone(&refresh)), refresh);
    let driver = Driver::new(DriverConfig {
        arena_bytes: 1024,
        tic_rate: 0.001,
        ..DriverConfig::default()
    });
    let mut engine = SavingEngine {
        save_path: save_path.clone(),
        frames: 0,
    };
    driver
        .run(
            SystemClock::new(),
            display,
            NullInput,
            OsFileIo::new(),
            &mut engine,
        )
        .expect("driver run");

    let mut io = OsFileIo::new();
    let (handle, size) = io.open_read(&save_path).expect("reload checkpoint");
    assert_eq!(size, 20);
    io.close(handle);

    let _ = std::fs::remove_dir_all(dir);
}
