use log::{error, info};

use crate::application::{DemoEngine, Driver, DriverConfig};
use crate::infrastructure::{OsFileIo, SystemClock};
use crate::interface::window::{self, WINDOW_HEIGHT, WINDOW_WIDTH};

pub fn run() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().collect();
    let mut args = argv.iter().cloned();
    let program = args.next().unwrap_or_else(|| "baseplate".to_string());
    let mut config = DriverConfig {
        args: argv.clone(),
        ..DriverConfig::default()
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(&program);
                return;
            }
            "-mem" => {
                let Some(megabytes) = args.next().and_then(|value| value.parse::<f64>().ok())
                else {
                    print_usage(&program);
                    std::process::exit(2);
                };
                config.arena_bytes = (megabytes * 1024.0 * 1024.0) as usize;
            }
            "-basedir" => {
                let Some(dir) = args.next() else {
                    print_usage(&program);
                    std::process::exit(2);
                };
                config.base_dir = dir;
            }
            _ => {
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    info!(
        "starting with a {} byte arena under '{}'",
        config.arena_bytes, config.base_dir
    );

    let (display, input) = window::open("baseplate", WINDOW_WIDTH, WINDOW_HEIGHT);
    let driver = Driver::new(config);
    let mut engine = DemoEngine::new();

    if let Err(err) = driver.run(SystemClock::new(), display, input, OsFileIo::new(), &mut engine)
    {
        error!("{err}");
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [-mem <megabytes>] [-basedir <dir>]", program);
}
