pub mod demo;
pub mod driver;

pub use demo::DemoEngine;
pub use driver::{
    DEFAULT_ARENA_BYTES, DEFAULT_TIC_RATE, Driver, DriverConfig, DriverError, Engine,
    FrameOutcome, Platform,
};
