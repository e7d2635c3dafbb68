use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Monotonic microsecond time source plus a blocking microsecond delay.
/// Never fails; the reading must never move backward between calls.
pub trait Clock {
    fn now_micros(&self) -> u64;
    fn delay_micros(&self, micros: u64);
}

/// Counter register that resets at every tick boundary and counts
/// microseconds within the current tick.
pub trait SubTickCounter {
    fn read(&self) -> u32;
}

/// Sub-tick counter for tick sources with no fine-grained register; time
/// then advances in whole ticks only.
#[derive(Debug, Default)]
pub struct ZeroSubTick;

impl SubTickCounter for ZeroSubTick {
    fn read(&self) -> u32 {
        0
    }
}

/// Clock driven by a periodic interrupt tick and a free-running sub-tick
/// counter. The 32-bit tick register is extended to 64 bits so the
/// externally observed time keeps moving forward across register
/// wraparound, and the tick/sub-tick pair is re-read until stable so an
/// in-flight increment cannot produce a torn reading.
#[derive(Debug)]
pub struct TickClock<S> {
    raw_ticks: AtomicU32,
    extended: AtomicU64,
    tick_period_micros: u64,
    counter: S,
}

impl<S> TickClock<S> {
    pub fn new(counter: S, tick_period_micros: u64) -> Self {
        Self::starting_at(counter, tick_period_micros, 0)
    }

    /// Start from an arbitrary tick register value, as after warm reset.
    pub fn starting_at(counter: S, tick_period_micros: u64, ticks: u32) -> Self {
        assert!(tick_period_micros > 0, "tick period must be non-zero");
        Self {
            raw_ticks: AtomicU32::new(ticks),
            extended: AtomicU64::new(u64::from(ticks)),
            tick_period_micros,
            counter,
        }
    }

    /// Called by the periodic timer interrupt, and only by it.
    pub fn interrupt_tick(&self) {
        self.raw_ticks.fetch_add(1, Ordering::AcqRel);
    }

    /// Fold the current 32-bit register value into the 64-bit extension.
    /// A register value below the last published low word means the
    /// register wrapped since then.
    fn extended_ticks(&self) -> u64 {
        let mut published = self.extended.load(Ordering::Acquire);
        loop {
            let raw = u64::from(self.raw_ticks.load(Ordering::Acquire));
            let mut next = (published & !0xFFFF_FFFF) | raw;
            if next < published {
                next += 1 << 32;
            }
            if next == published {
                return published;
            }
            match self.extended.compare_exchange_weak(
                published,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(current) => published = current,
            }
        }
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }

    fn delay_micros(&self, micros: u64) {
        (**self).delay_micros(micros);
    }
}

impl<S: SubTickCounter> Clock for TickClock<S> {
    fn now_micros(&self) -> u64 {
        loop {
            let before = self.extended_ticks();
            let sub = u64::from(self.counter.read()).min(self.tick_period_micros - 1);
            if self.extended_ticks() == before {
                return before * self.tick_period_micros + sub;
            }
        }
    }

    fn delay_micros(&self, micros: u64) {
        let deadline = self.now_micros().saturating_add(micros);
        while self.now_micros() < deadline {
            std::hint::spin_loop();
        }
    }
}
