//! Interrupt-driven event capture.
//!
//! Three GPIO edge interrupts (pellet well, left poke, right poke) latch
//! sticky flags that the control loop consumes exactly once per cycle.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ Pellet ISR   │────▶│                  │     │              │
//! │ Left ISR     │────▶│  FlagCell × 5    │────▶│  Main Loop   │
//! │ Right ISR    │────▶│  (lock-free)     │     │  (consumer)  │
//! └──────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! Each flag has exactly one writer (its ISR) and one reader (the main
//! loop).  A raise is never undone by a later edge: a poke that is released
//! before the loop runs still counts once.  `take` swaps the flag back to
//! false atomically, so an edge that lands during the drain is kept for the
//! next cycle rather than lost.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::schedule::Side;

// ── FlagCell ──────────────────────────────────────────────────

/// Single-writer / single-reader sticky boolean.
#[derive(Debug)]
pub struct FlagCell(AtomicBool);

impl FlagCell {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Latch the flag.  Safe to call from interrupt context.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume the flag, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    /// Inspect without consuming.
    pub fn peek(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for FlagCell {
    fn default() -> Self {
        Self::new()
    }
}

// ── EventCapture ──────────────────────────────────────────────

/// Everything the three edge interrupts can report.
#[derive(Debug, Default)]
pub struct EventCapture {
    left_poke: FlagCell,
    right_poke: FlagCell,
    pellet_arrived: FlagCell,
    pellet_removed: FlagCell,
    wake: FlagCell,
}

/// One cycle's worth of drained flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapturedEvents {
    pub left_poke: bool,
    pub right_poke: bool,
    pub pellet_arrived: bool,
    pub pellet_removed: bool,
}

impl CapturedEvents {
    pub fn poke(&self, side: Side) -> bool {
        match side {
            Side::Left => self.left_poke,
            Side::Right => self.right_poke,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.left_poke || self.right_poke || self.pellet_arrived || self.pellet_removed)
    }
}

impl EventCapture {
    pub const fn new() -> Self {
        Self {
            left_poke: FlagCell::new(),
            right_poke: FlagCell::new(),
            pellet_arrived: FlagCell::new(),
            pellet_removed: FlagCell::new(),
            wake: FlagCell::new(),
        }
    }

    /// Poke beam edge.  `level_low` is the pin level read inside the ISR;
    /// only the breaking edge latches a press.
    pub fn on_poke_edge(&self, side: Side, level_low: bool) {
        if level_low {
            match side {
                Side::Left => self.left_poke.raise(),
                Side::Right => self.right_poke.raise(),
            }
        }
        self.wake.raise();
    }

    /// Pellet well beam edge.  LOW = pellet present.
    pub fn on_pellet_edge(&self, level_low: bool) {
        if level_low {
            self.pellet_arrived.raise();
        } else {
            self.pellet_removed.raise();
        }
        self.wake.raise();
    }

    /// Whether any interrupt fired since the last [`take_wake`](Self::take_wake).
    pub fn wake_pending(&self) -> bool {
        self.wake.peek()
    }

    pub fn take_wake(&self) -> bool {
        self.wake.take()
    }

    /// Consume every pending flag.
    pub fn drain(&self) -> CapturedEvents {
        self.wake.take();
        CapturedEvents {
            left_poke: self.left_poke.take(),
            right_poke: self.right_poke.take(),
            pellet_arrived: self.pellet_arrived.take(),
            pellet_removed: self.pellet_removed.take(),
        }
    }
}

/// The capture instance shared with the GPIO ISRs.
pub static CAPTURE: EventCapture = EventCapture::new();

// ── ISR entry points ──────────────────────────────────────────

/// Left poke GPIO any-edge handler.  Lock-free; ISR-safe.
pub fn left_poke_isr(level_low: bool) {
    CAPTURE.on_poke_edge(Side::Left, level_low);
}

/// Right poke GPIO any-edge handler.  Lock-free; ISR-safe.
pub fn right_poke_isr(level_low: bool) {
    CAPTURE.on_poke_edge(Side::Right, level_low);
}

/// Pellet well GPIO any-edge handler.  Lock-free; ISR-safe.
pub fn pellet_well_isr(level_low: bool) {
    CAPTURE.on_pellet_edge(level_low);
}
