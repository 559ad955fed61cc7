//! Fatal-condition reporting.
//!
//! A few conditions have no caller to return an error to (an interrupt with
//! no handler) or leave the system in a degraded state the application must
//! know about (PLL never locked). They are counted here, logged, and passed
//! to an optional application hook that decides whether to halt, reset or
//! carry on.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// An interrupt fired with no registered handler. Carries the IRQ number.
    UnhandledInterrupt(u16),
    /// PLL0 or the main oscillator failed to stabilize.
    ClockLockTimeout,
}

/// Distinguishes fault kinds for [`count`], ignoring payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    UnhandledInterrupt,
    ClockLockTimeout,
}

impl Fault {
    pub fn kind(self) -> FaultKind {
        match self {
            Fault::UnhandledInterrupt(_) => FaultKind::UnhandledInterrupt,
            Fault::ClockLockTimeout => FaultKind::ClockLockTimeout,
        }
    }
}

pub type Hook = fn(Fault);

static UNHANDLED_INTERRUPTS: AtomicU32 = AtomicU32::new(0);
static CLOCK_LOCK_TIMEOUTS: AtomicU32 = AtomicU32::new(0);
static HOOK: Mutex<Cell<Option<Hook>>> = Mutex::new(Cell::new(None));

fn counter(kind: FaultKind) -> &'static AtomicU32 {
    match kind {
        FaultKind::UnhandledInterrupt => &UNHANDLED_INTERRUPTS,
        FaultKind::ClockLockTimeout => &CLOCK_LOCK_TIMEOUTS,
    }
}

/// Installs the fatal hook, returning the previous one.
pub fn set_hook(hook: Hook) -> Option<Hook> {
    critical_section::with(|cs| HOOK.borrow(cs).replace(Some(hook)))
}

pub fn clear_hook() -> Option<Hook> {
    critical_section::with(|cs| HOOK.borrow(cs).take())
}

/// Number of faults of `kind` signalled since boot.
pub fn count(kind: FaultKind) -> u32 {
    counter(kind).load(Ordering::Relaxed)
}

pub fn signal(fault: Fault) {
    counter(fault.kind()).fetch_add(1, Ordering::Relaxed);
    error!("fault: {:?}", fault);
    let hook = critical_section::with(|cs| HOOK.borrow(cs).get());
    // The hook runs outside the critical section so it may reset or spin.
    if let Some(hook) = hook {
        hook(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    static SEEN: AtomicBool = AtomicBool::new(false);

    fn record(fault: Fault) {
        if fault == Fault::UnhandledInterrupt(37) {
            SEEN.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn signal_counts_and_calls_hook() {
        let before = count(FaultKind::UnhandledInterrupt);
        set_hook(record);
        signal(Fault::UnhandledInterrupt(37));
        assert!(count(FaultKind::UnhandledInterrupt) > before);
        assert!(SEEN.load(Ordering::SeqCst));
    }
}
