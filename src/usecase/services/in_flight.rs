use std::cell::Cell;

/// Single-slot busy flag for operations that must not overlap.
#[derive(Debug, Default)]
pub struct InFlight {
    busy: Cell<bool>,
}

impl InFlight {
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Claims the slot, or returns `None` when another operation holds it.
    pub fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        if self.busy.replace(true) {
            return None;
        }
        Some(InFlightGuard { slot: self })
    }
}

/// Releases the slot on drop, including early returns and errors.
pub struct InFlightGuard<'a> {
    slot: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.slot.busy.set(false);
    }
}
