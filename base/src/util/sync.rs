use std::cell::Cell;
use std::rc::Rc;

use crate::defs::{Error, ErrorKind::*, Result};

/// Single-threaded busy flag admitting one holder at a time.
///
/// Unlike a borrow-scoped guard, `InFlightGuard` owns a handle to the flag so
/// it can be parked inside a pending task and carried across suspension
/// points. The flag is cleared whenever the guard is dropped, whichever way
/// the holder exits.
#[derive(Clone, Default)]
pub struct InFlightLock {
    busy: Rc<Cell<bool>>,
}

impl InFlightLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.busy.get()
    }

    pub fn try_lock(&self) -> Result<InFlightGuard> {
        if self.busy.replace(true) {
            Err(Error::new(BadOperation, "currently busy".to_string()))
        } else {
            Ok(InFlightGuard {
                busy: self.busy.clone(),
            })
        }
    }
}

#[must_use = "if unused the InFlightLock will immediately unlock"]
pub struct InFlightGuard {
    busy: Rc<Cell<bool>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}
