//! Small condition-variable helpers shared by the two loops: a `running`
//! flag both loops check at the top of every iteration and after every
//! interruptible wait, and a wake signal the Refresh Loop sleeps on between
//! passes (poked by `announceEndpoint` and `stop` so new announcements go
//! out promptly and shutdown doesn't wait for a full interval).

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Guards the engine's `running` flag and doubles as an interruptible sleep:
/// the Watch Loop's reconnect backoff blocks here instead of a plain
/// `thread::sleep`, so `stop()` can cut it short.
pub struct RunFlag {
    running: Mutex<bool>,
    cvar: Condvar,
}

impl RunFlag {
    pub fn new() -> RunFlag {
        RunFlag {
            running: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    pub fn set(&self, value: bool) {
        *self.running.lock().unwrap() = value;
        self.cvar.notify_all();
    }

    pub fn get(&self) -> bool {
        *self.running.lock().unwrap()
    }

    /// Sleep for up to `duration`, waking early if `set(false)` is called.
    /// Returns immediately if the flag is already false.
    pub fn sleep_while_running(&self, duration: Duration) {
        let guard = self.running.lock().unwrap();
        if !*guard {
            return;
        }
        let _ = self.cvar.wait_timeout(guard, duration);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        RunFlag::new()
    }
}

/// A plain wake signal: callers either `notify` or `wait_timeout`, with no
/// payload beyond "something happened, stop waiting".
pub struct WakeSignal {
    mutex: Mutex<()>,
    cvar: Condvar,
}

impl WakeSignal {
    pub fn new() -> WakeSignal {
        WakeSignal {
            mutex: Mutex::new(()),
            cvar: Condvar::new(),
        }
    }

    pub fn notify(&self) {
        let _guard = self.mutex.lock().unwrap();
        self.cvar.notify_all();
    }

    pub fn wait_timeout(&self, duration: Duration) {
        let guard = self.mutex.lock().unwrap();
        let _ = self.cvar.wait_timeout(guard, duration);
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        WakeSignal::new()
    }
}
