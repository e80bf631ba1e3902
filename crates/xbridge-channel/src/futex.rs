//! Cross-process sleep/wake on shared atomic words.
//!
//! On Linux these map to the futex syscall WITHOUT `FUTEX_PRIVATE_FLAG`:
//! the words live in a file-backed mapping shared by two processes, so
//! private (same-address-space) futexes would never wake the counterpart.
//! Other platforms fall back to a bounded sleep, which keeps the semantics
//! (blocking with deadline, no unsynchronized access) at the cost of wakeup
//! latency.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Upper bound for a single kernel wait. Waiters always re-check their
/// condition in a loop, so a capped wait only costs a spurious recheck.
pub const MAX_WAIT_SLICE: Duration = Duration::from_millis(100);

#[cfg(target_os = "linux")]
pub fn wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    let timeout = timeout.map_or(MAX_WAIT_SLICE, |t| t.min(MAX_WAIT_SLICE));
    let ts = libc::timespec {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as libc::c_long,
    };
    // EAGAIN (value changed), EINTR and ETIMEDOUT are all fine: the caller
    // re-checks its condition.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT,
            expected,
            &ts as *const libc::timespec,
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
pub fn wake(word: &AtomicU32, waiters: i32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE,
            waiters,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    // No portable cross-process futex; sleep briefly if the value still
    // matches, then let the caller re-check.
    if word.load(Ordering::Acquire) == expected {
        let nap = Duration::from_micros(500);
        std::thread::sleep(timeout.map_or(nap, |t| t.min(nap)));
    }
}

#[cfg(not(target_os = "linux"))]
pub fn wake(_word: &AtomicU32, _waiters: i32) {}

pub fn wake_one(word: &AtomicU32) {
    wake(word, 1);
}

pub fn wake_all(word: &AtomicU32) {
    wake(word, i32::MAX);
}

/// Futex-backed mutex over a shared word: 0 = free, 1 = held, 2 = held with
/// contention. Serializes producers from multiple processes/threads pushing
/// into the same ring. `owner_pid` records the holder so waiters can detect
/// a holder that died without unlocking and inherit its lock instead of
/// waiting forever.
pub struct SharedMutexGuard<'a> {
    word: &'a AtomicU32,
    owner_pid: &'a AtomicU32,
}

pub fn lock<'a>(word: &'a AtomicU32, owner_pid: &'a AtomicU32) -> SharedMutexGuard<'a> {
    if word
        .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
    {
        owner_pid.store(std::process::id(), Ordering::Release);
        return SharedMutexGuard { word, owner_pid };
    }
    loop {
        // Announce contention, then sleep until the holder unlocks.
        let prev = word.swap(2, Ordering::Acquire);
        if prev == 0 {
            owner_pid.store(std::process::id(), Ordering::Release);
            break;
        }
        let holder = owner_pid.load(Ordering::Acquire);
        if holder != 0 && !process_alive(holder) {
            // The holder died mid-push. Claiming the pid word decides which
            // waiter inherits the (still marked held) lock.
            if owner_pid
                .compare_exchange(
                    holder,
                    std::process::id(),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
        }
        wait(word, 2, Some(MAX_WAIT_SLICE));
    }
    SharedMutexGuard { word, owner_pid }
}

impl Drop for SharedMutexGuard<'_> {
    fn drop(&mut self) {
        self.owner_pid.store(0, Ordering::Release);
        if self.word.swap(0, Ordering::Release) == 2 {
            wake_one(self.word);
        }
    }
}

/// Signal 0 probes existence without delivering anything. Only ESRCH means
/// the pid is gone; EPERM is another user's live process.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    if unsafe { libc::kill(pid as libc::pid_t, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
