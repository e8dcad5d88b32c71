//! Named worker-thread spawning.
//!
//! Each actuator runs its deferred work on its own thread so pulses, ticks
//! and redraws of one actuator are strictly sequential while different
//! actuators never wait on each other.

use std::io;
use std::thread::JoinHandle;

/// Stack for actuator workers.  They hold nothing but a few registers'
/// worth of state and a formatted display line.
pub const WORKER_STACK_KB: usize = 64;

/// Spawn a named thread with an explicit stack size.
pub fn spawn_worker(
    name: &'static str,
    stack_kb: usize,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::debug!("Spawning '{}' (stack={}KB)", name, stack_kb);

    std::thread::Builder::new()
        .name(name.into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
