//! OS scheduling hints for worker threads.
//!
//! Everything here is best effort: a hint the platform rejects or doesn't
//! know is logged and ignored.

use crate::config::{SchedPolicy, THREAD_MAX_PRIORITY, THREAD_MIN_PRIORITY};

/// Priorities outside `[THREAD_MIN_PRIORITY, THREAD_MAX_PRIORITY]` fall back to the minimum.
pub(crate) fn clamp_priority(priority: i32) -> i32 {
    if (THREAD_MIN_PRIORITY..=THREAD_MAX_PRIORITY).contains(&priority) {
        priority
    } else {
        THREAD_MIN_PRIORITY
    }
}

/// Applies policy and priority to the calling thread.
#[cfg(unix)]
pub(crate) fn apply_sched_params(policy: SchedPolicy, priority: i32) {
    let raw_policy = match policy {
        SchedPolicy::Other => libc::SCHED_OTHER,
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::RoundRobin => libc::SCHED_RR,
    };
    // SCHED_OTHER only accepts priority 0
    let priority = match policy {
        SchedPolicy::Other => 0,
        _ => clamp_priority(priority),
    };

    let ret = unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = priority;
        libc::pthread_setschedparam(libc::pthread_self(), raw_policy, &param)
    };
    if ret != 0 {
        tracing::warn!(
            thread = std::thread::current().name().unwrap_or("unknown"),
            ?policy,
            priority,
            error_code = ret,
            "failed to set thread sched param"
        );
    }
}

#[cfg(not(unix))]
pub(crate) fn apply_sched_params(policy: SchedPolicy, priority: i32) {
    if policy != SchedPolicy::Other || priority != THREAD_MIN_PRIORITY {
        tracing::debug!(?policy, priority, "sched params not supported on this platform");
    }
}

/// Pins the calling thread to `core_id % num_cpus`.
#[cfg(target_os = "linux")]
pub(crate) fn pin_to_core(core_id: usize) {
    let core = core_id % num_cpus::get().max(1);
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core, &mut cpuset);
        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpuset);
        if result != 0 {
            tracing::warn!(
                thread = std::thread::current().name().unwrap_or("unknown"),
                core,
                "failed to pin thread to core"
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn pin_to_core(core_id: usize) {
    tracing::debug!(core_id, "cpu pinning not supported on this platform");
}
