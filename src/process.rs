use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Ask the process to exit.
    Graceful,
    /// Kill it.
    Forceful,
}

/// Closes processes that hold files open.
pub trait ProcessTerminator: Send + Sync {
    /// Signal every process whose executable name matches one of `names`,
    /// then wait at most `timeout` for them to go away. Returns how many are
    /// still running.
    fn terminate(&self, names: &[&str], mode: Termination, timeout: Duration) -> usize;
}

pub struct SysinfoTerminator;

fn matching_pids(sys: &System, names: &[&str]) -> Vec<Pid> {
    let mut pids: Vec<Pid> = sys
        .processes()
        .iter()
        .filter(|(_, process)| {
            let name = process.name().to_string_lossy();
            names.iter().any(|n| name.eq_ignore_ascii_case(n))
        })
        .map(|(pid, _)| *pid)
        .collect();
    pids.sort();
    pids
}

impl ProcessTerminator for SysinfoTerminator {
    fn terminate(&self, names: &[&str], mode: Termination, timeout: Duration) -> usize {
        if names.is_empty() {
            return 0;
        }
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let pids = matching_pids(&sys, names);
        if pids.is_empty() {
            return 0;
        }
        info!(?names, count = pids.len(), ?mode, "closing processes");

        for pid in &pids {
            let Some(process) = sys.process(*pid) else {
                continue;
            };
            let sent = match mode {
                // Platforms without SIGTERM get a plain kill instead.
                Termination::Graceful => process.kill_with(Signal::Term).unwrap_or_else(|| process.kill()),
                Termination::Forceful => process.kill(),
            };
            if !sent {
                debug!(%pid, "signal not delivered");
            }
        }

        let deadline = Instant::now() + timeout;
        loop {
            sys.refresh_processes(ProcessesToUpdate::Some(&pids), true);
            let alive = pids.iter().filter(|pid| sys.process(**pid).is_some()).count();
            if alive == 0 || Instant::now() >= deadline {
                return alive;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}
