//! Periodic maintenance task owned by each pool

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

enum Control {
    Reschedule(Duration),
    Cancel,
}

/// A dedicated thread invoking a task at a fixed rate.
///
/// The task returns `false` to stop the schedule on its own, which is how a
/// reaper notices that its pool is gone.
pub(crate) struct Reaper {
    control: Sender<Control>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Reaper {
    pub fn spawn<F>(name: &str, period: Duration, task: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (control, commands) = channel::unbounded();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(commands, period, task));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "failed to spawn reaper thread, maintenance disabled");
                None
            }
        };

        Self {
            control,
            handle: Mutex::new(handle),
        }
    }

    /// Restart the schedule with a new period.
    pub fn reschedule(&self, period: Duration) {
        let _ = self.control.send(Control::Reschedule(period));
    }

    /// Stop the schedule. Idempotent; waits for a running pass to finish
    /// unless called from the reaper thread itself.
    pub fn cancel(&self) {
        let _ = self.control.send(Control::Cancel);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
    }
}

fn run<F>(commands: Receiver<Control>, period: Duration, mut task: F)
where
    F: FnMut() -> bool,
{
    let mut ticker = channel::tick(period);
    loop {
        // None is a tick; a dropped control channel counts as a cancel
        let command = channel::select! {
            recv(commands) -> command => Some(command.unwrap_or(Control::Cancel)),
            recv(ticker) -> _ => None,
        };
        match command {
            Some(Control::Reschedule(period)) => {
                debug!(?period, "reaper rescheduled");
                ticker = channel::tick(period);
            }
            Some(Control::Cancel) => break,
            None => {
                if !task() {
                    break;
                }
            }
        }
    }
    debug!("reaper stopped");
}
