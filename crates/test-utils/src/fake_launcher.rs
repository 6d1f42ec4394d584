use std::sync::{Arc, Mutex};

use flowdag::agents::ProcessLauncher;
use flowdag::errors::FlowdagError;
use flowdag::remote::BoxFuture;

/// A fake process launcher that records every command it is asked to start
/// and can be told to fail after a number of successful launches.
pub struct FakeLauncher {
    launched: Arc<Mutex<Vec<Vec<String>>>>,
    fail_after: Option<usize>,
    next_pid: u32,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            launched: Arc::new(Mutex::new(Vec::new())),
            fail_after: None,
            next_pid: 1000,
        }
    }

    /// Fail every launch after the first `n` successes.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::new()
        }
    }

    pub fn launched(&self) -> Vec<Vec<String>> {
        self.launched.lock().unwrap().clone()
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch<'a>(&'a mut self, command: &'a [String]) -> BoxFuture<'a, u32> {
        let count = self.launched.lock().unwrap().len();
        if let Some(limit) = self.fail_after {
            if count >= limit {
                return Box::pin(async move {
                    Err(FlowdagError::Remote("no more process slots".to_string()))
                });
            }
        }
        self.launched.lock().unwrap().push(command.to_vec());
        self.next_pid += 1;
        let pid = self.next_pid;
        Box::pin(async move { Ok(pid) })
    }
}
