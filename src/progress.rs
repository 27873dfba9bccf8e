use std::io::Write;

use crate::status::LiveStatus;

/// Receives progress from the poll loop. The loop itself never prints.
pub trait WaitObserver {
    fn waiting(&mut self, _username: &str, _status: LiveStatus) {}
    fn countdown(&mut self, _seconds_left: u64) {}
    fn checking(&mut self) {}
    fn live(&mut self, _username: &str) {}
}

pub struct NoopObserver;

impl WaitObserver for NoopObserver {}

/// Single-line countdown rewritten in place on stdout.
pub struct ConsoleCountdown;

impl ConsoleCountdown {
    fn rewrite(line: &str) {
        print!("\x1b[2K\r{}", line);
        let _ = std::io::stdout().lock().flush();
    }
}

impl WaitObserver for ConsoleCountdown {
    fn waiting(&mut self, username: &str, status: LiveStatus) {
        match status {
            LiveStatus::PreparingToGoLive => println!(
                "User @{} is preparing to go live. Awaiting @{} to start streaming.",
                username, username
            ),
            _ => println!(
                "User @{} is currently offline. Awaiting @{} to start streaming.",
                username, username
            ),
        }
    }

    fn countdown(&mut self, seconds_left: u64) {
        Self::rewrite(&format!("Retrying in {} seconds", seconds_left));
    }

    fn checking(&mut self) {
        Self::rewrite("Checking...");
    }

    fn live(&mut self, username: &str) {
        Self::rewrite("");
        println!("User @{} is now streaming live.", username);
    }
}
