use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Hashrate spinner fed from the solver's shared counters
pub struct ProgressDisplay {
    bar: ProgressBar,
    start_time: Instant,
}

impl ProgressDisplay {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        bar.set_style(style);
        bar.set_message("Waiting for puzzle | 0 H/s | 0 attempts | ETA: -");

        Self {
            bar,
            start_time: Instant::now(),
        }
    }

    /// `attempts` counts every search so far; `search_attempts` and
    /// `expected` describe the search in flight and drive the ETA.
    pub fn update(&self, attempts: u64, search_attempts: u64, expected: u64) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let hashrate = if elapsed > 0.0 {
            attempts as f64 / elapsed
        } else {
            0.0
        };

        self.bar.set_message(format!(
            "{} | {} attempts | ETA: {}",
            format_hashrate(hashrate),
            format_number(attempts),
            format_eta(hashrate, expected, search_attempts)
        ));
        self.bar.tick();
    }

    pub fn finish(&self, attempts: u64) {
        let elapsed = self.start_time.elapsed();
        let hashrate = attempts as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

        self.bar.finish_with_message(format!(
            "Stopped after {} ({} attempts, {})",
            format_duration(elapsed),
            format_number(attempts),
            format_hashrate(hashrate)
        ));
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_hashrate(hashrate: f64) -> String {
    if hashrate >= 1_000_000.0 {
        format!("{:.2} MH/s", hashrate / 1_000_000.0)
    } else if hashrate >= 1_000.0 {
        format!("{:.2} KH/s", hashrate / 1_000.0)
    } else {
        format!("{:.0} H/s", hashrate)
    }
}

pub fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

/// Time left until the average solution, or `-` when unknown
pub fn format_eta(hashrate: f64, expected: u64, done: u64) -> String {
    if hashrate <= 0.0 || expected == 0 {
        return "-".to_string();
    }
    let remaining = expected.saturating_sub(done);
    let secs = remaining as f64 / hashrate;
    match Duration::try_from_secs_f64(secs) {
        Ok(eta) => format_duration(eta),
        Err(_) => "-".to_string(),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
