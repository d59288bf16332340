use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress display for the CLI. Every method is a no-op when disabled.
pub struct ProgressTracker {
    multi: MultiProgress,
    enabled: bool,
}

impl ProgressTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Spinner shown while one file is loaded and parsed.
    pub fn create_file_spinner(&self, description: &str) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }

        let pb = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Parsing {}...", description));
        Some(pb)
    }

    pub fn finish_with_message(pb: Option<ProgressBar>, message: &str) {
        if let Some(pb) = pb {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn finish_and_clear(pb: Option<ProgressBar>) {
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker_disabled() {
        let tracker = ProgressTracker::new(false);
        assert!(!tracker.is_enabled());
        assert!(tracker.create_file_spinner("bugreport.txt").is_none());
    }

    #[test]
    fn test_progress_tracker_enabled() {
        let tracker = ProgressTracker::new(true);
        let spinner = tracker.create_file_spinner("bugreport.txt");
        assert!(spinner.is_some());
        ProgressTracker::finish_with_message(spinner, "done");

        let spinner = tracker.create_file_spinner("kmsg.txt");
        ProgressTracker::finish_and_clear(spinner);
    }
}
