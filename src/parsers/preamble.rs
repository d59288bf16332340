use std::collections::{HashMap, VecDeque};

/// Sliding windows over the most recent raw lines, overall and per pid.
#[derive(Debug)]
pub(crate) struct Preamble {
    recent: VecDeque<String>,
    recent_size: usize,
    by_pid: HashMap<u32, VecDeque<String>>,
    pid_size: usize,
}

impl Preamble {
    pub fn new(recent_size: usize, pid_size: usize) -> Self {
        Preamble {
            recent: VecDeque::with_capacity(recent_size),
            recent_size,
            by_pid: HashMap::new(),
            pid_size,
        }
    }

    pub fn push(&mut self, pid: Option<u32>, line: &str) {
        push_bounded(&mut self.recent, self.recent_size, line);
        if let Some(pid) = pid {
            let window = self.by_pid.entry(pid).or_default();
            push_bounded(window, self.pid_size, line);
        }
    }

    /// The window of recent lines, oldest first, joined with `\n`.
    pub fn recent(&self) -> String {
        join(&self.recent)
    }

    pub fn for_pid(&self, pid: u32) -> String {
        self.by_pid.get(&pid).map(join).unwrap_or_default()
    }
}

fn push_bounded(window: &mut VecDeque<String>, size: usize, line: &str) {
    if size == 0 {
        return;
    }
    if window.len() == size {
        window.pop_front();
    }
    window.push_back(line.to_string());
}

fn join(window: &VecDeque<String>) -> String {
    window.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
}
