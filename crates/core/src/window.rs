//! Bounded memory of recent narration.

use std::collections::VecDeque;

/// Text shown to the oracle when nothing has been narrated yet.
pub const EMPTY_WINDOW_TEXT: &str = "None";

/// FIFO of the last `capacity` narrations.
///
/// Owned by a single run; read before each generation call and appended
/// after it.
#[derive(Debug, Clone)]
pub struct ContinuityWindow {
    entries: VecDeque<String>,
    capacity: usize,
}

impl ContinuityWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a narration, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, narration: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let narration = narration.into();
        if narration.trim().is_empty() {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(narration);
    }

    pub fn extend<I, S>(&mut self, narrations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for narration in narrations {
            self.push(narration);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Window content as prompt text.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return EMPTY_WINDOW_TEXT.to_string();
        }
        self.entries
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut window = ContinuityWindow::new(2);
        window.extend(["one", "two", "three"]);
        assert_eq!(window.entries().collect::<Vec<_>>(), vec!["two", "three"]);
        assert_eq!(window.render(), "two\nthree");
    }

    #[test]
    fn test_empty_render() {
        let window = ContinuityWindow::new(3);
        assert!(window.is_empty());
        assert_eq!(window.render(), EMPTY_WINDOW_TEXT);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut window = ContinuityWindow::new(0);
        window.push("ignored");
        assert!(window.is_empty());
    }

    #[test]
    fn test_blank_narration_not_stored() {
        let mut window = ContinuityWindow::new(2);
        window.push("  ");
        assert_eq!(window.len(), 0);
    }
}
