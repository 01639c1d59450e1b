use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::info;

/// Task descriptions are cut to this many characters in samples.
const TASK_PREVIEW_CHARS: usize = 50;

/// Timing and tool usage of one finished turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSample {
    pub task: String,
    pub elapsed_secs: f64,
    pub tool_count: usize,
    pub tool_sequence: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceSample {
    pub fn new(task: &str, elapsed: Duration, tool_sequence: Vec<String>) -> Self {
        Self {
            task: task.chars().take(TASK_PREVIEW_CHARS).collect(),
            elapsed_secs: elapsed.as_secs_f64(),
            tool_count: tool_sequence.len(),
            tool_sequence,
            timestamp: Utc::now(),
        }
    }
}

/// A one-shot instruction appended to the next turn's system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemHint(String);

impl SystemHint {
    /// Build the corrective hint for a slow, tool-heavy turn.
    pub fn for_slow_turn(sample: &PerformanceSample) -> Self {
        Self(format!(
            "[PERFORMANCE WARNING] The previous task \"{}\" took {:.1}s and used {} tool calls: {}. \
             Do NOT repeat this sequence. Pick the most direct tool for the job, \
             combine steps where possible, and answer as soon as you have what you need.",
            sample.task,
            sample.elapsed_secs,
            sample.tool_count,
            sample.tool_sequence.join(" → "),
        ))
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

/// Ring buffer of recent turn samples plus the pending system hint.
#[derive(Debug)]
pub struct PerformanceMonitor {
    samples: VecDeque<PerformanceSample>,
    capacity: usize,
    slow_threshold_secs: f64,
    tool_count_threshold: usize,
    pending_hint: Option<SystemHint>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(100, 30.0, 3)
    }
}

impl PerformanceMonitor {
    pub fn new(capacity: usize, slow_threshold_secs: f64, tool_count_threshold: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            slow_threshold_secs,
            tool_count_threshold,
            pending_hint: None,
        }
    }

    /// True if a turn was both slow and tool-heavy.
    pub fn is_inefficient(&self, sample: &PerformanceSample) -> bool {
        sample.elapsed_secs > self.slow_threshold_secs && sample.tool_count > self.tool_count_threshold
    }

    /// Store a sample, evicting the oldest when full. An inefficient turn
    /// replaces the pending hint; returns whether that happened.
    pub fn record(&mut self, sample: PerformanceSample) -> bool {
        let inefficient = self.is_inefficient(&sample);
        if inefficient {
            info!(
                task = %sample.task,
                elapsed_secs = sample.elapsed_secs,
                tools = sample.tool_count,
                "slow turn detected, arming system hint"
            );
            self.pending_hint = Some(SystemHint::for_slow_turn(&sample));
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        inefficient
    }

    /// Take the pending hint. A hint is returned at most once.
    pub fn take_hint(&mut self) -> Option<SystemHint> {
        self.pending_hint.take()
    }

    pub fn has_pending_hint(&self) -> bool {
        self.pending_hint.is_some()
    }

    pub fn samples(&self) -> impl Iterator<Item = &PerformanceSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn average_elapsed_secs(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().map(|s| s.elapsed_secs).sum::<f64>() / self.samples.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(secs: u64, tools: &[&str]) -> PerformanceSample {
        PerformanceSample::new(
            "organise my downloads folder please",
            Duration::from_secs(secs),
            tools.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[test]
    fn test_task_is_truncated() {
        let s = PerformanceSample::new(&"x".repeat(80), Duration::ZERO, vec![]);
        assert_eq!(s.task.chars().count(), 50);
    }

    #[test]
    fn test_needs_both_slow_and_tool_heavy() {
        let mut m = PerformanceMonitor::default();
        assert!(!m.record(sample(60, &["a", "b"])));
        assert!(!m.record(sample(5, &["a", "b", "c", "d", "e"])));
        assert!(!m.has_pending_hint());
        assert!(m.record(sample(31, &["a", "b", "c", "d"])));
        assert!(m.has_pending_hint());
    }

    #[test]
    fn test_hint_is_single_use() {
        let mut m = PerformanceMonitor::default();
        m.record(sample(45, &["list_windows", "screenshot", "ocr", "screenshot"]));
        let hint = m.take_hint().unwrap();
        assert!(hint.text().contains("list_windows → screenshot → ocr → screenshot"));
        assert!(hint.text().contains("Do NOT repeat"));
        assert!(m.take_hint().is_none());
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut m = PerformanceMonitor::new(3, 30.0, 3);
        for secs in 1..=5 {
            m.record(sample(secs, &[]));
        }
        assert_eq!(m.len(), 3);
        let kept: Vec<f64> = m.samples().map(|s| s.elapsed_secs).collect();
        assert_eq!(kept, vec![3.0, 4.0, 5.0]);
        assert_eq!(m.average_elapsed_secs(), Some(4.0));
    }
}
