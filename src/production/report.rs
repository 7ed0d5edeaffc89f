//! Run Report
//!
//! Records the outcome of every planned step and move of a run, in planning
//! order, for the end-of-run summary.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::planner::StepOutcome;

/// Whether an entry is a workflow step or a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Step,
    Move,
}

/// One planned step or move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub tag: String,
    pub application: String,
    pub kind: PlanKind,
    /// Transformation name the entry was planned under
    pub name: String,
    pub outcome: StepOutcome,
}

impl PlanEntry {
    /// `detsim` for steps, `detsim-move` for moves.
    pub fn label(&self) -> String {
        match self.kind {
            PlanKind::Step => self.application.clone(),
            PlanKind::Move => format!("{}-move", self.application),
        }
    }
}

/// Outcomes of one production run.
#[derive(Debug, Clone)]
pub struct RunReport {
    entries: Vec<PlanEntry>,
    skipped_tags: Vec<(String, String)>,
    start_time: Instant,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            skipped_tags: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn record(
        &mut self,
        tag: &str,
        application: &str,
        kind: PlanKind,
        name: String,
        outcome: StepOutcome,
    ) {
        self.entries.push(PlanEntry {
            tag: tag.to_string(),
            application: application.to_string(),
            kind,
            name,
            outcome,
        });
    }

    /// Records a tag whose parameters could not be converted.
    pub fn skip_tag(&mut self, tag: &str, reason: String) {
        self.skipped_tags.push((tag.to_string(), reason));
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn skipped_tags(&self) -> &[(String, String)] {
        &self.skipped_tags
    }

    /// Transformation names in planning order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Created(_)))
    }

    pub fn dry_run(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::DryRun))
    }

    pub fn already_exists(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::AlreadyExists(_)))
    }

    pub fn predecessor_missing(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::PredecessorMissing(_)))
    }

    fn count(&self, predicate: impl Fn(&StepOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.outcome)).count()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// One line per entry followed by the totals.
    pub fn summary(&self) -> String {
        let mut output = String::from("\nProduction summary:\n\n");

        for entry in &self.entries {
            output.push_str(&format!(
                "{:16} {:18} {}\n",
                truncate(&entry.tag, 16),
                truncate(&entry.label(), 18),
                entry.outcome
            ));
        }
        for (tag, reason) in &self.skipped_tags {
            output.push_str(&format!("{:16} skipped: {}\n", truncate(tag, 16), reason));
        }

        output.push_str(&format!(
            "\nCreated: {}, dry-run: {}, existing: {}, missing input: {}, skipped tags: {}\n",
            self.created(),
            self.dry_run(),
            self.already_exists(),
            self.predecessor_missing(),
            self.skipped_tags.len()
        ));
        output
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or shortens a string to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        let mut report = RunReport::new();
        report.record("t", "detsim", PlanKind::Step, "p-t-detsim".to_string(), StepOutcome::Created("1".to_string()));
        report.record(
            "t",
            "elecsim",
            PlanKind::Step,
            "p-t-elecsim".to_string(),
            StepOutcome::AlreadyExists("2".to_string()),
        );
        report.record(
            "u",
            "detsim",
            PlanKind::Move,
            "p-u-detsim-Replication".to_string(),
            StepOutcome::PredecessorMissing("detsim".to_string()),
        );
        report
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.created(), 1);
        assert_eq!(report.already_exists(), 1);
        assert_eq!(report.predecessor_missing(), 1);
        assert_eq!(report.dry_run(), 0);
    }

    #[test]
    fn test_names_in_order() {
        assert_eq!(
            report().names(),
            vec!["p-t-detsim", "p-t-elecsim", "p-u-detsim-Replication"]
        );
    }

    #[test]
    fn test_summary_lines() {
        let mut report = report();
        report.skip_tag("bad", "convert tag param error".to_string());
        let summary = report.summary();
        assert!(summary.contains("detsim-move"));
        assert!(summary.contains("already exists (2)"));
        assert!(summary.contains("skipped: convert tag param error"));
        assert!(summary.contains("Created: 1, dry-run: 0, existing: 1, missing input: 1, skipped tags: 1"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc  ");
        assert_eq!(truncate("abcdefgh", 6), "abc...");
    }
}
