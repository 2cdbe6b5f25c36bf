//! # Child Information
//!
//! Snapshots of children for listings and logs.

use crate::ChildState;
use core_types::ChildId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Information about one child for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildInfo {
    pub id: ChildId,
    pub cmdline: String,
    pub state: ChildState,
    /// Scheduling entities, including the main thread
    pub threads: usize,
    pub sessions: usize,
    pub regions: usize,
    pub mapped_bytes: usize,
    pub port_ranges: usize,
    pub gsis: usize,
    pub pending_joins: usize,
}

impl fmt::Display for ChildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<6} {:<28} {:<12} {:>7} {:>8} {:>7} {:>10} {:>5} {:>4}",
            self.id.0,
            self.cmdline,
            self.state.as_str(),
            self.threads,
            self.sessions,
            self.regions,
            self.mapped_bytes,
            self.port_ranges,
            self.gsis
        )
    }
}

/// Formats child infos as a table, ordered by id
pub fn format_table(infos: &[ChildInfo]) -> String {
    let mut sorted: Vec<&ChildInfo> = infos.iter().collect();
    sorted.sort_by_key(|info| info.id);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<6} {:<28} {:<12} {:>7} {:>8} {:>7} {:>10} {:>5} {:>4}\n",
        "ID", "CMDLINE", "STATE", "THREADS", "SESSIONS", "REGIONS", "BYTES", "PORTS", "GSIS"
    ));
    output.push_str("─".repeat(94).as_str());
    output.push('\n');
    for info in sorted {
        output.push_str(&format!("{}\n", info));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: usize, cmdline: &str) -> ChildInfo {
        ChildInfo {
            id: ChildId(id),
            cmdline: cmdline.to_string(),
            state: ChildState::Running,
            threads: 2,
            sessions: 1,
            regions: 4,
            mapped_bytes: 0x7000,
            port_ranges: 0,
            gsis: 0,
            pending_joins: 0,
        }
    }

    #[test]
    fn test_display_columns() {
        let line = format!("{}", info(3, "log --verbose"));
        assert!(line.starts_with("3      log --verbose"));
        assert!(line.contains("running"));
        assert!(line.contains("28672"));
    }

    #[test]
    fn test_format_table_sorted() {
        let table = format_table(&[info(7, "timer"), info(2, "disk")]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[2].contains("disk"));
        assert!(lines[3].contains("timer"));
    }

    #[test]
    fn test_serializes() {
        let json = serde_json::to_string(&info(1, "x")).unwrap();
        let back: ChildInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info(1, "x"));
    }
}
