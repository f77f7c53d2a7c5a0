//! Table rendering for CLI output

use crate::infrastructure::providers::Snapshot;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

/// Table renderer for formatted output
pub struct TableRenderer;

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a snapshot list as a formatted table
    pub fn render_snapshots(&self, snapshots: &[Snapshot]) -> String {
        if snapshots.is_empty() {
            return "No snapshots found".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("ID").set_alignment(CellAlignment::Left),
                Cell::new("TIME").set_alignment(CellAlignment::Left),
                Cell::new("HOST").set_alignment(CellAlignment::Left),
                Cell::new("PATHS").set_alignment(CellAlignment::Left),
            ]);

        for snapshot in snapshots {
            let id = if snapshot.short_id.is_empty() {
                snapshot.id.chars().take(8).collect::<String>()
            } else {
                snapshot.short_id.clone()
            };

            table.add_row(vec![
                Cell::new(&id),
                Cell::new(&snapshot.time),
                Cell::new(&snapshot.hostname),
                Cell::new(snapshot.paths.join("\n")),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "{} snapshot(s)\n",
            snapshots.len().to_string().cyan()
        ));
        output.push_str(&table.to_string());
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(short_id: &str, host: &str) -> Snapshot {
        Snapshot {
            time: "2024-11-02T01:00:00Z".to_string(),
            tree: String::new(),
            paths: vec!["/var/lib/app".to_string()],
            hostname: host.to_string(),
            username: String::new(),
            uid: 0,
            gid: 0,
            id: format!("{}{}", short_id, "0000000000000000"),
            short_id: short_id.to_string(),
        }
    }

    #[test]
    fn test_render_empty_list() {
        let renderer = TableRenderer::new();
        assert_eq!(renderer.render_snapshots(&[]), "No snapshots found");
    }

    #[test]
    fn test_render_contains_rows() {
        let renderer = TableRenderer::new();
        let output =
            renderer.render_snapshots(&[snapshot("f00dfeed", "node-1"), snapshot("cafe1234", "node-2")]);

        assert!(output.contains("f00dfeed"));
        assert!(output.contains("node-2"));
        assert!(output.contains("/var/lib/app"));
    }
}
