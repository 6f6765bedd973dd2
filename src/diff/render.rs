use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use super::DiffResult;

/// Colored terminal listing of a diff, one file per line.
pub fn format_diff(diff: &DiffResult) -> String {
    let mut output = String::new();

    output.push_str(&"───────────────────────────────────────\n".dimmed().to_string());
    for name in &diff.added {
        output.push_str(&format!("+ {}", name).green().to_string());
        output.push('\n');
    }
    for file in &diff.modified {
        output.push_str(&format!("~ {}", file.name).yellow().to_string());
        output.push('\n');
    }
    for name in &diff.deleted {
        output.push_str(&format!("- {}", name).red().to_string());
        output.push('\n');
    }
    if !diff.has_changes() {
        output.push_str("  (no changes)\n");
    }
    output.push_str(&"───────────────────────────────────────\n".dimmed().to_string());
    output.push_str(&format!(
        "{} added, {} modified, {} deleted, {} unchanged",
        diff.added.len(),
        diff.modified.len(),
        diff.deleted.len(),
        diff.unchanged.len()
    ));

    output
}

/// Line diff between two manifest files.
pub fn format_manifest_diff(old_manifest: &str, new_manifest: &str) -> String {
    let diff = TextDiff::from_lines(old_manifest, new_manifest);
    let mut output = String::new();

    output.push_str(&"───────────────────────────────────────\n".dimmed().to_string());

    for change in diff.iter_all_changes() {
        let line = change.to_string();
        let formatted = match change.tag() {
            ChangeTag::Delete => format!("- {}", line.trim_end()).red().to_string(),
            ChangeTag::Insert => format!("+ {}", line.trim_end()).green().to_string(),
            ChangeTag::Equal => format!("  {}", line.trim_end()),
        };
        output.push_str(&formatted);
        output.push('\n');
    }

    output.push_str(&"───────────────────────────────────────".dimmed().to_string());

    output
}

pub fn has_manifest_changes(old_manifest: &str, new_manifest: &str) -> bool {
    old_manifest.trim() != new_manifest.trim()
}

#[cfg(test)]
mod tests {
    use super::super::ModifiedFile;
    use super::*;

    #[test]
    fn test_format_diff_lists_each_section() {
        let diff = DiffResult {
            added: vec!["metadata/NEW.csv".to_string()],
            deleted: vec!["metadata/OLD.csv".to_string()],
            modified: vec![ModifiedFile {
                name: "metadata/STUDY.csv".to_string(),
                staging_md5: Some("a".to_string()),
                production_md5: Some("b".to_string()),
            }],
            unchanged: vec!["metadata/SAMPLE.csv".to_string()],
        };

        let rendered = format_diff(&diff);
        assert!(rendered.contains("+ metadata/NEW.csv"));
        assert!(rendered.contains("~ metadata/STUDY.csv"));
        assert!(rendered.contains("- metadata/OLD.csv"));
        assert!(rendered.contains("1 added, 1 modified, 1 deleted, 1 unchanged"));
    }

    #[test]
    fn test_format_diff_empty() {
        let rendered = format_diff(&DiffResult::default());
        assert!(rendered.contains("(no changes)"));
        assert!(rendered.contains("0 added, 0 modified, 0 deleted, 0 unchanged"));
    }

    #[test]
    fn test_format_manifest_diff_shows_changes() {
        let old = "filename\ttimestamp\nSTUDY.csv\t2024-01-01T00-00-00Z\n";
        let new = "filename\ttimestamp\nSTUDY.csv\t2024-02-01T00-00-00Z\n";
        let rendered = format_manifest_diff(old, new);
        assert!(rendered.contains("2024-01-01"));
        assert!(rendered.contains("2024-02-01"));
    }

    #[test]
    fn test_has_manifest_changes_ignores_outer_whitespace() {
        assert!(!has_manifest_changes("a\tb\n", "a\tb"));
        assert!(has_manifest_changes("a\tb", "a\tc"));
    }
}
