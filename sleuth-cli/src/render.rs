//! Terminal rendering for research runs.
//!
//! Activity events become one status line each on stderr; the final report
//! is printed as lightly styled markdown when stdout is a terminal.

use sleuth_core::research::{ActivityEvent, ActivityStatus};

mod ansi {
    pub const BOLD_ON: &str = "\x1b[1m";
    pub const BOLD_OFF: &str = "\x1b[22m";
    pub const DIM_ON: &str = "\x1b[2m";
    pub const DIM_OFF: &str = "\x1b[22m";
    pub const UNDERLINE_ON: &str = "\x1b[4m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
    pub const RESET: &str = "\x1b[0m";
}

fn status_marker(status: ActivityStatus) -> (&'static str, &'static str) {
    match status {
        ActivityStatus::Pending => ("…", ansi::CYAN),
        ActivityStatus::Complete => ("✓", ansi::GREEN),
        ActivityStatus::Warning => ("!", ansi::YELLOW),
        ActivityStatus::Error => ("✗", ansi::RED),
    }
}

/// One line describing an activity, e.g. `✓ [search] Found 5 results`.
pub fn activity_line(event: &ActivityEvent, color: bool) -> String {
    let (marker, tint) = status_marker(event.status);
    if color {
        format!(
            "{tint}{marker}{reset} {dim}[{kind}]{dim_off} {message}",
            reset = ansi::RESET,
            dim = ansi::DIM_ON,
            kind = event.kind,
            dim_off = ansi::DIM_OFF,
            message = event.message,
        )
    } else {
        format!("{marker} [{}] {}", event.kind, event.message)
    }
}

/// The report body without the `<report>` wrapper the model is asked for.
pub fn report_body(report: &str) -> &str {
    let trimmed = report.trim();
    match (trimmed.find("<report>"), trimmed.rfind("</report>")) {
        (Some(start), Some(end)) if start + "<report>".len() <= end => {
            trimmed[start + "<report>".len()..end].trim()
        }
        (Some(start), None) => trimmed[start + "<report>".len()..].trim(),
        _ => trimmed,
    }
}

/// Style headings, bullets, rules, and `**bold**` spans with ANSI codes.
pub fn render_markdown(text: &str) -> String {
    let mut in_code_block = false;
    let mut lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            lines.push(format!("{}{line}{}", ansi::DIM_ON, ansi::DIM_OFF));
            continue;
        }
        if in_code_block {
            lines.push(format!("{}{line}{}", ansi::DIM_ON, ansi::DIM_OFF));
            continue;
        }

        let heading = trimmed.trim_start_matches('#');
        if trimmed.starts_with('#') && heading.starts_with(' ') {
            lines.push(format!(
                "{}{}{}{}",
                ansi::BOLD_ON,
                ansi::UNDERLINE_ON,
                heading.trim(),
                ansi::RESET
            ));
        } else if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let indent = &line[..line.len() - trimmed.len()];
            lines.push(format!("{indent}  • {}", render_bold(item)));
        } else if matches!(trimmed, "---" | "***" | "___") {
            lines.push(format!("{}{}{}", ansi::DIM_ON, "─".repeat(40), ansi::DIM_OFF));
        } else {
            lines.push(render_bold(line));
        }
    }

    lines.join("\n")
}

fn render_bold(text: &str) -> String {
    let mut output = String::with_capacity(text.len() + 16);
    let mut rest = text;
    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        output.push_str(&rest[..start]);
        output.push_str(ansi::BOLD_ON);
        output.push_str(&after[..end]);
        output.push_str(ansi::BOLD_OFF);
        rest = &after[end + 2..];
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sleuth_core::research::ActivityType;

    #[test]
    fn test_activity_line_plain() {
        let event = ActivityEvent::new(
            ActivityType::Search,
            ActivityStatus::Complete,
            "Found 5 results for \"laptops\"",
        );
        assert_eq!(
            activity_line(&event, false),
            "✓ [search] Found 5 results for \"laptops\""
        );
    }

    #[test]
    fn test_activity_line_colored_error() {
        let event = ActivityEvent::new(ActivityType::Plan, ActivityStatus::Error, "boom");
        let line = activity_line(&event, true);
        assert!(line.starts_with(ansi::RED));
        assert!(line.ends_with("boom"));
    }

    #[test]
    fn test_report_body_strips_tags() {
        assert_eq!(report_body("  <report>\n# Title\nBody\n</report> "), "# Title\nBody");
        assert_eq!(report_body("Preamble <report>Body"), "Body");
        assert_eq!(report_body("# No tags"), "# No tags");
    }

    #[test]
    fn test_render_heading_and_bullets() {
        let out = render_markdown("## Findings\n- **Fast** CPU\nplain");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Findings"));
        assert!(!lines[0].contains("##"));
        assert!(lines[1].starts_with("  • "));
        assert!(lines[1].contains(&format!("{}Fast{}", ansi::BOLD_ON, ansi::BOLD_OFF)));
        assert_eq!(lines[2], "plain");
    }

    #[test]
    fn test_code_block_left_unstyled_inside() {
        let out = render_markdown("```\n# not a heading\n```");
        assert!(out.contains("# not a heading"));
    }

    #[test]
    fn test_unclosed_bold_kept_verbatim() {
        assert_eq!(render_bold("a ** b"), "a ** b");
    }
}
