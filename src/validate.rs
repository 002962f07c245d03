//! Lightweight Mermaid syntax validator.
//!
//! Catches the most common AI-generated mistakes without a full parser.
//! The report is advisory: the render fallback ladder is the actual
//! enforcement mechanism, so a defect here never blocks a render attempt.

use std::sync::OnceLock;

use regex::Regex;

fn diagram_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(graph|flowchart|sequencediagram|classdiagram|statediagram|erdiagram|gantt|pie|gitgraph)\s",
        )
        .expect("valid regex")
    })
}

fn edge_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\|([^|]+)\|").expect("valid regex"))
}

fn node_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+\[([^\]]*)\]").expect("valid regex"))
}

fn unsafe_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[(){}\[\]"]"#).expect("valid regex"))
}

fn shape_open_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[({/\\]").expect("valid regex"))
}

/// Whether a label is already wrapped in a single pair of double quotes
/// with no embedded quote.
fn safely_quoted(label: &str) -> bool {
    label.len() >= 2
        && label.starts_with('"')
        && label.ends_with('"')
        && !label[1..label.len() - 1].contains('"')
}

/// Check Mermaid source for common defects.
///
/// Returns the first problem found, or `None` if the code looks valid.
/// "Looks valid" is not a guarantee; this never raises and never blocks
/// rendering.
pub fn validate(code: &str) -> Option<String> {
    let lines: Vec<&str> = code
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return Some("Empty diagram code".to_string());
    }

    // Must start with a recognized diagram type.
    if !diagram_type_regex().is_match(lines[0]) {
        return Some(format!(
            "Diagram must start with a valid type (e.g., \"graph TD\" or \"flowchart TD\"), but starts with: \"{}\"",
            lines[0]
        ));
    }

    // Unquoted special characters in labels are the most common breakage.
    for (i, line) in lines.iter().enumerate().skip(1) {
        if line.starts_with("%%")
            || *line == "end"
            || line.starts_with("subgraph ")
            || line.starts_with("style ")
            || line.starts_with("classDef ")
        {
            continue;
        }

        for caps in edge_label_regex().captures_iter(line) {
            let label = caps[1].trim().to_string();
            if safely_quoted(&label) {
                continue;
            }
            if unsafe_label_regex().is_match(&label) {
                return Some(format!(
                    "Line {}: Edge label \"{label}\" contains special characters that must be quoted.",
                    i + 1
                ));
            }
        }

        for caps in node_label_regex().captures_iter(line) {
            let label = &caps[1];
            // Shape syntax like [(...)] or [/...\] is not a plain label.
            if shape_open_regex().is_match(label) {
                continue;
            }
            if safely_quoted(label) {
                continue;
            }
            if unsafe_label_regex().is_match(label) {
                return Some(format!(
                    "Line {}: Node label \"{label}\" contains special characters or inner quotes that must be fixed.",
                    i + 1
                ));
            }
        }
    }

    // Subgraph blocks must balance exactly.
    let mut depth: i32 = 0;
    for line in &lines {
        if line.starts_with("subgraph ") {
            depth += 1;
        }
        if *line == "end" {
            depth -= 1;
        }
    }
    if depth > 0 {
        return Some(format!(
            "{depth} unclosed subgraph block(s) - missing 'end' keyword(s)"
        ));
    }
    if depth < 0 {
        return Some(format!(
            "{} extra 'end' keyword(s) without matching subgraph",
            -depth
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_minimal_diagram_is_valid() {
        assert_eq!(validate("graph TD\nA-->B"), None);
    }

    #[test]
    fn test_validate_accepts_known_diagram_types() {
        for header in [
            "flowchart LR",
            "sequenceDiagram title",
            "classDiagram x",
            "stateDiagram x",
            "erDiagram x",
            "gantt x",
            "pie title Pets",
            "gitGraph x",
        ] {
            assert_eq!(validate(header), None, "rejected {header:?}");
        }
    }

    #[test]
    fn test_validate_empty_input() {
        assert_eq!(validate(""), Some("Empty diagram code".to_string()));
        assert_eq!(validate("  \n \n"), Some("Empty diagram code".to_string()));
    }

    #[test]
    fn test_validate_missing_type_line_references_first_line() {
        let msg = validate("A-->B").expect("defect expected");
        assert!(msg.contains("A-->B"));
        assert!(msg.contains("must start with a valid type"));
    }

    #[test]
    fn test_validate_unclosed_subgraph() {
        let msg = validate("graph TD\nsubgraph X\nA-->B").expect("defect expected");
        assert_eq!(msg, "1 unclosed subgraph block(s) - missing 'end' keyword(s)");
    }

    #[test]
    fn test_validate_extra_end() {
        let msg = validate("graph TD\nA-->B\nend\nend").expect("defect expected");
        assert_eq!(msg, "2 extra 'end' keyword(s) without matching subgraph");
    }

    #[test]
    fn test_validate_balanced_subgraphs_pass() {
        assert_eq!(
            validate("graph TD\nsubgraph X\nA-->B\nend\nsubgraph Y\nC-->D\nend"),
            None
        );
    }

    #[test]
    fn test_validate_flags_unquoted_edge_label() {
        let msg = validate("graph TD\nA -->|read(write)| B").expect("defect expected");
        assert!(msg.starts_with("Line 2:"));
        assert!(msg.contains("read(write)"));
        assert!(msg.contains("Edge label"));
    }

    #[test]
    fn test_validate_accepts_quoted_edge_label() {
        assert_eq!(validate("graph TD\nA -->|\"read(write)\"| B"), None);
    }

    #[test]
    fn test_validate_flags_unquoted_node_label() {
        let msg = validate("graph TD\nA[Load Balancer (LB)]").expect("defect expected");
        assert!(msg.starts_with("Line 2:"));
        assert!(msg.contains("Load Balancer (LB)"));
        assert!(msg.contains("Node label"));
    }

    #[test]
    fn test_validate_accepts_quoted_node_label() {
        assert_eq!(validate("graph TD\nA[\"Load Balancer (LB)\"]"), None);
    }

    #[test]
    fn test_validate_skips_shape_syntax() {
        assert_eq!(validate("graph TD\nA[(database)]"), None);
    }

    #[test]
    fn test_validate_skips_comments_and_directives() {
        let code = "graph TD\n%% a (comment)\nstyle A fill:#f9f\nclassDef x fill:#fff\nA-->B";
        assert_eq!(validate(code), None);
    }

    #[test]
    fn test_validate_line_numbers_skip_blank_lines() {
        // Blank lines are dropped before numbering, matching the repair
        // pass which also works on non-empty trimmed lines.
        let msg = validate("graph TD\n\nA[bad (label)]").expect("defect expected");
        assert!(msg.starts_with("Line 2:"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn validate_never_panics(input in ".*") {
                let _ = validate(&input);
            }

            #[test]
            fn sanitized_labels_pass_validation(label in "[A-Za-z0-9 ()/{}&]{1,24}") {
                let sanitized = crate::sanitize::sanitize(&format!("graph TD\nA[{label}] --> B"));
                let verdict = validate(&sanitized);
                prop_assert!(
                    verdict.is_none(),
                    "sanitize left a defect for label {:?}: {:?}",
                    label,
                    verdict
                );
            }
        }
    }
}
