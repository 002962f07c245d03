//! Best-effort repair of AI-generated Mermaid source.
//!
//! Generative models produce diagram source with a recurring set of syntax
//! mistakes: markdown fences around the code, malformed dotted arrows,
//! edges with a label but no target node, quoted strings used as node IDs,
//! and unquoted special characters inside labels. [`sanitize`] fixes what
//! can be fixed without a full grammar; the lossy transforms at the bottom
//! of this module are reserved for the render fallback ladder.

use std::sync::OnceLock;

use regex::Regex;

fn fence_open_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^```(?:mermaid)?\s*\n?").expect("valid regex"))
}

fn fence_close_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)\n?\s*```$").expect("valid regex"))
}

fn extra_dash_dotted_arrow_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-{2,}\.->").expect("valid regex"))
}

fn multi_dot_arrow_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+\.{2,}-*>").expect("valid regex"))
}

fn stray_arrow_after_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\|[^|]*\|)\s*\.?-+>").expect("valid regex"))
}

fn incomplete_edge_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*\w+\s+--\s+"[^"]*"\s*$"#).expect("valid regex"))
}

fn quoted_node_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)"\s*(\(?\[|\(?\()"#).expect("valid regex"))
}

fn edge_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\|([^|]+)\|").expect("valid regex"))
}

fn node_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)\[([^\]]*)\]").expect("valid regex"))
}

fn edge_label_special_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[(){}\[\]/&<>"]"#).expect("valid regex"))
}

fn node_label_special_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[(){}/&<>"]"#).expect("valid regex"))
}

fn shape_open_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[({/\\]").expect("valid regex"))
}

/// Convert a quoted display name into a valid node identifier.
///
/// Keeps alphanumerics, collapses every other run of characters into a
/// single underscore, and strips leading/trailing underscores. The display
/// text itself is not preserved.
fn sanitize_identifier(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !id.is_empty() {
                id.push('_');
            }
            pending_separator = false;
            id.push(ch);
        } else {
            pending_separator = true;
        }
    }
    id
}

/// Repair common AI-generated Mermaid syntax issues.
///
/// Never fails: always returns a string, possibly unchanged or empty.
/// Applied once per render invocation, before the fallback ladder runs.
pub fn sanitize(code: &str) -> String {
    // Strip markdown code fences if the model wrapped the diagram in them.
    let code = fence_open_regex().replace_all(code, "");
    let code = fence_close_regex().replace_all(&code, "");
    let code = code.trim();

    let mut sanitized: Vec<String> = Vec::new();

    for line in code.split('\n') {
        // Malformed arrow syntax, fixed before the label transforms below.
        let result = extra_dash_dotted_arrow_regex().replace_all(line, "-.->");
        let result = multi_dot_arrow_regex().replace_all(&result, "-.->");
        let result = stray_arrow_after_label_regex().replace_all(&result, "$1");

        // An edge like `Node -- "text"` with no target node is invalid and
        // unsalvageable; drop the whole line.
        if incomplete_edge_regex().is_match(&result) {
            continue;
        }

        // Quoted strings used as node IDs, e.g. `"Some Name"([...])`.
        // Node IDs cannot be quoted strings; convert to plain identifiers.
        let result = quoted_node_id_regex().replace_all(&result, |caps: &regex::Captures<'_>| {
            format!("{}{}", sanitize_identifier(&caps[1]), &caps[2])
        });

        // Quote edge labels |...| that contain special characters.
        let result = edge_label_regex().replace_all(&result, |caps: &regex::Captures<'_>| {
            let label = &caps[1];
            let trimmed = label.trim();
            if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
                return format!("|{label}|");
            }
            if edge_label_special_regex().is_match(trimmed) {
                return format!("|\"{}\"|", trimmed.replace('"', "'"));
            }
            format!("|{label}|")
        });

        // Quote bracket node labels that contain problematic characters.
        let result = node_label_regex().replace_all(&result, |caps: &regex::Captures<'_>| {
            let id = &caps[1];
            let label = &caps[2];
            if label.len() >= 2 && label.starts_with('"') && label.ends_with('"') {
                // Already quoted; only inner quotes need fixing.
                let inner = &label[1..label.len() - 1];
                if inner.contains('"') {
                    return format!("{id}[\"{}\"]", inner.replace('"', "'"));
                }
                return format!("{id}[{label}]");
            }
            // Shape definitions like [(...)] or [/.../] are syntax, not labels.
            if shape_open_regex().is_match(label) {
                return format!("{id}[{label}]");
            }
            if node_label_special_regex().is_match(label) {
                return format!("{id}[\"{}\"]", label.replace('"', "'"));
            }
            format!("{id}[{label}]")
        });

        sanitized.push(result.into_owned());
    }

    sanitized.join("\n")
}

/// Remove every pipe-delimited edge label.
///
/// Last-resort transform: the layout engine no longer has to position
/// label boxes, at the cost of losing the labels entirely.
pub fn strip_edge_labels(code: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\|[^|]*\|").expect("valid regex"));
    code.split('\n')
        .map(|line| re.replace_all(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove `subgraph`/`end` blocks, keeping all nodes and edges intact.
pub fn flatten_subgraphs(code: &str) -> String {
    code.split('\n')
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("subgraph ") && trimmed != "end"
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite a leading `graph` diagram-type declaration to `flowchart`.
///
/// Same semantics; some engine versions lay out `flowchart` input more
/// reliably.
pub fn use_flowchart_keyword(code: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^graph\s+").expect("valid regex"));
    re.replace(code, "flowchart ").into_owned()
}
