//! Text rendering for injection output and markdown fragments.
//!
//! Injection lines are deliberately terse: they compete for prompt budget.
//! Markdown fragments carry a machine-readable marker comment so a doc
//! sync can find and replace the fragment it owns without disturbing the
//! surrounding document.

use crate::types::Delta;
use crate::util::collapse_whitespace;

/// One-line form of a delta for prompt injection. Conditions read as
/// written ("when using edit on **/*.rs"), so nothing is prepended.
pub fn injection_line(delta: &Delta) -> String {
    format!(
        "- [{:.2}] {}: {}",
        delta.confidence,
        collapse_whitespace(&delta.condition),
        collapse_whitespace(&delta.solution),
    )
}

/// Markdown fragment for one promoted delta.
pub fn delta_fragment(delta: &Delta) -> String {
    let mut fragment = String::new();
    fragment.push_str(&format!("### {}\n\n", collapse_whitespace(&delta.problem)));
    fragment.push_str(&format!(
        "*When:* {}\n\n",
        collapse_whitespace(&delta.condition)
    ));
    fragment.push_str(&format!("{}\n\n", delta.solution.trim()));
    fragment.push_str(&format!(
        "<!-- metis:delta:{} confidence:{:.2} helpful:{} not_helpful:{} human:{} -->\n",
        delta.id,
        delta.confidence,
        delta.feedback.helpful_count,
        delta.feedback.not_helpful_count,
        delta.feedback.human_feedback_count,
    ));
    fragment
}

/// Full markdown document of every delta, newest first, for `export`.
pub fn export_markdown(deltas: &[Delta]) -> String {
    let mut ordered: Vec<&Delta> = deltas.iter().collect();
    ordered.sort_by(|a, b| b.created.cmp(&a.created));

    let mut doc = String::from("# Learned playbook\n\n");
    if ordered.is_empty() {
        doc.push_str("_No promoted lessons yet._\n");
        return doc;
    }
    for delta in ordered {
        doc.push_str(&delta_fragment(delta));
        doc.push('\n');
    }
    doc
}
