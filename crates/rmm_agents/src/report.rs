//! Incident report rendering and tokenization.
//!
//! The same rendered text is returned by the request/response entry point and
//! replayed token by token by the streaming entry point.

use std::fmt::Write;

use rmm_core::{RemediationPlan, RootCause};

/// Warning appended to reports whose plan needs sign-off.
pub const APPROVAL_NOTICE: &str = "⚠️ **Manual approval required before executing remediation.**";

/// Render the markdown incident report.
pub fn format_incident_report(
    incident_id: &str,
    root_cause: &RootCause,
    plan: &RemediationPlan,
) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "**Incident Analysis Complete** (ID: {})\n\n\
         **Root Cause Analysis:**\n{}\n\n\
         **Confidence Level:** {}%\n\n\
         **Recommended Actions:**\n",
        incident_id,
        root_cause.analysis,
        (root_cause.confidence * 100.0) as u32,
    );

    for (i, action) in plan.actions().iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. **{}**\n   - Target: {}\n   - Rationale: {}",
            i + 1,
            action.action_type.title(),
            action.target,
            action.rationale,
        );
    }

    let _ = write!(
        out,
        "\n\n**Risk Level:** {}\n**Estimated Resolution Time:** {}",
        plan.risk().as_str().to_uppercase(),
        plan.estimated_time(),
    );

    if plan.requires_approval() {
        out.push_str("\n\n");
        out.push_str(APPROVAL_NOTICE);
    }
    out
}

/// Split text on single spaces. Every token but the last keeps its trailing
/// space, so concatenating the tokens yields the input unchanged.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split_inclusive(' ').map(str::to_string).collect()
}
