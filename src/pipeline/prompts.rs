//! Prompt assembly for the map and reduce phases.

use super::types::REPORT_CATEGORIES;

/// Role label used when the caller does not supply one.
pub(crate) const DEFAULT_TARGET_ROLE: &str = "general";

/// Normalize the caller-supplied role, falling back to the default label.
pub fn effective_target_role(target_role: &str) -> &str {
    let trimmed = target_role.trim();
    if trimmed.is_empty() {
        DEFAULT_TARGET_ROLE
    } else {
        trimmed
    }
}

/// Build the map-phase prompt summarizing one chunk of the document.
///
/// The summary must preserve concrete facts (employers, dates, stacks, numbers)
/// because the reduce phase sees only these summaries, never the raw text.
pub(crate) fn build_chunk_summary_prompt(chunk: &str, target_role: &str) -> String {
    format!(
        "You are a recruiter reviewing a candidate document for a {target_role} position. \
         The document is being processed in segments. Summarize the following segment in a \
         few sentences, keeping every concrete detail relevant to the {target_role} role: \
         employers, dates, responsibilities, technologies, and measurable results. \
         Do not evaluate yet; only condense.\n\n\
         Segment:\n{chunk}"
    )
}

/// Build the reduce-phase prompt requesting the structured competency report.
pub(crate) fn build_final_analysis_prompt(joined_summaries: &str, target_role: &str) -> String {
    let mut prompt = format!(
        "You are a hiring expert for {target_role} positions. Below are ordered segment \
         summaries of a candidate document. Assess the candidate from the perspective of a \
         recruiter filling a {target_role} role and provide concrete, actionable improvement \
         advice.\n\nEvaluate these categories:\n\
         - experience: relevance of project and work history, clarity of measurable results\n\
         - skills: fit between the listed stack and the core skills the role demands\n\
         - education: relevance of education, certifications, and other activities\n\
         - readability: grammar, typos, awkward phrasing, overall clarity\n\
         - overall: competitiveness for the role and the most important improvements\n\n\
         Answer with a single JSON object and nothing else, in exactly this shape:\n{{\n"
    );
    for (position, category) in REPORT_CATEGORIES.iter().enumerate() {
        prompt.push_str(&format!(
            "  \"{category}\": {{\n    \"assessment\": \"...\",\n    \"improvement_suggestion\": \"...\"\n  }}{}\n",
            if position + 1 < REPORT_CATEGORIES.len() { "," } else { "" }
        ));
    }
    prompt.push_str("}\n\nSegment summaries, in document order:\n");
    prompt.push_str(joined_summaries);
    prompt
}
