//! Research gap identification.

use super::content::prepare_content;
use crate::llm::{parse_llm_json, string_field, string_list, LlmClient};
use crate::models::{PaperDigest, ResearchGaps, Section};
use anyhow::{Context, Result};
use tracing::{debug, info};

const MAX_TOKENS: u32 = 1500;

const SYSTEM_PROMPT: &str = "\
You are a research advisor helping identify opportunities for follow-up work on \
an academic paper. Think critically and constructively.

Return a single JSON object with exactly these keys:
- \"open_questions\": array of 3-5 strings, important unanswered questions raised by this work
- \"extension_ideas\": array of 2-4 strings, concrete and actionable project ideas that \
extend this work. Be specific: not \"do more experiments\" but \"apply X method to Y domain \
to test Z hypothesis\"
- \"scaling_considerations\": string, what happens when the approach is applied at larger \
scale, to other domains or with more data, and which assumptions break
- \"methodological_gaps\": array of 1-3 strings, weaknesses in the methodology such as \
missing baselines, questionable assumptions or evaluation gaps

Return ONLY the JSON object. No markdown fencing, no explanation.";

fn build_user_prompt(digest: &PaperDigest, sections: Option<&[Section]>, max_chars: usize) -> String {
    let mut prompt = format!(
        "Paper: {}\n\
         Authors: {}\n\
         Venue: {}\n\n\
         Key Contribution: {}\n\n\
         Methodology: {}\n\n\
         Core Results: {}\n\n\
         Known Limitations: {}\n\n\
         Tags: {}",
        digest.title,
        digest.authors.join(", "),
        digest.venue,
        digest.key_contribution,
        digest.methodology,
        digest.core_results,
        digest.limitations,
        digest.tags.join(", "),
    );

    if let Some(sections) = sections.filter(|s| !s.is_empty()) {
        let content = prepare_content(sections, "", max_chars);
        if !content.trim().is_empty() {
            prompt.push_str("\n\n--- RAW PAPER SECTIONS (for deeper analysis) ---\n");
            prompt.push_str(&content);
        }
    }

    prompt
}

/// Ask the model for open questions, extension ideas and weaknesses.
///
/// Raw `sections`, when given, are appended to the prompt within `max_chars`.
pub async fn identify_gaps(
    client: &LlmClient,
    digest: &PaperDigest,
    sections: Option<&[Section]>,
    max_chars: usize,
) -> Result<ResearchGaps> {
    let prompt = build_user_prompt(digest, sections, max_chars);
    debug!("Gaps prompt prepared: {} chars", prompt.chars().count());

    info!("Requesting research gaps from {}", client.model_name());
    let reply = client
        .complete(SYSTEM_PROMPT, &prompt, MAX_TOKENS)
        .await
        .context("Research gaps request failed")?;

    let data = parse_llm_json(&reply)?;
    let gaps = ResearchGaps {
        open_questions: string_list(&data, "open_questions"),
        extension_ideas: string_list(&data, "extension_ideas"),
        scaling_considerations: string_field(&data, "scaling_considerations").unwrap_or_default(),
        methodological_gaps: string_list(&data, "methodological_gaps"),
    };

    info!(
        "Gap analysis complete: {} questions, {} ideas",
        gaps.open_questions.len(),
        gaps.extension_ideas.len()
    );
    Ok(gaps)
}
