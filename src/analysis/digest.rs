//! Structured paper digest via the language model.

use super::content::prepare_content;
use crate::llm::{parse_llm_json, string_field, string_list, LlmClient};
use crate::models::{PaperData, PaperDigest, UNKNOWN};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

const MAX_TOKENS: u32 = 1500;

const SYSTEM_PROMPT: &str = "\
You are a research paper analysis assistant. Given the extracted content of an \
academic paper, produce a structured analysis.

Be concise and precise. Write for a researcher who wants to understand what the \
paper contributes without reading all of it.

Return a single JSON object with exactly these keys:
- \"tags\": array of 3-5 topic tags, lowercase and hyphenated (e.g. [\"text-to-speech\", \"neural-codec\"])
- \"key_contribution\": string, 1-2 sentences on the ONE novel contribution
- \"methodology\": string, one concise paragraph summarizing the approach
- \"core_results\": string, one paragraph on key findings with specific metrics where available
- \"limitations\": string, acknowledged limitations and any you identify
- \"connections\": array of 3-7 related concepts, methods or research areas, \
phrased as note titles (e.g. \"Transformer Architecture\", \"Self-Supervised Learning\")
- \"venue\": string, the conference or journal if detectable from the text, otherwise \"ArXiv\"

Return ONLY the JSON object. No markdown fencing, no explanation.";

static AUTHOR_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",|;|\band\b").expect("valid author separator regex"));

/// Split a raw author line into names.
pub fn split_authors(raw: &str) -> Vec<String> {
    AUTHOR_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

fn build_user_prompt(paper: &PaperData, content: &str) -> String {
    let meta = &paper.metadata;
    let mut parts = vec![
        format!("Paper Title: {}", meta.title),
        format!("Authors: {}", meta.authors),
    ];
    if let Some(id) = &meta.arxiv_id {
        parts.push(format!("ArXiv ID: {}", id));
    }
    if let Some(date) = &meta.date {
        parts.push(format!("Date: {}", date));
    }
    parts.push(String::new());
    parts.push("--- PAPER CONTENT ---".to_string());
    parts.push(content.to_string());
    parts.join("\n")
}

/// Produce a digest of `paper`.
///
/// Bibliographic fields come from the parsed metadata; the analysis fields
/// come from the model and default to empty when it omits them.
pub async fn digest_paper(client: &LlmClient, paper: &PaperData, max_chars: usize) -> Result<PaperDigest> {
    let content = prepare_content(&paper.sections, &paper.full_text, max_chars);
    debug!("Digest content prepared: {} chars", content.chars().count());

    let prompt = build_user_prompt(paper, &content);
    info!("Requesting digest from {}", client.model_name());
    let reply = client
        .complete(SYSTEM_PROMPT, &prompt, MAX_TOKENS)
        .await
        .context("Digest request failed")?;
    debug!("Digest reply: {} chars", reply.len());

    let data = parse_llm_json(&reply)?;
    let meta = &paper.metadata;

    let digest = PaperDigest {
        title: meta.title.clone(),
        authors: split_authors(&meta.authors),
        date: meta.date.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        venue: string_field(&data, "venue").unwrap_or_else(|| "ArXiv".to_string()),
        arxiv_id: meta.arxiv_id.clone(),
        tags: string_list(&data, "tags"),
        key_contribution: string_field(&data, "key_contribution").unwrap_or_default(),
        methodology: string_field(&data, "methodology").unwrap_or_default(),
        core_results: string_field(&data, "core_results").unwrap_or_default(),
        limitations: string_field(&data, "limitations").unwrap_or_default(),
        connections: string_list(&data, "connections"),
    };

    info!("Digest complete: {} tags, {} connections", digest.tags.len(), digest.connections.len());
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{client_for, mount_reply, sample_paper};
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_split_authors() {
        assert_eq!(
            split_authors("Chengyi Wang, Sanyuan Chen; Yu Wu and Ziqiang Zhang"),
            vec!["Chengyi Wang", "Sanyuan Chen", "Yu Wu", "Ziqiang Zhang"]
        );
        // "and" inside a name is not a separator
        assert_eq!(split_authors("Alexander Sand"), vec!["Alexander Sand"]);
        assert_eq!(split_authors("Unknown"), vec!["Unknown"]);
        assert!(split_authors(" , ;").is_empty());
    }

    #[test]
    fn test_user_prompt_layout() {
        let paper = sample_paper();
        let prompt = build_user_prompt(&paper, "BODY");
        assert_eq!(
            prompt,
            "Paper Title: Neural Codec Language Models\n\
             Authors: Chengyi Wang, Sanyuan Chen\n\
             ArXiv ID: 2301.02111\n\
             Date: 2023-01\n\
             \n\
             --- PAPER CONTENT ---\n\
             BODY"
        );

        let mut local = sample_paper();
        local.metadata.arxiv_id = None;
        local.metadata.date = None;
        let prompt = build_user_prompt(&local, "BODY");
        assert!(!prompt.contains("ArXiv ID"));
        assert!(!prompt.contains("Date:"));
    }

    #[tokio::test]
    async fn test_digest_merges_metadata_and_model_fields() {
        let server = MockServer::start().await;
        mount_reply(
            &server,
            "```json\n{\"tags\": [\"text-to-speech\", \"neural-codec\"], \
             \"key_contribution\": \"TTS as language modeling.\", \
             \"methodology\": \"Discrete codec tokens.\", \
             \"core_results\": \"Beats baselines.\", \
             \"limitations\": \"Robustness.\", \
             \"connections\": [\"Language Models\"]}\n```",
        )
        .await;

        let digest = digest_paper(&client_for(&server), &sample_paper(), 200_000)
            .await
            .unwrap();

        assert_eq!(digest.title, "Neural Codec Language Models");
        assert_eq!(digest.authors, vec!["Chengyi Wang", "Sanyuan Chen"]);
        assert_eq!(digest.date, "2023-01");
        assert_eq!(digest.arxiv_id.as_deref(), Some("2301.02111"));
        assert_eq!(digest.venue, "ArXiv");
        assert_eq!(digest.tags, vec!["text-to-speech", "neural-codec"]);
        assert_eq!(digest.key_contribution, "TTS as language modeling.");
        assert_eq!(digest.connections, vec!["Language Models"]);
    }

    #[tokio::test]
    async fn test_digest_defaults_for_missing_fields() {
        let server = MockServer::start().await;
        mount_reply(&server, "{\"venue\": \"ICML\"}").await;

        let mut paper = sample_paper();
        paper.metadata.date = None;
        let digest = digest_paper(&client_for(&server), &paper, 200_000).await.unwrap();

        assert_eq!(digest.venue, "ICML");
        assert_eq!(digest.date, "Unknown");
        assert!(digest.tags.is_empty());
        assert_eq!(digest.methodology, "");
    }

    #[tokio::test]
    async fn test_digest_sends_paper_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("--- PAPER CONTENT ---"))
            .and(body_string_contains("We introduce VALL-E"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "{}"}],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        digest_paper(&client_for(&server), &sample_paper(), 200_000)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_digest_unparseable_reply() {
        let server = MockServer::start().await;
        mount_reply(&server, "Sorry, I can't do that.").await;

        let err = digest_paper(&client_for(&server), &sample_paper(), 200_000)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Sorry, I can't do that."));
    }
}
