//! Embedding vault wikilinks into digest prose.

use crate::llm::{parse_llm_json, string_field, string_list, LlmClient};
use crate::models::PaperDigest;
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const MAX_TOKENS: u32 = 2000;

const SYSTEM_PROMPT: &str = "\
You are a knowledge graph linker for an Obsidian vault. Given a paper digest and a \
list of existing vault note titles, embed [[wikilinks]] into the digest text where \
those concepts naturally appear.

Rules:
1. Only link to notes that exist in the provided vault list. Do NOT invent links.
2. Use the EXACT note title in double brackets, e.g. [[Transformer Architecture]].
3. Link each concept at most ONCE per field, at its first natural occurrence.
4. Insert links inline within the existing prose without altering meaning or wording.
5. Only link when the text genuinely discusses the concept.
6. For close matches (vault has \"Attention\", text says \"attention mechanism\"), \
link as [[Attention]] at the appropriate point.
7. Preserve all original text; only add [[ and ]] around matching concept names.

Return a JSON object with exactly these keys:
- \"key_contribution\": string with [[wikilinks]] embedded
- \"methodology\": string with [[wikilinks]] embedded
- \"core_results\": string with [[wikilinks]] embedded
- \"limitations\": string with [[wikilinks]] embedded
- \"linked_concepts\": array of the vault note titles you actually linked

Return ONLY the JSON object. No markdown fencing, no explanation.";

fn build_user_prompt(digest: &PaperDigest, vault_notes: &[String]) -> String {
    let note_list = vault_notes
        .iter()
        .map(|title| format!("- {}", title))
        .collect::<Vec<_>>()
        .join("\n");

    [
        format!("Paper: {}", digest.title),
        format!("Tags: {}", digest.tags.join(", ")),
        String::new(),
        "--- EXISTING VAULT NOTES ---".to_string(),
        note_list,
        String::new(),
        "--- DIGEST TEXT FIELDS TO LINK ---".to_string(),
        String::new(),
        "key_contribution:".to_string(),
        digest.key_contribution.clone(),
        String::new(),
        "methodology:".to_string(),
        digest.methodology.clone(),
        String::new(),
        "core_results:".to_string(),
        digest.core_results.clone(),
        String::new(),
        "limitations:".to_string(),
        digest.limitations.clone(),
    ]
    .join("\n")
}

/// Rewrite the digest prose with `[[wikilinks]]` to existing vault notes.
///
/// Returns the linked digest and the concepts that were linked. With no
/// vault notes the digest is returned untouched without calling the model.
pub async fn link_concepts(
    client: &LlmClient,
    digest: PaperDigest,
    vault_notes: &[String],
) -> Result<(PaperDigest, Vec<String>)> {
    if vault_notes.is_empty() {
        info!("No vault notes provided, skipping concept linking");
        return Ok((digest, Vec::new()));
    }

    let prompt = build_user_prompt(&digest, vault_notes);
    debug!(
        "Linker prompt prepared: {} chars, {} vault notes",
        prompt.chars().count(),
        vault_notes.len()
    );

    info!("Requesting concept links from {}", client.model_name());
    let reply = client
        .complete(SYSTEM_PROMPT, &prompt, MAX_TOKENS)
        .await
        .context("Concept linking request failed")?;
    let data = parse_llm_json(&reply)?;

    let known: HashSet<&str> = vault_notes.iter().map(String::as_str).collect();
    let mut linked = Vec::new();
    for concept in string_list(&data, "linked_concepts") {
        if !known.contains(concept.as_str()) {
            warn!("Dropping linked concept not in vault: {}", concept);
        } else if !linked.contains(&concept) {
            linked.push(concept);
        }
    }

    let linked_digest = PaperDigest {
        key_contribution: string_field(&data, "key_contribution").unwrap_or(digest.key_contribution),
        methodology: string_field(&data, "methodology").unwrap_or(digest.methodology),
        core_results: string_field(&data, "core_results").unwrap_or(digest.core_results),
        limitations: string_field(&data, "limitations").unwrap_or(digest.limitations),
        ..digest
    };

    info!("Linked {} concepts: {:?}", linked.len(), linked);
    Ok((linked_digest, linked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{client_for, mount_reply, sample_digest};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vault() -> Vec<String> {
        vec!["Language Models".to_string(), "Neural Audio Codec".to_string()]
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_user_prompt(&sample_digest(), &vault());
        assert!(prompt.starts_with(
            "Paper: Neural Codec Language Models\nTags: text-to-speech, neural-codec\n\n--- EXISTING VAULT NOTES ---\n- Language Models\n- Neural Audio Codec\n\n--- DIGEST TEXT FIELDS TO LINK ---\n\nkey_contribution:\n"
        ));
        assert!(prompt.ends_with("limitations:\nStruggles with noisy prompts."));
    }

    #[tokio::test]
    async fn test_empty_vault_skips_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let digest = sample_digest();
        let (linked, concepts) = link_concepts(&client_for(&server), digest.clone(), &[])
            .await
            .unwrap();
        assert_eq!(linked, digest);
        assert!(concepts.is_empty());
    }

    #[tokio::test]
    async fn test_links_fields_and_filters_concepts() {
        let server = MockServer::start().await;
        mount_reply(
            &server,
            "{\"key_contribution\": \"TTS as [[Language Models]].\", \
             \"methodology\": \"Tokens from a [[Neural Audio Codec]].\", \
             \"linked_concepts\": [\"Language Models\", \"Neural Audio Codec\", \"Invented Note\", \"Language Models\"]}",
        )
        .await;

        let digest = sample_digest();
        let (linked, concepts) = link_concepts(&client_for(&server), digest.clone(), &vault())
            .await
            .unwrap();

        assert_eq!(linked.key_contribution, "TTS as [[Language Models]].");
        assert_eq!(linked.methodology, "Tokens from a [[Neural Audio Codec]].");
        // Fields the model omitted keep their original text
        assert_eq!(linked.core_results, digest.core_results);
        assert_eq!(linked.limitations, digest.limitations);
        assert_eq!(linked.connections, digest.connections);
        assert_eq!(concepts, vec!["Language Models", "Neural Audio Codec"]);
    }
}
