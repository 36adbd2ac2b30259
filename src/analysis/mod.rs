//! Model-driven paper analysis.
//!
//! Each step is a single prompt/response exchange: `digest` summarises the
//! paper, `linker` weaves vault wikilinks into the summary and `gaps`
//! proposes follow-up research. `content` fits paper text into a budget.

pub mod content;
pub mod digest;
pub mod gaps;
pub mod linker;

pub use content::prepare_content;
pub use digest::digest_paper;
pub use gaps::identify_gaps;
pub use linker::link_concepts;

#[cfg(test)]
pub(crate) mod tests {
    use crate::llm::{LlmClient, LlmConfig};
    use crate::models::{PaperData, PaperDigest, PaperMetadata, Section};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn client_for(server: &MockServer) -> LlmClient {
        LlmClient::new(LlmConfig {
            api_url: server.uri(),
            api_key: "test-key".to_string(),
            retries: 0,
            retry_base_delay: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap()
    }

    /// Answer every Messages request with a single text block.
    pub(crate) async fn mount_reply(server: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": text}],
                "stop_reason": "end_turn"
            })))
            .mount(server)
            .await;
    }

    fn section(name: &str, text: &str) -> Section {
        Section {
            name: name.to_string(),
            text: text.to_string(),
        }
    }

    pub(crate) fn sample_paper() -> PaperData {
        PaperData {
            metadata: PaperMetadata {
                title: "Neural Codec Language Models".to_string(),
                authors: "Chengyi Wang, Sanyuan Chen".to_string(),
                date: Some("2023-01".to_string()),
                arxiv_id: Some("2301.02111".to_string()),
                source_url: "https://arxiv.org/abs/2301.02111".to_string(),
            },
            sections: vec![
                section("Title", "Neural Codec Language Models"),
                section("Abstract", "We introduce VALL-E, a neural codec language model."),
                section("1 Introduction", "Speech synthesis has improved rapidly."),
                section("3 Method", "We train on discrete codec tokens."),
                section("5 Results", "VALL-E outperforms the baseline."),
            ],
            full_text: "Neural Codec Language Models\nWe introduce VALL-E.".to_string(),
            figures: vec![],
            tables: vec![],
            source: "https://arxiv.org/abs/2301.02111".to_string(),
        }
    }

    pub(crate) fn sample_digest() -> PaperDigest {
        PaperDigest {
            title: "Neural Codec Language Models".to_string(),
            authors: vec!["Chengyi Wang".to_string(), "Sanyuan Chen".to_string()],
            date: "2023-01".to_string(),
            venue: "ArXiv".to_string(),
            arxiv_id: Some("2301.02111".to_string()),
            tags: vec!["text-to-speech".to_string(), "neural-codec".to_string()],
            key_contribution: "TTS framed as conditional language modeling.".to_string(),
            methodology: "A decoder-only model over discrete codec tokens.".to_string(),
            core_results: "Better speaker similarity than the baseline.".to_string(),
            limitations: "Struggles with noisy prompts.".to_string(),
            connections: vec!["Language Models".to_string(), "Neural Audio Codec".to_string()],
        }
    }
}
