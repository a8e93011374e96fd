//! Profile enrichment: fetch a page, strip it to text, summarize it.
//!
//! HTML is reduced to visible text with two `lol_html` passes. The first
//! removes non-content elements and pads block elements with spaces; the
//! second collects the remaining text nodes.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use html_escape::decode_html_entities;
use lol_html::html_content::ContentType;
use lol_html::{doc_text, element, HtmlRewriter, Settings};
use std::sync::Arc;
use std::time::Duration;

use warm_ranker_core::agent::{LanguageModel, ProfileEnricher};

use crate::config::EnrichmentConfig;

const STRIPPED_ELEMENTS: &str = "script, style, noscript, svg, head, template, iframe";
const BLOCK_ELEMENTS: &str =
    "p, div, br, li, ul, ol, tr, td, th, h1, h2, h3, h4, h5, h6, section, article, header, footer";

/// Build the summarization prompt for scraped page text.
pub fn enrichment_prompt(content: &str) -> String {
    format!("Extract concise bio and skills summary from: {}", content)
}

/// Reduce an HTML document to whitespace-collapsed visible text.
pub fn html_to_text(html: &str) -> Result<String> {
    let mut cleaned = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!(STRIPPED_ELEMENTS, |el| {
                    el.remove();
                    Ok(())
                }),
                element!(BLOCK_ELEMENTS, |el| {
                    el.before(" ", ContentType::Text);
                    el.after(" ", ContentType::Text);
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| cleaned.extend_from_slice(chunk),
    );
    rewriter
        .write(html.as_bytes())
        .map_err(|e| anyhow!("html rewrite error: {}", e))?;
    rewriter
        .end()
        .map_err(|e| anyhow!("html rewrite error: {}", e))?;

    let mut text = String::new();
    let mut collector = HtmlRewriter::new(
        Settings {
            document_content_handlers: vec![doc_text!(|t| {
                text.push_str(t.as_str());
                Ok(())
            })],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );
    collector
        .write(&cleaned)
        .map_err(|e| anyhow!("html rewrite error: {}", e))?;
    collector
        .end()
        .map_err(|e| anyhow!("html rewrite error: {}", e))?;

    Ok(collapse_whitespace(&decode_html_entities(&text)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters, never splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Scrapes a profile URL and asks the language model for a short bio.
///
/// Without a model every call fails, so contacts fall back to the
/// enrichment-failed bio without any network traffic.
pub struct WebProfileEnricher {
    client: reqwest::Client,
    model: Option<Arc<dyn LanguageModel>>,
    max_content_chars: usize,
}

impl WebProfileEnricher {
    pub fn new(config: &EnrichmentConfig, model: Option<Arc<dyn LanguageModel>>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            model,
            max_content_chars: config.max_content_chars,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("Fetching {} returned {}", url, status);
        }
        let body = response.text().await?;
        html_to_text(&body)
    }
}

#[async_trait]
impl ProfileEnricher for WebProfileEnricher {
    async fn enrich(&self, url: &str) -> Result<String> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("no language model configured for enrichment"))?;

        let text = self.fetch_text(url).await?;
        if text.is_empty() {
            bail!("{} has no readable text", url);
        }
        let content = truncate_chars(&text, self.max_content_chars);

        let bio = model.complete(&enrichment_prompt(content)).await?;
        let bio = bio.trim();
        if bio.is_empty() {
            bail!("language model returned an empty bio for {}", url);
        }
        Ok(bio.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_strips_scripts_and_styles() {
        let html = r#"<html><head><title>Jane</title><style>p{color:red}</style></head>
            <body><script>var x = "secret";</script>
            <h1>Jane Doe</h1><p>Marketing lead at Tech Startup.</p>
            <noscript>enable js</noscript></body></html>"#;
        let text = html_to_text(html).unwrap();
        assert_eq!(text, "Jane Doe Marketing lead at Tech Startup.");
    }

    #[test]
    fn test_html_to_text_separates_blocks() {
        let text = html_to_text("<ul><li>Rust</li><li>Go</li></ul><p>Hiring</p>").unwrap();
        assert_eq!(text, "Rust Go Hiring");
    }

    #[test]
    fn test_html_to_text_decodes_common_entities() {
        let text = html_to_text("<p>R&amp;D &lt;AI&gt;</p>").unwrap();
        assert_eq!(text, "R&D <AI>");
    }

    #[test]
    fn test_html_to_text_decodes_named_and_numeric_entities() {
        let text =
            html_to_text("<p>Caf&eacute; &#x27;AI&#x27; &mdash; R&#38;D&nbsp;lead</p>").unwrap();
        assert_eq!(text, "Café 'AI' \u{2014} R&D lead");
    }

    #[test]
    fn test_html_to_text_plain_input() {
        assert_eq!(html_to_text("  just   text \n here ").unwrap(), "just text here");
        assert_eq!(html_to_text("").unwrap(), "");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_enrichment_prompt() {
        assert_eq!(
            enrichment_prompt("CTO at Acme"),
            "Extract concise bio and skills summary from: CTO at Acme"
        );
    }

    #[tokio::test]
    async fn test_enrich_without_model_fails_fast() {
        let enricher = WebProfileEnricher::new(&EnrichmentConfig::default(), None).unwrap();
        let err = enricher
            .enrich("http://127.0.0.1:9/profile")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no language model"));
    }
}
