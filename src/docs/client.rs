//! Typed client for the Google Docs v1 REST API.
//!
//! Only the three calls the log needs: read a document as flat text, insert
//! text at the head, and create a fresh document. Everything above the wire
//! goes through the [`DocumentApi`] trait so the log layer tests against a
//! stub store.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::docs::auth::GoogleAuth;
use crate::error::{is_retryable_status, DocError};

const API_BASE: &str = "https://docs.googleapis.com/v1/documents";

/// Body text begins at index 1; index 0 is the document start marker.
const HEAD_INDEX: u32 = 1;

/// Named paragraph style applied to entry headings.
const HEADING_STYLE: &str = "HEADING_2";

/// The document store seam. The production impl talks to Google Docs; tests
/// substitute an in-memory store.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Full document text, paragraphs flattened in order.
    async fn read_text(&self, doc_id: &str) -> Result<String, DocError>;

    /// Insert `text` at the head of the document body. When `heading` is
    /// given (UTF-16 offsets within `text`), that span is styled as a
    /// heading in the same atomic update.
    async fn insert_at_head(
        &self,
        doc_id: &str,
        text: &str,
        heading: Option<Range<u32>>,
    ) -> Result<(), DocError>;

    /// Create a new document, returning its id.
    async fn create_document(&self, title: &str) -> Result<String, DocError>;
}

pub struct GoogleDocsClient {
    client: reqwest::Client,
    auth: Arc<GoogleAuth>,
}

impl GoogleDocsClient {
    pub fn new(auth: Arc<GoogleAuth>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, auth }
    }

    async fn check_status(
        doc_id: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DocError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(match code {
            401 | 403 => DocError::AuthFailed(format!("HTTP {code}: {body}")),
            429 => DocError::RateLimited { retry_after: None },
            _ if is_retryable_status(code) => DocError::ServerError {
                status: code,
                reason: body,
            },
            _ => DocError::RequestFailed {
                doc_id: doc_id.to_string(),
                reason: format!("HTTP {code}: {body}"),
            },
        })
    }
}

#[async_trait]
impl DocumentApi for GoogleDocsClient {
    async fn read_text(&self, doc_id: &str) -> Result<String, DocError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(format!("{API_BASE}/{doc_id}"))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| DocError::Transport(e.to_string()))?;

        let response = Self::check_status(doc_id, response).await?;
        let document: Document = response
            .json()
            .await
            .map_err(|e| DocError::InvalidPayload(e.to_string()))?;
        Ok(document.flatten_text())
    }

    async fn insert_at_head(
        &self,
        doc_id: &str,
        text: &str,
        heading: Option<Range<u32>>,
    ) -> Result<(), DocError> {
        let token = self.auth.access_token().await?;
        let mut requests = vec![UpdateRequest::InsertText {
            location: Location { index: HEAD_INDEX },
            text: text.to_string(),
        }];
        if let Some(span) = heading {
            requests.push(UpdateRequest::UpdateParagraphStyle {
                range: TextRange {
                    start_index: HEAD_INDEX + span.start,
                    end_index: HEAD_INDEX + span.end,
                },
                paragraph_style: ParagraphStyle {
                    named_style_type: HEADING_STYLE,
                },
                fields: "namedStyleType",
            });
        }
        let body = BatchUpdateRequest { requests };
        let response = self
            .client
            .post(format!("{API_BASE}/{doc_id}:batchUpdate"))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| DocError::Transport(e.to_string()))?;

        Self::check_status(doc_id, response).await?;
        Ok(())
    }

    async fn create_document(&self, title: &str) -> Result<String, DocError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(API_BASE)
            .bearer_auth(token.expose_secret())
            .json(&CreateRequest { title })
            .send()
            .await
            .map_err(|e| DocError::Transport(e.to_string()))?;

        let response = Self::check_status("(new)", response).await?;
        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| DocError::InvalidPayload(e.to_string()))?;
        Ok(created.document_id)
    }
}

// -- Wire types --

#[derive(Serialize)]
struct BatchUpdateRequest {
    requests: Vec<UpdateRequest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum UpdateRequest {
    #[serde(rename_all = "camelCase")]
    InsertText { location: Location, text: String },
    #[serde(rename_all = "camelCase")]
    UpdateParagraphStyle {
        range: TextRange,
        paragraph_style: ParagraphStyle,
        fields: &'static str,
    },
}

#[derive(Serialize)]
struct Location {
    index: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextRange {
    start_index: u32,
    end_index: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphStyle {
    named_style_type: &'static str,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    title: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    document_id: String,
}

#[derive(Deserialize, Default)]
struct Document {
    #[serde(default)]
    body: DocBody,
}

#[derive(Deserialize, Default)]
struct DocBody {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Deserialize)]
struct StructuralElement {
    paragraph: Option<Paragraph>,
}

#[derive(Deserialize)]
struct Paragraph {
    #[serde(default)]
    elements: Vec<ParagraphElement>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphElement {
    text_run: Option<TextRun>,
}

#[derive(Deserialize)]
struct TextRun {
    #[serde(default)]
    content: String,
}

impl Document {
    /// Concatenate every text run in document order. Paragraph text runs
    /// already carry their trailing newlines.
    fn flatten_text(&self) -> String {
        let mut text = String::new();
        for element in &self.body.content {
            let Some(paragraph) = &element.paragraph else {
                continue;
            };
            for part in &paragraph.elements {
                if let Some(run) = &part.text_run {
                    text.push_str(&run.content);
                }
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flatten_concatenates_text_runs_in_order() {
        let raw = serde_json::json!({
            "title": "Coach Log",
            "body": {
                "content": [
                    { "sectionBreak": {} },
                    { "paragraph": { "elements": [
                        { "textRun": { "content": "Coach Log\n" } }
                    ]}},
                    { "paragraph": { "elements": [
                        { "textRun": { "content": "Daily Check-in: " } },
                        { "textRun": { "content": "2026-08-28\n" } }
                    ]}}
                ]
            }
        });

        let document: Document = serde_json::from_value(raw).unwrap();
        assert_eq!(
            document.flatten_text(),
            "Coach Log\nDaily Check-in: 2026-08-28\n"
        );
    }

    #[test]
    fn flatten_tolerates_missing_body() {
        let document: Document = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(document.flatten_text(), "");
    }

    #[test]
    fn insert_request_wire_shape() {
        let body = BatchUpdateRequest {
            requests: vec![UpdateRequest::InsertText {
                location: Location { index: HEAD_INDEX },
                text: "\nentry\n".to_string(),
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requests": [
                    { "insertText": { "location": { "index": 1 }, "text": "\nentry\n" } }
                ]
            })
        );
    }

    #[test]
    fn styled_insert_batches_heading_style_request() {
        // "\nDaily Check-in: 2026-08-28\n..." with the heading at span 1..27
        // in the inserted text, so 2..28 once offset by the head index.
        let body = BatchUpdateRequest {
            requests: vec![
                UpdateRequest::InsertText {
                    location: Location { index: HEAD_INDEX },
                    text: "\nDaily Check-in: 2026-08-28\nbody\n\n---\n".to_string(),
                },
                UpdateRequest::UpdateParagraphStyle {
                    range: TextRange {
                        start_index: HEAD_INDEX + 1,
                        end_index: HEAD_INDEX + 27,
                    },
                    paragraph_style: ParagraphStyle {
                        named_style_type: HEADING_STYLE,
                    },
                    fields: "namedStyleType",
                },
            ],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requests": [
                    { "insertText": {
                        "location": { "index": 1 },
                        "text": "\nDaily Check-in: 2026-08-28\nbody\n\n---\n"
                    }},
                    { "updateParagraphStyle": {
                        "range": { "startIndex": 2, "endIndex": 28 },
                        "paragraphStyle": { "namedStyleType": "HEADING_2" },
                        "fields": "namedStyleType"
                    }}
                ]
            })
        );
    }
}
