use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::types::{GenerationRequest, ImagePayload, ModelId, ModelInvoker, SafetySetting};
use super::InvocationError;
use crate::config::AnalysisConfig;

/// Gemini `generateContent` client over blocking HTTP.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    temperature: f32,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    fn endpoint(&self, model: &ModelId) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    safety_settings: &'a [SafetySetting],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Google API error envelope: `{"error": {"code", "status", "message", "details"}}`.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Deserialize)]
struct ErrorPayload {
    code: Option<u16>,
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

fn request_body<'a>(
    request: &'a GenerationRequest<'a>,
    temperature: f32,
) -> GenerateContentRequest<'a> {
    let mut parts = vec![Part::Text {
        text: request.prompt,
    }];
    if let Some(image) = request.image {
        parts.push(inline_image(image));
    }

    GenerateContentRequest {
        contents: vec![Content { role: "user", parts }],
        safety_settings: &request.safety.settings,
        generation_config: GenerationConfig { temperature },
    }
}

fn inline_image(image: &ImagePayload) -> Part<'static> {
    Part::InlineData {
        inline_data: InlineData {
            mime_type: image.mime_type.clone(),
            data: image.to_base64(),
        },
    }
}

/// Turn a non-2xx response into an `InvocationError`.
///
/// Falls back to the raw body (truncated) when it is not an error envelope.
fn decode_error_response(http_status: u16, body: &str) -> InvocationError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        let snippet: String = body.chars().take(300).collect();
        return InvocationError::message(format!("HTTP {http_status}: {snippet}"))
            .with_status(http_status);
    };

    let payload = envelope.error;
    let mut err = InvocationError::message(
        payload
            .message
            .unwrap_or_else(|| format!("HTTP {http_status}")),
    )
    .with_status(payload.code.unwrap_or(http_status));
    if let Some(status) = payload.status {
        err = err.with_provider_status(status);
    }
    if let Some(reason) = payload.details.into_iter().find_map(|d| d.reason) {
        err = err.with_reason(reason);
    }
    err
}

/// Concatenate all text parts of a successful response.
///
/// A response with no text (safety block, empty candidate) is an error.
fn response_text(response: GenerateContentResponse) -> Result<String, InvocationError> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
    let mut finish_reason = None;
    let mut texts = Vec::new();

    for candidate in response.candidates {
        if finish_reason.is_none() {
            finish_reason = candidate.finish_reason;
        }
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        texts.extend(parts.into_iter().filter_map(|p| p.text));
    }

    // Parts are consecutive pieces of one reply.
    let text = texts.concat();
    if !text.trim().is_empty() {
        return Ok(text);
    }

    let reason = block_reason
        .or(finish_reason)
        .unwrap_or_else(|| "no candidates".to_string());
    Err(InvocationError::message(format!(
        "Model returned no text content ({reason})"
    )))
}

impl ModelInvoker for GeminiClient {
    fn generate(
        &self,
        model: &ModelId,
        request: &GenerationRequest<'_>,
    ) -> Result<String, InvocationError> {
        tracing::debug!(
            model = %model,
            prompt_len = request.prompt.len(),
            image_len = request.image.map_or(0, ImagePayload::len),
            "Calling Gemini generateContent"
        );

        let body = request_body(request, self.temperature);
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    InvocationError::message(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else if e.is_connect() {
                    InvocationError::message(format!("Could not connect to {}", self.base_url))
                } else {
                    InvocationError::message(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(decode_error_response(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| InvocationError::message(format!("Malformed Gemini response: {e}")))?;

        response_text(parsed)
    }
}

// ──────────────────────────────────────────────
// MockModelInvoker (testing)
// ──────────────────────────────────────────────

/// Scripted invoker for tests.
///
/// Each model gets a fixed result; unscripted models answer with a 404.
/// Calls are recorded in order together with the prompt that was sent.
#[derive(Default)]
pub struct MockModelInvoker {
    scripted: HashMap<String, Result<String, InvocationError>>,
    calls: Mutex<Vec<ModelId>>,
    prompts: Mutex<Vec<String>>,
}

impl MockModelInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, model: &str, text: &str) -> Self {
        self.scripted.insert(model.to_string(), Ok(text.to_string()));
        self
    }

    pub fn fail(mut self, model: &str, err: InvocationError) -> Self {
        self.scripted.insert(model.to_string(), Err(err));
        self
    }

    /// Models invoked so far, in call order.
    pub fn calls(&self) -> Vec<ModelId> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

impl ModelInvoker for MockModelInvoker {
    fn generate(
        &self,
        model: &ModelId,
        request: &GenerationRequest<'_>,
    ) -> Result<String, InvocationError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(model.clone());
        }
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.to_string());
        }
        self.scripted.get(model.as_str()).cloned().unwrap_or_else(|| {
            Err(InvocationError::message(format!("models/{model} is not found"))
                .with_status(404)
                .with_provider_status("NOT_FOUND"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::classify::{classify_invocation_error, ErrorKind};
    use crate::pipeline::analysis::types::SafetyPolicy;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn request_body_has_text_and_inline_image() {
        let image = ImagePayload::new("image/png", vec![1, 2, 3]);
        let safety = SafetyPolicy::clinical();
        let request = GenerationRequest {
            prompt: "analise",
            image: Some(&image),
            safety: &safety,
        };
        let value = serde_json::to_value(request_body(&request, 0.2)).unwrap();

        let parts = &value["contents"][0]["parts"];
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "analise");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(value["safetySettings"].as_array().unwrap().len(), 4);
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn request_body_without_image_has_one_part() {
        let safety = SafetyPolicy::clinical();
        let request = GenerationRequest {
            prompt: "prognóstico",
            image: None,
            safety: &safety,
        };
        let value = serde_json::to_value(request_body(&request, 0.2)).unwrap();
        assert_eq!(value["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn text_parts_are_joined() {
        let response =
            parse(r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#);
        assert_eq!(response_text(response).unwrap(), "ab");
    }

    #[test]
    fn json_split_across_parts_stays_valid() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"report\": \"Úlcera "},{"text":"venosa\"}"}]}}]}"#,
        );
        let text = response_text(response).unwrap();
        assert_eq!(text, r#"{"report": "Úlcera venosa"}"#);
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    }

    #[test]
    fn safety_block_is_an_error() {
        let response = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        let err = response_text(response).unwrap_err();
        assert!(err.message.contains("SAFETY"));
        assert_eq!(err.status, None);
    }

    #[test]
    fn empty_candidate_reports_finish_reason() {
        let response = parse(r#"{"candidates":[{"finishReason":"RECITATION"}]}"#);
        let err = response_text(response).unwrap_err();
        assert!(err.message.contains("RECITATION"));
    }

    #[test]
    fn expired_key_envelope_classifies_as_credential() {
        let body = r#"{"error":{"code":400,"message":"API key expired. Please renew the API key.","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID"}]}}"#;
        let err = decode_error_response(400, body);
        assert_eq!(err.status, Some(400));
        assert_eq!(err.provider_status.as_deref(), Some("INVALID_ARGUMENT"));
        assert_eq!(err.reason.as_deref(), Some("API_KEY_INVALID"));
        assert_eq!(classify_invocation_error(&err), ErrorKind::FatalCredential);
    }

    #[test]
    fn quota_envelope_classifies_as_quota() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = decode_error_response(429, body);
        assert_eq!(classify_invocation_error(&err), ErrorKind::FatalQuota);
    }

    #[test]
    fn not_found_envelope_is_retryable() {
        let body = r#"{"error":{"code":404,"message":"models/gemini-0 is not found for API version v1beta","status":"NOT_FOUND"}}"#;
        let err = decode_error_response(404, body);
        assert_eq!(classify_invocation_error(&err), ErrorKind::RetryableUnavailable);
    }

    #[test]
    fn non_envelope_body_keeps_status() {
        let err = decode_error_response(502, "<html>Bad Gateway</html>");
        assert_eq!(err.status, Some(502));
        assert!(err.message.contains("Bad Gateway"));
    }

    #[test]
    fn client_builds_endpoint_from_config() {
        let config = AnalysisConfig {
            api_base_url: "http://localhost:9999/v1beta/".into(),
            ..AnalysisConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(&ModelId::new("gemini-2.5-pro")),
            "http://localhost:9999/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn mock_records_calls_and_defaults_to_not_found() {
        let mock = MockModelInvoker::new().respond("gemini-b", "ok");
        let safety = SafetyPolicy::default();
        let request = GenerationRequest {
            prompt: "p",
            image: None,
            safety: &safety,
        };
        let a = mock.generate(&ModelId::new("gemini-a"), &request);
        let b = mock.generate(&ModelId::new("gemini-b"), &request);

        assert_eq!(
            classify_invocation_error(&a.unwrap_err()),
            ErrorKind::RetryableUnavailable
        );
        assert_eq!(b.unwrap(), "ok");
        assert_eq!(
            mock.calls(),
            vec![ModelId::new("gemini-a"), ModelId::new("gemini-b")]
        );
        assert_eq!(mock.last_prompt().as_deref(), Some("p"));
    }
}
