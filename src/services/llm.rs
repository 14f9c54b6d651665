use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Debug;
use url::Url;

use crate::core::config::LlmConfig;
use crate::core::error::{GenError, GenResult, ServiceError};
use crate::core::state::VideoClip;

/// Text fragments of a streamed response, in arrival order.
pub type TextStream = BoxStream<'static, GenResult<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextRequest {
    pub system_instruction: Option<String>,
    pub contents: Vec<Message>,
    /// Requests `application/json` output constrained to this schema.
    pub response_schema: Option<Value>,
    pub use_search: bool,
    pub temperature: Option<f32>,
}

impl TextRequest {
    pub fn single(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Message::user(prompt)],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub aspect_ratio: String,
}

/// Snapshot of a long-running video job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoJob {
    pub name: String,
    pub done: bool,
    pub video_uri: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait GenerativeService: Send + Sync + Debug {
    async fn generate(&self, request: &TextRequest) -> GenResult<String>;
    async fn generate_stream(&self, request: &TextRequest) -> GenResult<TextStream>;
    async fn submit_video(&self, request: &VideoRequest) -> GenResult<VideoJob>;
    async fn poll_video(&self, job_name: &str) -> GenResult<VideoJob>;
    async fn download(&self, uri: &str) -> GenResult<VideoClip>;
}

// --- Gemini ---

#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    text_model: String,
    video_model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Fails with a configuration error when no usable key is given.
    pub fn new(api_key: Option<String>, config: &LlmConfig) -> GenResult<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenError::config("API key is not set (llm.api_key or GEMINI_API_KEY)"))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            video_model: config.video_model.clone(),
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> GenResult<Self> {
        Self::new(config.resolve_api_key(), config)
    }

    fn endpoint(&self, path: &str) -> GenResult<Url> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| GenError::config(format!("Invalid base_url {}: {}", self.base_url, e)))
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: Url, body: &T) -> GenResult<reqwest::Response> {
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        ensure_success(resp).await
    }
}

async fn ensure_success(resp: reqwest::Response) -> GenResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Endpoint { status: status.as_u16(), body }.into())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: Role,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl From<&TextRequest> for GeminiRequest {
    fn from(request: &TextRequest) -> Self {
        let generation_config = if request.response_schema.is_some() || request.temperature.is_some() {
            Some(GeminiGenerationConfig {
                response_mime_type: request
                    .response_schema
                    .as_ref()
                    .map(|_| "application/json".to_string()),
                response_schema: request.response_schema.clone(),
                temperature: request.temperature,
            })
        } else {
            None
        };

        Self {
            contents: request
                .contents
                .iter()
                .map(|m| GeminiContent {
                    role: m.role,
                    parts: vec![GeminiPart { text: m.text.clone() }],
                })
                .collect(),
            system_instruction: request.system_instruction.as_ref().map(|s| GeminiSystemInstruction {
                parts: vec![GeminiPart { text: s.clone() }],
            }),
            generation_config,
            tools: if request.use_search {
                vec![serde_json::json!({ "googleSearch": {} })]
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, or None when it carries no text.
    fn into_text(self) -> GenResult<Option<String>> {
        if let Some(err) = self.error {
            return Err(ServiceError::Endpoint { status: 200, body: err.message }.into());
        }

        let first = match self.candidates.and_then(|c| c.into_iter().next()) {
            Some(first) => first,
            None => return Ok(None),
        };

        let text: String = first
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            // A closing chunk ends on STOP or MAX_TOKENS after the text already arrived.
            if let Some(reason) = first.finish_reason.as_deref() {
                if reason != "STOP" && reason != "MAX_TOKENS" {
                    return Err(GenError::format(format!("Response blocked. Finish reason: {}", reason)));
                }
            }
            return Ok(None);
        }
        Ok(Some(text))
    }
}

/// Text carried by one `data:` line of a streamed response.
fn parse_sse_line(line: &str) -> Option<GenResult<String>> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GeminiResponse>(payload) {
        Ok(resp) => resp.into_text().transpose(),
        Err(e) => Some(Err(GenError::format(format!("Bad stream chunk: {}. Chunk: {}", e, payload)))),
    }
}

struct SseState {
    bytes: BoxStream<'static, GenResult<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<GenResult<String>>,
    finished: bool,
}

impl SseState {
    fn drain_lines(&mut self, flush: bool) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.push_line(&line);
        }
        if flush && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.push_line(&rest);
        }
    }

    fn push_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        if let Some(item) = parse_sse_line(line.trim_end()) {
            self.pending.push_back(item);
        }
    }
}

fn sse_text_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Into<GenError>,
{
    let state = SseState {
        bytes: bytes.map(|r| r.map(|b| b.as_ref().to_vec()).map_err(Into::into)).boxed(),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(&chunk);
                    st.drain_lines(false);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.finished = true;
                    st.drain_lines(true);
                }
            }
        }
    })
    .boxed()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    aspect_ratio: String,
}

#[derive(Deserialize)]
struct OperationResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    response: Option<OperationResult>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize)]
struct GeneratedSample {
    video: Option<GeneratedVideo>,
}

#[derive(Deserialize)]
struct GeneratedVideo {
    uri: Option<String>,
}

impl From<OperationResponse> for VideoJob {
    fn from(op: OperationResponse) -> Self {
        let video_uri = op
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().find_map(|s| s.video.and_then(|v| v.uri)));
        Self {
            name: op.name,
            done: op.done,
            video_uri,
            error: op.error.map(|e| e.message),
        }
    }
}

async fn read_operation(resp: reqwest::Response) -> GenResult<VideoJob> {
    let body = resp.text().await?;
    let op: OperationResponse = serde_json::from_str(&body)
        .map_err(|e| GenError::format(format!("Failed to parse video operation: {}. Body: {}", e, body)))?;
    Ok(op.into())
}

#[async_trait]
impl GenerativeService for GeminiClient {
    async fn generate(&self, request: &TextRequest) -> GenResult<String> {
        let url = self.endpoint(&format!("models/{}:generateContent", self.text_model))?;
        let resp = self.post_json(url, &GeminiRequest::from(request)).await?;

        let response_text = resp.text().await?;
        let result: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            GenError::format(format!("Failed to parse Gemini response: {}. Body: {}", e, response_text))
        })?;

        Ok(result.into_text()?.unwrap_or_default())
    }

    async fn generate_stream(&self, request: &TextRequest) -> GenResult<TextStream> {
        let mut url = self.endpoint(&format!("models/{}:streamGenerateContent", self.text_model))?;
        url.query_pairs_mut().append_pair("alt", "sse");
        let resp = self.post_json(url, &GeminiRequest::from(request)).await?;
        Ok(sse_text_stream(resp.bytes_stream()))
    }

    async fn submit_video(&self, request: &VideoRequest) -> GenResult<VideoJob> {
        let url = self.endpoint(&format!("models/{}:predictLongRunning", self.video_model))?;
        let body = PredictRequest {
            instances: vec![PredictInstance { prompt: request.prompt.clone() }],
            parameters: PredictParameters { aspect_ratio: request.aspect_ratio.clone() },
        };
        let resp = self.post_json(url, &body).await?;
        let job = read_operation(resp).await?;
        if job.name.is_empty() {
            return Err(GenError::format("Video job was accepted without an operation name"));
        }
        Ok(job)
    }

    async fn poll_video(&self, job_name: &str) -> GenResult<VideoJob> {
        let url = self.endpoint(job_name.trim_start_matches('/'))?;
        let resp = self
            .client
            .get(url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        read_operation(ensure_success(resp).await?).await
    }

    async fn download(&self, uri: &str) -> GenResult<VideoClip> {
        let url = Url::parse(uri).map_err(|e| GenError::format(format!("Invalid video URI {}: {}", uri, e)))?;
        let resp = self
            .client
            .get(url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ServiceError::Download(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ServiceError::Download(format!("status {}", resp.status())).into());
        }

        let mime_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = resp.bytes().await.map_err(|e| ServiceError::Download(e.to_string()))?;
        Ok(VideoClip { bytes: bytes.to_vec(), mime_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_config_error() {
        let err = GeminiClient::new(None, &LlmConfig::default()).unwrap_err();
        assert!(err.is_config());

        let err = GeminiClient::new(Some("   ".to_string()), &LlmConfig::default()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_request_serialization() {
        let request = TextRequest {
            system_instruction: Some("be brief".to_string()),
            contents: vec![Message::user("hi"), Message::model("hello"), Message::user("again")],
            response_schema: Some(serde_json::json!({ "type": "OBJECT" })),
            use_search: true,
            temperature: None,
        };
        let json = serde_json::to_value(GeminiRequest::from(&request)).unwrap();

        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "again");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert!(json["tools"][0].get("googleSearch").is_some());
    }

    #[test]
    fn test_plain_request_omits_optional_sections() {
        let json = serde_json::to_value(GeminiRequest::from(&TextRequest::single("x"))).unwrap();
        assert!(json.get("systemInstruction").is_none());
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_gemini_response_parsing_success() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [ { "text": "Hello " }, { "text": "world" } ],
                        "role": "model"
                    },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(result.into_text().unwrap().as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_gemini_response_parsing_safety_block() {
        let json = r#"{ "candidates": [ { "finishReason": "SAFETY", "index": 0 } ] }"#;
        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(result.into_text(), Err(GenError::Format(_))));
    }

    #[test]
    fn test_parse_sse_line() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"chunk"}],"role":"model"}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap().unwrap(), "chunk");

        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line(r#"data: {"candidates":[{"finishReason":"STOP"}]}"#).is_none());
        assert!(matches!(parse_sse_line("data: {oops"), Some(Err(GenError::Format(_)))));
    }

    #[test]
    fn test_max_tokens_closing_chunk_is_not_an_error() {
        let line = r#"data: {"candidates":[{"content":{"parts":[],"role":"model"},"finishReason":"MAX_TOKENS"}]}"#;
        assert!(parse_sse_line(line).is_none());
    }

    #[tokio::test]
    async fn test_sse_stream_joins_split_lines() {
        let mut first = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"caf".as_bytes().to_vec();
        let mut second = "é\"}]}}]}\n\n".as_bytes().to_vec();
        // Split inside the two-byte encoding of 'é'.
        first.push(second.remove(0));
        let chunks: Vec<Result<Vec<u8>, GenError>> = vec![
            Ok(first),
            Ok(second),
            Ok(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" au lait\"}]}}]}".to_vec()),
            Ok(b"\ndata: {\"candidates\":[{\"finishReason\":\"MAX_TOKENS\"}]}".to_vec()),
        ];

        let pieces: Vec<String> = sse_text_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(pieces, vec!["café", " au lait"]);
    }

    #[tokio::test]
    async fn test_sse_stream_surfaces_transport_error() {
        let chunks: Vec<Result<Vec<u8>, GenError>> = vec![
            Ok(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\n".to_vec()),
            Err(ServiceError::Transport("reset".to_string()).into()),
        ];
        let items: Vec<GenResult<String>> = sse_text_stream(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "a");
        assert!(matches!(items[1], Err(GenError::Service(ServiceError::Transport(_)))));
    }

    #[test]
    fn test_operation_parsing() {
        let running: OperationResponse =
            serde_json::from_str(r#"{ "name": "models/veo/operations/abc" }"#).unwrap();
        let job = VideoJob::from(running);
        assert_eq!(job.name, "models/veo/operations/abc");
        assert!(!job.done);
        assert!(job.video_uri.is_none());

        let finished: OperationResponse = serde_json::from_str(
            r#"{
                "name": "models/veo/operations/abc",
                "done": true,
                "response": {
                    "generateVideoResponse": {
                        "generatedSamples": [ { "video": { "uri": "https://example.com/v.mp4" } } ]
                    }
                }
            }"#,
        )
        .unwrap();
        let job = VideoJob::from(finished);
        assert!(job.done);
        assert_eq!(job.video_uri.as_deref(), Some("https://example.com/v.mp4"));

        let failed: OperationResponse =
            serde_json::from_str(r#"{ "name": "x", "done": true, "error": { "code": 3, "message": "blocked" } }"#)
                .unwrap();
        assert_eq!(VideoJob::from(failed).error.as_deref(), Some("blocked"));
    }
}
