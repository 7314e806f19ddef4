//! Gemini generateContent API with function calling
//!
//! This module provides a client for the `models/{model}:generateContent`
//! endpoint of the Generative Language API, plus the mapping between the
//! local [`Conversation`] and the wire `contents` array.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::agent::conversation::{Conversation, Turn};
use crate::model::{ChatError, ModelClient, ModelResponse};
use crate::tools::{ToolInvocationRequest, ToolSpec};

/// Public Generative Language API endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Operating instruction sent with every request
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a coding agent. You MUST use the list_files and read_file functions to explore files. Never use code execution.";

/// A message in the `contents` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>, // "user", "model"
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts,
        }
    }
}

/// One piece of a message; exactly one payload field is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    /// Set by thinking models next to a function call; must be sent back with it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// A function call emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The result of a function call, sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// Function declaration advertised to the model
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value, // OpenAPI schema subset
}

impl From<&ToolSpec> for FunctionDeclaration {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            parameters: spec.parameters_schema(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionCallingConfig {
    pub mode: String, // "AUTO", "ANY", "NONE"
}

/// Request body for generateContent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub tools: Vec<ToolDeclarations>,
    pub tool_config: ToolConfig,
}

/// Response body from generateContent
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Map the local conversation onto the wire `contents` array
pub fn to_contents(conversation: &Conversation) -> Vec<Content> {
    conversation
        .turns()
        .iter()
        .map(|turn| match turn {
            Turn::User(text) => Content::user(vec![Part::text(text.clone())]),
            Turn::Model(text) => Content::model(vec![Part::text(text.clone())]),
            Turn::ToolCall(call) => Content::model(vec![Part {
                function_call: Some(FunctionCall {
                    name: call.name.clone(),
                    args: call.args_json(),
                }),
                thought_signature: call.signature.clone(),
                ..Default::default()
            }]),
            Turn::ToolResult { name, response } => Content::user(vec![Part {
                function_response: Some(FunctionResponse {
                    name: name.clone(),
                    response: response.clone(),
                }),
                ..Default::default()
            }]),
        })
        .collect()
}

/// Finish reason the service reports when the model emitted an unparseable call
const MALFORMED_FUNCTION_CALL: &str = "MALFORMED_FUNCTION_CALL";

/// Interpret a generateContent response
///
/// Function calls win over text: if any part carries a call, the whole
/// response is a tool request, in the order the parts arrived. A candidate
/// with neither calls nor text (or flagged as a malformed call) is a
/// protocol violation, not an empty answer.
pub fn parse_response(response: GenerateContentResponse) -> Result<ModelResponse, ChatError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ChatError::EmptyResponse)?;

    if candidate.finish_reason.as_deref() == Some(MALFORMED_FUNCTION_CALL) {
        return Err(ChatError::Malformed(
            "model produced a malformed function call".to_string(),
        ));
    }

    let content = candidate
        .content
        .filter(|c| !c.parts.is_empty())
        .ok_or(ChatError::EmptyResponse)?;

    let calls: Vec<ToolInvocationRequest> = content
        .parts
        .iter()
        .filter_map(|p| p.function_call.as_ref().map(|call| (call, p)))
        .map(|(call, part)| ToolInvocationRequest {
            name: call.name.clone(),
            args: match &call.args {
                Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                _ => Default::default(),
            },
            signature: part.thought_signature.clone(),
        })
        .collect();

    if !calls.is_empty() {
        return Ok(ModelResponse::ToolCallRequested { calls });
    }

    let texts: Vec<&str> = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if texts.is_empty() {
        return Err(ChatError::Malformed(format!(
            "response has neither text nor function calls (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("none")
        )));
    }

    Ok(ModelResponse::Final {
        text: texts.concat(),
    })
}

/// Client for the Gemini generateContent endpoint with tool support
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    system_instruction: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// Fails with [`ChatError::MissingCredential`] if `api_key` is blank.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ChatError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingCredential);
        }

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: model.into(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Point the client at a different endpoint (proxies, local fakes)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the request body for the given conversation and tools
    pub fn build_request(&self, conversation: &Conversation, tools: &[ToolSpec]) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: to_contents(conversation),
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(self.system_instruction.clone())],
            },
            tools: vec![ToolDeclarations {
                function_declarations: tools.iter().map(FunctionDeclaration::from).collect(),
            }],
            tool_config: ToolConfig {
                function_calling_config: FunctionCallingConfig {
                    mode: "AUTO".to_string(),
                },
            },
        }
    }

    /// Send one generateContent request
    pub async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ChatError> {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn invoke(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ChatError> {
        let request = self.build_request(conversation, tools);
        debug!(model = %self.model, turns = request.contents.len(), "Sending generateContent");
        let response = self.generate(&request).await?;
        parse_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    fn response_from(json: Value) -> GenerateContentResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_blank_api_key_rejected() {
        assert!(matches!(
            GeminiClient::new("  ", DEFAULT_MODEL),
            Err(ChatError::MissingCredential)
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = GeminiClient::new("key", DEFAULT_MODEL)
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_request_body_shape() {
        let client = GeminiClient::new("key", DEFAULT_MODEL).unwrap();
        let registry = ToolRegistry::default();
        let mut conversation = Conversation::new();
        conversation.push_user("What files are here?");

        let body = serde_json::to_value(client.build_request(&conversation, registry.list_tools())).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "What files are here?");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            DEFAULT_SYSTEM_INSTRUCTION
        );
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");

        let declarations = body["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[1]["name"], "read_file");
        assert_eq!(declarations[1]["parameters"]["required"][0], "filename");
    }

    #[test]
    fn test_tool_turns_map_to_function_parts() {
        let mut conversation = Conversation::new();
        conversation.push_user("read a.txt");
        conversation.push_tool_call(ToolInvocationRequest::new("read_file").with_arg("filename", "a.txt"));
        conversation.push_tool_result("read_file", serde_json::json!({ "result": "hello" }));
        conversation.push_model("It says hello.");

        let body = serde_json::to_value(to_contents(&conversation)).unwrap();

        assert_eq!(body[1]["role"], "model");
        assert_eq!(body[1]["parts"][0]["functionCall"]["name"], "read_file");
        assert_eq!(body[1]["parts"][0]["functionCall"]["args"]["filename"], "a.txt");
        assert!(body[1]["parts"][0].get("text").is_none());

        assert_eq!(body[2]["role"], "user");
        assert_eq!(body[2]["parts"][0]["functionResponse"]["response"]["result"], "hello");

        assert_eq!(body[3]["role"], "model");
        assert_eq!(body[3]["parts"][0]["text"], "It says hello.");
    }

    #[test]
    fn test_parse_text_response() {
        let response = response_from(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "There is " }, { "text": "one file." }] },
                "finishReason": "STOP"
            }]
        }));

        assert_eq!(
            parse_response(response).unwrap(),
            ModelResponse::Final { text: "There is one file.".to_string() }
        );
    }

    #[test]
    fn test_parse_function_calls_in_order() {
        let response = response_from(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "functionCall": { "name": "list_files" } },
                        { "functionCall": { "name": "read_file", "args": { "filename": "a.txt" } } }
                    ]
                }
            }]
        }));

        match parse_response(response).unwrap() {
            ModelResponse::ToolCallRequested { calls } => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].name, "list_files");
                assert!(calls[0].args.is_empty());
                assert_eq!(calls[1].args["filename"], "a.txt");
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_no_candidates() {
        let response = response_from(serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(matches!(parse_response(response), Err(ChatError::EmptyResponse)));
    }

    #[test]
    fn test_api_error_body() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#,
        )
        .unwrap();
        assert_eq!(body.error.message, "API key not valid.");
    }

    #[test]
    fn test_parse_malformed_function_call_finish_reason() {
        let response = response_from(serde_json::json!({
            "candidates": [{ "finishReason": "MALFORMED_FUNCTION_CALL" }]
        }));
        assert!(matches!(parse_response(response), Err(ChatError::Malformed(_))));
    }

    #[test]
    fn test_parse_parts_without_text_or_calls() {
        let response = response_from(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "executableCode": { "language": "PYTHON", "code": "print(1)" } }]
                },
                "finishReason": "STOP"
            }]
        }));

        match parse_response(response) {
            Err(ChatError::Malformed(msg)) => assert!(msg.contains("STOP")),
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn test_thought_signature_echoed_back() {
        let response = response_from(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "list_files", "args": {} }, "thoughtSignature": "c2lnLTE=" }]
                }
            }]
        }));

        let call = match parse_response(response).unwrap() {
            ModelResponse::ToolCallRequested { mut calls } => calls.remove(0),
            other => panic!("expected tool calls, got {:?}", other),
        };
        assert_eq!(call.signature.as_deref(), Some("c2lnLTE="));

        let mut conversation = Conversation::new();
        conversation.push_user("ls");
        conversation.push_tool_call(call);
        let body = serde_json::to_value(to_contents(&conversation)).unwrap();
        assert_eq!(body[1]["parts"][0]["thoughtSignature"], "c2lnLTE=");

        // Calls without a signature don't send the field
        conversation.push_tool_call(ToolInvocationRequest::new("list_files"));
        let body = serde_json::to_value(to_contents(&conversation)).unwrap();
        assert!(body[2]["parts"][0].get("thoughtSignature").is_none());
    }

    /// Answer exactly one HTTP request on a local port with a canned response.
    /// The join handle yields the raw request that was received.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .find_map(|line| {
                            line.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8(request).unwrap()
        });

        (base_url, handle)
    }

    fn client_for(base_url: &str) -> GeminiClient {
        GeminiClient::new("test-key", DEFAULT_MODEL)
            .unwrap()
            .with_base_url(base_url)
    }

    fn empty_request(client: &GeminiClient) -> GenerateContentRequest {
        let mut conversation = Conversation::new();
        conversation.push_user("hi");
        client.build_request(&conversation, ToolRegistry::default().list_tools())
    }

    #[tokio::test]
    async fn test_generate_maps_api_error_status() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 400 Bad Request",
            r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#,
        )
        .await;
        let client = client_for(&base_url);

        let err = client.generate(&empty_request(&client)).await.unwrap_err();
        server.await.unwrap();

        match err {
            ChatError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid.");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_keeps_raw_error_text() {
        let (base_url, server) = serve_once("HTTP/1.1 503 Service Unavailable", "overloaded").await;
        let client = client_for(&base_url);

        let err = client.generate(&empty_request(&client)).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, ChatError::Api { status: 503, ref message } if message == "overloaded"));
    }

    #[tokio::test]
    async fn test_generate_empty_body() {
        let (base_url, server) = serve_once("HTTP/1.1 200 OK", "").await;
        let client = client_for(&base_url);

        let err = client.generate(&empty_request(&client)).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, ChatError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_invoke_round_trip() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Two files."}]},"finishReason":"STOP"}]}"#,
        )
        .await;
        let client = client_for(&base_url);
        let mut conversation = Conversation::new();
        conversation.push_user("What files are here?");

        let response = client
            .invoke(&conversation, ToolRegistry::default().list_tools())
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert_eq!(response, ModelResponse::Final { text: "Two files.".to_string() });
        assert!(request.starts_with("POST /v1beta/models/gemini-2.0-flash:generateContent HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
        assert!(request.contains("What files are here?"));
        assert!(request.contains("\"functionDeclarations\""));
    }
}
