//! Gemini `generateContent` transport

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatTransport, Reply};
use crate::config::ChatConfig;
use crate::conversation::{Conversation, Message, Role, ToolCall};
use crate::tools::ToolDeclaration;
use crate::{Error, Result};

/// Gemini REST API base URL
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Chat client for the Gemini `generateContent` endpoint
pub struct GeminiChat {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    temperature: f32,
    system_prompt: String,
    base_url: String,
}

impl GeminiChat {
    /// Create a client for the given model and system prompt.
    #[must_use]
    pub fn new(api_key: SecretString, chat: &ChatConfig, system_prompt: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: chat.model.clone(),
            temperature: chat.temperature,
            system_prompt,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (local proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, conversation: &Conversation, tools: &[ToolDeclaration]) -> Request {
        // System messages fold into the instruction; everything else maps
        // onto the wire roles.
        let mut instruction = self.system_prompt.clone();
        let mut contents = Vec::with_capacity(conversation.len());

        for message in conversation.messages() {
            match message.role {
                Role::System => {
                    if !instruction.is_empty() {
                        instruction.push('\n');
                    }
                    instruction.push_str(&message.content);
                }
                Role::User | Role::Assistant | Role::Tool => {
                    contents.push(Content::from_message(message));
                }
            }
        }

        Request {
            system_instruction: SystemInstruction {
                parts: vec![Part::text(instruction)],
            },
            contents,
            tools: if tools.is_empty() {
                None
            } else {
                Some(vec![ToolSet {
                    function_declarations: tools
                        .iter()
                        .map(|t| FunctionDeclaration {
                            name: t.name.to_string(),
                            description: t.description.to_string(),
                            parameters: t.parameters.clone(),
                        })
                        .collect(),
                }])
            },
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl ChatTransport for GeminiChat {
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolDeclaration],
    ) -> Result<Reply> {
        if conversation.is_empty() {
            return Err(Error::Chat("conversation is empty".to_string()));
        }
        if conversation.last_role() == Some(Role::Assistant) {
            return Err(Error::Chat(
                "conversation ends with an assistant message".to_string(),
            ));
        }

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = self.build_request(conversation, tools);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamUnavailable(format!(
                "chat service returned {status}: {body}"
            )));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("invalid response JSON: {e}")))?;

        parse_reply(body)
    }
}

/// Extract the reply variant from a decoded response body.
///
/// The first `functionCall` part wins; otherwise all text parts concatenate
/// into the final reply.
fn parse_reply(body: Response) -> Result<Reply> {
    let candidate = body
        .candidates
        .and_then(|mut c| if c.is_empty() { None } else { Some(c.remove(0)) })
        .ok_or_else(|| Error::MalformedResponse("response has no candidates".to_string()))?;

    let parts = candidate
        .content
        .ok_or_else(|| Error::MalformedResponse("candidate has no content".to_string()))?
        .parts;

    if parts.is_empty() {
        return Err(Error::MalformedResponse(
            "candidate content has no parts".to_string(),
        ));
    }

    for part in &parts {
        if let Some(call) = &part.function_call {
            // The wire format carries no call id; synthesize one so tool
            // results can be paired with their invocation.
            return Ok(Reply::ToolCall(ToolCall {
                id: uuid::Uuid::new_v4().to_string(),
                name: call.name.clone(),
                arguments: call.args.clone().unwrap_or(serde_json::Value::Null),
            }));
        }
    }

    let text: String = parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(Error::MalformedResponse(
            "candidate has neither text nor a function call".to_string(),
        ));
    }

    Ok(Reply::Final(text.trim().to_string()))
}

// -- Wire types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSet>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSet {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    /// Map a conversation message onto the wire content shape.
    fn from_message(message: &Message) -> Self {
        match (message.role, &message.call) {
            // Assistant tool request: functionCall part under the model role
            (Role::Assistant, Some(call)) => Self {
                role: "model".to_string(),
                parts: vec![Part {
                    text: if message.content.is_empty() {
                        None
                    } else {
                        Some(message.content.clone())
                    },
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: Some(call.arguments.clone()),
                    }),
                    function_response: None,
                }],
            },
            // Tool result rides under the user role as a functionResponse
            (Role::Tool, Some(call)) => Self {
                role: "user".to_string(),
                parts: vec![Part {
                    text: None,
                    function_call: None,
                    function_response: Some(FunctionResponse {
                        name: call.name.clone(),
                        response: serde_json::json!({ "text": message.content }),
                    }),
                }],
            },
            (Role::Assistant, None) => Self {
                role: "model".to_string(),
                parts: vec![Part::text(message.content.clone())],
            },
            _ => Self {
                role: "user".to_string(),
                parts: vec![Part::text(message.content.clone())],
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            function_call: None,
            function_response: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}
