use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeExecutor, NodeOutput};
use flowruntime::{NodeFactory, NodeMetadata, PortDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const REQUIRED_INPUTS: [&str; 5] = ["modelName", "apiKey", "apiHost", "temperature", "prompt"];

/// A single chat completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub model: String,
    pub api_key: String,
    pub api_host: String,
    pub temperature: f64,
    pub system_prompt: Option<String>,
    pub prompt: String,
}

/// Backend that turns a prompt into a completion
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<String, NodeError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAiClient {
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, request: ModelRequest) -> Result<String, NodeError> {
        let url = format!("{}/chat/completions", request.api_host.trim_end_matches('/'));

        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&request.api_key)
            .json(&json!({
                "model": request.model,
                "temperature": request.temperature,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Model request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(NodeError::ExecutionFailed(format!(
                "Model endpoint returned {}: {}",
                status, body
            )));
        }

        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| NodeError::ExecutionFailed("Response has no message content".to_string()))
    }
}

/// Model invocation node
pub struct LlmNode {
    client: Arc<dyn ModelClient>,
}

impl LlmNode {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    fn request(&self, ctx: &NodeContext) -> Result<ModelRequest, NodeError> {
        ctx.require_inputs(&REQUIRED_INPUTS)?;

        let string = |field: &str| -> Result<String, NodeError> {
            let value = ctx.require_input(field)?;
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| type_mismatch(field, "string", value))
        };
        let temperature = ctx.require_input("temperature")?;

        Ok(ModelRequest {
            model: string("modelName")?,
            api_key: string("apiKey")?,
            api_host: string("apiHost")?,
            temperature: temperature
                .as_f64()
                .ok_or_else(|| type_mismatch("temperature", "number", temperature))?,
            system_prompt: ctx
                .inputs
                .get("systemPrompt")
                .and_then(Value::as_str)
                .map(str::to_string),
            prompt: string("prompt")?,
        })
    }
}

fn type_mismatch(field: &str, expected: &str, value: &Value) -> NodeError {
    let actual = flowcore::VariableType::infer(value);
    NodeError::InvalidInputType {
        field: field.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

#[async_trait]
impl NodeExecutor for LlmNode {
    fn node_type(&self) -> &str {
        "llm"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let request = self.request(&ctx)?;
        ctx.runtime
            .messages
            .info(Some(&ctx.node_id), format!("calling model {}", request.model));

        let result = tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            result = self.client.complete(request) => result?,
        };

        Ok(NodeOutput::new().with_output("result", result))
    }
}

pub struct LlmNodeFactory {
    client: Arc<dyn ModelClient>,
}

impl LlmNodeFactory {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }
}

impl Default for LlmNodeFactory {
    fn default() -> Self {
        Self::new(Arc::new(OpenAiClient::new()))
    }
}

impl NodeFactory for LlmNodeFactory {
    fn create(&self, _node: &Node) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(LlmNode::new(self.client.clone())))
    }

    fn node_type(&self) -> &str {
        "llm"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Calls an OpenAI-compatible chat model".to_string(),
            category: "ai".to_string(),
            inputs: vec![
                PortDefinition::required("modelName", "Model identifier"),
                PortDefinition::required("apiKey", "Bearer token for the endpoint"),
                PortDefinition::required("apiHost", "Base URL, e.g. https://api.openai.com/v1"),
                PortDefinition::required("temperature", "Sampling temperature"),
                PortDefinition::required("prompt", "User prompt"),
                PortDefinition::optional("systemPrompt", "System prompt"),
            ],
            outputs: vec![PortDefinition::required("result", "Model completion")],
        }
    }
}
