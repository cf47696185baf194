use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::agent_gateway_interface::AgentGateway;
use super::types::{AssistantDefinition, MessageRole, Run, ThreadMessage, ToolOutput};
use crate::config::GatewayConfig;
use crate::error::{Result, ShoppingError};

/// Gateway backed by the OpenAI Assistants v2 HTTP API
pub struct OpenAiAssistantsGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turn a non-2xx response into `ShoppingError::Gateway`, preferring the
/// API's own error message over the raw body
pub(crate) async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .unwrap_or(body);

    Err(ShoppingError::Gateway {
        status: status.as_u16(),
        message,
    })
}

impl OpenAiAssistantsGateway {
    pub fn new(config: &GatewayConfig, api_key: String) -> Result<Self> {
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        info!("Initialized OpenAiAssistantsGateway: base_url={}", config.base_url);
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = check_response(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AgentGateway for OpenAiAssistantsGateway {
    async fn create_assistant(&self, definition: &AssistantDefinition) -> Result<String> {
        let created: IdResponse = self
            .send(self.request(Method::POST, "/assistants").json(definition))
            .await?;
        info!("Created assistant {} ({})", definition.name, created.id);
        Ok(created.id)
    }

    async fn create_thread(&self) -> Result<String> {
        let created: IdResponse = self
            .send(self.request(Method::POST, "/threads").json(&json!({})))
            .await?;
        debug!("Created thread {}", created.id);
        Ok(created.id)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let path = format!("/threads/{}", thread_id);
        check_response(self.request(Method::DELETE, &path).send().await?).await?;
        debug!("Deleted thread {}", thread_id);
        Ok(())
    }

    async fn add_message(&self, thread_id: &str, role: MessageRole, content: &str) -> Result<()> {
        let path = format!("/threads/{}/messages", thread_id);
        let body = json!({ "role": role, "content": content });
        let _: IdResponse = self.send(self.request(Method::POST, &path).json(&body)).await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run> {
        let path = format!("/threads/{}/runs", thread_id);
        let mut body = json!({ "assistant_id": assistant_id });
        if let Some(instructions) = instructions {
            body["instructions"] = json!(instructions);
        }
        let run: Run = self.send(self.request(Method::POST, &path).json(&body)).await?;
        debug!("Created run {} on thread {}", run.id, thread_id);
        Ok(run)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let path = format!("/threads/{}/runs/{}", thread_id, run_id);
        self.send(self.request(Method::GET, &path)).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run> {
        let path = format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id);
        let body = json!({ "tool_outputs": outputs });
        self.send(self.request(Method::POST, &path).json(&body)).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let path = format!("/threads/{}/runs/{}/cancel", thread_id, run_id);
        let run: Run = self.send(self.request(Method::POST, &path)).await?;
        debug!("Cancelled run {} (now {})", run.id, run.status);
        Ok(())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let path = format!("/threads/{}/messages", thread_id);
        let list: ListResponse<ThreadMessage> = self
            .send(
                self.request(Method::GET, &path)
                    .query(&[("order", "desc"), ("limit", "20")]),
            )
            .await?;
        Ok(list.data)
    }
}
