use std::sync::Arc;

use tracing::info;

use crate::config::{AssistantConfig, Config, Credentials};
use crate::conversations::{ConversationLoop, PollPolicy, SessionStore};
use crate::error::Result;
use crate::gateway::{AgentGateway, AssistantDefinition, OpenAiAssistantsGateway};
use crate::search::{ProductSearch, ProductSearchClient};
use crate::tools::ToolExecutor;
use crate::vision::ImageDescriber;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub conversation: Arc<ConversationLoop>,
    pub vision: Arc<ImageDescriber>,
}

impl AppState {
    /// Build the remote clients from configuration and declare the assistant
    pub async fn new(config: Config, credentials: Credentials) -> Result<Self> {
        let gateway: Arc<dyn AgentGateway> = Arc::new(OpenAiAssistantsGateway::new(
            &config.gateway,
            credentials.gateway_api_key.clone(),
        )?);
        let search: Arc<dyn ProductSearch> = Arc::new(ProductSearchClient::new(
            config.search.clone(),
            credentials.search_api_key.clone(),
        )?);
        let vision = Arc::new(ImageDescriber::new(
            &config.gateway,
            config.vision.clone(),
            credentials.gateway_api_key,
        )?);

        Self::assemble(config, gateway, search, vision).await
    }

    /// Validate the declared tools against the executor, then create the
    /// assistant once for the lifetime of the process
    pub async fn assemble(
        config: Config,
        gateway: Arc<dyn AgentGateway>,
        search: Arc<dyn ProductSearch>,
        vision: Arc<ImageDescriber>,
    ) -> Result<Self> {
        let executor = ToolExecutor::new(gateway.clone(), search);
        let definition = assistant_definition(&config.assistant);
        executor.registry().validate_declared(&definition.tools)?;

        let assistant_id = gateway.create_assistant(&definition).await?;
        info!("Assistant ready: {} ({})", definition.name, assistant_id);

        let conversation = ConversationLoop::new(
            gateway,
            executor,
            assistant_id,
            config.assistant.run_instructions.clone(),
            PollPolicy::from(&config.polling),
        );

        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionStore::new()),
            conversation: Arc::new(conversation),
            vision,
        })
    }
}

pub fn assistant_definition(config: &AssistantConfig) -> AssistantDefinition {
    AssistantDefinition {
        name: config.name.clone(),
        instructions: config.instructions.clone(),
        model: config.model.clone(),
        tools: config.tools.clone(),
    }
}
