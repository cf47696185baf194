use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{GatewayConfig, VisionConfig};
use crate::error::{Result, ShoppingError};
use crate::gateway::openai_assistants::check_response;

/// Prefix of the synthetic user message built from an uploaded image
pub const UPLOAD_MESSAGE_PREFIX: &str = "The following products were found in this image:";

const INSTRUCTION_PARTS: [&str; 6] = [
    "You are a professional shopping assistant with expertise in identifying products from images. Analyze the provided image and perform the following tasks:",
    "1. Identify and list all products shown in the image, including detailed descriptions.",
    "2. Recognize and include brand names where applicable.",
    "3. Describe the shape and fabric/material of each product.",
    "4. Provide associated search queries for Google Shopping that include these details to improve search accuracy.",
    "Your goal is to give a comprehensive overview of the products in the image, making it easier for users to find similar items online.",
];

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Describes product photos with a vision-capable chat completion model
pub struct ImageDescriber {
    client: Client,
    base_url: String,
    api_key: String,
    config: VisionConfig,
}

impl ImageDescriber {
    pub fn new(gateway: &GatewayConfig, config: VisionConfig, api_key: String) -> Result<Self> {
        let client = Client::builder().timeout(gateway.http_timeout()).build()?;
        info!("Initialized ImageDescriber: model={}", config.model);
        Ok(Self {
            client,
            base_url: gateway.base_url.trim_end_matches('/').to_string(),
            api_key,
            config,
        })
    }

    /// Ask the model to identify the products in `image` and suggest search queries
    pub async fn describe(&self, image: &[u8]) -> Result<String> {
        if image.is_empty() {
            return Err(ShoppingError::InvalidImage("empty upload".to_string()));
        }

        let mut content: Vec<serde_json::Value> = INSTRUCTION_PARTS
            .iter()
            .map(|text| json!({ "type": "text", "text": text }))
            .collect();
        content.push(json!({
            "type": "image_url",
            "image_url": { "url": data_uri(image) }
        }));

        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": self.config.max_tokens,
        });

        debug!("Describing image of {} bytes", image.len());
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let completion: CompletionResponse = check_response(response).await?.json().await?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// Synthetic user message fed to the conversation after an upload
pub fn upload_message(description: &str) -> String {
    format!("{}{}", UPLOAD_MESSAGE_PREFIX, description)
}

fn data_uri(image: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(image), STANDARD.encode(image))
}

fn sniff_mime(image: &[u8]) -> &'static str {
    if image.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if image.starts_with(b"GIF8") {
        "image/gif"
    } else if image.len() >= 12 && &image[0..4] == b"RIFF" && &image[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}
