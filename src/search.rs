use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::Result;

/// One product from the shopping search provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShoppingResponse {
    #[serde(default)]
    shopping_results: Vec<SearchResult>,
}

/// What a search produced. Only `Found` carries text for the assistant; the
/// other cases reach the assistant as an empty tool output.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found {
        results: Vec<SearchResult>,
        markdown: String,
    },
    Empty,
    TransientFailure(String),
    NotConfigured,
}

impl SearchOutcome {
    pub fn into_tool_text(self) -> String {
        match self {
            SearchOutcome::Found { markdown, .. } => markdown,
            SearchOutcome::Empty
            | SearchOutcome::TransientFailure(_)
            | SearchOutcome::NotConfigured => String::new(),
        }
    }
}

/// Product search capability used by the `search_google_shopping` tool
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &str) -> SearchOutcome;
}

/// SerpAPI Google Shopping client
pub struct ProductSearchClient {
    client: Client,
    config: SearchConfig,
    api_key: Option<String>,
}

impl ProductSearchClient {
    pub fn new(config: SearchConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        info!(
            "Initialized ProductSearchClient: engine={}, region={}, timeout={}s, configured={}",
            config.engine,
            config.region,
            config.http_timeout_secs,
            api_key.is_some()
        );
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    async fn fetch(&self, query: &str, api_key: &str) -> std::result::Result<Vec<SearchResult>, reqwest::Error> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("engine", self.config.engine.as_str()),
                ("q", query),
                ("api_key", api_key),
                ("gl", self.config.region.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: ShoppingResponse = response.json().await?;
        Ok(body.shopping_results)
    }
}

#[async_trait]
impl ProductSearch for ProductSearchClient {
    async fn search(&self, query: &str) -> SearchOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("{} environment variable is not set.", self.config.api_key_env);
            return SearchOutcome::NotConfigured;
        };

        match self.fetch(query, api_key).await {
            Ok(mut results) => {
                results.truncate(self.config.max_results);
                if results.is_empty() {
                    info!("No shopping results for query: {}", query);
                    return SearchOutcome::Empty;
                }
                let markdown = format_results(&results);
                debug!("Search for '{}' returned {} results", query, results.len());
                SearchOutcome::Found { results, markdown }
            }
            Err(e) => {
                warn!("Request failed: {}", e);
                SearchOutcome::TransientFailure(e.to_string())
            }
        }
    }
}

/// Render results as the markdown list handed to the assistant
pub fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| {
            let title = result.title.as_deref().unwrap_or_default();
            let price = result.price.as_deref().unwrap_or_default();
            let link = result.link.as_deref().unwrap_or_default();
            let image = result.thumbnail.as_deref().unwrap_or_default();
            format!(
                "- **Title:** [{title}]({link})\n  \
                 - **Price:** {price}\n  \
                 - **Link:** [View Product]({link})\n  \
                 - **Image:** ![Image]({image})\n\n"
            )
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn product(n: usize) -> serde_json::Value {
        json!({
            "title": format!("Shoe {}", n),
            "price": format!("CHF {}.00", 50 + n),
            "link": format!("https://shop.example/{}", n),
            "thumbnail": format!("https://img.example/{}.jpg", n)
        })
    }

    fn client(server: &MockServer, api_key: Option<&str>) -> ProductSearchClient {
        let config = SearchConfig {
            base_url: format!("{}/search.json", server.uri()),
            ..SearchConfig::default()
        };
        ProductSearchClient::new(config, api_key.map(String::from)).unwrap()
    }

    #[test]
    fn test_format_results_layout() {
        let results = vec![SearchResult {
            title: Some("Trail Runner".into()),
            price: Some("CHF 89.00".into()),
            link: Some("https://shop.example/trail".into()),
            thumbnail: Some("https://img.example/trail.jpg".into()),
        }];
        assert_eq!(
            format_results(&results),
            "- **Title:** [Trail Runner](https://shop.example/trail)\n\
             \x20 - **Price:** CHF 89.00\n\
             \x20 - **Link:** [View Product](https://shop.example/trail)\n\
             \x20 - **Image:** ![Image](https://img.example/trail.jpg)\n\n"
        );
    }

    #[tokio::test]
    async fn test_search_sends_fixed_params_and_truncates_to_three() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("engine", "google_shopping"))
            .and(query_param("q", "running shoes under $100"))
            .and(query_param("api_key", "serp-key"))
            .and(query_param("gl", "CH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "shopping_results": (0..7).map(product).collect::<Vec<_>>()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server, Some("serp-key"))
            .search("running shoes under $100")
            .await;
        match outcome {
            SearchOutcome::Found { results, markdown } => {
                assert_eq!(results.len(), 3);
                assert_eq!(results[0].title.as_deref(), Some("Shoe 0"));
                assert_eq!(markdown.matches("- **Title:**").count(), 3);
                assert!(!markdown.contains("Shoe 3"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"search_metadata": {}})))
            .mount(&server)
            .await;

        let outcome = client(&server, Some("serp-key")).search("nothing").await;
        assert!(matches!(outcome, SearchOutcome::Empty));
        assert_eq!(outcome.into_tool_text(), "");
    }

    #[tokio::test]
    async fn test_missing_credential_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = client(&server, None).search("running shoes").await;
        assert!(matches!(outcome, SearchOutcome::NotConfigured));
        assert_eq!(outcome.into_tool_text(), "");
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_as_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "shopping_results": [product(0)] }))
                    .set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let config = SearchConfig {
            base_url: format!("{}/search.json", server.uri()),
            http_timeout_secs: 1,
            ..SearchConfig::default()
        };
        let client = ProductSearchClient::new(config, Some("serp-key".into())).unwrap();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(10), client.search("shoes"))
            .await
            .expect("search should give up on its own");
        assert!(matches!(outcome, SearchOutcome::TransientFailure(_)));
        assert_eq!(outcome.into_tool_text(), "");
    }

    #[tokio::test]
    async fn test_http_error_is_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = client(&server, Some("serp-key")).search("running shoes").await;
        assert!(matches!(outcome, SearchOutcome::TransientFailure(_)));
        assert_eq!(outcome.into_tool_text(), "");
    }
}
