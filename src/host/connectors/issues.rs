//! Issue tracker searches through the relay

use serde::{Deserialize, Serialize};

use crate::engine::error::UpstreamError;
use crate::engine::invoke::IssueQuery;

use super::client::RelayClient;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    base_url: &'a str,
    username: &'a str,
    api_key: &'a str,
    jql_query: &'a str,
}

impl<'a> From<&'a IssueQuery> for SearchRequest<'a> {
    fn from(query: &'a IssueQuery) -> Self {
        Self {
            base_url: &query.base_url,
            username: &query.username,
            api_key: &query.api_key,
            jql_query: &query.query,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<String>,
}

pub async fn fetch_issues(
    client: &RelayClient,
    query: &IssueQuery,
) -> Result<Vec<String>, UpstreamError> {
    log::info!("Fetching issues from {}", query.base_url);
    let response: SearchResponse = client.post("jira", &SearchRequest::from(query)).await?;
    Ok(response.issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_maps_to_jql_field() {
        let query = IssueQuery {
            base_url: "https://tracker.example".to_string(),
            username: "ops".to_string(),
            api_key: "t".to_string(),
            query: "project = OPS".to_string(),
        };
        assert_eq!(
            serde_json::to_value(SearchRequest::from(&query)).unwrap(),
            json!({
                "base_url": "https://tracker.example",
                "username": "ops",
                "api_key": "t",
                "jql_query": "project = OPS"
            })
        );
    }

    #[test]
    fn test_missing_issues_is_empty() {
        let response: SearchResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.issues.is_empty());
    }
}
