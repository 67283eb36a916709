//! Hypermedia links attached to response descriptors

use serde::{Deserialize, Serialize};

/// Relation of the link to fetch a subscription
pub const LINK_REL_GET_SUBSCRIPTION: &str = "get subscription by id";
/// Relation of the link to remove a subscription
pub const LINK_REL_REMOVE_SUBSCRIPTION: &str = "remove subscription";
/// Relation of the link to fetch a command
pub const LINK_REL_GET_COMMAND: &str = "get command";
/// Relation of the link to remove a command
pub const LINK_REL_REMOVE_COMMAND: &str = "remove command";

const APPLICATION_JSON: &str = "application/json";

/// A link to a related API operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Absolute URL of the operation
    pub href: String,
    /// Relation name
    pub rel: String,
    /// HTTP method to use
    pub method: String,
    /// Media type produced by the operation, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produces: Option<String>,
}

impl Link {
    /// GET link producing JSON
    pub fn get(href: String, rel: &str) -> Self {
        Self {
            href,
            rel: rel.to_string(),
            method: "GET".to_string(),
            produces: Some(APPLICATION_JSON.to_string()),
        }
    }

    /// DELETE link without a response body
    pub fn delete(href: String, rel: &str) -> Self {
        Self {
            href,
            rel: rel.to_string(),
            method: "DELETE".to_string(),
            produces: None,
        }
    }
}
