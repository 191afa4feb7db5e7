use serde::{Deserialize, Serialize};

use super::Identified;

/// Body of `POST /favourites/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavouriteIn {
    pub name: String,
    pub config_json: serde_json::Value,
}

/// A named, user-owned saved view configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favourite {
    pub id: String,
    pub name: String,
    pub config_json: serde_json::Value,
    /// Missing on optimistic placeholders
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Favourite {
    /// Local stand-in shown until the server assigns an identity
    pub fn placeholder(input: &FavouriteIn, temp_id: String) -> Self {
        Self {
            id: temp_id,
            name: input.name.clone(),
            config_json: input.config_json.clone(),
            created_at: None,
        }
    }
}

impl Identified for Favourite {
    fn id(&self) -> &str {
        &self.id
    }
}
