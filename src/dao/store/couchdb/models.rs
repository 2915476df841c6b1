use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{PlayerEntity, QuestionEntity};

pub const PLAYER_PREFIX: &str = "player::";
pub const QUIZ_DOC_ID: &str = "quiz";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub player: PlayerEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchQuizDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub questions: Vec<QuestionEntity>,
}

/// Document identifier for a player, namespaced so `_all_docs` range scans find them.
pub fn player_doc_id(name: &str) -> String {
    format!("{PLAYER_PREFIX}{name}")
}

impl CouchPlayerDocument {
    pub fn from_entity(player: PlayerEntity, rev: Option<String>) -> Self {
        Self {
            id: player_doc_id(&player.name),
            rev,
            player,
        }
    }
}

impl CouchQuizDocument {
    pub fn from_questions(questions: Vec<QuestionEntity>, rev: Option<String>) -> Self {
        Self {
            id: QUIZ_DOC_ID.to_owned(),
            rev,
            questions,
        }
    }
}
