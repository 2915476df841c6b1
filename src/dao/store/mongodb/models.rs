use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{PlayerEntity, QuestionEntity};

/// Identifier of the single document holding the current quiz.
pub const QUIZ_DOCUMENT_ID: &str = "current";

/// Player document stored in the `players` collection, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    pub name: String,
    pub password: String,
    pub total_score: i64,
    pub correct_answers: i64,
    pub incorrect_answers: i64,
    pub total_questions_answered: i64,
}

/// Whole quiz stored as one document so replacing it is atomic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub questions: Vec<QuestionEntity>,
}

/// Filter selecting a document by its `_id`.
pub fn doc_id(id: &str) -> Document {
    doc! { "_id": id }
}

fn counter(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name: value.name,
            password: value.password,
            total_score: value.total_score,
            correct_answers: value.correct_answers.into(),
            incorrect_answers: value.incorrect_answers.into(),
            total_questions_answered: value.total_questions_answered.into(),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            name: value.name,
            password: value.password,
            total_score: value.total_score,
            correct_answers: counter(value.correct_answers),
            incorrect_answers: counter(value.incorrect_answers),
            total_questions_answered: counter(value.total_questions_answered),
        }
    }
}

impl From<Vec<QuestionEntity>> for MongoQuizDocument {
    fn from(questions: Vec<QuestionEntity>) -> Self {
        Self {
            id: QUIZ_DOCUMENT_ID.to_owned(),
            questions,
        }
    }
}
