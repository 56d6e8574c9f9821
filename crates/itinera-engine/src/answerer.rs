//! Conversational question answering on top of the refinement loop.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use camino::Utf8Path;
use itinera_llm::Message;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::prompt::{ANSWER_SYSTEM_PROMPT, EvaluationContext, full_question};
use crate::refinement::{RefinementAttempt, RefinementLoop, Termination};

/// Passages retrieved per question
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePassage {
    pub text: String,
    pub score: f32,
}

/// Source of reference passages for a question.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Up to `top_k` passages, most relevant first.
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgePassage>>;
}

/// In-memory retriever ranking passages by how many distinct query terms
/// they contain.
#[derive(Debug, Clone, Default)]
pub struct KeywordRetriever {
    passages: Vec<(String, HashSet<String>)>,
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl KeywordRetriever {
    #[must_use]
    pub fn new<I, S>(passages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let passages = passages
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .map(|p| {
                let t = terms(&p);
                (p.trim().to_string(), t)
            })
            .collect();
        Self { passages }
    }

    /// One passage per blank-line separated paragraph.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        Self::new(normalized.split("\n\n").map(str::to_string).collect::<Vec<_>>())
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read knowledge file: {path}"))?;
        Ok(Self::from_text(&text))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

#[async_trait]
impl KnowledgeRetriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgePassage>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(i, (_, passage_terms))| (i, query_terms.intersection(passage_terms).count()))
            .filter(|(_, overlap)| *overlap > 0)
            .collect();
        // Stable sort keeps document order among ties.
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(i, overlap)| KnowledgePassage {
                text: self.passages[i].0.clone(),
                score: overlap as f32 / query_terms.len() as f32,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub answer: String,
    pub termination: Termination,
    pub attempts: Vec<RefinementAttempt>,
    pub knowledge: Vec<KnowledgePassage>,
}

impl AnswerOutcome {
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.termination == Termination::Accepted
    }
}

pub struct ConversationalAnswerer {
    refinement: RefinementLoop,
    retriever: Option<Arc<dyn KnowledgeRetriever>>,
    top_k: usize,
}

impl ConversationalAnswerer {
    #[must_use]
    pub fn new(refinement: RefinementLoop) -> Self {
        Self {
            refinement,
            retriever: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_retriever(mut self, retriever: Arc<dyn KnowledgeRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Answer `question`, consulting the retriever when `use_knowledge` is set.
    ///
    /// Retrieval failures downgrade to answering without knowledge.
    pub async fn answer(
        &self,
        question: &str,
        image_description: Option<&str>,
        use_knowledge: bool,
    ) -> AnswerOutcome {
        let knowledge = match (&self.retriever, use_knowledge) {
            (Some(retriever), true) => match retriever.retrieve(question, self.top_k).await {
                Ok(passages) => passages,
                Err(e) => {
                    warn!(error = %e, "Knowledge retrieval failed, answering without it");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };
        debug!(passages = knowledge.len(), "Knowledge gathered");

        let knowledge_text = knowledge
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let conversation = vec![
            Message::system(ANSWER_SYSTEM_PROMPT),
            Message::user(full_question(question, image_description, &knowledge_text)),
        ];
        let ctx = EvaluationContext {
            question,
            image_description,
            knowledge: &knowledge_text,
        };

        let outcome = self.refinement.run(conversation, &ctx).await;
        AnswerOutcome {
            answer: outcome.answer,
            termination: outcome.termination,
            attempts: outcome.attempts,
            knowledge,
        }
    }
}
