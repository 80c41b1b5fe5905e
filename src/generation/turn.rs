//! Per-turn chat pipeline.
//!
//! State machine: RETRIEVE → (GENERATE_STREAM | FORMAT_RETRIEVAL_ONLY) →
//! EXTRACT_CITATIONS → PERSIST → DONE. Any generation failure transitions
//! directly to a terminal error event; partial text already streamed is not
//! retracted. Citation events are emitted only after the stream drains
//! (they depend on the full text), except in retrieval-only mode where all
//! results are used by definition and citations go out up front.

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::Result;
use crate::providers::{ChatMessage, LlmProvider};
use crate::retrieval::RetrievalOrchestrator;
use crate::storage::Database;
use crate::types::{
    response::ChatResponse, ChatMode, ChatRequest, Citation, RetrievedSource, StreamEvent,
};

use super::citation::{extract_citations, filter_citations};
use super::prompt::PromptBuilder;

const HISTORY_LIMIT: usize = 50;

/// Drives chat turns, blocking or streaming
pub struct ChatPipeline {
    orchestrator: Arc<RetrievalOrchestrator>,
    llm: Arc<dyn LlmProvider>,
    db: Arc<Database>,
    retrieval_limit: usize,
}

impl ChatPipeline {
    pub fn new(
        orchestrator: Arc<RetrievalOrchestrator>,
        llm: Arc<dyn LlmProvider>,
        db: Arc<Database>,
        retrieval_limit: usize,
    ) -> Self {
        Self {
            orchestrator,
            llm,
            db,
            retrieval_limit,
        }
    }

    /// RETRIEVE: fan out across the requested sources (empty selection
    /// means none) and build the citation candidate set.
    async fn retrieve(
        &self,
        request: &ChatRequest,
    ) -> Result<(Vec<RetrievedSource>, Vec<Citation>)> {
        if request.mode == ChatMode::Normal {
            return Ok((Vec::new(), Vec::new()));
        }

        let sources = request.requested_sources();
        if sources.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let results = self
            .orchestrator
            .search_sources(
                &request.message,
                request.organization_id,
                &sources,
                &request.filters(),
                self.retrieval_limit,
            )
            .await?;

        let candidates = results.iter().map(Citation::from_retrieved).collect();
        Ok((results, candidates))
    }

    fn history(&self, conversation_id: Uuid) -> Vec<ChatMessage> {
        match self.db.conversation_history(conversation_id, HISTORY_LIMIT) {
            Ok(history) => history
                .into_iter()
                .map(|(role, content)| ChatMessage { role, content })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to load conversation history: {}", e);
                Vec::new()
            }
        }
    }

    /// PERSIST: store a turn message; persistence failures are logged, not
    /// surfaced, so an answered turn is never retracted over bookkeeping.
    fn persist_message(
        &self,
        conversation_id: Uuid,
        role: &str,
        content: &str,
        citations: &[Citation],
    ) {
        let citations_json = serde_json::to_value(citations).unwrap_or_default();
        if let Err(e) =
            self.db
                .insert_chat_message(conversation_id, role, content, &citations_json)
        {
            tracing::error!("Failed to persist {} message: {}", role, e);
        }
    }

    /// Run a turn in blocking mode
    pub async fn run_blocking(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();

        self.persist_message(request.conversation_id, "user", &request.message, &[]);

        let (results, candidates) = self.retrieve(request).await?;

        let (answer, used_citations) = if request.mode == ChatMode::RagOnly {
            // Every retrieved result is rendered directly; all are used
            let answer = PromptBuilder::format_retrieval_only(&results);
            let used = if results.is_empty() { Vec::new() } else { candidates };
            (answer, used)
        } else {
            let context = (!results.is_empty()).then(|| PromptBuilder::build_context(&results));
            let system = PromptBuilder::build_system_prompt(context.as_deref());

            let mut messages = self.history(request.conversation_id);
            messages.push(ChatMessage::user(request.message.clone()));

            let raw_answer = self.llm.complete(&system, &messages).await?;
            let (clean, cited_ids) = extract_citations(&raw_answer);
            (clean, filter_citations(candidates, &cited_ids))
        };

        self.persist_message(
            request.conversation_id,
            "assistant",
            &answer,
            &used_citations,
        );

        Ok(ChatResponse {
            answer,
            citations: used_citations,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run a turn in streaming mode. Events follow the envelope contract:
    /// `chunk*` then `citation*` then `done`, or a terminal `error`.
    pub fn run_stream(self: Arc<Self>, request: ChatRequest) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            self.drive_stream(request, tx).await;
        });

        ReceiverStream::new(rx)
    }

    async fn drive_stream(&self, request: ChatRequest, tx: mpsc::Sender<StreamEvent>) {
        self.persist_message(request.conversation_id, "user", &request.message, &[]);

        let (results, candidates) = match self.retrieve(&request).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error { error: e.to_string() }).await;
                return;
            }
        };

        let (full_content, used_citations) = if request.mode == ChatMode::RagOnly {
            let content = PromptBuilder::format_retrieval_only(&results);
            let _ = tx
                .send(StreamEvent::Chunk {
                    content: content.clone(),
                })
                .await;
            let used = if results.is_empty() { Vec::new() } else { candidates };
            (content, used)
        } else {
            let context = (!results.is_empty()).then(|| PromptBuilder::build_context(&results));
            let system = PromptBuilder::build_system_prompt(context.as_deref());

            let mut messages = self.history(request.conversation_id);
            messages.push(ChatMessage::user(request.message.clone()));

            let mut stream = match self.llm.complete_stream(&system, &messages).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error { error: e.to_string() }).await;
                    return;
                }
            };

            let mut full_content = String::new();
            while let Some(delta) = stream.next().await {
                match delta {
                    Ok(text) if text.is_empty() => {}
                    Ok(text) => {
                        full_content.push_str(&text);
                        let _ = tx.send(StreamEvent::Chunk { content: text }).await;
                    }
                    Err(e) => {
                        // Terminal: already-streamed text is not retracted
                        let _ = tx.send(StreamEvent::Error { error: e.to_string() }).await;
                        return;
                    }
                }
            }

            // EXTRACT_CITATIONS only once the stream has fully drained
            let (clean, cited_ids) = extract_citations(&full_content);
            (clean, filter_citations(candidates, &cited_ids))
        };

        for citation in &used_citations {
            let _ = tx
                .send(StreamEvent::Citation {
                    citation: citation.clone(),
                })
                .await;
        }

        self.persist_message(
            request.conversation_id,
            "assistant",
            &full_content,
            &used_citations,
        );

        let _ = tx.send(StreamEvent::Done).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterRegistry;
    use crate::config::RetrievalConfig;
    use crate::error::Error;
    use crate::index::VectorIndex;
    use crate::providers::local::{HashEmbedder, MemoryVectorIndex};
    use crate::providers::{EmbeddingProvider, TokenStream};
    use async_trait::async_trait;

    /// Emits scripted deltas, then optionally fails
    struct ScriptedLlm {
        deltas: Vec<String>,
        fail_after: bool,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
            if self.fail_after {
                return Err(Error::llm("completion backend unavailable"));
            }
            Ok(self.deltas.concat())
        }

        async fn complete_stream(
            &self,
            _system: &str,
            _messages: &[ChatMessage],
        ) -> Result<TokenStream> {
            let mut items: Vec<Result<String>> =
                self.deltas.iter().cloned().map(Ok).collect();
            if self.fail_after {
                items.push(Err(Error::llm("stream interrupted")));
            }
            Ok(Box::pin(futures_util::stream::iter(items)))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn pipeline_with_tenant(llm: ScriptedLlm, org: Uuid, tenant_id: Uuid) -> Arc<ChatPipeline> {
        let db = Arc::new(Database::in_memory().unwrap());
        db.insert_tenant(&crate::types::Tenant {
            id: tenant_id,
            organization_id: org,
            name: "Bob Renter".into(),
            tenant_type: "individual".into(),
            email: None,
            phone: None,
            profession: None,
            monthly_income: None,
            household_size: None,
            guarantor_name: None,
            guarantor_contact: None,
        })
        .unwrap();

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(8));
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryVectorIndex::new());
        let registry = Arc::new(AdapterRegistry::new(
            Arc::clone(&db),
            embedder,
            index,
            &RetrievalConfig::default(),
        ));
        let orchestrator = Arc::new(RetrievalOrchestrator::new(registry));
        Arc::new(ChatPipeline::new(orchestrator, Arc::new(llm), db, 10))
    }

    fn pipeline(llm: ScriptedLlm) -> (Arc<ChatPipeline>, Uuid) {
        let org = Uuid::new_v4();
        (pipeline_with_tenant(llm, org, Uuid::new_v4()), org)
    }

    fn request(org: Uuid, mode: ChatMode, sources: Vec<String>) -> ChatRequest {
        ChatRequest {
            conversation_id: Uuid::new_v4(),
            organization_id: org,
            message: "Who rents here?".into(),
            mode,
            requested_sources: sources,
            document_ids: None,
            lease_ids: None,
            property_ids: None,
        }
    }

    async fn collect(stream: ReceiverStream<StreamEvent>) -> Vec<StreamEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn retrieval_only_with_no_sources_returns_nothing_found() {
        let (pipeline, org) = pipeline(ScriptedLlm {
            deltas: vec![],
            fail_after: false,
        });
        let events = collect(pipeline.run_stream(request(org, ChatMode::RagOnly, vec![]))).await;

        // One chunk with the canned message, zero citations, then done
        assert!(matches!(
            &events[0],
            StreamEvent::Chunk { content } if content == super::super::prompt::NO_RESULTS_MESSAGE
        ));
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Citation { .. })));
    }

    #[tokio::test]
    async fn retrieval_only_emits_all_citations_up_front() {
        let (pipeline, org) = pipeline(ScriptedLlm {
            deltas: vec![],
            fail_after: false,
        });
        let events = collect(
            pipeline.run_stream(request(org, ChatMode::RagOnly, vec!["tenants".into()])),
        )
        .await;

        let citations: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Citation { .. }))
            .collect();
        assert_eq!(citations.len(), 1);
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
    }

    #[tokio::test]
    async fn generation_citations_are_verified_against_markers() {
        let (pipeline, org) = pipeline(ScriptedLlm {
            deltas: vec![
                "Bob rents the flat ".into(),
                "[SOURCE:chunk-tenants-".into(),
            ],
            fail_after: false,
        });

        // The scripted marker id is incomplete, so no candidate matches and
        // the citation list must be empty even though retrieval found one.
        let events = collect(
            pipeline.run_stream(request(org, ChatMode::RagEnhanced, vec!["tenants".into()])),
        )
        .await;
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Citation { .. })));
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
    }

    #[tokio::test]
    async fn stream_failure_emits_terminal_error() {
        let (pipeline, org) = pipeline(ScriptedLlm {
            deltas: vec!["partial answer ".into()],
            fail_after: true,
        });
        let events = collect(
            pipeline.run_stream(request(org, ChatMode::RagEnhanced, vec!["tenants".into()])),
        )
        .await;

        // Partial content was streamed and is not retracted
        assert!(matches!(&events[0], StreamEvent::Chunk { .. }));
        assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Done)));
    }

    #[tokio::test]
    async fn blocking_turn_matches_marker_scenario() {
        let org = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        // The stable chunk id is derived from the record id, so the
        // scripted answer can cite it up front
        let chunk_id = format!("chunk-tenants-{}", tenant_id);

        let pipeline = pipeline_with_tenant(
            ScriptedLlm {
                deltas: vec![format!(
                    "The tenant is Bob Renter [SOURCE:{}]. Nice person.",
                    chunk_id
                )],
                fail_after: false,
            },
            org,
            tenant_id,
        );

        let req = request(org, ChatMode::RagEnhanced, vec!["tenants".into()]);
        let response = pipeline.run_blocking(&req).await.unwrap();
        assert_eq!(response.answer, "The tenant is Bob Renter. Nice person.");
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].chunk_id, chunk_id);
    }
}
