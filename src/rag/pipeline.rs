// End-to-end answering pipeline
//
// `RagServices` holds the stateless, shareable components and is built once
// per process. `RagPipeline` pairs those services with one conversation and
// is owned by exactly one session.
use std::sync::Arc;

use crate::config::Config;
use crate::errors::{RagError, Result, Stage};
use crate::memory::{ConversationMemory, ConversationSummarizer, MemoryStrategy};
use crate::models::{ChatClient, ChatModel, CrossEncoder, Embedder, EmbeddingEngine, RelevanceModel};
use crate::rag::citation::CitationFormatter;
use crate::rag::context::AnswerGenerator;
use crate::rag::expansion::QueryExpander;
use crate::rag::reranking::Reranker;
use crate::rag::retrieval::engine::SearchTimeouts;
use crate::rag::retrieval::{QdrantIndex, VectorIndex, VectorStoreClient};
use crate::telemetry::StageTimings;
use crate::types::{AnswerPayload, MemoryStats, MetadataFilter, Passage};

/// Model and index backends the services are assembled from
#[derive(Clone)]
pub struct Backends {
    pub chat: Arc<dyn ChatModel>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub relevance: Arc<dyn RelevanceModel>,
}

/// Shared pipeline components; safe to use from any number of sessions
pub struct RagServices {
    expander: QueryExpander,
    store: VectorStoreClient,
    reranker: Reranker,
    generator: AnswerGenerator,
    summarizer: ConversationSummarizer,
    filter: Option<MetadataFilter>,
    config: Config,
}

impl RagServices {
    pub fn new(backends: Backends, config: &Config) -> Self {
        let mut expander = QueryExpander::new(
            backends.chat.clone(),
            config.expansion.temperature,
            config.expansion.max_tokens,
        );
        if !config.expansion.enabled {
            expander = expander.disabled();
        }

        let store = VectorStoreClient::new(backends.embedder, backends.index).with_timeouts(
            SearchTimeouts {
                embedding: config.embedding_timeout(),
                search: config.vector_store_timeout(),
            },
        );

        Self {
            expander,
            store,
            reranker: Reranker::new(backends.relevance, config.reranker_timeout()),
            generator: AnswerGenerator::new(
                backends.chat.clone(),
                config.generation.temperature,
                config.generation.max_tokens,
            ),
            summarizer: ConversationSummarizer::new(backends.chat, config.memory.summary_max_tokens),
            filter: config
                .retrieval
                .source_dir
                .as_deref()
                .map(MetadataFilter::source_dir),
            config: config.clone(),
        }
    }

    /// Build the production backends and refuse to start unless the index is ready
    pub async fn bootstrap(config: &Config) -> Result<Arc<Self>> {
        config.validate()?;

        let chat = ChatClient::new(
            config.chat.base_url.clone(),
            config.chat.api_key.clone(),
            config.chat.model.clone(),
            config.chat_timeout(),
        )?;
        let index = QdrantIndex::connect(
            &config.vector_store.url,
            config.vector_store.api_key.clone(),
            &config.vector_store.collection,
            config.vector_store_timeout(),
        )?;

        let cache_dir = config.model_cache_dir();
        let embedding_model = config.embedding.model.clone();
        let embedding_cache = cache_dir.clone();
        let embedder = tokio::task::spawn_blocking(move || {
            EmbeddingEngine::load(&embedding_model, embedding_cache.as_deref())
        })
        .await
        .map_err(|e| RagError::Initialization(format!("Embedding model loader panicked: {}", e)))??;

        if embedder.dimension() != config.embedding.dimension {
            return Err(RagError::DimensionMismatch {
                expected: config.embedding.dimension,
                actual: embedder.dimension(),
            });
        }

        let reranker_model = config.reranker.model.clone();
        let batch_size = config.reranker.batch_size;
        let max_length = config.reranker.max_length;
        let relevance = tokio::task::spawn_blocking(move || {
            CrossEncoder::load(&reranker_model, cache_dir.as_deref(), batch_size, max_length)
        })
        .await
        .map_err(|e| RagError::Initialization(format!("Reranker loader panicked: {}", e)))??;

        let services = Self::new(
            Backends {
                chat: Arc::new(chat),
                embedder: Arc::new(embedder),
                index: Arc::new(index),
                relevance: Arc::new(relevance),
            },
            config,
        );
        services.verify_ready().await?;

        tracing::info!(
            collection = %config.vector_store.collection,
            model = %config.chat.model,
            "Pipeline services ready"
        );
        Ok(Arc::new(services))
    }

    /// Vector store reachable, non-empty and compatible with the embedder
    pub async fn verify_ready(&self) -> Result<()> {
        self.store.verify_ready().await
    }

    pub fn store(&self) -> &VectorStoreClient {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// New orchestrator with an empty conversation
    pub fn pipeline(self: &Arc<Self>) -> RagPipeline {
        RagPipeline::new(Arc::clone(self))
    }

    /// Expand, retrieve broadly, then rerank down to the final context
    async fn retrieve(&self, question: &str, timings: &mut StageTimings) -> Result<Vec<Passage>> {
        let retrieval = &self.config.retrieval;

        let query = timings
            .measure(Stage::Expansion, self.expander.expand(question))
            .await;

        let candidates = timings
            .measure(
                Stage::VectorSearch,
                self.store
                    .similarity_search(&query, retrieval.broad_k, self.filter.as_ref()),
            )
            .await?;

        let ranked = timings
            .measure(
                Stage::Reranking,
                self.reranker.rerank(&query, candidates, retrieval.rerank_k),
            )
            .await?;

        tracing::debug!(kept = ranked.len(), "Context passages selected");
        Ok(ranked.into_iter().map(|r| r.passage).collect())
    }
}

/// Per-session orchestrator: shared services plus one exclusively owned conversation
pub struct RagPipeline {
    services: Arc<RagServices>,
    memory: ConversationMemory,
}

impl RagPipeline {
    pub fn new(services: Arc<RagServices>) -> Self {
        let memory = ConversationMemory::with_strategy(
            services.config.memory.max_history,
            services.config.memory.strategy,
        );
        Self { services, memory }
    }

    /// Answer one question: completion text followed by the citation block
    ///
    /// On any failure the conversation is restored to its state before the
    /// call, so an unanswered question never stays in history.
    pub async fn generate_response(&mut self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let mut timings = StageTimings::start();
        let checkpoint = self.memory.checkpoint();
        self.memory.append(crate::types::Message::user(question));

        match self.answer_turn(question, &mut timings).await {
            Ok(answer) => {
                timings.log();
                Ok(answer)
            }
            Err(e) => {
                self.memory.restore(checkpoint);
                tracing::error!(error = %e, stage = ?e.stage(), "Question failed");
                Err(e)
            }
        }
    }

    async fn answer_turn(&mut self, question: &str, timings: &mut StageTimings) -> Result<String> {
        let services = Arc::clone(&self.services);
        let passages = services.retrieve(question, timings).await?;

        if self.memory.strategy() == MemoryStrategy::Summarize {
            timings
                .measure(
                    Stage::Summarization,
                    services.summarizer.refresh(&mut self.memory),
                )
                .await;
        }

        let generated = timings
            .measure(
                Stage::Generation,
                services.generator.generate(question, &passages, &self.memory),
            )
            .await?;

        let citations = CitationFormatter::format(&passages);
        self.memory
            .append(crate::types::Message::assistant(generated.text.clone()));

        Ok(format!("{}{}", generated.text, citations))
    }

    /// Same as [`generate_response`](Self::generate_response), folded into the caller payload
    pub async fn answer(&mut self, question: &str) -> AnswerPayload {
        AnswerPayload::from_result(self.generate_response(question).await)
    }

    pub fn reset_conversation(&mut self) {
        self.memory.reset();
        tracing::info!("Conversation memory cleared");
    }

    pub fn conversation_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn services(&self) -> &Arc<RagServices> {
        &self.services
    }
}
