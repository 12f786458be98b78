use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{info, info_span, warn, Instrument};

use asklegal_core::{CoreError, Query};
use asklegal_llm::{AdapterError, AnsweringAdapter, GenerateRequest};

use crate::calculation::CalculationEngine;
use crate::config::CoreConfig;
use crate::privacy::{PrivacyClassifier, Sensitivity};
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::retriever::{HybridRetriever, RetrievalStatus};
use crate::router::{ModelRouter, RoutingDecision, Strategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl AnswerRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_id: None,
            top_k: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResponse {
    pub request_id: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub strategy_used: Strategy,
    pub grounded: bool,
    pub downgraded: bool,
    pub sensitivity: Sensitivity,
    pub retrieval: RetrievalStatus,
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("malformed query: {0}")]
    MalformedQuery(&'static str),
    #[error("{strategy} generation failed: {source}")]
    Generation {
        strategy: Strategy,
        #[source]
        source: AdapterError,
    },
}

/// The per-process answering pipeline: privacy, retrieval, routing and
/// generation, with one REMOTE to LOCAL downgrade on adapter failure.
pub struct AnswerService {
    config: Arc<CoreConfig>,
    classifier: PrivacyClassifier,
    retriever: HybridRetriever,
    router: ModelRouter,
    local: Arc<dyn AnsweringAdapter>,
    remote: Option<Arc<dyn AnsweringAdapter>>,
}

impl AnswerService {
    pub fn new(
        config: Arc<CoreConfig>,
        retriever: HybridRetriever,
        local: Arc<dyn AnsweringAdapter>,
        remote: Option<Arc<dyn AnsweringAdapter>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let classifier = PrivacyClassifier::new(&config.privacy)?;
        let engine = Arc::new(CalculationEngine::new(&config.rate_tables)?);
        let router = ModelRouter::new(
            engine,
            config.routing.clone(),
            config.privacy.remote_policy,
            remote.is_some(),
        );
        Ok(Self {
            config,
            classifier,
            retriever,
            router,
            local,
            remote,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn classifier(&self) -> &PrivacyClassifier {
        &self.classifier
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    pub async fn answer(&self, request: AnswerRequest) -> Result<AnswerResponse, AnswerError> {
        let query = Query::new(request.query, request.conversation_id).map_err(|err| match err {
            CoreError::MalformedQuery(reason) => AnswerError::MalformedQuery(reason),
            _ => AnswerError::MalformedQuery("unreadable query"),
        })?;
        let top_k = request
            .top_k
            .filter(|k| *k > 0)
            .unwrap_or(self.config.retrieval.top_k);
        let span = info_span!(
            "answer",
            request_id = %query.id(),
            conversation_id = query.conversation_id().unwrap_or("-"),
        );
        self.answer_query(query, top_k).instrument(span).await
    }

    async fn answer_query(&self, query: Query, top_k: usize) -> Result<AnswerResponse, AnswerError> {
        let verdict = self.classifier.classify(query.text());
        info!(
            sensitivity = %verdict.sensitivity,
            categories = ?verdict.categories,
            topics = verdict.topics.len(),
            "privacy verdict"
        );

        let retrieval = self.retriever.retrieve(&query, &verdict, top_k).await;
        let retrieval_status = retrieval.status();

        let mut decision = self.router.route(&query, &verdict, &retrieval.window);
        info!(
            strategy = %decision.strategy(),
            reason = decision.reason(),
            "routing decision"
        );

        if let RoutingDecision::Calculation {
            facts,
            rate_table_version,
        } = &decision
        {
            match self.router.engine().compute(facts, rate_table_version) {
                Ok(breakdown) => {
                    return Ok(AnswerResponse {
                        request_id: query.id().to_string(),
                        answer: breakdown.render(),
                        sources: Vec::new(),
                        strategy_used: Strategy::Calculation,
                        grounded: false,
                        downgraded: false,
                        sensitivity: verdict.sensitivity,
                        retrieval: retrieval_status,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "calculation failed, routing generatively");
                    decision = self
                        .router
                        .route_generative(&query, &verdict, &retrieval.window);
                }
            }
        }

        let mut downgraded = false;
        let answer = match self.generate(&decision).await {
            Ok(text) => text,
            Err(err) => {
                let Some(fallback) = self.router.downgrade(&query, &decision) else {
                    return Err(AnswerError::Generation {
                        strategy: decision.strategy(),
                        source: err,
                    });
                };
                warn!(
                    from = %decision.strategy(),
                    to = %fallback.strategy(),
                    error = %err,
                    "generation failed, downgrading"
                );
                downgraded = true;
                decision = fallback;
                self.generate(&decision)
                    .await
                    .map_err(|source| AnswerError::Generation {
                        strategy: decision.strategy(),
                        source,
                    })?
            }
        };

        let sources = decision
            .context()
            .map(|window| window.passage_ids())
            .unwrap_or_default();
        Ok(AnswerResponse {
            request_id: query.id().to_string(),
            answer,
            grounded: !sources.is_empty(),
            sources,
            strategy_used: decision.strategy(),
            downgraded,
            sensitivity: verdict.sensitivity,
            retrieval: retrieval_status,
        })
    }

    async fn generate(&self, decision: &RoutingDecision) -> Result<String, AdapterError> {
        let routing = &self.config.routing;
        let (adapter, query_text, context, max_tokens, limit) = match decision {
            RoutingDecision::LocalModel {
                query_text,
                context,
                ..
            } => (
                &self.local,
                query_text,
                context,
                routing.local_max_tokens,
                routing.local_timeout(),
            ),
            RoutingDecision::RemoteModel {
                query_text,
                context,
                ..
            } => {
                let Some(remote) = &self.remote else {
                    return Err(AdapterError::Provider(
                        "no remote adapter configured".to_string(),
                    ));
                };
                (
                    remote,
                    query_text,
                    context,
                    routing.remote_max_tokens,
                    routing.remote_timeout(),
                )
            }
            RoutingDecision::Calculation { .. } => {
                return Err(AdapterError::Provider(
                    "calculation decisions are not generated".to_string(),
                ))
            }
        };

        let request = GenerateRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt: build_prompt(query_text, context),
            max_tokens,
            timeout: limit,
        };
        let started = Instant::now();
        let generation = timeout(limit, adapter.generate(&request))
            .await
            .map_err(|_| AdapterError::Timeout(limit))??;
        if generation.text.trim().is_empty() {
            return Err(AdapterError::Provider("empty completion".to_string()));
        }
        info!(
            adapter = adapter.name(),
            strategy = %decision.strategy(),
            latency_ms = started.elapsed().as_millis() as u64,
            prompt_tokens = generation.prompt_tokens,
            completion_tokens = generation.completion_tokens,
            "generation complete"
        );
        Ok(generation.text)
    }
}
