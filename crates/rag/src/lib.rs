pub mod bootstrap;
pub mod calculation;
pub mod complexity;
pub mod config;
pub mod embedding;
pub mod fusion;
pub mod pipeline;
pub mod privacy;
pub mod prompt;
pub mod retriever;
pub mod router;
pub mod signals;

pub use bootstrap::Bootstrap;
pub use calculation::{
    detect_calculation, extract_facts, CalculationEngine, CalculationKind, FinancialFacts,
    RateTable, TaxBreakdown,
};
pub use complexity::ComplexityScore;
pub use config::{CoreConfig, PrivacyConfig, RatesConfig, RemotePolicy, RetrievalConfig, RoutingConfig};
pub use embedding::{EmbeddingBackend, EmbeddingClient};
pub use fusion::FusionWeights;
pub use pipeline::{AnswerError, AnswerRequest, AnswerResponse, AnswerService};
pub use privacy::{redact, PiiCategory, PrivacyClassifier, Sensitivity, SensitivityVerdict};
pub use retriever::{HybridRetriever, Retrieval, RetrievalStatus, SignalStatus};
pub use router::{ModelRouter, RouteReason, RoutingDecision, Strategy};
pub use signals::{EmbeddingProvider, KeywordSearch, MetadataFilter, VectorSearch};
pub use asklegal_llm::{AdapterError, AnsweringAdapter, GenerateRequest, Generation, LlmClient, LlmProvider};
