use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rustc_hash::FxHashSet;

use asklegal_core::{HashEmbedder, Query};
use asklegal_index::{
    Corpus, FilterSpec, KeywordIndex, MetadataCache, PassageRecord, ScoredPassage, VectorIndex,
};
use asklegal_rag::{
    AdapterError, AnswerError, AnswerRequest, AnswerService, AnsweringAdapter, CoreConfig,
    EmbeddingProvider, GenerateRequest, Generation, HybridRetriever, KeywordSearch,
    MetadataFilter, PrivacyClassifier, RemotePolicy, RetrievalStatus, Sensitivity, Strategy,
    VectorSearch,
};

const CALCULATION: &str =
    "Company with 1 crore turnover, 20 employees, 20 lpa salary, 50 lpa resources. Calculate taxes";
const COMPLEX: &str = "Please analyze and compare the liability and indemnity clauses of my \
                       vendor contract, evaluate compliance with the regulation, and assess \
                       damages if the supplier breaches the delivery schedule.";

#[derive(Clone, Copy)]
enum Behaviour {
    Answer,
    Hang,
    Fail,
    Blank,
}

struct ScriptedAdapter {
    name: &'static str,
    behaviour: Behaviour,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnsweringAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, AdapterError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        match self.behaviour {
            Behaviour::Answer => Ok(Generation {
                text: format!("answer from {}", self.name),
                prompt_tokens: 10,
                completion_tokens: 5,
            }),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(Generation {
                    text: "too late".into(),
                    prompt_tokens: 0,
                    completion_tokens: 0,
                })
            }
            Behaviour::Fail => Err(AdapterError::Provider("upstream 500".into())),
            Behaviour::Blank => Ok(Generation {
                text: "  \n ".into(),
                prompt_tokens: 10,
                completion_tokens: 0,
            }),
        }
    }
}

struct SlowSignal;

#[async_trait]
impl VectorSearch for SlowSignal {
    async fn search(&self, _embedding: &[f32], _k: usize) -> Result<Vec<ScoredPassage>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

#[async_trait]
impl KeywordSearch for SlowSignal {
    async fn search(&self, _text: &str, _k: usize) -> Result<Vec<ScoredPassage>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

#[async_trait]
impl MetadataFilter for SlowSignal {
    async fn eligible(&self, _spec: &FilterSpec) -> Result<FxHashSet<String>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(FxHashSet::default())
    }
}

/// Hash embedder that reports itself as remote and records what it saw.
struct RecordingEmbedder {
    inner: HashEmbedder,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl EmbeddingProvider for RecordingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(self.inner.embed_text(text))
    }

    fn is_remote(&self) -> bool {
        true
    }
}

fn corpus() -> Arc<Corpus> {
    let record = |id: &str, doc: &str, text: &str| PassageRecord {
        passage_id: id.into(),
        document_id: doc.into(),
        text: text.into(),
        tags: vec!["msme".into()],
        jurisdiction: Some("IN".into()),
        ..Default::default()
    };
    Arc::new(
        Corpus::from_records(vec![
            record(
                "msmed-1",
                "msmed-act",
                "MSME classification: micro enterprises have investment up to 1 crore and turnover up to 5 crore.",
            ),
            record(
                "msmed-2",
                "msmed-act",
                "Small enterprises have investment up to 10 crore and turnover up to 50 crore.",
            ),
            record(
                "contract-1",
                "contract-act",
                "A vendor contract should allocate liability, indemnity and damages for delayed delivery.",
            ),
            record(
                "gst-1",
                "gst-act",
                "GST registration is compulsory once aggregate turnover crosses the threshold.",
            ),
        ])
        .expect("corpus"),
    )
}

fn in_memory_retriever(config: &CoreConfig) -> HybridRetriever {
    let corpus = corpus();
    let embedder = HashEmbedder::default();
    let vectors = VectorIndex::build(&corpus, |t| Ok(embedder.embed_text(t))).expect("vectors");
    HybridRetriever::new(corpus.clone(), Arc::new(embedder), config.retrieval.clone())
        .with_vector(Arc::new(vectors))
        .with_keyword(Arc::new(KeywordIndex::build(&corpus)))
        .with_metadata(Arc::new(MetadataCache::build(&corpus)))
}

fn service(
    config: CoreConfig,
    local: Arc<ScriptedAdapter>,
    remote: Option<Arc<ScriptedAdapter>>,
) -> AnswerService {
    let retriever = in_memory_retriever(&config);
    AnswerService::new(
        Arc::new(config),
        retriever,
        local,
        remote.map(|r| r as Arc<dyn AnsweringAdapter>),
    )
    .expect("service")
}

fn redact_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.privacy.remote_policy = RemotePolicy::Redact;
    config
}

#[tokio::test]
async fn calculation_query_is_answered_without_a_model() {
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let remote = ScriptedAdapter::new("remote", Behaviour::Answer);
    let service = service(CoreConfig::default(), local.clone(), Some(remote.clone()));

    let response = service.answer(AnswerRequest::new(CALCULATION)).await.unwrap();
    assert_eq!(response.strategy_used, Strategy::Calculation);
    assert!(response.answer.contains("Income Tax"));
    assert!(response.answer.contains("₹2,50,000"));
    assert!(response.sources.is_empty());
    assert!(local.prompts().is_empty());
    assert!(remote.prompts().is_empty());
}

#[tokio::test]
async fn simple_question_goes_local_with_single_passage() {
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let remote = ScriptedAdapter::new("remote", Behaviour::Answer);
    let service = service(CoreConfig::default(), local.clone(), Some(remote.clone()));

    let response = service
        .answer(AnswerRequest::new("What is MSME classification?"))
        .await
        .unwrap();
    assert_eq!(response.strategy_used, Strategy::LocalModel);
    assert_eq!(response.sources, vec!["msmed-1".to_string()]);
    assert!(response.grounded);
    assert_eq!(response.answer, "answer from local");
    assert_eq!(response.retrieval, RetrievalStatus::Complete);
    assert!(remote.prompts().is_empty());
    assert!(local.prompts()[0].contains("[SOURCE: msmed-act, passage msmed-1]"));
}

#[tokio::test(start_paused = true)]
async fn all_signals_timing_out_answers_ungrounded() {
    let mut config = CoreConfig::default();
    config.retrieval.filter = FilterSpec {
        required_tags: vec!["msme".into()],
        ..Default::default()
    };
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let retriever = HybridRetriever::new(
        corpus(),
        Arc::new(HashEmbedder::default()),
        config.retrieval.clone(),
    )
    .with_vector(Arc::new(SlowSignal))
    .with_keyword(Arc::new(SlowSignal))
    .with_metadata(Arc::new(SlowSignal));
    let service = AnswerService::new(Arc::new(config), retriever, local.clone(), None).unwrap();

    let response = service
        .answer(AnswerRequest::new("What is MSME classification?"))
        .await
        .unwrap();
    assert_eq!(response.retrieval, RetrievalStatus::Unavailable);
    assert_eq!(response.strategy_used, Strategy::LocalModel);
    assert!(response.sources.is_empty());
    assert!(!response.grounded);
    assert!(local.prompts()[0].contains("not grounded"));
}

fn retriever_with(
    config: &CoreConfig,
    keyword: Arc<dyn KeywordSearch>,
    metadata: Arc<dyn MetadataFilter>,
) -> HybridRetriever {
    let corpus = corpus();
    let embedder = HashEmbedder::default();
    let vectors = VectorIndex::build(&corpus, |t| Ok(embedder.embed_text(t))).expect("vectors");
    HybridRetriever::new(corpus, Arc::new(embedder), config.retrieval.clone())
        .with_vector(Arc::new(vectors))
        .with_keyword(keyword)
        .with_metadata(metadata)
}

#[tokio::test(start_paused = true)]
async fn keyword_outage_still_answers_from_vector_results() {
    let config = CoreConfig::default();
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let retriever = retriever_with(
        &config,
        Arc::new(SlowSignal),
        Arc::new(MetadataCache::build(&corpus())),
    );
    let service = AnswerService::new(Arc::new(config), retriever, local.clone(), None).unwrap();

    let response = service
        .answer(AnswerRequest::new("What is MSME classification?"))
        .await
        .unwrap();
    assert_eq!(response.retrieval, RetrievalStatus::Degraded);
    assert_eq!(response.strategy_used, Strategy::LocalModel);
    assert!(response.grounded);
    assert!(!response.sources.is_empty());
    assert!(local.prompts()[0].contains("[SOURCE: "));
}

#[tokio::test(start_paused = true)]
async fn metadata_outage_under_a_filter_serves_no_passages() {
    let mut config = CoreConfig::default();
    config.retrieval.filter = FilterSpec {
        jurisdictions: vec!["IN".into()],
        ..Default::default()
    };
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let corpus = corpus();
    let retriever = retriever_with(
        &config,
        Arc::new(KeywordIndex::build(&corpus)),
        Arc::new(SlowSignal),
    );
    let service = AnswerService::new(Arc::new(config), retriever, local.clone(), None).unwrap();

    let response = service
        .answer(AnswerRequest::new("What is MSME classification?"))
        .await
        .unwrap();
    assert_eq!(response.retrieval, RetrievalStatus::Degraded);
    assert!(response.sources.is_empty());
    assert!(!response.grounded);
    assert!(local.prompts()[0].contains("not grounded"));
}

#[tokio::test]
async fn sensitive_remote_query_sends_only_redacted_text() {
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let remote = ScriptedAdapter::new("remote", Behaviour::Answer);
    let service = service(redact_config(), local.clone(), Some(remote.clone()));
    let text = format!("{COMPLEX} Reach me at ravi.kumar@example.com or 9876543210.");

    let response = service.answer(AnswerRequest::new(text)).await.unwrap();
    assert_eq!(response.sensitivity, Sensitivity::Sensitive);
    assert_eq!(response.strategy_used, Strategy::RemoteModel);
    let prompts = remote.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].contains("ravi.kumar@example.com"));
    assert!(!prompts[0].contains("9876543210"));
    assert!(prompts[0].contains("[EMAIL]"));
    assert!(prompts[0].contains("[PHONE]"));
    assert!(local.prompts().is_empty());
}

#[tokio::test]
async fn sensitive_query_stays_local_under_default_policy() {
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let remote = ScriptedAdapter::new("remote", Behaviour::Answer);
    let service = service(CoreConfig::default(), local.clone(), Some(remote.clone()));
    let text = format!("{COMPLEX} My PAN is ABCDE1234F.");

    let response = service.answer(AnswerRequest::new(text)).await.unwrap();
    assert_eq!(response.strategy_used, Strategy::LocalModel);
    assert!(remote.prompts().is_empty());
}

#[tokio::test]
async fn public_complex_query_goes_remote_with_full_context() {
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let remote = ScriptedAdapter::new("remote", Behaviour::Answer);
    let service = service(CoreConfig::default(), local.clone(), Some(remote.clone()));

    let response = service.answer(AnswerRequest::new(COMPLEX)).await.unwrap();
    assert_eq!(response.strategy_used, Strategy::RemoteModel);
    assert_eq!(response.sensitivity, Sensitivity::Public);
    assert!(response.sources.len() > 1);
    assert!(!response.downgraded);
}

#[tokio::test(start_paused = true)]
async fn remote_timeout_downgrades_to_local_once() {
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let remote = ScriptedAdapter::new("remote", Behaviour::Hang);
    let service = service(CoreConfig::default(), local.clone(), Some(remote.clone()));

    let response = service.answer(AnswerRequest::new(COMPLEX)).await.unwrap();
    assert!(response.downgraded);
    assert_eq!(response.strategy_used, Strategy::LocalModel);
    assert_eq!(response.answer, "answer from local");
    assert!(response.sources.len() <= 1);
    assert_eq!(remote.prompts().len(), 1);
    assert_eq!(local.prompts().len(), 1);
}

#[tokio::test]
async fn second_failure_is_surfaced() {
    let local = ScriptedAdapter::new("local", Behaviour::Fail);
    let remote = ScriptedAdapter::new("remote", Behaviour::Fail);
    let service = service(CoreConfig::default(), local.clone(), Some(remote.clone()));

    let err = service.answer(AnswerRequest::new(COMPLEX)).await.unwrap_err();
    match err {
        AnswerError::Generation { strategy, source } => {
            assert_eq!(strategy, Strategy::LocalModel);
            assert!(matches!(source, AdapterError::Provider(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(remote.prompts().len(), 1);
    assert_eq!(local.prompts().len(), 1);
}

#[tokio::test]
async fn local_failure_is_not_retried() {
    let local = ScriptedAdapter::new("local", Behaviour::Blank);
    let service = service(CoreConfig::default(), local.clone(), None);

    let err = service
        .answer(AnswerRequest::new("What is MSME classification?"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AnswerError::Generation {
            strategy: Strategy::LocalModel,
            source: AdapterError::Provider(_)
        }
    ));
    assert_eq!(local.prompts().len(), 1);
}

#[tokio::test]
async fn malformed_queries_are_rejected_before_retrieval() {
    let local = ScriptedAdapter::new("local", Behaviour::Answer);
    let service = service(CoreConfig::default(), local.clone(), None);

    for text in ["", "   \n\t", "null\0byte"] {
        let err = service.answer(AnswerRequest::new(text)).await.unwrap_err();
        assert!(matches!(err, AnswerError::MalformedQuery(_)));
    }
    assert!(local.prompts().is_empty());
}

#[tokio::test]
async fn remote_embedder_never_sees_raw_sensitive_text() {
    let config = CoreConfig::default();
    let corpus = corpus();
    let embedder = Arc::new(RecordingEmbedder {
        inner: HashEmbedder::default(),
        seen: Mutex::new(Vec::new()),
    });
    let hash = HashEmbedder::default();
    let vectors = VectorIndex::build(&corpus, |t| Ok(hash.embed_text(t))).unwrap();
    let retriever = HybridRetriever::new(corpus.clone(), embedder.clone(), config.retrieval.clone())
        .with_vector(Arc::new(vectors))
        .with_keyword(Arc::new(KeywordIndex::build(&corpus)));

    let text = "GST registration for Mr. Ravi Kumar, phone 9876543210";
    let query = Query::new(text, None).unwrap();
    let verdict = PrivacyClassifier::new(&config.privacy).unwrap().classify(text);
    let retrieval = retriever.retrieve(&query, &verdict, 3).await;
    assert!(!retrieval.is_unavailable());

    let seen = embedder.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].contains("9876543210"));
    assert!(!seen[0].contains("Ravi Kumar"));
}
