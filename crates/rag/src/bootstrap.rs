//! Process-start wiring shared by the HTTP service and the operator CLI.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use asklegal_index::Corpus;
use asklegal_llm::{AnsweringAdapter, LlmClient, LlmProvider};

use crate::config::{CoreConfig, CONFIG_ENV, DEFAULT_CONFIG_PATH};
use crate::embedding::EmbeddingClient;
use crate::pipeline::AnswerService;
use crate::retriever::HybridRetriever;

pub const CORPUS_ENV: &str = "ASKLEGAL_CORPUS";
pub const DEFAULT_CORPUS_PATH: &str = "corpus.jsonl";

#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    pub config_path: Option<PathBuf>,
    pub corpus_path: Option<PathBuf>,
}

impl Bootstrap {
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.corpus_path
            .clone()
            .or_else(|| env::var(CORPUS_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS_PATH))
    }

    pub fn load_config(&self) -> Result<Arc<CoreConfig>> {
        let path = self.config_path();
        let config = CoreConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        Ok(Arc::new(config))
    }

    pub async fn build_retriever(&self, config: &CoreConfig) -> Result<HybridRetriever> {
        let corpus = Arc::new(load_corpus(&self.corpus_path())?);
        let embedding = EmbeddingClient::from_env().unwrap_or_else(|_| EmbeddingClient::hash());
        HybridRetriever::in_process(corpus, embedding, config.retrieval.clone())
            .await
            .context("failed to build retrieval indices")
    }

    pub async fn build_service(&self) -> Result<AnswerService> {
        let config = self.load_config()?;
        let retriever = self.build_retriever(&config).await?;
        let local = local_adapter_from_env()?;
        let remote = remote_adapter_from_env()?;
        info!(
            local = local.name(),
            remote = remote.as_ref().map(|r| r.name()).unwrap_or("none"),
            "answering adapters ready"
        );
        AnswerService::new(config, retriever, local, remote).context("invalid configuration")
    }
}

fn load_corpus(path: &Path) -> Result<Corpus> {
    if !path.exists() {
        info!(path = %path.display(), "corpus not found, starting with an empty corpus");
        return Ok(Corpus::default());
    }
    Corpus::load_jsonl(path)
}

fn provider_from_env(var: &str) -> Result<Option<LlmProvider>> {
    match env::var(var) {
        Ok(name) if !name.trim().is_empty() => LlmProvider::from_str(&name)
            .map(Some)
            .ok_or_else(|| anyhow!("unknown provider {name} in {var}")),
        _ => Ok(None),
    }
}

/// `LOCAL_LLM_PROVIDER`/`LOCAL_LLM_MODEL`/`LOCAL_LLM_BASE_URL`; the offline
/// extractive adapter when unset.
pub fn local_adapter_from_env() -> Result<Arc<dyn AnsweringAdapter>> {
    let Some(provider) = provider_from_env("LOCAL_LLM_PROVIDER")? else {
        return Ok(Arc::new(LlmClient::local()));
    };
    let model = env::var("LOCAL_LLM_MODEL").unwrap_or_else(|_| provider.default_model().to_string());
    let base_url = env::var("LOCAL_LLM_BASE_URL").ok();
    let client = ensure_local(LlmClient::new(provider, model, base_url)?)?;
    Ok(Arc::new(client))
}

/// SENSITIVE text is answered by the local adapter, so it must not leave the host.
fn ensure_local(client: LlmClient) -> Result<LlmClient> {
    if client.is_remote() {
        return Err(anyhow!(
            "LOCAL_LLM_PROVIDER {} sends text off the machine; use `local` or a loopback LOCAL_LLM_BASE_URL",
            client.name()
        ));
    }
    Ok(client)
}

/// `REMOTE_LLM_PROVIDER`/`REMOTE_LLM_MODEL`; no remote adapter when unset.
pub fn remote_adapter_from_env() -> Result<Option<Arc<dyn AnsweringAdapter>>> {
    let Some(provider) = provider_from_env("REMOTE_LLM_PROVIDER")? else {
        return Ok(None);
    };
    let model = env::var("REMOTE_LLM_MODEL").unwrap_or_else(|_| provider.default_model().to_string());
    let client = LlmClient::new(provider, model, None)?;
    Ok(Some(Arc::new(client)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_win() {
        let boot = Bootstrap {
            config_path: Some(PathBuf::from("custom.toml")),
            corpus_path: Some(PathBuf::from("passages.jsonl")),
        };
        assert_eq!(boot.config_path(), PathBuf::from("custom.toml"));
        assert_eq!(boot.corpus_path(), PathBuf::from("passages.jsonl"));
    }

    #[test]
    fn missing_corpus_is_empty() {
        let corpus = load_corpus(Path::new("does/not/exist.jsonl")).unwrap();
        assert!(corpus.is_empty());
    }

    #[test]
    fn local_adapter_must_stay_on_the_machine() {
        let loopback = LlmClient::new(
            LlmProvider::OpenAi,
            "llama3",
            Some("http://127.0.0.1:11434/v1".to_string()),
        )
        .unwrap();
        assert!(ensure_local(loopback).is_ok());
        assert!(ensure_local(LlmClient::local()).is_ok());

        let hosted = LlmClient::new(
            LlmProvider::OpenAi,
            "llama3",
            Some("https://llm.example.com/v1".to_string()),
        )
        .unwrap();
        assert!(ensure_local(hosted).is_err());
    }
}
