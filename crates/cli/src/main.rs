use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use asklegal_core::Query;
use asklegal_rag::{
    AnswerRequest, AnswerResponse, Bootstrap, CalculationEngine, ComplexityScore,
    PrivacyClassifier, RoutingDecision, SensitivityVerdict, TaxBreakdown,
};

#[derive(Parser, Debug)]
#[command(name = "asklegal", version, about = "AskLegal retrieval-and-routing operator CLI")]
struct Cli {
    /// TOML configuration (falls back to $ASKLEGAL_CONFIG, then asklegal.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSONL passage corpus (falls back to $ASKLEGAL_CORPUS, then corpus.jsonl)
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question end to end.
    Ask {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        conversation: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Show the privacy verdict and redacted text.
    Classify { text: String },
    /// Extract financial facts and compute the tax breakdown.
    Calc {
        text: String,
        #[arg(long = "rate-table")]
        rate_table: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Retrieve and route without generating an answer.
    Route {
        text: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let boot = Bootstrap {
        config_path: cli.config.clone(),
        corpus_path: cli.corpus.clone(),
    };

    match cli.command {
        Commands::Ask {
            question,
            top_k,
            conversation,
            json,
        } => {
            let service = boot.build_service().await?;
            let request = AnswerRequest {
                query: question,
                conversation_id: conversation,
                top_k,
            };
            let response = service.answer(request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_answer(&response);
            }
        }
        Commands::Classify { text } => {
            let config = boot.load_config()?;
            let classifier = PrivacyClassifier::new(&config.privacy)?;
            print_verdict(&classifier.classify(&text));
        }
        Commands::Calc {
            text,
            rate_table,
            json,
        } => {
            let config = boot.load_config()?;
            let engine = CalculationEngine::new(&config.rate_tables)?;
            let facts = engine
                .extract(&text)
                .ok_or_else(|| anyhow!("no calculation intent or turnover found in input"))?;
            let version = rate_table.unwrap_or_else(|| engine.default_version().to_string());
            let breakdown = engine.compute(&facts, &version)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
            } else {
                print_breakdown(&breakdown);
            }
        }
        Commands::Route { text, top_k } => {
            let service = boot.build_service().await?;
            let query = Query::new(text, None)?;
            let top_k = top_k
                .filter(|k| *k > 0)
                .unwrap_or(service.config().retrieval.top_k);
            let verdict = service.classifier().classify(query.text());
            let retrieval = service.retriever().retrieve(&query, &verdict, top_k).await;
            let decision = service.router().route(&query, &verdict, &retrieval.window);
            println!("[AskLegal] Sensitivity:  {}", verdict.sensitivity);
            println!(
                "[AskLegal] Retrieval:    {:?} (vector={}, keyword={}, metadata={}, candidates={})",
                retrieval.status(),
                retrieval.vector,
                retrieval.keyword,
                retrieval.metadata,
                retrieval.candidates
            );
            print_decision(&decision, query.text());
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_answer(response: &AnswerResponse) {
    println!("[AskLegal] Request:      {}", response.request_id);
    println!("[AskLegal] Strategy:     {}", response.strategy_used);
    println!("[AskLegal] Sensitivity:  {}", response.sensitivity);
    println!("[AskLegal] Retrieval:    {:?}", response.retrieval);
    if response.downgraded {
        println!("[AskLegal] Downgraded:   remote generation failed, answered locally");
    }
    if !response.sources.is_empty() {
        println!("[AskLegal] Sources:      {}", response.sources.join(", "));
    }
    println!("\n{}", response.answer.trim());
}

fn print_verdict(verdict: &SensitivityVerdict) {
    println!("[AskLegal] Sensitivity:  {}", verdict.sensitivity);
    if !verdict.categories.is_empty() {
        let categories: Vec<&str> = verdict.categories.iter().map(|c| c.as_str()).collect();
        println!("[AskLegal] PII:          {}", categories.join(", "));
    }
    if !verdict.topics.is_empty() {
        println!("[AskLegal] Topics:       {}", verdict.topics.join(", "));
    }
    println!("[AskLegal] Outbound:     {}", verdict.outbound_text());
}

fn print_breakdown(breakdown: &TaxBreakdown) {
    println!("{}", breakdown.render());
}

fn print_decision(decision: &RoutingDecision, text: &str) {
    let complexity = ComplexityScore::of(text);
    println!(
        "[AskLegal] Complexity:   {:.2} (length={:.2}, analytical={:.2}, legal={:.2}, numeric={:.2})",
        complexity.value, complexity.length, complexity.analytical, complexity.legal, complexity.numeric
    );
    println!("[AskLegal] Strategy:     {}", decision.strategy());
    println!("[AskLegal] Reason:       {}", decision.reason());
    match decision {
        RoutingDecision::Calculation {
            facts,
            rate_table_version,
        } => {
            println!("[AskLegal] Rate table:   {rate_table_version}");
            println!(
                "[AskLegal] Facts:        kind={}, turnover={}, headcount={}, salary={}, other={}",
                facts.kind.as_str(),
                facts.turnover,
                facts.headcount,
                facts.salary_total,
                facts.other_expenses
            );
        }
        RoutingDecision::LocalModel { context, .. } | RoutingDecision::RemoteModel { context, .. } => {
            println!(
                "[AskLegal] Context:      {} passages, {} chars [{}]",
                context.len(),
                context.total_size(),
                context.passage_ids().join(", ")
            );
        }
    }
    if let RoutingDecision::RemoteModel { query_text, redacted, .. } = decision {
        if *redacted {
            println!("[AskLegal] Outbound:     {query_text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_calc_with_rate_table() {
        let cli = Cli::try_parse_from([
            "asklegal",
            "--config",
            "custom.toml",
            "calc",
            "tax on 1 crore turnover",
            "--rate-table",
            "FY2024-25",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Calc {
                text,
                rate_table,
                json,
            } => {
                assert_eq!(text, "tax on 1 crore turnover");
                assert_eq!(rate_table.as_deref(), Some("FY2024-25"));
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn ask_requires_a_question() {
        assert!(Cli::try_parse_from(["asklegal", "ask"]).is_err());
    }
}
