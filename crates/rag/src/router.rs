use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use asklegal_core::{ContextWindow, Query};

use crate::calculation::{CalculationEngine, FinancialFacts};
use crate::complexity::ComplexityScore;
use crate::config::{RemotePolicy, RoutingConfig};
use crate::privacy::SensitivityVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Calculation,
    LocalModel,
    RemoteModel,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Calculation => "calculation",
            Strategy::LocalModel => "local_model",
            Strategy::RemoteModel => "remote_model",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    LowComplexity,
    SensitiveForcedLocal,
    RemoteUnavailable,
    Downgraded,
}

impl RouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteReason::LowComplexity => "low_complexity",
            RouteReason::SensitiveForcedLocal => "sensitive_forced_local",
            RouteReason::RemoteUnavailable => "remote_unavailable",
            RouteReason::Downgraded => "downgraded",
        }
    }
}

/// Which strategy answers a query, with exactly the input that strategy needs.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    Calculation {
        facts: FinancialFacts,
        rate_table_version: String,
    },
    LocalModel {
        query_text: String,
        context: ContextWindow,
        reason: RouteReason,
    },
    RemoteModel {
        /// The redacted copy whenever the query is SENSITIVE.
        query_text: String,
        context: ContextWindow,
        complexity: ComplexityScore,
        redacted: bool,
    },
}

impl RoutingDecision {
    pub fn strategy(&self) -> Strategy {
        match self {
            RoutingDecision::Calculation { .. } => Strategy::Calculation,
            RoutingDecision::LocalModel { .. } => Strategy::LocalModel,
            RoutingDecision::RemoteModel { .. } => Strategy::RemoteModel,
        }
    }

    pub fn context(&self) -> Option<&ContextWindow> {
        match self {
            RoutingDecision::Calculation { .. } => None,
            RoutingDecision::LocalModel { context, .. }
            | RoutingDecision::RemoteModel { context, .. } => Some(context),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            RoutingDecision::Calculation { .. } => "financial_facts",
            RoutingDecision::LocalModel { reason, .. } => reason.as_str(),
            RoutingDecision::RemoteModel { .. } => "high_complexity",
        }
    }
}

/// Stateless decision table over (query, verdict, context).
#[derive(Debug, Clone)]
pub struct ModelRouter {
    engine: Arc<CalculationEngine>,
    routing: RoutingConfig,
    policy: RemotePolicy,
    remote_available: bool,
}

impl ModelRouter {
    pub fn new(
        engine: Arc<CalculationEngine>,
        routing: RoutingConfig,
        policy: RemotePolicy,
        remote_available: bool,
    ) -> Self {
        Self {
            engine,
            routing,
            policy,
            remote_available,
        }
    }

    pub fn engine(&self) -> &CalculationEngine {
        &self.engine
    }

    pub fn remote_available(&self) -> bool {
        self.remote_available
    }

    pub fn route(
        &self,
        query: &Query,
        verdict: &SensitivityVerdict,
        context: &ContextWindow,
    ) -> RoutingDecision {
        if let Some(facts) = self.engine.extract(query.text()) {
            match facts.validate() {
                Ok(()) => {
                    return RoutingDecision::Calculation {
                        facts,
                        rate_table_version: self.engine.default_version().to_string(),
                    }
                }
                Err(err) => debug!(error = %err, "extracted facts rejected, routing generatively"),
            }
        }
        self.route_generative(query, verdict, context)
    }

    /// The decision table without the calculation branch.
    pub fn route_generative(
        &self,
        query: &Query,
        verdict: &SensitivityVerdict,
        context: &ContextWindow,
    ) -> RoutingDecision {
        let complexity = ComplexityScore::of(query.text());
        if !complexity.exceeds(self.routing.complexity_threshold) {
            return self.local(query, context, RouteReason::LowComplexity);
        }
        if !self.remote_available {
            return self.local(query, context, RouteReason::RemoteUnavailable);
        }
        if verdict.is_sensitive() && self.policy == RemotePolicy::ForceLocal {
            return self.local(query, context, RouteReason::SensitiveForcedLocal);
        }
        RoutingDecision::RemoteModel {
            query_text: verdict.outbound_text().to_string(),
            context: context.clone(),
            complexity,
            redacted: verdict.is_sensitive(),
        }
    }

    /// The next cheaper strategy after a failed remote generation.
    pub fn downgrade(&self, query: &Query, decision: &RoutingDecision) -> Option<RoutingDecision> {
        match decision {
            RoutingDecision::RemoteModel { context, .. } => {
                Some(self.local(query, context, RouteReason::Downgraded))
            }
            _ => None,
        }
    }

    fn local(&self, query: &Query, context: &ContextWindow, reason: RouteReason) -> RoutingDecision {
        RoutingDecision::LocalModel {
            query_text: query.text().to_string(),
            context: context.reduced(
                self.routing.local_context_chars,
                self.routing.local_max_passages,
            ),
            reason,
        }
    }
}
