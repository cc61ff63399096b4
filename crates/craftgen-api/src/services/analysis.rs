//! Market, technical and risk reports for a design concept.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use craftgen_core::{AnalysisReport, DesignConcept, GenerationBackend, Result};
use craftgen_inference::parse_structured;

use super::prompts::{
    market_user_prompt, risk_user_prompt, technical_user_prompt, MARKET_SYSTEM_PROMPT,
    RISK_SYSTEM_PROMPT, TECHNICAL_SYSTEM_PROMPT,
};

/// Produces the three analysis sections, one model call each.
#[derive(Clone)]
pub struct DesignAnalyzer {
    generator: Arc<dyn GenerationBackend>,
}

impl DesignAnalyzer {
    pub fn new(generator: Arc<dyn GenerationBackend>) -> Self {
        Self { generator }
    }

    /// Run all three sections concurrently.
    ///
    /// A failed model call fails the whole report. An unparseable response
    /// only empties its own section.
    #[instrument(
        skip(self, concept),
        fields(subsystem = "pipeline", component = "analysis", op = "analyze")
    )]
    pub async fn analyze(&self, concept: &DesignConcept) -> Result<AnalysisReport> {
        let start = Instant::now();
        let (market, technical, risk) = tokio::try_join!(
            self.section("market", MARKET_SYSTEM_PROMPT, market_user_prompt(concept)),
            self.section("technical", TECHNICAL_SYSTEM_PROMPT, technical_user_prompt(concept)),
            self.section("risk", RISK_SYSTEM_PROMPT, risk_user_prompt(concept)),
        )?;

        info!(
            concept = %concept.concept_name,
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(AnalysisReport {
            market_analysis: market,
            technical_feasibility: technical,
            risk_assessment: risk,
        })
    }

    async fn section(&self, name: &str, system: &str, prompt: String) -> Result<Value> {
        let raw = self.generator.generate_with_system(system, &prompt).await?;
        match parse_structured::<Map<String, Value>>(&raw) {
            Ok(object) => Ok(Value::Object(object)),
            Err(e) => {
                warn!(section = name, error = %e, fallback = "empty_object", "Analysis response not parseable");
                Ok(Value::Object(Map::new()))
            }
        }
    }
}
