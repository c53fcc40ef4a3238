//! Report payloads for presentation layers
//!
//! A [`ReportPayload`] pairs the outcome of a training or prediction run
//! with an optional explainability report. It serializes to JSON and can be
//! rendered as a short Markdown summary.

use crate::error::Result;
use crate::explainability::ExplainabilityReport;
use crate::inference::PredictionSummary;
use crate::training::TrainingRun;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the report is about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSubject {
    Training(TrainingRun),
    Prediction(PredictionSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub subject: ReportSubject,
    pub explainability: Option<ExplainabilityReport>,
    pub generator: String,
    pub generated_at: DateTime<Utc>,
}

impl ReportPayload {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Short human-readable summary
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("*Generated: {}*\n\n", self.generated_at.format("%Y-%m-%d %H:%M UTC")));

        match &self.subject {
            ReportSubject::Training(run) => {
                md.push_str(&format!("# Training: {} on {}\n\n", run.algorithm.display_name(), run.dataset));
                md.push_str(&format!("- **Target:** {}\n", run.target_column));
                md.push_str(&format!("- **Features:** {}\n", run.feature_names.join(", ")));
                md.push_str(&format!("- **Rows:** {} train / {} test\n", run.train_rows, run.test_rows));
                md.push_str(&format!("- **Accuracy:** {:.4}\n", run.accuracy()));
                md.push_str(&format!("- **Macro F1:** {:.4}\n", run.metrics.macro_avg.f1_score));
                for warning in &run.warnings {
                    md.push_str(&format!("- **Warning:** {}\n", warning));
                }
            }
            ReportSubject::Prediction(summary) => {
                md.push_str(&format!("# Prediction with {}\n\n", summary.model_id));
                md.push_str(&format!("- **Rows:** {}\n", summary.rows));
                for (label, count) in &summary.class_counts {
                    md.push_str(&format!("- **{}:** {}\n", label, count));
                }
                if let Some(confidence) = summary.mean_confidence {
                    md.push_str(&format!("- **Mean confidence:** {:.4}\n", confidence));
                }
            }
        }

        if let Some(report) = &self.explainability {
            md.push_str("\n## Explainability\n\n");
            md.push_str(&format!("- **Accuracy on {}:** {:.4}\n", report.dataset, report.performance.accuracy));
            if let Some(importance) = &report.feature_importance {
                let top: Vec<String> = importance
                    .ranked()
                    .into_iter()
                    .take(5)
                    .map(|(name, value)| format!("{} ({:.3})", name, value))
                    .collect();
                md.push_str(&format!("- **Top features:** {}\n", top.join(", ")));
            }
            if let Some(roc) = &report.roc {
                md.push_str(&format!("- **AUC:** {:.4}\n", roc.auc));
            }
            for warning in &report.warnings {
                md.push_str(&format!("- **Warning:** {}\n", warning));
            }
        }
        md
    }
}

/// Combines run outcomes and explainability into payloads
#[derive(Debug, Clone, Default)]
pub struct ReportAssembler;

impl ReportAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, subject: ReportSubject, explainability: Option<ExplainabilityReport>) -> ReportPayload {
        ReportPayload {
            subject,
            explainability,
            generator: format!("odyssey-ml v{}", env!("CARGO_PKG_VERSION")),
            generated_at: Utc::now(),
        }
    }

    pub fn training(&self, run: TrainingRun, explainability: Option<ExplainabilityReport>) -> ReportPayload {
        self.assemble(ReportSubject::Training(run), explainability)
    }

    pub fn prediction(
        &self,
        summary: PredictionSummary,
        explainability: Option<ExplainabilityReport>,
    ) -> ReportPayload {
        self.assemble(ReportSubject::Prediction(summary), explainability)
    }

    /// Assemble from upstream results, returning the first error
    pub fn try_assemble(
        &self,
        subject: Result<ReportSubject>,
        explainability: Option<Result<ExplainabilityReport>>,
    ) -> Result<ReportPayload> {
        let subject = subject?;
        let explainability = explainability.transpose()?;
        Ok(self.assemble(subject, explainability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OdysseyError;

    fn summary() -> PredictionSummary {
        PredictionSummary {
            model_id: "random_forest_42".to_string(),
            rows: 3,
            class_counts: vec![("no".to_string(), 1), ("yes".to_string(), 2)],
            mean_confidence: Some(0.8),
            elapsed_secs: 0.01,
        }
    }

    #[test]
    fn test_prediction_payload_json() {
        let payload = ReportAssembler::new().prediction(summary(), None);
        let json: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();

        assert_eq!(json["subject"]["kind"], "prediction");
        assert_eq!(json["subject"]["rows"], 3);
        assert!(json["explainability"].is_null());
        assert!(payload.to_markdown().contains("random_forest_42"));
    }

    #[test]
    fn test_try_assemble_propagates_errors() {
        let assembler = ReportAssembler::new();
        let err = assembler
            .try_assemble(Err(OdysseyError::NotFound("x.csv".to_string())), None)
            .unwrap_err();
        assert!(matches!(err, OdysseyError::NotFound(_)));

        let err = assembler
            .try_assemble(
                Ok(ReportSubject::Prediction(summary())),
                Some(Err(OdysseyError::Computation("boom".to_string()))),
            )
            .unwrap_err();
        assert!(matches!(err, OdysseyError::Computation(_)));

        let ok = assembler.try_assemble(Ok(ReportSubject::Prediction(summary())), None).unwrap();
        assert!(ok.explainability.is_none());
    }
}
