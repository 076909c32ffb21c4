//! Map-reduce analyzer orchestrating chunking and completion calls.
//!
//! The map phase summarizes each chunk independently; calls run through a bounded,
//! order-preserving stream so later chunks never overtake earlier ones in the
//! reassembled narrative. The reduce phase sees only the joined summaries and must
//! return the structured report as JSON, which is parsed strictly here. Dropping the
//! returned future cancels any chunk calls still in flight.

use super::chunking::chunk_text;
use super::prompts::{build_chunk_summary_prompt, build_final_analysis_prompt};
use super::types::{AnalysisError, AnalysisOutcome, AnalysisReport};
use crate::completion::{CompletionClient, CompletionRequest, get_completion_client};
use crate::config::get_config;
use futures_util::{StreamExt, TryStreamExt, stream};

/// Tunable knobs for one analyzer instance.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Model identifier passed with every completion request.
    pub model: String,
    /// Sampling temperature passed with every completion request.
    pub temperature: f32,
    /// Maximum characters per chunk in the map phase.
    pub chunk_max_chars: usize,
    /// Number of chunk summarization calls allowed in flight at once.
    pub map_concurrency: usize,
}

/// Two-phase document analyzer backed by a completion service.
pub struct MapReduceAnalyzer {
    client: Box<dyn CompletionClient>,
    options: AnalyzerOptions,
}

impl MapReduceAnalyzer {
    /// Build an analyzer over an explicit completion client.
    pub fn new(client: Box<dyn CompletionClient>, options: AnalyzerOptions) -> Self {
        Self { client, options }
    }

    /// Build an analyzer from the loaded configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self::new(
            get_completion_client(),
            AnalyzerOptions {
                model: config.completion_model.clone(),
                temperature: config.completion_temperature,
                chunk_max_chars: config.chunk_max_chars,
                map_concurrency: config.map_concurrency,
            },
        )
    }

    /// Produce a structured competency report for the extracted document text.
    ///
    /// Empty input fails before any completion call. A terminal failure on any
    /// chunk fails the whole analysis with that chunk's index; summaries from
    /// other chunks are discarded rather than aggregated around the gap.
    pub async fn analyze(
        &self,
        text: &str,
        target_role: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let chunks = chunk_text(text, self.options.chunk_max_chars)?;
        tracing::debug!(
            chunks = chunks.len(),
            chunk_max_chars = self.options.chunk_max_chars,
            target_role,
            "Starting map phase"
        );

        let prompts: Vec<(usize, String)> = chunks
            .iter()
            .enumerate()
            .map(|(chunk_index, chunk)| (chunk_index, build_chunk_summary_prompt(chunk, target_role)))
            .collect();

        let summaries: Vec<String> = stream::iter(prompts.into_iter().map(
            |(chunk_index, prompt)| {
                async move {
                    self.client
                        .complete(CompletionRequest {
                            prompt,
                            model: self.options.model.clone(),
                            temperature: self.options.temperature,
                        })
                        .await
                        .map_err(|source| AnalysisError::PartialSummary {
                            chunk_index,
                            source,
                        })
                }
            },
        ))
        .buffered(self.options.map_concurrency.max(1))
        .try_collect()
        .await?;

        tracing::debug!(summaries = summaries.len(), "Map phase complete");

        let final_prompt = build_final_analysis_prompt(&summaries.join("\n"), target_role);
        let raw = self
            .client
            .complete(CompletionRequest {
                prompt: final_prompt,
                model: self.options.model.clone(),
                temperature: self.options.temperature,
            })
            .await?;

        let report = parse_report(&raw)?;
        tracing::info!(
            chunks = chunks.len(),
            categories = report.len(),
            target_role,
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            report,
            chunk_count: chunks.len(),
        })
    }
}

/// Parse the reduce-phase response strictly as a report.
///
/// Models occasionally wrap the JSON object in a markdown code fence; the fence is
/// stripped before parsing and nothing else is coerced.
fn parse_report(raw: &str) -> Result<AnalysisReport, AnalysisError> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|source| AnalysisError::ReportParse {
        raw: raw.to_string(),
        source,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionClientError;
    use crate::pipeline::types::CategoryInsight;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Scripted completion client: echoes map-phase segments back as summaries and
    /// answers the reduce-phase prompt with a fixed response.
    struct ScriptedClient {
        final_response: String,
        fail_segment_containing: Option<String>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedClient {
        fn new(final_response: &str) -> Self {
            Self {
                final_response: final_response.to_string(),
                fail_segment_containing: None,
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing_on(marker: &str) -> Self {
            Self {
                fail_segment_containing: Some(marker.to_string()),
                ..Self::new("{}")
            }
        }

    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<String, CompletionClientError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());

            if let Some(segment) = request.prompt.split("Segment:\n").nth(1) {
                if let Some(marker) = &self.fail_segment_containing
                    && segment.contains(marker.as_str())
                {
                    return Err(CompletionClientError::ServiceUnavailable(
                        "connection refused".into(),
                    ));
                }
                return Ok(format!("<{segment}>"));
            }

            Ok(self.final_response.clone())
        }
    }

    fn sample_report_json() -> String {
        r#"{
            "experience": {
                "assessment": "Solid backend history.",
                "improvement_suggestion": "Quantify outcomes."
            },
            "skills": {
                "assessment": "Stack fits the role.",
                "improvement_suggestion": "Add observability tooling."
            }
        }"#
        .to_string()
    }

    fn analyzer_with(client: ScriptedClient, chunk_max_chars: usize) -> MapReduceAnalyzer {
        MapReduceAnalyzer::new(
            Box::new(client),
            AnalyzerOptions {
                model: "gpt-test".into(),
                temperature: 0.7,
                chunk_max_chars,
                map_concurrency: 2,
            },
        )
    }

    #[tokio::test]
    async fn summaries_reach_the_reduce_phase_in_chunk_order() {
        let client = ScriptedClient::new(&sample_report_json());
        let prompts = client.prompts.clone();
        let analyzer = analyzer_with(client, 4);

        let outcome = analyzer.analyze("aaaabbbbcc", "backend engineer").await.expect("outcome");
        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(outcome.report.len(), 2);

        let recorded = prompts.lock().unwrap().clone();
        let final_prompt = recorded.last().expect("final prompt");
        assert!(final_prompt.contains("<aaaa>\n<bbbb>\n<cc>"));
    }

    #[tokio::test]
    async fn parsed_report_preserves_category_insights() {
        let analyzer = analyzer_with(ScriptedClient::new(&sample_report_json()), 100);

        let outcome = analyzer.analyze("short resume", "data engineer").await.expect("outcome");
        assert_eq!(
            outcome.report.get("skills"),
            Some(&CategoryInsight {
                assessment: "Stack fits the role.".into(),
                improvement_suggestion: "Add observability tooling.".into(),
            })
        );
    }

    #[tokio::test]
    async fn fenced_json_response_is_accepted() {
        let fenced = format!("```json\n{}\n```", sample_report_json());
        let analyzer = analyzer_with(ScriptedClient::new(&fenced), 100);

        let outcome = analyzer.analyze("short resume", "general").await.expect("outcome");
        assert_eq!(outcome.report.len(), 2);
    }

    #[tokio::test]
    async fn empty_input_fails_before_any_completion_call() {
        let client = ScriptedClient::new(&sample_report_json());
        let prompts = client.prompts.clone();
        let analyzer = analyzer_with(client, 100);

        let error = analyzer.analyze("   \n\t", "general").await.expect_err("empty");
        assert!(matches!(error, AnalysisError::EmptyInput));
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_chunk_fails_the_whole_analysis_with_its_index() {
        // Three chunks of four characters; the third (index 2) fails terminally.
        let analyzer = analyzer_with(ScriptedClient::failing_on("cccc"), 4);

        let error = analyzer
            .analyze("aaaabbbbcccc", "backend engineer")
            .await
            .expect_err("map failure");

        match error {
            AnalysisError::PartialSummary { chunk_index, source } => {
                assert_eq!(chunk_index, 2);
                assert!(matches!(source, CompletionClientError::ServiceUnavailable(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unparseable_reduce_response_carries_the_raw_text() {
        let analyzer = analyzer_with(
            ScriptedClient::new("Here is my assessment: looks great!"),
            100,
        );

        let error = analyzer.analyze("short resume", "general").await.expect_err("parse");
        match error {
            AnalysisError::ReportParse { raw, .. } => {
                assert_eq!(raw, "Here is my assessment: looks great!");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn code_fences_are_stripped_and_plain_text_is_untouched() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }
}
