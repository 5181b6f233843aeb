use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::{
    generation::{
        prompt_length, GenerationError, GenerationErrorKind, GenerationOptions, Progress,
        Response, Usage,
    },
    tone::ModelType,
};

pub mod api;
pub mod strategy;
pub mod types;

pub use api::{HttpReplicate, ReplicateApi};
use types::PredictionStatus;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runs tones backed by Replicate, polling each prediction until it settles.
pub struct ReplicateModel<A = HttpReplicate> {
    api: A,
    length: fn(&str) -> usize,
}
impl<A: ReplicateApi> ReplicateModel<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            length: prompt_length,
        }
    }

    /// Replaces the function used to measure prompt and completion lengths.
    pub fn with_length(self, length: fn(&str) -> usize) -> Self {
        Self { length, ..self }
    }

    pub async fn complete(
        &self,
        options: GenerationOptions<'_>,
    ) -> Result<Response, GenerationError> {
        let tone = options.tone;
        let ModelType::Replicate(strategy) = tone.settings.model else {
            return Err(GenerationError::configuration(format!(
                "{} is not a Replicate tone",
                tone.name
            )));
        };

        let (owner, name) = tone
            .model
            .model
            .as_deref()
            .and_then(|m| m.split_once('/'))
            .ok_or_else(|| {
                GenerationError::configuration(format!(
                    "{} needs a Replicate model in `owner/name` form",
                    tone.name
                ))
            })?;

        let model = self.api.model(owner, name).await?;
        let version = model.latest_version.ok_or_else(|| {
            GenerationError::configuration(format!("{owner}/{name} has no published version"))
        })?;

        let input = strategy.build(&options, self.length);
        let prediction = self.api.create_prediction(&version.id, &input).await?;
        let started = Instant::now();
        debug!(id = %prediction.id, tone = %tone.name, "started Replicate prediction");

        let latest = loop {
            let latest = self.api.prediction(&prediction.id).await?;
            if let Some(output) = &latest.output {
                let text = strategy.format(output);
                if !text.is_empty() {
                    (options.progress)(Progress { text });
                }
            }

            if latest.status.is_terminal() {
                break latest;
            }
            sleep(POLL_INTERVAL).await;
        };

        if latest.error.is_some() || latest.status != PredictionStatus::Succeeded {
            warn!(
                id = %latest.id,
                status = ?latest.status,
                error = ?latest.error,
                "Replicate prediction failed"
            );
            return Err(GenerationError::Generation(GenerationErrorKind::Other));
        }

        let text = latest
            .output
            .as_ref()
            .map(|output| strategy.format(output))
            .unwrap_or_default();
        let prompt = input.get("prompt").and_then(Value::as_str).unwrap_or_default();

        let duration = latest
            .metrics
            .as_ref()
            .and_then(|m| m.predict_time)
            .filter(|t| t.is_finite() && *t >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_else(|| started.elapsed());

        Ok(Response {
            usage: Usage {
                prompt: (self.length)(prompt),
                completion: (self.length)(&text),
            },
            text,
            duration,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use serde_json::json;
    use serenity::async_trait;

    use super::{
        api::ApiError,
        types::{Metrics, Model, ModelVersion, Output, Prediction},
        *,
    };
    use crate::{
        generation::Budget,
        tone::{self, Tone},
    };

    /// Plays back a fixed series of prediction snapshots, then keeps processing.
    #[derive(Default)]
    pub struct ScriptedApi {
        polls: Mutex<VecDeque<Result<Prediction, ApiError>>>,
        inputs: Mutex<Vec<Value>>,
        calls: AtomicUsize,
        fetches: AtomicUsize,
    }
    impl ScriptedApi {
        fn new(polls: Vec<Result<Prediction, ApiError>>) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
                ..Default::default()
            }
        }

        fn ok(polls: Vec<Prediction>) -> Self {
            Self::new(polls.into_iter().map(Ok).collect())
        }
    }

    #[async_trait]
    impl ReplicateApi for ScriptedApi {
        async fn model(&self, owner: &str, name: &str) -> Result<Model, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Model {
                owner: owner.to_string(),
                name: name.to_string(),
                latest_version: Some(ModelVersion {
                    id: "v1".to_string(),
                }),
            })
        }

        async fn create_prediction(
            &self,
            version: &str,
            input: &Value,
        ) -> Result<Prediction, ApiError> {
            assert_eq!(version, "v1");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.lock().unwrap().push(input.clone());
            Ok(snapshot(PredictionStatus::Starting, None))
        }

        async fn prediction(&self, id: &str) -> Result<Prediction, ApiError> {
            assert_eq!(id, "p1");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(snapshot(PredictionStatus::Processing, None)))
        }
    }

    fn snapshot(status: PredictionStatus, output: Option<Output>) -> Prediction {
        Prediction {
            id: "p1".to_string(),
            status,
            output,
            error: None,
            metrics: None,
        }
    }

    fn fragments(parts: &[&str]) -> Option<Output> {
        Some(Output::Fragments(
            parts.iter().map(|s| s.to_string()).collect(),
        ))
    }

    fn options<'a>(tone: &'a Tone, seen: &Arc<Mutex<Vec<String>>>) -> GenerationOptions<'a> {
        let seen = seen.clone();
        GenerationOptions {
            prompt: "Tell me a joke".to_string(),
            tone,
            budget: tone.budget(&Budget::default()),
            history: vec![],
            preamble: "",
            progress: Box::new(move |p| seen.lock().unwrap().push(p.text)),
        }
    }

    fn catalog_tone(id: &str) -> Tone {
        tone::find(&tone::catalog(), id).unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn succeeded_prediction_streams_and_returns_output() {
        use PredictionStatus::*;
        let mut done = snapshot(Succeeded, fragments(&["Hello", " world"]));
        done.metrics = Some(Metrics {
            predict_time: Some(2.5),
        });
        let api = ScriptedApi::ok(vec![
            snapshot(Starting, None),
            snapshot(Processing, fragments(&["Hello"])),
            snapshot(Processing, fragments(&["Hello", " world"])),
            done,
        ]);
        let model = ReplicateModel::new(api);
        let tone = catalog_tone("tone-dolly");
        let seen = Arc::new(Mutex::new(vec![]));

        let response = model.complete(options(&tone, &seen)).await.unwrap();

        assert_eq!(response.text, "Hello world");
        assert_eq!(response.duration, Duration::from_millis(2500));
        assert_eq!(
            response.usage,
            Usage {
                prompt: prompt_length("Tell me a joke"),
                completion: prompt_length("Hello world"),
            }
        );
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Hello", "Hello world", "Hello world"]
        );
        assert_eq!(model.api.fetches.load(Ordering::SeqCst), 4);

        let inputs = model.api.inputs.lock().unwrap();
        assert_eq!(inputs[0]["prompt"], "Tell me a joke");
        assert_eq!(inputs[0]["max_length"], 300);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_falls_back_to_elapsed_time() {
        use PredictionStatus::*;
        let api = ScriptedApi::ok(vec![
            snapshot(Processing, None),
            snapshot(Processing, None),
            snapshot(Succeeded, Some(Output::Text("done".into()))),
        ]);
        let model = ReplicateModel::new(api);
        let tone = catalog_tone("tone-stablelm");
        let seen = Arc::new(Mutex::new(vec![]));

        let response = model.complete(options(&tone, &seen)).await.unwrap();
        assert_eq!(response.text, "done");
        assert_eq!(response.duration, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_is_a_generation_error() {
        use PredictionStatus::*;
        let api = ScriptedApi::ok(vec![
            snapshot(Processing, fragments(&["Hi"])),
            snapshot(Failed, fragments(&["Hi", " there"])),
        ]);
        let model = ReplicateModel::new(api);
        let tone = catalog_tone("tone-dolly");
        let seen = Arc::new(Mutex::new(vec![]));

        let err = model.complete(options(&tone, &seen)).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Generation(GenerationErrorKind::Other)
        ));
        assert_eq!(*seen.lock().unwrap(), vec!["Hi", "Hi there"]);
    }

    #[tokio::test(start_paused = true)]
    async fn error_field_fails_even_when_succeeded() {
        let mut done = snapshot(PredictionStatus::Succeeded, fragments(&["Hi"]));
        done.error = Some(json!("something broke"));
        let model = ReplicateModel::new(ScriptedApi::ok(vec![done]));
        let tone = catalog_tone("tone-dolly");
        let seen = Arc::new(Mutex::new(vec![]));

        let err = model.complete(options(&tone, &seen)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Generation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn canceled_prediction_is_a_generation_error() {
        let model = ReplicateModel::new(ScriptedApi::ok(vec![snapshot(
            PredictionStatus::Canceled,
            None,
        )]));
        let tone = catalog_tone("tone-dolly");
        let seen = Arc::new(Mutex::new(vec![]));

        let err = model.complete(options(&tone, &seen)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Generation(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_without_output() {
        let model = ReplicateModel::new(ScriptedApi::default());
        let tone = catalog_tone("tone-dolly");
        let seen = Arc::new(Mutex::new(vec![]));

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            model.complete(options(&tone, &seen)),
        )
        .await;

        assert!(result.is_err());
        assert!(model.api.fetches.load(Ordering::SeqCst) >= 10);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn succeeded_without_output_is_empty() {
        let model = ReplicateModel::new(ScriptedApi::ok(vec![snapshot(
            PredictionStatus::Succeeded,
            None,
        )]));
        let tone = catalog_tone("tone-dolly");
        let seen = Arc::new(Mutex::new(vec![]));

        let response = model.complete(options(&tone, &seen)).await.unwrap();
        assert_eq!(response.text, "");
        assert_eq!(response.usage.completion, 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_propagate_unchanged() {
        let api = ScriptedApi::new(vec![
            Ok(snapshot(PredictionStatus::Processing, None)),
            Err(ApiError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        ]);
        let model = ReplicateModel::new(api);
        let tone = catalog_tone("tone-dolly");
        let seen = Arc::new(Mutex::new(vec![]));

        let err = model.complete(options(&tone, &seen)).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Api(ApiError::Status { status: 502, .. })
        ));
        assert_eq!(err.to_string(), "Replicate returned 502: bad gateway");
        assert_eq!(model.api.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_tones_fail_before_any_request() {
        let model = ReplicateModel::new(ScriptedApi::default());
        let tone = catalog_tone("tone-chatgpt");
        let seen = Arc::new(Mutex::new(vec![]));

        let err = model.complete(options(&tone, &seen)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
        assert_eq!(model.api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_model_name_is_a_configuration_error() {
        let model = ReplicateModel::new(ScriptedApi::default());
        let mut tone = catalog_tone("tone-dolly");
        tone.model.model = Some("dolly".to_string());
        let seen = Arc::new(Mutex::new(vec![]));

        let err = model.complete(options(&tone, &seen)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
        assert_eq!(model.api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn vicuna_uses_its_builder_and_formatter() {
        let model = ReplicateModel::new(ScriptedApi::ok(vec![snapshot(
            PredictionStatus::Succeeded,
            fragments(&["Why", "did the chicken..."]),
        )]))
        .with_length(|s| s.len());
        let tone = catalog_tone("tone-vicuna");
        let seen = Arc::new(Mutex::new(vec![]));

        let response = model.complete(options(&tone, &seen)).await.unwrap();
        assert_eq!(response.text, "Why did the chicken...");

        let inputs = model.api.inputs.lock().unwrap();
        let prompt = inputs[0]["prompt"].as_str().unwrap();
        assert!(prompt.ends_with("### Human: Tell me a joke\n### Vicuna:"));
        assert_eq!(inputs[0]["max_length"], prompt.len() + 250);
        assert_eq!(response.usage.prompt, prompt.len());
    }
}
