use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;

use crate::core::config::{Config, VideoConfig};
use crate::core::error::{GenError, GenResult, ServiceError};
use crate::core::state::{Duration, Genre, Idea, Language, NarrationStyle, SeoContent, VideoClip};
use crate::services::conversation::Conversation;
use crate::services::llm::{GeminiClient, GenerativeService, TextRequest, TextStream, VideoRequest};
use crate::services::prompts;
use crate::services::script::{parse_trending_topics, strip_code_blocks};

/// How a video job is watched until it finishes.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: StdDuration,
    /// `None` polls until the job reports done.
    pub max_attempts: Option<u32>,
}

impl From<&VideoConfig> for PollSettings {
    fn from(cfg: &VideoConfig) -> Self {
        Self {
            interval: cfg.poll_interval(),
            max_attempts: cfg.max_poll_attempts,
        }
    }
}

/// Issues every generation request the workflows need.
#[derive(Debug)]
pub struct Orchestrator {
    service: Box<dyn GenerativeService>,
    poll: PollSettings,
    aspect_ratio: String,
}

impl Orchestrator {
    pub fn new(service: Box<dyn GenerativeService>, video: &VideoConfig) -> Self {
        Self {
            service,
            poll: PollSettings::from(video),
            aspect_ratio: video.aspect_ratio.clone(),
        }
    }

    /// Builds the Gemini-backed orchestrator. A missing key fails here, before any request.
    pub fn connect(api_key: Option<String>, config: &Config) -> GenResult<Self> {
        let client = GeminiClient::new(api_key, &config.llm)?;
        Ok(Self::new(Box::new(client), &config.video))
    }

    pub fn from_config(config: &Config) -> GenResult<Self> {
        Self::connect(config.llm.resolve_api_key(), config)
    }

    pub async fn list_ideas(&self, genre: Genre, duration: Duration) -> GenResult<String> {
        log::info!("Requesting ideas: genre={}, duration={}s", genre, duration.seconds());
        let request = TextRequest::single(prompts::idea_listing(genre, duration));
        self.service
            .generate(&request)
            .await
            .inspect_err(|e| log::error!("Idea listing failed: {}", e))
    }

    pub async fn trending_topics(&self, genres: &[Genre]) -> GenResult<Vec<String>> {
        if genres.is_empty() {
            return Err(GenError::workflow("Pick at least one genre to analyse trends"));
        }
        log::info!("Requesting trending topics for {} genre(s)", genres.len());
        let request = TextRequest {
            use_search: true,
            ..TextRequest::single(prompts::trending_topics(genres))
        };
        let text = self
            .service
            .generate(&request)
            .await
            .inspect_err(|e| log::error!("Trending topic analysis failed: {}", e))?;
        Ok(parse_trending_topics(&text))
    }

    pub fn open_conversation(&self) -> Conversation {
        Conversation::new(prompts::SCRIPTWRITER_SYSTEM)
    }

    /// Starts the first scriptwriting turn. The caller commits the turn once
    /// the stream is drained, or abandons it on failure.
    pub async fn draft_script(
        &self,
        conversation: &mut Conversation,
        idea: &Idea,
        scene_duration: u32,
        suppress_narration: bool,
        language: Language,
    ) -> GenResult<TextStream> {
        if idea.title.trim().is_empty() || idea.concept.trim().is_empty() {
            return Err(GenError::workflow("The idea needs a title and a concept"));
        }
        log::info!("Drafting script for '{}'", idea.title);
        let prompt = prompts::draft_script(idea, scene_duration, suppress_narration, language);
        self.send_turn(conversation, prompt).await
    }

    pub async fn revise_script(
        &self,
        conversation: &mut Conversation,
        scene_duration: u32,
        suppress_narration: bool,
        language: Language,
        suggestion: &str,
        style: Option<&NarrationStyle>,
    ) -> GenResult<TextStream> {
        if conversation.is_empty() {
            return Err(GenError::workflow("There is no draft to revise yet"));
        }
        if suggestion.trim().is_empty() {
            return Err(GenError::workflow("Describe what should change in the script"));
        }
        log::info!("Revising script (turn {})", conversation.len() + 1);
        let prompt = prompts::revise_script(scene_duration, suppress_narration, language, suggestion, style);
        self.send_turn(conversation, prompt).await
    }

    async fn send_turn(&self, conversation: &mut Conversation, prompt: String) -> GenResult<TextStream> {
        let request = conversation.begin_turn(prompt);
        match self.service.generate_stream(&request).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                conversation.abandon_turn();
                log::error!("Script turn failed: {}", e);
                Err(e)
            }
        }
    }

    /// Returns the scene array as JSON text. Only the code fence is removed;
    /// the JSON itself is not checked here.
    pub async fn finalize_script(
        &self,
        script: &str,
        max_scene_duration: u32,
        scene_count: Option<u32>,
    ) -> GenResult<String> {
        log::info!("Finalizing script (max scene {}s, scenes {:?})", max_scene_duration, scene_count);
        let request = TextRequest::single(prompts::finalize_script(script, max_scene_duration, scene_count));
        let text = self
            .service
            .generate(&request)
            .await
            .inspect_err(|e| log::error!("Script finalization failed: {}", e))?;
        Ok(strip_code_blocks(&text))
    }

    pub async fn generate_seo(&self, script_json: &str, idea: &Idea) -> GenResult<SeoContent> {
        log::info!("Generating SEO content for '{}'", idea.title);
        let request = TextRequest {
            response_schema: Some(prompts::seo_schema()),
            ..TextRequest::single(prompts::seo_content(script_json, idea))
        };
        let text = self
            .service
            .generate(&request)
            .await
            .inspect_err(|e| log::error!("SEO generation failed: {}", e))?;

        let clean = strip_code_blocks(&text);
        serde_json::from_str(&clean).map_err(|e| {
            log::error!("SEO response is not valid JSON: {}. Body: {}", e, clean);
            GenError::format(format!("SEO response could not be parsed: {}", e))
        })
    }

    /// Submits a video job and waits for it, checking every `poll.interval`.
    ///
    /// Cancelling the token stops the wait; the remote job keeps running.
    pub async fn generate_video(
        &self,
        idea: &Idea,
        visual_style: &str,
        music_mood: &str,
        cancel: &CancellationToken,
    ) -> GenResult<VideoClip> {
        let request = VideoRequest {
            prompt: prompts::video(idea, visual_style, music_mood),
            aspect_ratio: self.aspect_ratio.clone(),
        };
        self.run_video_job(&request, cancel)
            .await
            .inspect_err(|e| log::error!("Video generation failed: {}", e))
    }

    async fn run_video_job(&self, request: &VideoRequest, cancel: &CancellationToken) -> GenResult<VideoClip> {
        let mut job = self.service.submit_video(request).await?;
        let job_name = job.name.clone();
        log::info!("Video job submitted: {}", job_name);

        let mut attempts: u32 = 0;
        while !job.done {
            if let Some(max) = self.poll.max_attempts {
                if attempts >= max {
                    return Err(ServiceError::PollTimeout { attempts }.into());
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::warn!("Stopped waiting for video job {}", job_name);
                    return Err(ServiceError::Cancelled.into());
                }
                _ = tokio::time::sleep(self.poll.interval) => {}
            }

            attempts += 1;
            log::debug!("Polling video job {} (attempt {})", job_name, attempts);
            job = self.service.poll_video(&job_name).await?;
        }

        if let Some(err) = job.error {
            return Err(ServiceError::JobFailed(err).into());
        }
        let uri = job
            .video_uri
            .ok_or_else(|| GenError::format("Video job finished without a video link"))?;

        log::info!("Video ready after {} poll(s), downloading", attempts);
        self.service.download(&uri).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::error::ServiceError;
    use crate::services::llm::VideoJob;
    use async_trait::async_trait;
    use futures_util::stream::{self, StreamExt};
    use std::sync::{Arc, Mutex};

    /// Scripted service: returns canned text and a video job that finishes
    /// after `video_polls_needed` polls.
    #[derive(Debug, Default)]
    pub(crate) struct MockService {
        pub calls: Arc<Mutex<usize>>,
        pub requests: Arc<Mutex<Vec<TextRequest>>>,
        pub text: String,
        pub chunks: Vec<String>,
        pub fail_stream_after: Option<usize>,
        /// Stream call (1-based, counted with all calls) that sends one chunk and then hangs.
        pub stall_on_call: Option<usize>,
        pub video_polls_needed: Option<u32>,
        pub video_error: Option<String>,
        pub video_uri: Option<String>,
    }

    impl MockService {
        pub(crate) fn with_text(text: &str) -> Self {
            Self {
                text: text.to_string(),
                ..Default::default()
            }
        }

        fn record(&self, request: &TextRequest) {
            *self.calls.lock().unwrap() += 1;
            self.requests.lock().unwrap().push(request.clone());
        }
    }

    #[async_trait]
    impl GenerativeService for MockService {
        async fn generate(&self, request: &TextRequest) -> GenResult<String> {
            self.record(request);
            Ok(self.text.clone())
        }

        async fn generate_stream(&self, request: &TextRequest) -> GenResult<TextStream> {
            self.record(request);
            if self.stall_on_call == Some(*self.calls.lock().unwrap()) {
                let first: Vec<GenResult<String>> = self.chunks.iter().take(1).cloned().map(Ok).collect();
                return Ok(stream::iter(first).chain(stream::pending()).boxed());
            }
            let mut items: Vec<GenResult<String>> = self.chunks.iter().cloned().map(Ok).collect();
            if let Some(n) = self.fail_stream_after {
                items.truncate(n);
                items.push(Err(ServiceError::Transport("connection reset".to_string()).into()));
            }
            Ok(stream::iter(items).boxed())
        }

        async fn submit_video(&self, _request: &VideoRequest) -> GenResult<VideoJob> {
            *self.calls.lock().unwrap() += 1;
            Ok(VideoJob {
                name: "operations/test".to_string(),
                done: self.video_polls_needed == Some(0),
                video_uri: self.video_uri.clone(),
                error: None,
            })
        }

        async fn poll_video(&self, job_name: &str) -> GenResult<VideoJob> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            let polls = (*calls - 1) as u32;
            let done = self.video_polls_needed.is_some_and(|n| polls >= n);
            Ok(VideoJob {
                name: job_name.to_string(),
                done,
                video_uri: if done { self.video_uri.clone() } else { None },
                error: if done { self.video_error.clone() } else { None },
            })
        }

        async fn download(&self, uri: &str) -> GenResult<VideoClip> {
            Ok(VideoClip {
                bytes: uri.as_bytes().to_vec(),
                mime_type: "video/mp4".to_string(),
            })
        }
    }

    pub(crate) fn fast_video_config(max_attempts: Option<u32>) -> VideoConfig {
        VideoConfig {
            poll_interval_seconds: 0,
            max_poll_attempts: max_attempts,
            ..Default::default()
        }
    }

    pub(crate) fn sample_idea() -> Idea {
        Idea {
            title: "Lost Sock".to_string(),
            concept: "A sock's journey home.".to_string(),
            story_arc: "Lost, searching, reunited.".to_string(),
            genre: Genre::Comedy,
            duration: Duration::Seconds30,
        }
    }

    #[tokio::test]
    async fn test_idea_listing_without_key_is_config_error() {
        let config = Config::default();
        for genre in Genre::ALL {
            for duration in Duration::ALL {
                let err = match Orchestrator::connect(None, &config) {
                    Ok(orch) => orch.list_ideas(genre, duration).await.unwrap_err(),
                    Err(e) => e,
                };
                assert!(err.is_config(), "{} / {:?} gave {:?}", genre, duration, err);
            }
        }
    }

    #[tokio::test]
    async fn test_trending_topics() {
        let mock = MockService::with_text("Cats, Dogs ,  Birds");
        let requests = mock.requests.clone();
        let orch = Orchestrator::new(Box::new(mock), &fast_video_config(None));

        let topics = orch.trending_topics(&[Genre::Comedy, Genre::Lifestyle]).await.unwrap();
        assert_eq!(topics, vec!["cats", "dogs", "birds"]);
        assert!(requests.lock().unwrap()[0].use_search);

        let empty = Orchestrator::new(Box::new(MockService::with_text("")), &fast_video_config(None));
        assert!(empty.trending_topics(&[Genre::Drama]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trending_topics_requires_genre() {
        let mock = MockService::with_text("x");
        let calls = mock.calls.clone();
        let orch = Orchestrator::new(Box::new(mock), &fast_video_config(None));

        assert!(matches!(orch.trending_topics(&[]).await, Err(GenError::Workflow(_))));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_finalize_strips_fence_only() {
        let orch = Orchestrator::new(
            Box::new(MockService::with_text("```json\n[{\"scene\":1}]\n```")),
            &fast_video_config(None),
        );
        assert_eq!(orch.finalize_script("table", 10, None).await.unwrap(), "[{\"scene\":1}]");

        let broken = Orchestrator::new(Box::new(MockService::with_text("```json\n[{oops\n```")), &fast_video_config(None));
        assert_eq!(broken.finalize_script("table", 10, Some(3)).await.unwrap(), "[{oops");
    }

    #[tokio::test]
    async fn test_generate_seo() {
        let mock = MockService::with_text(r#"{"title":"T","description":"D","tags":[]}"#);
        let requests = mock.requests.clone();
        let orch = Orchestrator::new(Box::new(mock), &fast_video_config(None));

        let seo = orch.generate_seo("[]", &sample_idea()).await.unwrap();
        assert_eq!(seo.title, "T");
        assert!(seo.tags.is_empty());
        assert!(requests.lock().unwrap()[0].response_schema.is_some());

        let bad = Orchestrator::new(Box::new(MockService::with_text("not json")), &fast_video_config(None));
        assert!(matches!(bad.generate_seo("[]", &sample_idea()).await, Err(GenError::Format(_))));

        let missing = Orchestrator::new(
            Box::new(MockService::with_text(r#"{"title":"T","tags":["a"]}"#)),
            &fast_video_config(None),
        );
        assert!(matches!(missing.generate_seo("[]", &sample_idea()).await, Err(GenError::Format(_))));
    }

    #[tokio::test]
    async fn test_revise_requires_prior_turn() {
        let orch = Orchestrator::new(Box::new(MockService::default()), &fast_video_config(None));
        let mut conv = orch.open_conversation();
        let res = orch
            .revise_script(&mut conv, 5, false, Language::English, "shorter", None)
            .await;
        assert!(matches!(res, Err(GenError::Workflow(_))));
        assert!(!conv.has_pending());
    }

    #[tokio::test]
    async fn test_video_completes_after_polls() {
        let mock = MockService {
            video_polls_needed: Some(2),
            video_uri: Some("https://example.com/v.mp4".to_string()),
            ..Default::default()
        };
        let orch = Orchestrator::new(Box::new(mock), &fast_video_config(Some(5)));

        let clip = orch
            .generate_video(&sample_idea(), "claymation", "upbeat", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(clip.bytes, b"https://example.com/v.mp4");
    }

    #[tokio::test]
    async fn test_video_poll_timeout() {
        let mock = MockService {
            video_polls_needed: None,
            ..Default::default()
        };
        let orch = Orchestrator::new(Box::new(mock), &fast_video_config(Some(3)));

        let err = orch
            .generate_video(&sample_idea(), "anime", "calm", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Service(ServiceError::PollTimeout { attempts: 3 })));
    }

    #[tokio::test]
    async fn test_video_cancelled() {
        let orch = Orchestrator::new(Box::new(MockService::default()), &fast_video_config(None));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orch
            .generate_video(&sample_idea(), "anime", "calm", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Service(ServiceError::Cancelled)));
    }

    #[tokio::test]
    async fn test_video_failure_kinds() {
        let failed = MockService {
            video_polls_needed: Some(1),
            video_error: Some("safety filter".to_string()),
            ..Default::default()
        };
        let orch = Orchestrator::new(Box::new(failed), &fast_video_config(Some(5)));
        let err = orch
            .generate_video(&sample_idea(), "a", "b", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Service(ServiceError::JobFailed(_))));

        let no_link = MockService {
            video_polls_needed: Some(0),
            ..Default::default()
        };
        let orch = Orchestrator::new(Box::new(no_link), &fast_video_config(Some(5)));
        let err = orch
            .generate_video(&sample_idea(), "a", "b", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Format(_)));
    }
}
