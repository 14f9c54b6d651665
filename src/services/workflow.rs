use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;

use crate::core::error::{GenError, GenResult};
use crate::core::history::History;
use crate::core::state::{FinalizedScript, HistoryItem, Idea, Language, NarrationStyle, Scene, SeoContent};
use crate::services::conversation::Conversation;
use crate::services::orchestrator::Orchestrator;
use crate::services::script::split_narration_block;

pub const MIN_SCENE_DURATION: u32 = 5;
pub const MAX_SCENE_DURATION: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Drafting,
    DraftReady,
    Revising,
    Finalizing,
    Finalized,
    GeneratingSeo,
    Complete,
    /// A request failed. `recover()` returns to `resume`.
    Error { message: String, resume: Box<Stage> },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::Drafting => write!(f, "drafting"),
            Stage::DraftReady => write!(f, "draft ready"),
            Stage::Revising => write!(f, "revising"),
            Stage::Finalizing => write!(f, "finalizing"),
            Stage::Finalized => write!(f, "finalized"),
            Stage::GeneratingSeo => write!(f, "generating SEO"),
            Stage::Complete => write!(f, "complete"),
            Stage::Error { message, .. } => write!(f, "error: {}", message),
        }
    }
}

/// Per-idea script settings carried across every turn.
#[derive(Debug, Clone)]
pub struct ScriptSettings {
    pub scene_duration: u32,
    pub suppress_narration: bool,
    pub language: Language,
}

/// Drives one idea from first draft to SEO content.
///
/// Actions take `&mut self`, so only one request per idea is ever in flight.
/// Each action checks the current stage before touching the network.
pub struct ScriptWorkflow {
    orchestrator: Arc<Orchestrator>,
    history: Arc<History>,
    idea: Idea,
    settings: ScriptSettings,
    stage: Stage,
    conversation: Conversation,
    draft: String,
    has_draft: bool,
    styles: Vec<NarrationStyle>,
    selected_style: Option<usize>,
    finalized: Option<FinalizedScript>,
    seo: Option<SeoContent>,
}

impl ScriptWorkflow {
    pub fn new(orchestrator: Arc<Orchestrator>, history: Arc<History>, idea: Idea, settings: ScriptSettings) -> Self {
        let conversation = orchestrator.open_conversation();
        Self {
            orchestrator,
            history,
            idea,
            settings,
            stage: Stage::Idle,
            conversation,
            draft: String::new(),
            has_draft: false,
            styles: Vec::new(),
            selected_style: None,
            finalized: None,
            seo: None,
        }
    }

    pub fn idea(&self) -> &Idea {
        &self.idea
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn settings(&self) -> &ScriptSettings {
        &self.settings
    }

    /// Full text of the current draft, including any suggestion block.
    pub fn current_draft(&self) -> &str {
        &self.draft
    }

    /// The scene table part of the current draft.
    pub fn draft_table(&self) -> String {
        split_narration_block(&self.draft).1
    }

    pub fn narration_styles(&self) -> &[NarrationStyle] {
        &self.styles
    }

    pub fn selected_style(&self) -> Option<&NarrationStyle> {
        self.selected_style.and_then(|i| self.styles.get(i))
    }

    pub fn finalized(&self) -> Option<&FinalizedScript> {
        self.finalized.as_ref()
    }

    pub fn seo(&self) -> Option<&SeoContent> {
        self.seo.as_ref()
    }

    fn require(&self, allowed: &[Stage], action: &str) -> GenResult<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(GenError::workflow(format!("Cannot {} while {}", action, self.stage)))
        }
    }

    fn fail(&mut self, resume: Stage, err: GenError) -> GenError {
        log::warn!("Workflow for '{}' failed: {}", self.idea.title, err);
        self.stage = Stage::Error {
            message: err.user_message(),
            resume: Box::new(resume),
        };
        err
    }

    /// Returns to the last stable stage after an error, or after an action
    /// whose future was dropped before it finished.
    pub fn recover(&mut self) -> GenResult<()> {
        let resume = match std::mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Error { resume, .. } => *resume,
            Stage::Drafting => Stage::Idle,
            Stage::Revising | Stage::Finalizing => Stage::DraftReady,
            Stage::GeneratingSeo => Stage::Finalized,
            other => {
                self.stage = other;
                return Err(GenError::workflow("Nothing to recover from"));
            }
        };
        if self.conversation.has_pending() {
            log::info!("Discarding unfinished turn for '{}'", self.idea.title);
            self.conversation.abandon_turn();
        }
        self.stage = resume;
        Ok(())
    }

    /// Writes the first draft, calling `on_fragment` with each streamed piece.
    pub async fn draft<F>(&mut self, on_fragment: F) -> GenResult<()>
    where
        F: FnMut(&str),
    {
        self.require(&[Stage::Idle], "draft a script")?;
        self.stage = Stage::Drafting;

        let stream = self
            .orchestrator
            .draft_script(
                &mut self.conversation,
                &self.idea,
                self.settings.scene_duration,
                self.settings.suppress_narration,
                self.settings.language,
            )
            .await;

        match stream {
            Ok(stream) => self.consume_turn(stream, on_fragment, Stage::Idle).await,
            Err(e) => Err(self.fail(Stage::Idle, e)),
        }
    }

    pub async fn revise<F>(&mut self, suggestion: &str, on_fragment: F) -> GenResult<()>
    where
        F: FnMut(&str),
    {
        self.require(&[Stage::DraftReady], "revise the script")?;
        if suggestion.trim().is_empty() {
            return Err(GenError::workflow("Describe what should change in the script"));
        }
        self.stage = Stage::Revising;

        let style = self.selected_style().cloned();
        let stream = self
            .orchestrator
            .revise_script(
                &mut self.conversation,
                self.settings.scene_duration,
                self.settings.suppress_narration,
                self.settings.language,
                suggestion,
                style.as_ref(),
            )
            .await;

        match stream {
            Ok(stream) => self.consume_turn(stream, on_fragment, Stage::DraftReady).await,
            Err(e) => Err(self.fail(Stage::DraftReady, e)),
        }
    }

    async fn consume_turn<F>(
        &mut self,
        mut stream: crate::services::llm::TextStream,
        mut on_fragment: F,
        resume: Stage,
    ) -> GenResult<()>
    where
        F: FnMut(&str),
    {
        // The current draft is only replaced once the whole turn has arrived.
        let mut text = String::new();

        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(piece) => {
                    text.push_str(&piece);
                    on_fragment(&piece);
                }
                Err(e) => {
                    self.conversation.abandon_turn();
                    return Err(self.fail(resume, e));
                }
            }
        }

        if text.trim().is_empty() {
            self.conversation.abandon_turn();
            return Err(self.fail(resume, GenError::format("The script came back empty")));
        }

        self.conversation.commit_turn(text.clone());
        self.draft = text;

        if !self.has_draft {
            let (styles, _) = split_narration_block(&self.draft);
            log::info!("First draft ready with {} narration suggestion(s)", styles.len());
            self.selected_style = if styles.is_empty() { None } else { Some(0) };
            self.styles = styles;
            self.has_draft = true;
        }

        self.stage = Stage::DraftReady;
        Ok(())
    }

    pub fn select_style(&mut self, index: usize) -> GenResult<()> {
        self.require(&[Stage::DraftReady], "change the narration style")?;
        if index >= self.styles.len() {
            return Err(GenError::workflow(format!(
                "There are only {} narration styles",
                self.styles.len()
            )));
        }
        self.selected_style = Some(index);
        Ok(())
    }

    pub async fn finalize(&mut self, max_scene_duration: u32, scene_count: Option<u32>) -> GenResult<()> {
        self.require(&[Stage::DraftReady], "finalize the script")?;
        if !(MIN_SCENE_DURATION..=MAX_SCENE_DURATION).contains(&max_scene_duration) {
            return Err(GenError::workflow(format!(
                "Max scene duration must be between {} and {} seconds",
                MIN_SCENE_DURATION, MAX_SCENE_DURATION
            )));
        }
        if scene_count == Some(0) {
            return Err(GenError::workflow("Scene count must be a positive number"));
        }
        self.stage = Stage::Finalizing;

        let table = self.draft_table();
        let json = match self
            .orchestrator
            .finalize_script(&table, max_scene_duration, scene_count)
            .await
        {
            Ok(json) => json,
            Err(e) => return Err(self.fail(Stage::DraftReady, e)),
        };

        let scenes: Vec<Scene> = match serde_json::from_str(&json) {
            Ok(scenes) => scenes,
            Err(e) => {
                let err = GenError::format(format!("Finalized script is not a scene array: {}", e));
                return Err(self.fail(Stage::DraftReady, err));
            }
        };

        log::info!("Script finalized with {} scene(s)", scenes.len());
        self.finalized = Some(FinalizedScript { json, scenes });
        self.stage = Stage::Finalized;
        Ok(())
    }

    /// Generates SEO content and records the finished idea in the history.
    pub async fn generate_seo(&mut self) -> GenResult<HistoryItem> {
        self.require(&[Stage::Finalized], "generate SEO content")?;
        let Some(script) = self.finalized.clone() else {
            return Err(GenError::workflow("Finalize the script first"));
        };
        self.stage = Stage::GeneratingSeo;

        let seo = match self.orchestrator.generate_seo(&script.json, &self.idea).await {
            Ok(seo) => seo,
            Err(e) => return Err(self.fail(Stage::Finalized, e)),
        };

        let item = HistoryItem {
            idea: self.idea.clone(),
            script,
            seo: seo.clone(),
        };
        self.history.append(item.clone());
        self.seo = Some(seo);
        self.stage = Stage::Complete;
        Ok(item)
    }
}
