//! Terminal front-end. Every user action maps onto one workflow call.

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, InquireError, MultiSelect, Select, Text};
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::error::GenError;
use crate::core::history::History;
use crate::core::state::{Duration, Genre, Idea};
use crate::services::orchestrator::Orchestrator;
use crate::services::script::parse_idea_listing;
use crate::services::setup::{ask_max_scene_duration, ask_scene_count, edit_script_settings, select_value};
use crate::services::workflow::{ScriptSettings, ScriptWorkflow, Stage};
use crate::utils::table::{parse_scene_table, render};

#[derive(Debug, Clone, Copy, PartialEq)]
enum MainAction {
    GenerateIdeas,
    TrendingTopics,
    OwnIdea,
    ShowHistory,
    Quit,
}

impl fmt::Display for MainAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MainAction::GenerateIdeas => "Generate video ideas",
            MainAction::TrendingTopics => "Show trending topics",
            MainAction::OwnIdea => "Script my own idea",
            MainAction::ShowHistory => "Show history",
            MainAction::Quit => "Quit",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DraftAction {
    Revise,
    ChooseStyle,
    ShowTable,
    Finalize,
    Abandon,
}

impl fmt::Display for DraftAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DraftAction::Revise => "Request a revision",
            DraftAction::ChooseStyle => "Choose narration style",
            DraftAction::ShowTable => "Show scene table",
            DraftAction::Finalize => "Finalize script",
            DraftAction::Abandon => "Abandon this idea",
        })
    }
}

pub struct App {
    config: Config,
    orchestrator: Arc<Orchestrator>,
    history: Arc<History>,
}

impl App {
    pub fn new(config: Config, orchestrator: Orchestrator) -> Self {
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            history: Arc::new(History::new()),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let actions = vec![
            MainAction::GenerateIdeas,
            MainAction::TrendingTopics,
            MainAction::OwnIdea,
            MainAction::ShowHistory,
            MainAction::Quit,
        ];

        loop {
            let action = match Select::new("What would you like to do?", actions.clone()).prompt() {
                Ok(action) => action,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => MainAction::Quit,
                Err(e) => return Err(e.into()),
            };
            let outcome = match action {
                MainAction::GenerateIdeas => self.generate_ideas().await,
                MainAction::TrendingTopics => self.trending_topics().await,
                MainAction::OwnIdea => self.own_idea().await,
                MainAction::ShowHistory => {
                    self.show_history();
                    Ok(())
                }
                MainAction::Quit => break,
            };
            if let Err(e) = outcome {
                report(&e);
            }
        }

        if !self.history.is_empty() {
            let path = Path::new(&self.config.output_folder).join("history.json");
            self.history.export(&path)?;
            println!("History saved to {}", path.display());
        }
        Ok(())
    }

    async fn generate_ideas(&self) -> Result<()> {
        let genre = select_value("Genre:", &Genre::ALL, None)?;
        let duration = select_value("Video length:", &Duration::ALL, Some(Duration::Seconds30))?;

        println!("Asking for ideas...");
        let Some(listing) = until_interrupted(self.orchestrator.list_ideas(genre, duration)).await else {
            println!("Stopped.");
            return Ok(());
        };
        let listing = listing?;
        println!("\n{}\n", listing.trim());

        let ideas = parse_idea_listing(&listing, genre, duration);
        if ideas.is_empty() {
            println!("Could not pick the ideas apart; use \"Script my own idea\" to continue with one.");
            return Ok(());
        }

        let titles: Vec<String> = ideas.iter().map(|i| i.title.clone()).collect();
        let Some(title) = Select::new("Pick an idea to script:", titles).prompt_skippable()? else {
            return Ok(());
        };
        let idea = ideas
            .into_iter()
            .find(|i| i.title == title)
            .ok_or_else(|| anyhow!("Selected idea vanished"))?;
        self.script_idea(idea).await
    }

    async fn trending_topics(&self) -> Result<()> {
        let genres = MultiSelect::new("Genres to analyse:", Genre::ALL.to_vec()).prompt()?;
        println!("Searching for trends...");
        let Some(topics) = until_interrupted(self.orchestrator.trending_topics(&genres)).await else {
            println!("Stopped.");
            return Ok(());
        };
        let topics = topics?;
        if topics.is_empty() {
            println!("No trending topics found.");
        } else {
            for topic in topics {
                println!("  - {}", topic);
            }
        }
        Ok(())
    }

    async fn own_idea(&self) -> Result<()> {
        let title = Text::new("Title:").prompt()?;
        let concept = Text::new("Concept:").prompt()?;
        let story_arc = Text::new("Story arc:").prompt()?;
        let genre = select_value("Genre:", &Genre::ALL, None)?;
        let duration = select_value("Video length:", &Duration::ALL, Some(Duration::Seconds30))?;

        self.script_idea(Idea {
            title,
            concept,
            story_arc,
            genre,
            duration,
        })
        .await
    }

    fn show_history(&self) {
        let items = self.history.items();
        if items.is_empty() {
            println!("Nothing finished yet.");
            return;
        }
        for (i, item) in items.iter().enumerate() {
            println!(
                "{}. {} -> \"{}\" ({} scenes, {} tags)",
                i + 1,
                item.idea.title,
                item.seo.title,
                item.script.scenes.len(),
                item.seo.tags.len()
            );
        }
    }

    async fn script_idea(&self, idea: Idea) -> Result<()> {
        let (scene_duration, suppress_narration, language) = edit_script_settings(&self.config)?;
        let settings = ScriptSettings {
            scene_duration,
            suppress_narration,
            language,
        };
        let mut workflow = ScriptWorkflow::new(self.orchestrator.clone(), self.history.clone(), idea, settings);

        loop {
            match workflow.stage().clone() {
                Stage::Idle => {
                    println!("\nWriting the first draft...\n");
                    match until_interrupted(workflow.draft(print_fragment)).await {
                        Some(Ok(())) => {
                            println!();
                            show_styles(&workflow);
                        }
                        Some(Err(_)) => {}
                        None => {
                            println!("\nStopped.");
                            workflow.recover()?;
                            return Ok(());
                        }
                    }
                }
                Stage::DraftReady => {
                    if !self.draft_menu(&mut workflow).await? {
                        return Ok(());
                    }
                }
                Stage::Finalized => {
                    if let Some(script) = workflow.finalized() {
                        println!("\nFinalized script:\n{}\n", script.json);
                    }
                    let go = Confirm::new("Generate SEO title, description and tags?")
                        .with_default(true)
                        .prompt()?;
                    if !go {
                        return Ok(());
                    }
                    println!("Generating SEO content...");
                    if until_interrupted(workflow.generate_seo()).await.is_none() {
                        println!("Stopped.");
                        workflow.recover()?;
                    }
                }
                Stage::Complete => {
                    if let Some(seo) = workflow.seo() {
                        println!("\nTitle: {}\nDescription: {}\nTags: {}\n", seo.title, seo.description, seo.tags.join(", "));
                    }
                    self.offer_video(workflow.idea()).await?;
                    return Ok(());
                }
                Stage::Error { message, .. } => {
                    println!("\n{}", message);
                    let retry = Confirm::new("Go back and try again?").with_default(true).prompt()?;
                    if !retry {
                        return Ok(());
                    }
                    workflow.recover()?;
                }
                other => return Err(anyhow!("Workflow stopped unexpectedly while {}", other)),
            }
        }
    }

    /// Returns false when the user abandons the idea.
    async fn draft_menu(&self, workflow: &mut ScriptWorkflow) -> Result<bool> {
        let mut actions = vec![DraftAction::Revise];
        if workflow.narration_styles().len() > 1 && !workflow.settings().suppress_narration {
            actions.push(DraftAction::ChooseStyle);
        }
        actions.extend([DraftAction::ShowTable, DraftAction::Finalize, DraftAction::Abandon]);

        match Select::new("Next step:", actions).prompt()? {
            DraftAction::Revise => {
                let suggestion = Text::new("What should change?")
                    .with_validator(inquire::required!("Please describe the change"))
                    .prompt()?;
                println!();
                match until_interrupted(workflow.revise(&suggestion, print_fragment)).await {
                    Some(Ok(())) => println!(),
                    Some(Err(_)) => {}
                    None => {
                        println!("\nStopped, keeping the previous draft.");
                        workflow.recover()?;
                    }
                }
            }
            DraftAction::ChooseStyle => {
                let names: Vec<String> = workflow.narration_styles().iter().map(|s| s.name.clone()).collect();
                let start = workflow
                    .selected_style()
                    .and_then(|s| names.iter().position(|n| *n == s.name))
                    .unwrap_or(0);
                let index = Select::new("Narration style:", names)
                    .with_starting_cursor(start)
                    .raw_prompt()?
                    .index;
                workflow.select_style(index)?;
            }
            DraftAction::ShowTable => {
                println!("\n{}\n", render(&parse_scene_table(&workflow.draft_table())));
            }
            DraftAction::Finalize => {
                let max = ask_max_scene_duration()?;
                let count = ask_scene_count()?;
                println!("Converting the script into scenes...");
                if until_interrupted(workflow.finalize(max, count)).await.is_none() {
                    println!("Stopped.");
                    workflow.recover()?;
                }
            }
            DraftAction::Abandon => return Ok(false),
        }
        Ok(true)
    }

    async fn offer_video(&self, idea: &Idea) -> Result<()> {
        let go = Confirm::new("Render a video for this idea?").with_default(false).prompt()?;
        if !go {
            return Ok(());
        }
        let style = Text::new("Visual style:").with_default("cinematic").prompt()?;
        let mood = Text::new("Music mood:").with_default("upbeat").prompt()?;

        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
        pb.set_message("Rendering video (Ctrl+C to stop waiting)...");
        pb.enable_steady_tick(std::time::Duration::from_millis(120));

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let result = self.orchestrator.generate_video(idea, &style, &mood, &cancel).await;
        watcher.abort();

        let clip = match result {
            Ok(clip) => clip,
            Err(e) => {
                pb.finish_with_message("Video failed");
                println!("{}", e.user_message());
                return Ok(());
            }
        };
        pb.finish_with_message("Video ready");

        let path = Path::new(&self.config.output_folder).join(format!("{}.mp4", slug(&idea.title)));
        std::fs::write(&path, &clip.bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved {} ({} bytes) to {}", clip.mime_type, clip.bytes.len(), path.display());
        Ok(())
    }
}

/// Runs `fut` unless Ctrl+C arrives first, dropping it in that case.
///
/// Tokio keeps its SIGINT handler for the rest of the process once one is
/// installed, so every long wait in the front-end goes through here.
async fn until_interrupted<F: Future>(fut: F) -> Option<F::Output> {
    tokio::select! {
        out = fut => Some(out),
        _ = tokio::signal::ctrl_c() => None,
    }
}

fn print_fragment(fragment: &str) {
    print!("{}", fragment);
    let _ = std::io::stdout().flush();
}

fn show_styles(workflow: &ScriptWorkflow) {
    let styles = workflow.narration_styles();
    if styles.is_empty() {
        return;
    }
    println!("\nSuggested narration styles:");
    for (i, style) in styles.iter().enumerate() {
        println!("  {}. {}: {} ({})", i + 1, style.name, style.description, style.justification);
    }
    if let Some(selected) = workflow.selected_style() {
        println!("Using \"{}\" for revisions.", selected.name);
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<GenError>() {
        Some(e) => println!("{}", e.user_message()),
        None => println!("Error: {:#}", err),
    }
}

fn slug(title: &str) -> String {
    let mut out = String::new();
    for c in title.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        "video".to_string()
    } else {
        out
    }
}
