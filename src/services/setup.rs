use anyhow::Result;
use inquire::{Confirm, CustomType, Password, Select};
use std::fmt::Display;

use crate::core::config::Config;
use crate::core::state::Language;
use crate::services::workflow::{MAX_SCENE_DURATION, MIN_SCENE_DURATION};

/// Fills in what the assistant cannot run without, offering to save it.
pub fn run_setup(config: &mut Config) -> Result<()> {
    let mut needs_save = false;

    if config.llm.resolve_api_key().is_none() {
        println!("No API key found in config.yml, GEMINI_API_KEY or API_KEY.");
        let key = Password::new("Gemini API key:")
            .without_confirmation()
            .prompt()?;
        if !key.trim().is_empty() {
            config.llm.api_key = Some(key.trim().to_string());
            needs_save = Confirm::new("Save the key to config.yml?")
                .with_default(false)
                .prompt()?;
        }
    }

    if needs_save {
        config.save()?;
        println!("Configuration saved.");
    }
    Ok(())
}

/// Lets the user adjust per-idea script settings, starting from the configured ones.
pub fn edit_script_settings(config: &Config) -> Result<(u32, bool, Language)> {
    let language = select_value("Script language:", &Language::ALL, Some(config.script.language))?;

    let scene_duration = CustomType::<u32>::new("Target seconds per scene:")
        .with_default(config.script.scene_duration_seconds)
        .with_validator(|v: &u32| {
            if (1..=MAX_SCENE_DURATION).contains(v) {
                Ok(inquire::validator::Validation::Valid)
            } else {
                Ok(inquire::validator::Validation::Invalid(
                    format!("Enter 1 to {}", MAX_SCENE_DURATION).into(),
                ))
            }
        })
        .prompt()?;

    let suppress_narration = Confirm::new("Skip voice-over narration?")
        .with_default(config.script.suppress_narration)
        .prompt()?;

    Ok((scene_duration, suppress_narration, language))
}

pub fn ask_max_scene_duration() -> Result<u32> {
    Ok(CustomType::<u32>::new("Max seconds per scene:")
        .with_default(10)
        .with_validator(|v: &u32| {
            if (MIN_SCENE_DURATION..=MAX_SCENE_DURATION).contains(v) {
                Ok(inquire::validator::Validation::Valid)
            } else {
                Ok(inquire::validator::Validation::Invalid(
                    format!("Enter {} to {}", MIN_SCENE_DURATION, MAX_SCENE_DURATION).into(),
                ))
            }
        })
        .prompt()?)
}

/// Empty input means "let the model decide".
pub fn ask_scene_count() -> Result<Option<u32>> {
    let answer = CustomType::<u32>::new("Number of scenes (Esc to let the model decide):")
        .with_validator(|v: &u32| {
            if *v > 0 {
                Ok(inquire::validator::Validation::Valid)
            } else {
                Ok(inquire::validator::Validation::Invalid("Enter a positive number".into()))
            }
        })
        .prompt_skippable()?;
    Ok(answer)
}

pub fn select_value<T>(prompt: &str, values: &[T], current: Option<T>) -> Result<T>
where
    T: Display + Copy + PartialEq,
{
    let start = current
        .and_then(|c| values.iter().position(|v| *v == c))
        .unwrap_or(0);
    Ok(Select::new(prompt, values.to_vec()).with_starting_cursor(start).prompt()?)
}
