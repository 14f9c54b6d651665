//! Prompt templates. Every builder is a pure function of its inputs.

use serde_json::{json, Value};

use crate::core::state::{Duration, Genre, Idea, Language, NarrationStyle};

pub const SCRIPTWRITER_SYSTEM: &str = "You are an expert scriptwriter for short-form vertical video \
(YouTube Shorts, TikTok, Reels). You write tight, visual, hook-first scripts. \
Always answer with the requested markdown structure and nothing else.";

pub fn idea_listing(genre: Genre, duration: Duration) -> String {
    format!(
        "Generate 10 original short video ideas in the {genre} genre, each designed for a video of about {secs} seconds.\n\
         For every idea use exactly this format:\n\
         1. **Title:** <catchy title>\n\
         **Concept:** <one or two sentences>\n\
         **Story Arc:** <beginning, middle and end in one sentence>\n\
         Number the ideas 1 to 10 and do not add any other commentary.",
        genre = genre.label(),
        secs = duration.seconds(),
    )
}

pub fn trending_topics(genres: &[Genre]) -> String {
    let list = genres.iter().map(|g| g.label()).collect::<Vec<_>>().join(", ");
    format!(
        "Using current web search results, find the topics trending right now on short-form video \
         platforms for these genres: {}.\n\
         Reply with only a single comma-separated list of short topic names, no numbering and no other text.",
        list
    )
}

fn narration_rule(suppress_narration: bool) -> &'static str {
    if suppress_narration {
        "Do NOT include any voice-over narration. Leave the narration column empty and tell the story through visuals and on-screen text."
    } else {
        "Include voice-over narration for each scene."
    }
}

pub fn draft_script(idea: &Idea, scene_duration: u32, suppress_narration: bool, language: Language) -> String {
    let style_block = if suppress_narration {
        String::new()
    } else {
        "Before the table, suggest 3 narration styles, one per line, formatted exactly as:\n\
         1. **<Style name>:** <short description> *<why it fits this idea>*\n\
         Then write a line containing only ---\n"
            .to_string()
    };

    format!(
        "Write a script for this short video idea.\n\
         Title: {title}\n\
         Concept: {concept}\n\
         Story Arc: {arc}\n\
         Genre: {genre}\n\
         Total length: {total} seconds\n\
         Each scene should last about {scene} seconds.\n\
         Write all narration and on-screen text in {language}.\n\
         {narration}\n\
         {style_block}\
         Present the script as a markdown table with the columns: Timestamp | Visual | Narration | On-screen Text | Sound.",
        title = idea.title,
        concept = idea.concept,
        arc = idea.story_arc,
        genre = idea.genre.label(),
        total = idea.duration.seconds(),
        scene = scene_duration,
        language = language.label(),
        narration = narration_rule(suppress_narration),
        style_block = style_block,
    )
}

pub fn revise_script(
    scene_duration: u32,
    suppress_narration: bool,
    language: Language,
    suggestion: &str,
    style: Option<&NarrationStyle>,
) -> String {
    let style_rule = match style {
        Some(s) if !suppress_narration => format!(
            "Write the narration in the \"{}\" style: {}.\n",
            s.name, s.description
        ),
        _ => String::new(),
    };

    format!(
        "Revise the script above using this feedback:\n\
         {suggestion}\n\
         Keep each scene about {scene} seconds long.\n\
         Write all narration and on-screen text in {language}.\n\
         {narration}\n\
         {style_rule}\
         Return only the full revised markdown table with the same columns.",
        suggestion = suggestion.trim(),
        scene = scene_duration,
        language = language.label(),
        narration = narration_rule(suppress_narration),
        style_rule = style_rule,
    )
}

pub fn finalize_script(script: &str, max_scene_duration: u32, scene_count: Option<u32>) -> String {
    let count_rule = scene_count
        .map(|n| format!("Produce exactly {} scenes.\n", n))
        .unwrap_or_default();

    format!(
        "Convert the following video script into a JSON array of scene objects.\n\
         Each object must have: \"scene\" (1-based integer), \"timestamp\" (for example \"0:05\"), \
         \"visual\", \"narration\", \"on_screen_text\" and \"sound\".\n\
         No scene may be longer than {max} seconds; split longer scenes.\n\
         {count_rule}\
         Reply with only the JSON array.\n\n\
         Script:\n{script}",
        max = max_scene_duration,
        count_rule = count_rule,
        script = script,
    )
}

pub fn seo_content(script_json: &str, idea: &Idea) -> String {
    format!(
        "Create SEO metadata for a short video.\n\
         Idea title: {}\n\
         Concept: {}\n\
         Genre: {}\n\
         Script (JSON scenes):\n{}\n\n\
         Return a catchy title under 100 characters, a description of 2-3 sentences with a call to action, \
         and up to 15 relevant tags.",
        idea.title,
        idea.concept,
        idea.genre.label(),
        script_json,
    )
}

pub fn seo_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "description": { "type": "STRING" },
            "tags": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["title", "description", "tags"]
    })
}

pub fn video(idea: &Idea, visual_style: &str, music_mood: &str) -> String {
    format!(
        "A {secs}-second vertical short video. {title}: {concept} Story: {arc} \
         Visual style: {style}. Music mood: {mood}.",
        secs = idea.duration.seconds(),
        title = idea.title,
        concept = idea.concept,
        arc = idea.story_arc,
        style = visual_style.trim(),
        mood = music_mood.trim(),
    )
}
