//! Post-processing of model output: fences, narration suggestions, topics and ideas.

use crate::core::state::{Duration, Genre, Idea, NarrationStyle};

/// Removes a surrounding ``` fence (with optional language tag) and trims.
/// Text without a fence is only trimmed.
pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s.to_string();
    };

    // Info string ("json", "JSON", ...), whether or not the content follows on the same line.
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());

    rest.trim().trim_end_matches("```").trim().to_string()
}

/// Splits a draft into its narration-style suggestions and the scene table.
///
/// The suggestions live above the first line consisting of `---`. When that
/// section holds no recognizable suggestion, the whole draft is the table.
pub fn split_narration_block(draft: &str) -> (Vec<NarrationStyle>, String) {
    let lines: Vec<&str> = draft.lines().collect();
    let Some(sep) = lines.iter().position(|l| l.trim() == "---") else {
        return (Vec::new(), draft.to_string());
    };

    let suggestions: Vec<NarrationStyle> = lines[..sep]
        .iter()
        .filter_map(|l| parse_narration_line(l))
        .collect();

    if suggestions.is_empty() {
        return (Vec::new(), draft.to_string());
    }

    (suggestions, lines[sep + 1..].join("\n"))
}

/// Parses `1. **Name:** description *justification*`.
fn parse_narration_line(line: &str) -> Option<NarrationStyle> {
    let line = line.trim();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?.trim_start();
    let rest = rest.strip_prefix("**")?;
    let (name, rest) = rest.split_once("**")?;

    let name = name.trim().trim_end_matches(':').trim();
    if name.is_empty() {
        return None;
    }
    let rest = rest.trim_start().trim_start_matches(':').trim();

    let (description, justification) = match rest.strip_suffix('*') {
        Some(body) => match body.rfind('*') {
            Some(open) => (body[..open].trim(), body[open + 1..].trim()),
            None => (rest, ""),
        },
        None => (rest, ""),
    };

    Some(NarrationStyle {
        name: name.to_string(),
        description: description.to_string(),
        justification: justification.to_string(),
    })
}

/// Comma-separated topics, lower-cased. Blank input gives no topics.
pub fn parse_trending_topics(text: &str) -> Vec<String> {
    text.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Extracts ideas from the numbered listing the idea prompt asks for.
/// Entries missing a title or a concept are skipped.
pub fn parse_idea_listing(text: &str, genre: Genre, duration: Duration) -> Vec<Idea> {
    #[derive(Default)]
    struct Draft {
        title: String,
        concept: String,
        story_arc: String,
    }

    fn finish(draft: Draft, genre: Genre, duration: Duration, out: &mut Vec<Idea>) {
        if !draft.title.is_empty() && !draft.concept.is_empty() {
            out.push(Idea {
                title: draft.title,
                concept: draft.concept,
                story_arc: draft.story_arc,
                genre,
                duration,
            });
        }
    }

    let mut ideas = Vec::new();
    let mut current: Option<Draft> = None;

    for raw in text.lines() {
        let line = raw.trim().trim_start_matches(['-', '*', '#']).trim();
        if line.is_empty() {
            continue;
        }

        let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
        let numbered = digits > 0 && matches!(line[digits..].chars().next(), Some('.') | Some(')'));
        let body = if numbered { line[digits + 1..].trim() } else { line };

        if numbered {
            if let Some(done) = current.take() {
                finish(done, genre, duration, &mut ideas);
            }
            current = Some(Draft::default());
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = body.split_once(':') else {
            continue;
        };

        let key = key.replace('*', "").trim().to_lowercase();
        let value = value.trim().trim_start_matches('*').trim().trim_matches('"').to_string();
        match key.as_str() {
            "title" => draft.title = value,
            "concept" => draft.concept = value,
            "story arc" | "arc" => draft.story_arc = value,
            _ => {}
        }
    }

    if let Some(done) = current {
        finish(done, genre, duration, &mut ideas);
    }
    ideas
}
