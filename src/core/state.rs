use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Comedy,
    Drama,
    Horror,
    SciFi,
    Fantasy,
    Mystery,
    Romance,
    Educational,
    Motivational,
    Lifestyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Duration {
    Seconds15,
    Seconds30,
    Seconds60,
    Seconds90,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
    German,
    Portuguese,
    Hindi,
    Indonesian,
    Japanese,
    Korean,
    Chinese,
}

impl Genre {
    pub const ALL: [Genre; 10] = [
        Genre::Comedy,
        Genre::Drama,
        Genre::Horror,
        Genre::SciFi,
        Genre::Fantasy,
        Genre::Mystery,
        Genre::Romance,
        Genre::Educational,
        Genre::Motivational,
        Genre::Lifestyle,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Genre::Comedy => "Comedy",
            Genre::Drama => "Drama",
            Genre::Horror => "Horror",
            Genre::SciFi => "Sci-Fi",
            Genre::Fantasy => "Fantasy",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::Educational => "Educational",
            Genre::Motivational => "Motivational",
            Genre::Lifestyle => "Lifestyle",
        }
    }
}

impl Duration {
    pub const ALL: [Duration; 4] = [
        Duration::Seconds15,
        Duration::Seconds30,
        Duration::Seconds60,
        Duration::Seconds90,
    ];

    pub fn seconds(&self) -> u32 {
        match self {
            Duration::Seconds15 => 15,
            Duration::Seconds30 => 30,
            Duration::Seconds60 => 60,
            Duration::Seconds90 => 90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Duration::Seconds15 => "15 seconds",
            Duration::Seconds30 => "30 seconds",
            Duration::Seconds60 => "60 seconds",
            Duration::Seconds90 => "90 seconds",
        }
    }
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::English,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Portuguese,
        Language::Hindi,
        Language::Indonesian,
        Language::Japanese,
        Language::Korean,
        Language::Chinese,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Portuguese => "Portuguese",
            Language::Hindi => "Hindi",
            Language::Indonesian => "Indonesian",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::Chinese => "Chinese",
        }
    }
}

macro_rules! label_enum_traits {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| format!("Unknown {}: {}", $what, wanted))
            }
        }
    };
}

label_enum_traits!(Genre, "genre");
label_enum_traits!(Duration, "duration");
label_enum_traits!(Language, "language");

/// A proposed short-video concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub title: String,
    pub concept: String,
    pub story_arc: String,
    pub genre: Genre,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationStyle {
    pub name: String,
    pub description: String,
    pub justification: String,
}

/// One entry of a finalized script. Only the index and timestamp are fixed;
/// everything else the model produced is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub scene: u32,
    pub timestamp: String,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedScript {
    pub json: String,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoContent {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub idea: Idea,
    pub script: FinalizedScript,
    pub seo: SeoContent,
}

/// Rendered video held in memory.
#[derive(Clone)]
pub struct VideoClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl fmt::Debug for VideoClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoClip")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}
