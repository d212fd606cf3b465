//! Closed mapping from infobox name tokens to recognized categories.

use serde::{Deserialize, Serialize};

/// The recognized content categories.
///
/// This is the pipeline's primary volume reduction: the dump holds orders of
/// magnitude more pages than these, and everything outside the set is dropped.
/// The list is closed and not runtime-configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "book")]
    Book,
    #[serde(rename = "film")]
    Film,
    #[serde(rename = "television series")]
    TelevisionSeries,
    #[serde(rename = "video game")]
    VideoGame,
    #[serde(rename = "song")]
    Song,
}

impl Category {
    /// Maps a raw infobox name token (the text after "infobox") to a
    /// category. Matching is exact on the lower-cased, trimmed token;
    /// anything else is unrecognized and the owning record is dropped.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "book" => Some(Self::Book),
            "film" => Some(Self::Film),
            "television" | "television series" => Some(Self::TelevisionSeries),
            "video game" => Some(Self::VideoGame),
            "song" => Some(Self::Song),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Film => "film",
            Self::TelevisionSeries => "television series",
            Self::VideoGame => "video game",
            Self::Song => "song",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_tokens_map_exactly() {
        assert_eq!(Category::from_token("book"), Some(Category::Book));
        assert_eq!(Category::from_token("film"), Some(Category::Film));
        assert_eq!(
            Category::from_token("television"),
            Some(Category::TelevisionSeries)
        );
        assert_eq!(Category::from_token("video game"), Some(Category::VideoGame));
        assert_eq!(Category::from_token("song"), Some(Category::Song));
    }

    #[test]
    fn tokens_are_trimmed_and_lowercased() {
        assert_eq!(Category::from_token("  Book \n"), Some(Category::Book));
        assert_eq!(Category::from_token("FILM"), Some(Category::Film));
    }

    #[test]
    fn unrecognized_tokens_are_rejected() {
        assert_eq!(Category::from_token("planet"), None);
        assert_eq!(Category::from_token("book series"), None);
        assert_eq!(Category::from_token(""), None);
    }

    #[test]
    fn payload_serialization_uses_display_names() {
        let json = serde_json::to_string(&Category::VideoGame).unwrap();
        assert_eq!(json, "\"video game\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::VideoGame);
    }
}
