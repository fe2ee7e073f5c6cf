use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One tracked show from the roster file.
///
/// The slug derived from `name` is the entity key used across every source
/// panel; the optional handles/titles tell individual collectors where to
/// look for that show.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowConfig {
    pub name: String,
    /// Wikipedia article title, e.g. `"Oh,_Mary!"`. `None` skips pageviews.
    pub wiki_article: Option<String>,
    /// Search-interest queries, e.g. `["oh mary tickets"]`.
    #[serde(default)]
    pub trend_queries: Vec<String>,
    /// Short-video account handle (without `@`).
    pub video_handle: Option<String>,
    /// Photo-feed account handle (without `@`).
    pub photo_handle: Option<String>,
    /// Forum search terms; defaults to the show name when empty.
    #[serde(default)]
    pub forum_terms: Vec<String>,
    pub notes: Option<String>,
}

impl ShowConfig {
    /// Generate a URL-safe slug from the show name.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else if c == ' ' {
                    '-'
                } else {
                    '\0'
                }
            })
            .filter(|&c| c != '\0')
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[derive(Debug, Deserialize)]
pub struct ShowsFile {
    pub shows: Vec<ShowConfig>,
}

/// Load and validate the show roster from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_shows(path: &Path) -> Result<ShowsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ShowsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let shows_file: ShowsFile = serde_yaml::from_str(&content)?;

    validate_shows(&shows_file)?;

    Ok(shows_file)
}

fn validate_shows(shows_file: &ShowsFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    let mut seen_slugs = HashSet::new();

    for show in &shows_file.shows {
        if show.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "show name must be non-empty".to_string(),
            ));
        }

        let lower_name = show.name.to_lowercase();
        if !seen_names.insert(lower_name) {
            return Err(ConfigError::Validation(format!(
                "duplicate show name: '{}'",
                show.name
            )));
        }

        let slug = show.slug();
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate show slug: '{}' (from show '{}')",
                slug, show.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(name: &str) -> ShowConfig {
        ShowConfig {
            name: name.to_string(),
            wiki_article: None,
            trend_queries: Vec::new(),
            video_handle: None,
            photo_handle: None,
            forum_terms: Vec::new(),
            notes: None,
        }
    }

    #[test]
    fn slug_strips_punctuation_and_spaces() {
        assert_eq!(show("Oh, Mary!").slug(), "oh-mary");
        assert_eq!(show("Maybe Happy Ending").slug(), "maybe-happy-ending");
        assert_eq!(show("& Juliet").slug(), "juliet");
    }

    #[test]
    fn duplicate_slugs_rejected() {
        let file = ShowsFile {
            shows: vec![show("Oh, Mary!"), show("Oh Mary")],
        };
        assert!(validate_shows(&file).is_err());
    }

    #[test]
    fn empty_name_rejected() {
        let file = ShowsFile {
            shows: vec![show("  ")],
        };
        assert!(validate_shows(&file).is_err());
    }

    #[test]
    fn roster_yaml_parses() {
        let yaml = r#"
shows:
  - name: "Oh, Mary!"
    wiki_article: "Oh,_Mary!"
    trend_queries: ["oh mary tickets"]
    video_handle: "ohmaryplay"
  - name: "Maybe Happy Ending"
    photo_handle: "maybehappyending"
"#;
        let file: ShowsFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.shows.len(), 2);
        assert_eq!(file.shows[0].trend_queries.len(), 1);
        assert!(validate_shows(&file).is_ok());
    }
}
