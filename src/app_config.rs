use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::slide_normalizer::SlideRules;

pub const DECK_CONFIG_FILE: &str = "deck_config.json";

// Text generation API configuration
pub const DEFAULT_GENERATION_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_GENERATION_MODEL: &str = "openai/gpt-3.5-turbo";

// Photo search API configuration
pub const DEFAULT_IMAGE_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

// `{asana}` is replaced with the pose name, `{ASANA}` with its upper-cased form
pub const DEFAULT_DECK_PROMPT: &str = "Create a comprehensive yoga presentation for {asana} with exactly 13 slides.
Each slide should have clear structure with headings, subheadings, and 5-6 detailed bullet points.

FORMAT EACH SLIDE LIKE THIS:

SLIDE 1: MASTERING {ASANA}
🎯 SUBHEADING: Transform Your Yoga Practice
• Foundational standing pose suitable for all experience levels
• Builds core strength, improves balance and body awareness
• Perfect for morning routines and daily practice sessions
• Creates deep connection between body, mind and breathing
• Enhances overall posture and spinal alignment
• Recommended by yoga therapists for holistic wellness

SLIDE 2: STEP-BY-STEP GUIDANCE
📝 SUBHEADING: Perfect Your Alignment & Form
• Start with feet hip-width apart, weight evenly distributed
• Ground through all four corners of each foot firmly
• Engage thigh muscles while gently lifting the kneecaps
• Lengthen spine upward, creating space between vertebrae
• Relax shoulders away from ears, broaden collarbones
• Maintain steady gaze forward with soft focus

SLIDE 3: BREATHING TECHNIQUES
🌬️ SUBHEADING: Sync Movement with Conscious Breath
• Practice deep diaphragmatic breathing throughout the pose
• Inhale deeply to lengthen spine and expand chest fully
• Exhale completely to ground feet and stabilize position
• Maintain steady, rhythmic breathing pattern consistently
• Coordinate breath with subtle micro-movements in pose
• Use ujjayi breathing for enhanced focus and warmth

Continue with 10 more slides covering benefits, modifications, safety, etc.
Each slide must have: MAIN TITLE, EMOJI SUBHEADING, and 5-6 DETAILED BULLET POINTS.
Make content comprehensive and practical for yoga practitioners.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the front end's `index.html`
    pub static_dir: PathBuf,
    /// When set, logs are also written to a daily rolling file here
    pub log_dir: Option<PathBuf>,

    #[serde(skip_serializing)]
    pub openrouter_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub unsplash_api_key: Option<String>,

    pub generation_url: String,
    pub generation_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub generation_timeout_secs: u64,
    pub prompt_template: String,

    pub image_search_url: String,
    pub image_timeout_secs: u64,

    /// Fixes the palette choice of exported decks
    pub theme_seed: Option<u64>,

    pub slide_rules: SlideRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            static_dir: PathBuf::from("."),
            log_dir: None,
            openrouter_api_key: None,
            unsplash_api_key: None,
            generation_url: DEFAULT_GENERATION_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            max_tokens: 3000,
            temperature: 0.7,
            generation_timeout_secs: 30,
            prompt_template: DEFAULT_DECK_PROMPT.to_string(),
            image_search_url: DEFAULT_IMAGE_SEARCH_URL.to_string(),
            image_timeout_secs: 15,
            theme_seed: None,
            slide_rules: SlideRules::default(),
        }
    }
}

impl AppConfig {
    /// Overlay settings from the process environment.
    ///
    /// `lookup` is normally `std::env::var(..).ok()`; blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.openrouter_api_key = Some(key);
        }
        if let Some(key) = get("UNSPLASH_API_KEY") {
            self.unsplash_api_key = Some(key);
        }
        if let Some(model) = get("OPENROUTER_MODEL") {
            self.generation_model = model;
        }
        if let Some(seed) = get("DECK_THEME_SEED").and_then(|s| s.parse().ok()) {
            self.theme_seed = Some(seed);
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    /// The prompt sent for `asana`.
    pub fn render_prompt(&self, asana: &str) -> String {
        self.prompt_template
            .replace("{ASANA}", &asana.to_uppercase())
            .replace("{asana}", asana)
    }
}

pub struct ConfigManager {
    config_file: PathBuf,
}

impl ConfigManager {
    pub fn new(config_file: impl AsRef<Path>) -> Self {
        Self {
            config_file: config_file.as_ref().to_path_buf(),
        }
    }

    pub fn load_config(&self) -> io::Result<AppConfig> {
        // If the file doesn't exist, return the default config
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let config_str = fs::read_to_string(&self.config_file)?;
        let config: AppConfig = serde_json::from_str(&config_str)?;
        config.slide_rules.validate().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid slide_rules in {}: {}", self.config_file.display(), e),
            )
        })?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().join("absent.json"));

        let config = manager.load_config().unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.generation_model, DEFAULT_GENERATION_MODEL);
        assert_eq!(config.slide_rules, SlideRules::default());
    }

    #[test]
    fn test_partial_file_overlays_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DECK_CONFIG_FILE);
        fs::write(
            &path,
            r#"{"port": 8080, "theme_seed": 7, "slide_rules": {"char_budget": 400}}"#,
        )
        .unwrap();

        let config = ConfigManager::new(&path).load_config().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.theme_seed, Some(7));
        assert_eq!(config.slide_rules.char_budget, 400);
        assert_eq!(config.slide_rules.deck_len, 13);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DECK_CONFIG_FILE);
        fs::write(&path, "{not json").unwrap();

        assert!(ConfigManager::new(&path).load_config().is_err());
    }

    #[test]
    fn test_invalid_slide_rules_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DECK_CONFIG_FILE);

        fs::write(&path, r#"{"slide_rules": {"min_bullets": 8, "max_bullets": 6}}"#).unwrap();
        let err = ConfigManager::new(&path).load_config().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("min_bullets (8) exceeds max_bullets (6)"));

        fs::write(&path, r#"{"slide_rules": {"title_token": ""}}"#).unwrap();
        let err = ConfigManager::new(&path).load_config().unwrap_err();
        assert!(err.to_string().contains("title_token must not be blank"));
    }

    #[test]
    fn test_apply_env() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENROUTER_API_KEY", "sk-test"),
            ("UNSPLASH_API_KEY", "   "),
            ("DECK_THEME_SEED", "42"),
        ]);

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.openrouter_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.unsplash_api_key, None);
        assert_eq!(config.theme_seed, Some(42));
        assert_eq!(config.generation_model, DEFAULT_GENERATION_MODEL);
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = AppConfig::default();
        config.openrouter_api_key = Some("sk-secret".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_render_prompt() {
        let prompt = AppConfig::default().render_prompt("Kati Chakrasana");
        assert!(prompt.starts_with("Create a comprehensive yoga presentation for Kati Chakrasana with exactly 13 slides."));
        assert!(prompt.contains("SLIDE 1: MASTERING KATI CHAKRASANA"));
        assert!(!prompt.contains("{asana}"));
    }
}
