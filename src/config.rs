use crate::case::CaseField;
use crate::evidence::{DEFAULT_EVIDENCE_FILTER, PUBMED_BASE_URL};
use crate::log_debug;
use crate::renderers::image::{DEFAULT_IMAGE_MODEL_VERSION, REPLICATE_BASE_URL};
use crate::renderers::speech::{DEFAULT_SPEECH_MODEL, ELEVENLABS_BASE_URL};
use crate::template::TemplateAssembler;

use anyhow::{Context, Result, anyhow};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for the physiocase pipeline.
///
/// Loaded once at process start and never mutated during a run.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// Text generation settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// API key for the text generation provider (never written back to disk)
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    /// Sampling temperature shared by every request of the process
    pub temperature: f64,
    pub max_tokens: u64,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            temperature: 0.9,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

/// Literature retrieval settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Maximum number of records pulled into a prompt
    pub max_results: usize,
    /// Restrict searches to systematic reviews and meta-analyses
    pub filter_enabled: bool,
    pub filter: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub tool: Option<String>,
    pub email: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            filter_enabled: true,
            filter: DEFAULT_EVIDENCE_FILTER.to_string(),
            base_url: PUBMED_BASE_URL.to_string(),
            api_key: String::new(),
            tool: Some(env!("CARGO_PKG_NAME").to_string()),
            email: None,
            timeout_secs: 15,
        }
    }
}

/// Speech synthesis settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            base_url: ELEVENLABS_BASE_URL.to_string(),
            model_id: DEFAULT_SPEECH_MODEL.to_string(),
        }
    }
}

/// Image synthesis settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub base_url: String,
    pub model_version: String,
    /// Longer case texts are cut to this many characters before use as a prompt
    pub max_prompt_chars: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_token: String::new(),
            base_url: REPLICATE_BASE_URL.to_string(),
            model_version: DEFAULT_IMAGE_MODEL_VERSION.to_string(),
            max_prompt_chars: 1000,
        }
    }
}

/// PDF export settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DocumentConfig {
    pub enabled: bool,
    pub body_font_size: f32,
    /// Characters per line before wrapping
    pub wrap_width: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            body_font_size: 10.0,
            wrap_width: 95,
        }
    }
}

/// Prompt template settings
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TemplateConfig {
    /// Order in which structured fields are rendered
    pub field_order: Vec<CaseField>,
    /// Replacement skeleton; must contain the `{subject}` placeholder
    pub skeleton_path: Option<PathBuf>,
}

/// Performance and execution configuration
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Per-call timeout for each artifact renderer
    pub render_timeout_secs: u64,
    /// Whether to enable verbose logging (includes HTTP client internals)
    pub verbose_logging: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            render_timeout_secs: 120,
            verbose_logging: false,
        }
    }
}

/// Environment variables holding service credentials
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ELEVEN_API_KEY_ENV: &str = "ELEVEN_API_KEY";
pub const REPLICATE_API_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";
pub const NCBI_API_KEY_ENV: &str = "NCBI_API_KEY";

impl Config {
    /// Load the configuration file (if any) and overlay credentials from the environment
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;

        log_debug!("Configuration loaded from {}", config_path.display());
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).map_err(|e| {
            anyhow!(
                "Invalid configuration file format: {}. Please check {} for syntax errors.",
                e,
                path.display()
            )
        })
    }

    /// Overlay credentials from an environment lookup; non-empty values win
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = read(OPENAI_API_KEY_ENV) {
            self.generation.api_key = key;
        }
        if let Some(key) = read(ELEVEN_API_KEY_ENV) {
            self.speech.api_key = key;
        }
        if let Some(token) = read(REPLICATE_API_TOKEN_ENV) {
            self.images.api_token = token;
        }
        if let Some(key) = read(NCBI_API_KEY_ENV) {
            self.evidence.api_key = key;
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(anyhow!(
                "generation.temperature must be between 0.0 and 2.0, got {}",
                self.generation.temperature
            ));
        }
        if self.evidence.max_results > 100 {
            return Err(anyhow!(
                "evidence.max_results must be at most 100, got {}",
                self.evidence.max_results
            ));
        }
        if self.generation.timeout_secs == 0 || self.performance.render_timeout_secs == 0 {
            return Err(anyhow!("timeouts must be greater than zero"));
        }
        if self.document.wrap_width < 20 {
            return Err(anyhow!(
                "document.wrap_width must be at least 20, got {}",
                self.document.wrap_width
            ));
        }
        Ok(())
    }

    /// Save the configuration to the file; credentials are never written
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        log_debug!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let mut path =
            config_dir().ok_or_else(|| anyhow!("Unable to determine config directory"))?;
        path.push(env!("CARGO_PKG_NAME"));
        fs::create_dir_all(&path)?;
        path.push("config.toml");
        Ok(path)
    }

    /// Prompt assembler honouring the template section
    pub fn template_assembler(&self) -> Result<TemplateAssembler> {
        let mut assembler =
            TemplateAssembler::new().with_field_order(&self.template.field_order);

        if let Some(path) = &self.template.skeleton_path {
            let skeleton = fs::read_to_string(path)
                .with_context(|| format!("Failed to read skeleton {}", path.display()))?;
            assembler = assembler
                .with_skeleton(skeleton)
                .with_context(|| format!("Invalid skeleton {}", path.display()))?;
        }

        Ok(assembler)
    }
}
