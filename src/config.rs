//! Configuration types for photo carbon analysis.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! The two environmental constants of the tree-offset calculation travel
//! inside the config as an [`OffsetModel`] rather than as globals, so a
//! caller with better regional figures can swap them without recompiling and
//! the normalizer stays a pure function of its inputs.

use crate::error::AnalysisError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default model when neither config nor environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Constants for converting a CO2 mass into an equivalent tree count.
///
/// `trees = ceil(lifetime_kg_co2 / (absorption_per_year * lifespan))`,
/// floored at one tree. The defaults are the commonly cited figures of
/// ~22 kg CO2 absorbed per tree per year over a ~40-year productive life.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetModel {
    /// TREE_CO2_ABSORPTION_PER_YEAR: kg CO2 one tree absorbs per year.
    pub tree_co2_absorption_per_year_kg: f64,
    /// AVERAGE_TREE_LIFESPAN: productive years of absorption per tree.
    pub average_tree_lifespan_years: f64,
}

impl Default for OffsetModel {
    fn default() -> Self {
        Self {
            tree_co2_absorption_per_year_kg: 22.0,
            average_tree_lifespan_years: 40.0,
        }
    }
}

impl OffsetModel {
    /// Lifetime absorption of a single tree, kg CO2.
    pub fn absorption_per_tree_kg(&self) -> f64 {
        self.tree_co2_absorption_per_year_kg * self.average_tree_lifespan_years
    }
}

/// Configuration for a photo analysis.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use carbonlens::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gpt-4.1-mini")
///     .default_region("EU")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the model completion. Default: 0.2.
    ///
    /// Low temperature keeps the numeric estimates reproducible across runs
    /// of the same photo. Higher values add variance that the normalizer
    /// cannot repair — it clamps ranges, not judgement.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// A cluttered desk photo can yield a dozen objects with sources each;
    /// setting this too low truncates the JSON mid-object and forces the
    /// extraction fallback to fail.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient model failure. Default: 3.
    ///
    /// Most 5xx and timeout errors are transient. Permanent errors (bad API
    /// key, 400) surface as [`crate::error::AnalysisError::Provider`] after
    /// the retries are spent.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Concurrent model calls for batch analysis. Default: 4.
    pub concurrency: usize,

    /// Region assumed for grid intensity and usage patterns when the photo
    /// gives no cue. Fed into the prompt and used as the metadata fallback.
    /// Default: "Global".
    pub default_region: String,

    /// Tree-offset constants. Default: [`OffsetModel::default()`].
    pub offset: OffsetModel,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Maximum image dimension (width or height) in pixels. Default: 1280.
    ///
    /// Phone cameras produce 12-megapixel frames; vision APIs tile images
    /// down to ~1500 px anyway, so uploading more is pure latency and cost.
    /// The longer side is capped and the other scaled proportionally.
    pub max_image_pixels: u32,

    /// JPEG quality (1–100) for the upload re-encode. Default: 85.
    ///
    /// Photographs tolerate lossy compression; 85 keeps objects clearly
    /// recognisable at a fraction of the PNG size.
    pub jpeg_quality: u8,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Per-model-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            concurrency: 4,
            default_region: "Global".to_string(),
            offset: OffsetModel::default(),
            system_prompt: None,
            max_image_pixels: 1280,
            jpeg_quality: 85,
            download_timeout_secs: 60,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("default_region", &self.default_region)
            .field("offset", &self.offset)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn default_region(mut self, region: impl Into<String>) -> Self {
        self.config.default_region = region.into();
        self
    }

    pub fn offset(mut self, offset: OffsetModel) -> Self {
        self.config.offset = offset;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.offset.tree_co2_absorption_per_year_kg <= 0.0
            || c.offset.average_tree_lifespan_years <= 0.0
        {
            return Err(AnalysisError::InvalidConfig(format!(
                "Tree offset constants must be positive, got {:?}",
                c.offset
            )));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(AnalysisError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.concurrency == 0 {
            return Err(AnalysisError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.default_region.trim().is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "Default region must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
