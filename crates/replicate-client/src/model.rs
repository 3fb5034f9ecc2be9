use serde::Serialize;

/// Hosted FLUX variants. Each one maps to a fixed model endpoint and carries
/// its own safety parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ModelVariant {
    /// Fast four-step model; the safety checker is switched off.
    #[default]
    Schnell,
    /// Highest quality; runs at the most permissive safety tolerance.
    Pro,
    /// Guidance-distilled development model with stock settings.
    Dev,
}

impl ModelVariant {
    pub const OWNER: &'static str = "black-forest-labs";

    pub fn name(self) -> &'static str {
        match self {
            ModelVariant::Schnell => "flux-schnell",
            ModelVariant::Pro => "flux-pro",
            ModelVariant::Dev => "flux-dev",
        }
    }

    /// Path relative to the API base, e.g. `v1/models/black-forest-labs/flux-schnell/predictions`.
    pub fn predictions_path(self) -> String {
        format!("v1/models/{}/{}/predictions", Self::OWNER, self.name())
    }

    pub fn defaults(self) -> VariantDefaults {
        match self {
            ModelVariant::Schnell => VariantDefaults {
                disable_safety_checker: Some(true),
                safety_tolerance: None,
            },
            ModelVariant::Pro => VariantDefaults {
                disable_safety_checker: None,
                safety_tolerance: Some(MAX_SAFETY_TOLERANCE),
            },
            ModelVariant::Dev => VariantDefaults::default(),
        }
    }
}

/// The highest tolerance flux-pro accepts.
pub const MAX_SAFETY_TOLERANCE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariantDefaults {
    pub disable_safety_checker: Option<bool>,
    pub safety_tolerance: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum AspectRatio {
    #[default]
    #[cfg_attr(feature = "clap", value(name = "1:1"))]
    Square,
    #[cfg_attr(feature = "clap", value(name = "16:9"))]
    Wide,
    #[cfg_attr(feature = "clap", value(name = "21:9"))]
    UltraWide,
    #[cfg_attr(feature = "clap", value(name = "2:3"))]
    Portrait,
    #[cfg_attr(feature = "clap", value(name = "3:2"))]
    Landscape,
    #[cfg_attr(feature = "clap", value(name = "4:5"))]
    PortraitFrame,
    #[cfg_attr(feature = "clap", value(name = "5:4"))]
    LandscapeFrame,
    #[cfg_attr(feature = "clap", value(name = "9:16"))]
    Tall,
    #[cfg_attr(feature = "clap", value(name = "9:21"))]
    UltraTall,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Wide => "16:9",
            AspectRatio::UltraWide => "21:9",
            AspectRatio::Portrait => "2:3",
            AspectRatio::Landscape => "3:2",
            AspectRatio::PortraitFrame => "4:5",
            AspectRatio::LandscapeFrame => "5:4",
            AspectRatio::Tall => "9:16",
            AspectRatio::UltraTall => "9:21",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Png,
    Webp,
    Jpg,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Jpg => "jpg",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

/// Everything about a generation except the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelParams {
    pub variant: ModelVariant,
    pub aspect_ratio: AspectRatio,
    pub output_format: OutputFormat,
}

pub const OUTPUT_QUALITY: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub params: ModelParams,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, params: ModelParams) -> Self {
        Self {
            prompt: prompt.into(),
            params,
        }
    }

    /// Request body for the predictions endpoint.
    pub fn body(&self) -> PredictionBody<'_> {
        let defaults = self.params.variant.defaults();
        PredictionBody {
            input: PredictionInput {
                prompt: self.prompt.trim(),
                aspect_ratio: self.params.aspect_ratio.as_str(),
                output_format: self.params.output_format.as_str(),
                output_quality: OUTPUT_QUALITY,
                disable_safety_checker: defaults.disable_safety_checker,
                safety_tolerance: defaults.safety_tolerance,
            },
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PredictionBody<'a> {
    pub input: PredictionInput<'a>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PredictionInput<'a> {
    pub prompt: &'a str,
    pub aspect_ratio: &'static str,
    pub output_format: &'static str,
    pub output_quality: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_safety_checker: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_tolerance: Option<u8>,
}
