//! Prompt registry for drawing analysis.
//!
//! Two layers:
//! - Static drawing prompts (`DRAWING_ANALYSIS_*`, `QUICK_SCAN_PROMPT`) used
//!   when the caller does not supply text.
//! - Ad-hoc templates (`PromptTemplate`) that wrap caller text with a short
//!   framing sentence. Unknown template keys leave the text unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════
// Static prompts
// ═══════════════════════════════════════════════════════════

/// Token budget for the full drawing analysis.
pub const DRAWING_ANALYSIS_MAX_TOKENS: u32 = 1500;
/// Token budget for quick scans and ad-hoc prompts.
pub const SHORT_PROMPT_MAX_TOKENS: u32 = 512;

pub const DRAWING_ANALYSIS_SYSTEM: &str = "\
You are an expert mechanical engineer specializing in precision machining \
and hydraulic components. You are analyzing a technical drawing.";

pub const DRAWING_ANALYSIS_PROMPT: &str = "\
Analyze this mechanical drawing and extract ALL dimensions with their \
tolerances and geometric significance.

For each dimension you identify:

1. **Exact Value & Tolerance**: Extract the precise numerical value and \
tolerance (e.g., \"2.490 ±0.002\")

2. **Geometric Significance**: Identify what each dimension controls:
   - Diameters (main, lands, grooves)
   - Shaft diameters and lengths
   - Seal groove dimensions (width, depth)
   - Threading specifications (UNF, UNC)
   - Chamfers and radii
   - Critical inspection dimensions (marked with *)
   - Port dimensions

3. **Functional Purpose**: Explain the mechanical function:
   - Sealing surfaces
   - Bearing surfaces
   - Pressure containment
   - Assembly interfaces

4. **Manufacturing Notes**: Note any:
   - Surface finish requirements
   - Tool chatter restrictions
   - Material specifications
   - Heat treatment callouts

Pay special attention to:
- Part numbering in the title block
- Inspection/sampling features (*)
- Thread specifications for fittings
- Seal groove critical dimensions
- Mating clearances

Format your response with clear sections for dimensions, threads, \
inspection features, and manufacturing notes. Put each dimension on its \
own line.";

pub const QUICK_SCAN_PROMPT: &str =
    "What dimensions and tolerances can you see in this mechanical drawing? List them all.";

// ═══════════════════════════════════════════════════════════
// Ad-hoc templates
// ═══════════════════════════════════════════════════════════

/// Framing applied to caller-supplied prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    Analyze,
    Describe,
    Technical,
    /// Text passes through unchanged.
    #[default]
    Default,
}

impl PromptTemplate {
    /// Resolve a template key. Absent or unknown keys map to `Default`.
    pub fn from_key(key: Option<&str>) -> Self {
        match key.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
            Some("analyze") => Self::Analyze,
            Some("describe") => Self::Describe,
            Some("technical") => Self::Technical,
            _ => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Describe => "describe",
            Self::Technical => "technical",
            Self::Default => "default",
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            Self::Analyze => format!(
                "Please analyze the following images and provide detailed insights: {text}"
            ),
            Self::Describe => format!("Please describe what you see in the images: {text}"),
            Self::Technical => format!(
                "Provide a technical analysis of the images with focus on: {text}"
            ),
            Self::Default => text.to_string(),
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wrap `text` with the template named by `template_key`.
pub fn build_prompt(text: &str, template_key: Option<&str>) -> String {
    PromptTemplate::from_key(template_key).apply(text)
}

// ═══════════════════════════════════════════════════════════
// Selection
// ═══════════════════════════════════════════════════════════

/// Which prompt an analysis run sends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromptSelection {
    /// Full expert checklist with system role.
    #[default]
    DrawingAnalysis,
    /// Single-sentence "list all dimensions" prompt.
    QuickScan,
    Custom {
        text: String,
        template: PromptTemplate,
    },
}

impl PromptSelection {
    pub fn custom(text: impl Into<String>, template_key: Option<&str>) -> Self {
        Self::Custom {
            text: text.into(),
            template: PromptTemplate::from_key(template_key),
        }
    }

    pub fn resolve(&self) -> ResolvedPrompt {
        match self {
            Self::DrawingAnalysis => ResolvedPrompt {
                system: Some(DRAWING_ANALYSIS_SYSTEM),
                user: DRAWING_ANALYSIS_PROMPT.to_string(),
                max_tokens: DRAWING_ANALYSIS_MAX_TOKENS,
            },
            Self::QuickScan => ResolvedPrompt {
                system: None,
                user: QUICK_SCAN_PROMPT.to_string(),
                max_tokens: SHORT_PROMPT_MAX_TOKENS,
            },
            Self::Custom { text, template } => ResolvedPrompt {
                system: None,
                user: template.apply(text),
                max_tokens: SHORT_PROMPT_MAX_TOKENS,
            },
        }
    }
}

/// Prompt text ready for a vision backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub system: Option<&'static str>,
    pub user: String,
    pub max_tokens: u32,
}
