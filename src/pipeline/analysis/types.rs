use std::fmt;
use std::path::Path;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::classify::ErrorKind;
use super::InvocationError;

// ──────────────────────────────────────────────
// Models
// ──────────────────────────────────────────────

/// A candidate model token, e.g. `gemini-2.5-flash`.
///
/// Tokens produced by `resolve_model_priority` are already normalized. `new`
/// does no validation so callers can drive the engine with arbitrary names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Result of a single model call inside the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
}

/// One entry of the per-run attempt log. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationAttempt {
    pub model: ModelId,
    pub outcome: AttemptOutcome,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
}

// ──────────────────────────────────────────────
// Inputs
// ──────────────────────────────────────────────

/// Semi-structured patient context accompanying an image. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalContext {
    pub name: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub location: Option<String>,
    pub chief_complaint: Vec<String>,
    pub history: Vec<String>,
    pub physical_exam: Vec<String>,
    pub blood_pressure: Option<String>,
    pub pulse_assessment: Option<String>,
    pub current_management: Vec<String>,
}

/// How the context arrived from the intake layer. Each variant renders to a
/// different placeholder when nothing usable is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextInput {
    /// No context was sent at all.
    Absent,
    /// Context decoded into fields (possibly all empty).
    Provided(ClinicalContext),
    /// Something was sent but could not be read as structured data.
    Unreadable,
}

impl From<ClinicalContext> for ContextInput {
    fn from(context: ClinicalContext) -> Self {
        Self::Provided(context)
    }
}

/// Image bytes plus mime type, already decoded by the upload layer.
#[derive(Clone)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read an image from disk, guessing the mime type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self { mime_type, data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

// Image bytes are patient data; keep them out of debug output.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Provider harm categories the policy can tune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: BlockThreshold,
}

/// Safety thresholds forwarded with every generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyPolicy {
    pub settings: Vec<SafetySetting>,
}

impl SafetyPolicy {
    /// Clinical photos (wounds, skin, genital exams) trip the default filters,
    /// so explicit and dangerous content only block at high probability.
    pub fn clinical() -> Self {
        Self {
            settings: vec![
                SafetySetting {
                    category: HarmCategory::Harassment,
                    threshold: BlockThreshold::BlockMediumAndAbove,
                },
                SafetySetting {
                    category: HarmCategory::HateSpeech,
                    threshold: BlockThreshold::BlockMediumAndAbove,
                },
                SafetySetting {
                    category: HarmCategory::SexuallyExplicit,
                    threshold: BlockThreshold::BlockOnlyHigh,
                },
                SafetySetting {
                    category: HarmCategory::DangerousContent,
                    threshold: BlockThreshold::BlockOnlyHigh,
                },
            ],
        }
    }
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self::clinical()
    }
}

// ──────────────────────────────────────────────
// Outputs
// ──────────────────────────────────────────────

/// Normalized model output. `is_valid_structured` is false when the text is
/// not JSON even after cleaning; callers then fall back to plain display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    pub text: String,
    pub is_valid_structured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Ordered by severity: `Normal < Urgent < Critical`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
    Critical,
}

/// Canonical report sections. Ids never come from the model text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Differential,
    Diagnosis,
    Findings,
    Severity,
    Treatment,
    Exams,
    WarningSigns,
    Referral,
    Prognosis,
    FollowUp,
    PatientGuidance,
    Limitations,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Differential => "differential",
            Self::Diagnosis => "diagnosis",
            Self::Findings => "findings",
            Self::Severity => "severity",
            Self::Treatment => "treatment",
            Self::Exams => "exams",
            Self::WarningSigns => "warning_signs",
            Self::Referral => "referral",
            Self::Prognosis => "prognosis",
            Self::FollowUp => "follow_up",
            Self::PatientGuidance => "patient_guidance",
            Self::Limitations => "limitations",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub id: SectionKind,
    pub title: String,
    pub content: String,
    pub priority: Priority,
    /// Always within 0..=100.
    pub confidence: u8,
    pub urgency: Urgency,
}

/// Sections plus the convenience roll-ups. This is what gets stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisAggregate {
    pub sections: Vec<ReportSection>,
    pub overall_confidence: u8,
    pub overall_urgency: Urgency,
}

// ──────────────────────────────────────────────
// Invocation seam
// ──────────────────────────────────────────────

/// Everything a provider needs for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub image: Option<&'a ImagePayload>,
    pub safety: &'a SafetyPolicy,
}

/// Text/image-to-text generation backend (allows mocking).
pub trait ModelInvoker {
    fn generate(
        &self,
        model: &ModelId,
        request: &GenerationRequest<'_>,
    ) -> Result<String, InvocationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_orders_by_severity() {
        assert!(Urgency::Normal < Urgency::Urgent);
        assert!(Urgency::Urgent < Urgency::Critical);
        assert_eq!(Urgency::default(), Urgency::Normal);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        assert_eq!(serde_json::to_string(&Urgency::Critical).unwrap(), "\"critical\"");
        assert_eq!(
            serde_json::to_string(&SectionKind::WarningSigns).unwrap(),
            "\"warning_signs\""
        );
    }

    #[test]
    fn section_kind_str_matches_serde_name() {
        let kind = SectionKind::FollowUp;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
    }

    #[test]
    fn safety_settings_use_provider_names() {
        let json = serde_json::to_value(SafetyPolicy::clinical().settings).unwrap();
        assert_eq!(json[0]["category"], "HARM_CATEGORY_HARASSMENT");
        assert_eq!(json[3]["threshold"], "BLOCK_ONLY_HIGH");
    }

    #[test]
    fn image_payload_debug_hides_bytes() {
        let image = ImagePayload::new("image/png", vec![1, 2, 3, 4]);
        let debug = format!("{image:?}");
        assert!(debug.contains("image/png"));
        assert!(debug.contains("len: 4"));
        assert!(!debug.contains("[1, 2"));
    }

    #[test]
    fn image_payload_base64() {
        let image = ImagePayload::new("image/jpeg", b"abc".to_vec());
        assert_eq!(image.to_base64(), "YWJj");
        assert_eq!(image.len(), 3);
        assert!(!image.is_empty());
    }

    #[test]
    fn image_payload_from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesion.png");
        std::fs::write(&path, b"fake png").unwrap();

        let image = ImagePayload::from_path(&path).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, b"fake png");
    }

    #[test]
    fn image_payload_from_missing_path_errors() {
        let result = ImagePayload::from_path(Path::new("/nonexistent/lesion.jpg"));
        assert!(result.is_err());
    }
}
