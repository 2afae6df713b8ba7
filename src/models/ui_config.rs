use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use validator::Validate;

/// Remotely delivered design tokens and feature gates
///
/// Only the sections the server reasons about are typed. Everything else the
/// clients understand (micro-interactions, component variants, per-screen
/// settings, visual enhancements) is carried through untouched in `sections`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    pub version: String,
    pub status: UiConfigStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
    #[validate(nested)]
    pub tokens: Tokens,
    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub i18n_overrides: BTreeMap<String, String>,
    #[validate(nested)]
    pub meta: UiConfigMeta,
    #[serde(flatten)]
    pub sections: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiConfigStatus {
    Draft,
    Preview,
    Staged,
    Prod,
}

impl UiConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiConfigStatus::Draft => "draft",
            UiConfigStatus::Preview => "preview",
            UiConfigStatus::Staged => "staged",
            UiConfigStatus::Prod => "prod",
        }
    }
}

/// Who receives a config
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub pct: Option<f64>,
    #[serde(default)]
    pub country_allow: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Tokens {
    pub colors: BTreeMap<String, String>,
    pub palette: Palette,
    #[validate(nested)]
    pub spacing: SpacingScale,
    #[validate(nested)]
    pub radii: RadiiScale,
    pub typography: Value,
    #[validate(nested)]
    pub motion: MotionTokens,
    pub shadow: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Palette {
    pub gradients: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SpacingScale {
    #[validate(range(min = 0.0, max = 100.0))]
    pub xs: f64,
    #[validate(range(min = 0.0, max = 200.0))]
    pub sm: f64,
    #[validate(range(min = 0.0, max = 300.0))]
    pub md: f64,
    #[validate(range(min = 0.0, max = 400.0))]
    pub lg: f64,
    #[validate(range(min = 0.0, max = 500.0))]
    pub xl: f64,
    #[serde(rename = "2xl")]
    #[validate(range(min = 0.0, max = 800.0))]
    pub xxl: f64,
    #[serde(rename = "3xl")]
    #[validate(range(min = 0.0, max = 1000.0))]
    pub xxxl: f64,
    #[serde(rename = "4xl")]
    #[validate(range(min = 0.0, max = 1200.0))]
    pub xxxxl: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RadiiScale {
    #[validate(range(min = 0.0, max = 0.0))]
    pub none: f64,
    #[validate(range(min = 0.0, max = 4.0))]
    pub xs: f64,
    #[validate(range(min = 0.0, max = 8.0))]
    pub sm: f64,
    #[validate(range(min = 0.0, max = 12.0))]
    pub md: f64,
    #[validate(range(min = 0.0, max = 16.0))]
    pub lg: f64,
    #[validate(range(min = 0.0, max = 24.0))]
    pub xl: f64,
    #[serde(rename = "2xl")]
    #[validate(range(min = 0.0, max = 32.0))]
    pub xxl: f64,
    #[validate(range(min = 0.0, max = 9999.0))]
    pub pill: f64,
    #[validate(range(min = 0.0, max = 9999.0))]
    pub full: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MotionTokens {
    #[validate(nested)]
    pub duration: MotionDuration,
    pub easing: Value,
    #[validate(nested)]
    pub scale: MotionScale,
    #[validate(nested)]
    pub opacity: MotionOpacity,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MotionDuration {
    #[validate(range(min = 0.0, max = 200.0))]
    pub xfast: f64,
    #[validate(range(min = 0.0, max = 300.0))]
    pub fast: f64,
    #[validate(range(min = 0.0, max = 500.0))]
    pub base: f64,
    #[validate(range(min = 0.0, max = 800.0))]
    pub slow: f64,
    #[validate(range(min = 0.0, max = 1200.0))]
    pub xslow: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MotionScale {
    #[validate(range(min = 0.5, max = 1.0))]
    pub pressed: f64,
    #[validate(range(min = 1.0, max = 1.2))]
    pub lift: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MotionOpacity {
    #[validate(range(min = 0.0, max = 1.0))]
    pub pressed: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub disabled: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub shimmer: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UiConfigMeta {
    #[validate(length(min = 1))]
    pub changelog: String,
    #[validate(length(min = 1))]
    pub created_by: String,
    pub created_at: String,
}
