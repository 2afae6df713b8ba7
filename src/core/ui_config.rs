use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use validator::Validate;

use crate::models::{Audience, UiConfig, UiConfigStatus};

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}\.\d{2}\.\d{2}(-[a-z]+\.\d+)?$").expect("valid version regex"));

#[derive(Debug, Error)]
pub enum UiConfigError {
    #[error("Invalid version '{0}', expected YYYY.MM.DD or YYYY.MM.DD-tag.N")]
    InvalidVersion(String),

    #[error("Invalid color '{value}' for token '{token}'")]
    InvalidColor { token: String, value: String },

    #[error("Gradient '{0}' must have between 2 and 4 colors")]
    InvalidGradient(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Full validation of an incoming config
pub fn validate_ui_config(config: &UiConfig) -> Result<(), UiConfigError> {
    if !VERSION_RE.is_match(&config.version) {
        return Err(UiConfigError::InvalidVersion(config.version.clone()));
    }

    config.validate()?;
    if let Some(audience) = &config.audience {
        audience.validate()?;
    }

    for (token, value) in &config.tokens.colors {
        if !is_hex_color(value) {
            return Err(UiConfigError::InvalidColor {
                token: token.clone(),
                value: value.clone(),
            });
        }
    }

    for (name, stops) in &config.tokens.palette.gradients {
        if !(2..=4).contains(&stops.len()) {
            return Err(UiConfigError::InvalidGradient(name.clone()));
        }
        if let Some(bad) = stops.iter().find(|s| !is_hex_color(s)) {
            return Err(UiConfigError::InvalidColor {
                token: format!("palette.gradients.{}", name),
                value: bad.clone(),
            });
        }
    }

    Ok(())
}

/// Who is asking for a config
#[derive(Debug, Clone, Default)]
pub struct AudienceContext {
    pub user_id: Option<String>,
    pub env: Option<String>,
    pub country: Option<String>,
}

/// Stable rollout bucket in 0..100 (FNV-1a of the user id)
pub fn rollout_bucket(user_id: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in user_id.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash % 100
}

pub fn audience_admits(audience: &Audience, ctx: &AudienceContext) -> bool {
    if let (Some(wanted), Some(env)) = (&audience.env, &ctx.env) {
        if !wanted.eq_ignore_ascii_case(env) {
            return false;
        }
    }

    if let (Some(allowed), Some(country)) = (&audience.country_allow, &ctx.country) {
        if !allowed.iter().any(|c| c.eq_ignore_ascii_case(country)) {
            return false;
        }
    }

    match audience.pct {
        None => true,
        Some(pct) if pct >= 100.0 => true,
        // anonymous callers only see full rollouts
        Some(pct) => ctx
            .user_id
            .as_deref()
            .map(|id| (rollout_bucket(id) as f64) < pct)
            .unwrap_or(false),
    }
}

/// Newest production config the caller is admitted to
///
/// `configs` must be ordered newest first.
pub fn select_config<'a>(configs: &'a [UiConfig], ctx: &AudienceContext) -> Option<&'a UiConfig> {
    configs.iter().find(|c| {
        c.status == UiConfigStatus::Prod
            && c.audience.as_ref().map_or(true, |a| audience_admits(a, ctx))
    })
}
