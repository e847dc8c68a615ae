//! Data models for app insights analyses.
//!
//! This module contains the schema of one computed analysis (a reference
//! app, its competitors and the insights extracted from their reviews) and
//! the key under which an analysis is stored.

use crate::error::{InsightsError, InsightsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Separator between app id and region inside a store document id.
pub const KEY_DELIMITER: char = ';';

const MAX_APP_ID_LEN: usize = 255;
const MAX_RATING: f64 = 5.0;

/// One themed finding extracted from app reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Theme title.
    pub title: String,
    /// How often the theme came up.
    pub amount: u64,
    /// Supporting review quotes.
    #[serde(default)]
    pub quotes: Vec<String>,
    /// Sentiment labels attached to the theme.
    #[serde(default)]
    pub sentiments: Vec<String>,
}

/// One app inside an analysis, either the reference app or a competitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    /// Store package id, unique within one analysis.
    pub app_id: String,
    pub title: String,
    /// Store description, may contain HTML.
    pub description: String,
    pub genre: String,
    pub icon_url: String,
    /// Free-form install bucket such as "10M+".
    pub installs: String,
    /// Average rating in [0, 5]. `None` means "not available", never zero.
    #[serde(default)]
    pub ratings: Option<f64>,
    #[serde(rename = "inAppProductPrice", default)]
    pub in_app_product_price: Option<String>,
    #[serde(default)]
    pub insights: Vec<Insight>,
}

impl App {
    /// Rating formatted for display.
    pub fn rating_label(&self) -> String {
        match self.ratings {
            Some(rating) => format!("{:.1}", rating),
            None => "N/A".to_string(),
        }
    }
}

/// A fully computed analysis: the unit of caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub reference_app: App,
    pub competitors: Vec<App>,
}

impl AnalysisResult {
    /// Check the invariants an externally produced payload must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();

        for app in self.apps() {
            if app.app_id.trim().is_empty() {
                return Err("app with empty app_id".to_string());
            }
            if !seen.insert(app.app_id.as_str()) {
                return Err(format!("duplicate app_id '{}'", app.app_id));
            }
            if let Some(rating) = app.ratings {
                if !rating.is_finite() || !(0.0..=MAX_RATING).contains(&rating) {
                    return Err(format!(
                        "rating {} of '{}' is outside [0, {}]",
                        rating, app.app_id, MAX_RATING
                    ));
                }
            }
        }

        Ok(())
    }

    /// All apps in display order, reference app first.
    pub fn apps(&self) -> impl Iterator<Item = &App> {
        std::iter::once(&self.reference_app).chain(self.competitors.iter())
    }
}

/// The (user, app, region) identifier of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnalysisKey {
    pub user_id: String,
    pub app_id: String,
    pub region: String,
}

impl AnalysisKey {
    /// Build a key, validating every part. The region is lowercased.
    pub fn new(user_id: &str, app_id: &str, region: &str) -> InsightsResult<Self> {
        validate_user_id(user_id)?;
        validate_app_id(app_id)?;
        let region = normalize_region(region)?;

        Ok(Self {
            user_id: user_id.to_string(),
            app_id: app_id.to_string(),
            region,
        })
    }

    /// Decode a store document id of the form `app_id;region`.
    pub fn from_document_id(user_id: &str, document_id: &str) -> InsightsResult<Self> {
        let (app_id, region) = document_id.split_once(KEY_DELIMITER).ok_or_else(|| {
            InsightsError::InvalidRequest(format!(
                "key '{}' is missing the '{}' separator",
                document_id, KEY_DELIMITER
            ))
        })?;
        Self::new(user_id, app_id, region)
    }

    /// Encode the app and region as the single string used by the store.
    pub fn document_id(&self) -> String {
        format!("{}{}{}", self.app_id, KEY_DELIMITER, self.region)
    }
}

impl fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document_id())
    }
}

/// A listed analysis: its key and when it was stored. No payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisIndexEntry {
    pub key: AnalysisKey,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisIndexEntry {
    /// The app part of the key, as shown on the dashboard.
    pub fn display_name(&self) -> &str {
        &self.key.app_id
    }
}

/// Reject user ids that could escape a per-user namespace.
pub fn validate_user_id(user_id: &str) -> InsightsResult<()> {
    let invalid = user_id.is_empty()
        || user_id == "."
        || user_id == ".."
        || user_id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | KEY_DELIMITER));

    if invalid {
        return Err(InsightsError::InvalidRequest(format!(
            "invalid user id '{}'",
            user_id
        )));
    }
    Ok(())
}

fn validate_app_id(app_id: &str) -> InsightsResult<()> {
    if app_id.is_empty() {
        return Err(InsightsError::InvalidRequest("app id is empty".to_string()));
    }
    if app_id.len() > MAX_APP_ID_LEN {
        return Err(InsightsError::InvalidRequest(format!(
            "app id is longer than {} characters",
            MAX_APP_ID_LEN
        )));
    }

    let allowed = app_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !allowed || app_id.starts_with('.') || app_id.ends_with('.') {
        return Err(InsightsError::InvalidRequest(format!(
            "app id '{}' is not a valid package name",
            app_id
        )));
    }
    Ok(())
}

fn normalize_region(region: &str) -> InsightsResult<String> {
    if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(InsightsError::InvalidRequest(format!(
            "region '{}' must be a two-letter country code",
            region
        )));
    }
    Ok(region.to_ascii_lowercase())
}
