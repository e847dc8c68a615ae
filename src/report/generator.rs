//! Markdown and JSON rendering of analyses and dashboard listings.

use crate::config::ReportConfig;
use crate::error::InsightsError;
use crate::models::{AnalysisIndexEntry, AnalysisResult, App, Insight};
use anyhow::Result;
use std::path::Path;

/// Shown when no analysis is active.
pub const NO_DATA_MESSAGE: &str = "No data available. Please try again.";

/// Generate the analysis view as Markdown.
pub fn generate_markdown_report(analysis: &AnalysisResult, config: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# AppInsights: {}\n\n",
        analysis.reference_app.title
    ));

    output.push_str("## Reference App\n\n");
    output.push_str(&generate_app_section(&analysis.reference_app, config));

    output.push_str("## Competitors\n\n");
    if analysis.competitors.is_empty() {
        output.push_str("No competitors were found.\n\n");
    }
    for app in &analysis.competitors {
        output.push_str(&generate_app_section(app, config));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the section for one app card.
fn generate_app_section(app: &App, config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", app.title));
    section.push_str(&format!("![{} icon]({})\n\n", app.title, app.icon_url));
    section.push_str(&format!("- **App ID:** `{}`\n", app.app_id));
    section.push_str(&format!("- **Genre:** {}\n", app.genre));
    section.push_str(&format!("- **Installs:** {}\n", app.installs));
    section.push_str(&format!("- **Rating:** {}\n", app.rating_label()));
    if let Some(ref price) = app.in_app_product_price {
        section.push_str(&format!("- **In-app products:** {}\n", price));
    }
    section.push('\n');

    let preview = description_preview(&app.description, config.description_preview_chars);
    if !preview.is_empty() {
        section.push_str(&format!("{}\n\n", preview));
    }

    if !app.insights.is_empty() {
        section.push_str("#### Insights\n\n");
        for insight in &app.insights {
            section.push_str(&generate_insight_block(insight, config));
        }
    }

    section
}

/// Generate a single insight block.
fn generate_insight_block(insight: &Insight, config: &ReportConfig) -> String {
    let mut block = String::new();

    block.push_str(&format!("- **{}** ({})\n", insight.title, insight.amount));

    if config.include_quotes {
        for quote in &insight.quotes {
            block.push_str(&format!("  > \"{}\"\n", quote));
        }
    }

    if config.include_sentiments && !insight.sentiments.is_empty() {
        let badges: Vec<String> = insight
            .sentiments
            .iter()
            .map(|s| format!("`{}`", s))
            .collect();
        block.push_str(&format!("  {}\n", badges.join(" ")));
    }

    block
}

/// First `max_chars` characters of a description, with an ellipsis if cut.
pub fn description_preview(description: &str, max_chars: usize) -> String {
    let trimmed = description.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Generate the dashboard listing as Markdown.
///
/// A listing failure renders as an empty list with a warning line.
pub fn generate_listing_markdown(
    entries: &[AnalysisIndexEntry],
    warning: Option<&InsightsError>,
) -> String {
    let mut output = String::new();

    output.push_str("# Previous Analyses\n\n");

    if let Some(err) = warning {
        output.push_str(&format!("> ⚠️ {} {}\n\n", err, err.next_action()));
    }

    if entries.is_empty() {
        output.push_str("No previous analyses.\n");
        return output;
    }

    output.push_str("| App | Region | Created | Key |\n");
    output.push_str("|:---|:---:|:---|:---|\n");
    for entry in entries {
        output.push_str(&format!(
            "| {} | {} | {} | `{}` |\n",
            entry.display_name(),
            entry.key.region,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.key.document_id()
        ));
    }

    output
}

/// Generate the analysis as JSON.
pub fn generate_json_report(analysis: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(analysis).map_err(Into::into)
}

/// Generate the dashboard listing as JSON.
///
/// A listing failure shows up as a `warning` next to the empty list.
pub fn generate_listing_json(
    entries: &[AnalysisIndexEntry],
    warning: Option<&InsightsError>,
) -> Result<String> {
    let rows: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "key": entry.key.document_id(),
                "app_id": entry.key.app_id,
                "region": entry.key.region,
                "timestamp": entry.timestamp,
            })
        })
        .collect();
    let listing = serde_json::json!({
        "analyses": rows,
        "warning": warning.map(|err| format!("{} {}", err, err.next_action())),
    });
    serde_json::to_string_pretty(&listing).map_err(Into::into)
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Generated by AppInsights*\n".to_string()
}

/// Write rendered output to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisKey;
    use crate::testing::sample_analysis;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_generate_markdown_report() {
        let analysis = sample_analysis("com.duolingo", &["com.babbel.mobile"]);
        let markdown = generate_markdown_report(&analysis, &ReportConfig::default());

        assert!(markdown.contains("# AppInsights: Title of com.duolingo"));
        assert!(markdown.contains("## Reference App"));
        assert!(markdown.contains("## Competitors"));
        assert!(markdown.contains("Title of com.babbel.mobile"));
        assert!(markdown.contains("**Great onboarding** (12)"));
        assert!(markdown.contains("> \"Set up in a minute.\""));
        assert!(markdown.contains("`positive`"));
    }

    #[test]
    fn test_missing_rating_renders_not_available() {
        let mut analysis = sample_analysis("com.a", &[]);
        analysis.reference_app.ratings = None;
        let markdown = generate_markdown_report(&analysis, &ReportConfig::default());

        assert!(markdown.contains("**Rating:** N/A"));
        assert!(!markdown.contains("**Rating:** 0"));
    }

    #[test]
    fn test_quotes_and_sentiments_can_be_hidden() {
        let analysis = sample_analysis("com.a", &[]);
        let config = ReportConfig {
            include_quotes: false,
            include_sentiments: false,
            ..ReportConfig::default()
        };
        let markdown = generate_markdown_report(&analysis, &config);

        assert!(!markdown.contains("Set up in a minute."));
        assert!(!markdown.contains("`positive`"));
    }

    #[test]
    fn test_description_preview() {
        assert_eq!(description_preview("short", 200), "short");
        assert_eq!(description_preview("abcdef", 3), "abc…");
        // Multi-byte characters are never split.
        assert_eq!(description_preview("äöüß", 2), "äö…");
    }

    #[test]
    fn test_listing_markdown() {
        let entries = vec![AnalysisIndexEntry {
            key: AnalysisKey::new("u1", "com.duolingo", "us").unwrap(),
            timestamp: Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap(),
        }];
        let markdown = generate_listing_markdown(&entries, None);

        assert!(markdown.contains("| com.duolingo | us | 2024-10-01 12:00:00 UTC | `com.duolingo;us` |"));
    }

    #[test]
    fn test_listing_failure_degrades_to_warning() {
        let err = InsightsError::StoreUnavailable("disk offline".to_string());
        let markdown = generate_listing_markdown(&[], Some(&err));

        assert!(markdown.contains("disk offline"));
        assert!(markdown.contains("retry shortly"));
        assert!(markdown.contains("No previous analyses."));
    }

    #[test]
    fn test_generate_json_outputs() {
        let analysis = sample_analysis("com.a", &[]);
        let json = generate_json_report(&analysis).unwrap();
        assert!(json.contains("\"reference_app\""));
        assert!(json.contains("\"competitors\""));

        let entries = vec![AnalysisIndexEntry {
            key: AnalysisKey::new("u1", "com.a", "de").unwrap(),
            timestamp: Utc::now(),
        }];
        let listing = generate_listing_json(&entries, None).unwrap();
        assert!(listing.contains("\"key\": \"com.a;de\""));
        assert!(listing.contains("\"warning\": null"));
    }

    #[test]
    fn test_listing_json_carries_the_failure() {
        let err = InsightsError::StoreUnavailable("disk offline".to_string());
        let listing = generate_listing_json(&[], Some(&err)).unwrap();

        let value: serde_json::Value = serde_json::from_str(&listing).unwrap();
        assert_eq!(value["analyses"], serde_json::json!([]));
        let warning = value["warning"].as_str().unwrap();
        assert!(warning.contains("disk offline"));
        assert!(warning.contains("retry shortly"));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        write_report("# hi\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi\n");
    }
}
