//! Core domain types for lead tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LeadEnrichError, Result};

/// Meters per statute mile, used when converting a search radius.
pub const METERS_PER_MILE: f64 = 1609.34;

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A single cell of a lead table.
///
/// Cells read from a file are always [`FieldValue::Text`] so that untouched
/// cells are written back exactly as read. Values fetched from remote
/// sources carry their type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// The row has no value for this column at all.
    #[default]
    Absent,
    /// A string cell, possibly blank.
    Text(String),
    /// A whole number (e.g. a review count).
    Integer(i64),
    /// A decimal number (e.g. a rating).
    Float(f64),
}

impl FieldValue {
    /// Build a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Text for an optional remote string: `None` and `""` become [`FieldValue::Absent`].
    pub fn from_optional_text(value: Option<String>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Self::Text(v),
            _ => Self::Absent,
        }
    }

    /// The string content if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for absent cells and all-whitespace strings.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Integer(_) | Self::Float(_) => false,
        }
    }

    /// Rendered cell content, trimmed.
    pub fn trimmed(&self) -> String {
        self.to_string().trim().to_string()
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Absent, Self::Float)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Absent, Self::Integer)
    }
}

// ---------------------------------------------------------------------------
// LeadField
// ---------------------------------------------------------------------------

/// Every logical column the enrichment pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadField {
    CompanyName,
    CompanyAddress,
    Phone,
    Website,
    Rating,
    ReviewCount,
    DetailUrl,
    LinkedIn,
    Facebook,
    Instagram,
    Twitter,
    ResearchBrief,
    GeneratedEmail,
}

impl LeadField {
    /// Header written when the pipeline has to create this column.
    pub fn canonical_header(&self) -> &'static str {
        match self {
            Self::CompanyName => "Company Name",
            Self::CompanyAddress => "Company Address",
            Self::Phone => "Phone Number",
            Self::Website => "Website",
            Self::Rating => "Google Review Rating",
            Self::ReviewCount => "Google Review Count",
            Self::DetailUrl => "Google Maps URL",
            Self::LinkedIn => "LinkedIn URL",
            Self::Facebook => "Facebook URL",
            Self::Instagram => "Instagram URL",
            Self::Twitter => "Twitter URL",
            Self::ResearchBrief => "Research Brief",
            Self::GeneratedEmail => "Generated Email",
        }
    }

    /// Accepted header names, in priority order.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::CompanyName => &["Business Name", "Company Name"],
            Self::CompanyAddress => &["Business Address", "Company Address"],
            Self::Phone => &["Phone Number", "Company Phone", "Business Phone"],
            Self::Website => &["Website", "Website URL"],
            Self::Rating => &["Google Review Rating"],
            Self::ReviewCount => &["Google Review Count"],
            Self::DetailUrl => &["Google Maps URL"],
            Self::LinkedIn => &["LinkedIn URL"],
            Self::Facebook => &["Facebook URL"],
            Self::Instagram => &["Instagram URL"],
            Self::Twitter => &["Twitter URL"],
            Self::ResearchBrief => &["Research Brief"],
            Self::GeneratedEmail => &["Generated Email"],
        }
    }

    /// Social-profile fields filled by website enrichment.
    pub const SOCIAL: [LeadField; 4] = [
        LeadField::LinkedIn,
        LeadField::Facebook,
        LeadField::Instagram,
        LeadField::Twitter,
    ];
}

// ---------------------------------------------------------------------------
// SearchResult
// ---------------------------------------------------------------------------

/// A business returned by a places text search. Always merged into a table row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    /// Canonical detail URL for the business.
    pub detail_url: String,
}

// ---------------------------------------------------------------------------
// GeoBias
// ---------------------------------------------------------------------------

/// Circular region used to weight search results toward a location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBias {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl GeoBias {
    /// Parse `"lat,lng"` plus a radius in miles, converted to whole meters.
    pub fn parse(location: &str, radius_miles: f64) -> Result<Self> {
        let (lat, lng) = location.split_once(',').ok_or_else(|| {
            LeadEnrichError::validation(format!(
                "location must be 'lat,lng' (e.g. '30.2672,-97.7431'), got '{location}'"
            ))
        })?;

        let parse = |s: &str| {
            s.trim().parse::<f64>().map_err(|_| {
                LeadEnrichError::validation(format!(
                    "location must be 'lat,lng' (e.g. '30.2672,-97.7431'), got '{location}'"
                ))
            })
        };
        let latitude = parse(lat)?;
        let longitude = parse(lng)?;

        if radius_miles <= 0.0 || !radius_miles.is_finite() {
            return Err(LeadEnrichError::validation("radius must be greater than 0"));
        }

        Ok(Self {
            latitude,
            longitude,
            radius_meters: (radius_miles * METERS_PER_MILE).trunc(),
        })
    }
}

// ---------------------------------------------------------------------------
// ErrorRecord
// ---------------------------------------------------------------------------

/// One per-row failure, written to the audit artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// 1-based line number in the source file (the header is line 1).
    pub row: usize,
    /// Name cell as captured at failure time.
    pub business_name: String,
    /// Address cell as captured at failure time.
    pub business_address: String,
    /// Underlying error message.
    pub error: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_display_keeps_one_decimal_for_whole_numbers() {
        assert_eq!(FieldValue::Float(4.0).to_string(), "4.0");
        assert_eq!(FieldValue::Float(4.7).to_string(), "4.7");
        assert_eq!(FieldValue::Integer(128).to_string(), "128");
        assert_eq!(FieldValue::Absent.to_string(), "");
    }

    #[test]
    fn blank_detection() {
        assert!(FieldValue::Absent.is_blank());
        assert!(FieldValue::text("   ").is_blank());
        assert!(!FieldValue::text("x").is_blank());
        assert!(!FieldValue::Float(0.0).is_blank());
    }

    #[test]
    fn optional_conversions() {
        assert_eq!(FieldValue::from(None::<f64>), FieldValue::Absent);
        assert_eq!(FieldValue::from(Some(3_i64)), FieldValue::Integer(3));
        assert_eq!(FieldValue::from_optional_text(Some(String::new())), FieldValue::Absent);
    }

    #[test]
    fn geo_bias_converts_miles_to_meters() {
        let bias = GeoBias::parse("30.2672,-97.7431", 10.0).expect("parse");
        assert_eq!(bias.latitude, 30.2672);
        assert_eq!(bias.longitude, -97.7431);
        assert_eq!(bias.radius_meters, 16093.0);
    }

    #[test]
    fn geo_bias_rejects_bad_input() {
        assert!(GeoBias::parse("30.2672", 10.0).is_err());
        assert!(GeoBias::parse("north,south", 10.0).is_err());
        assert!(GeoBias::parse("30.2,-97.7", 0.0).is_err());
    }

    #[test]
    fn error_record_serializes_timestamp_as_rfc3339() {
        let record = ErrorRecord {
            row: 2,
            business_name: "Alpha Dental".into(),
            business_address: String::new(),
            error: "Missing business name or address".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains(r#""row":2"#));
        assert!(json.contains("T"));
    }
}
