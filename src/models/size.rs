//! Schema size models.

use serde::Serialize;

/// Storage used by a schema (data + indexes), in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SchemaSize {
    pub megabytes: f64,
}

impl SchemaSize {
    pub fn from_megabytes(megabytes: f64) -> Self {
        Self { megabytes }
    }

    /// Parse the textual DECIMAL the size query returns (e.g. "4.00").
    pub fn parse(value: &str) -> Option<Self> {
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|mb| mb.is_finite() && *mb >= 0.0)
            .map(Self::from_megabytes)
    }
}

impl std::fmt::Display for SchemaSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} MB", self.megabytes)
    }
}

/// Result of a size measurement.
///
/// `NoData` means the query ran but the schema has no tables (the SUM was
/// NULL); `Unavailable` means the query could not run at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SizeReport {
    Measured(SchemaSize),
    NoData,
    Unavailable { reason: String },
}

impl SizeReport {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// The measured size, if there is one.
    pub fn size(&self) -> Option<SchemaSize> {
        match self {
            Self::Measured(size) => Some(*size),
            _ => None,
        }
    }
}

impl From<Option<SchemaSize>> for SizeReport {
    fn from(size: Option<SchemaSize>) -> Self {
        size.map_or(Self::NoData, Self::Measured)
    }
}

impl std::fmt::Display for SizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Measured(size) => write!(f, "{}", size),
            Self::NoData => write!(f, "unknown (no tables in schema)"),
            Self::Unavailable { reason } => write!(f, "unknown ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_display_two_decimals() {
        assert_eq!(SchemaSize::from_megabytes(4.0).to_string(), "4.00 MB");
        assert_eq!(SchemaSize::from_megabytes(12.346).to_string(), "12.35 MB");
        assert_eq!(SchemaSize::from_megabytes(0.0).to_string(), "0.00 MB");
    }

    #[test]
    fn test_parse_decimal_text() {
        assert_eq!(SchemaSize::parse("4.00"), Some(SchemaSize::from_megabytes(4.0)));
        assert_eq!(SchemaSize::parse(" 0.50 "), Some(SchemaSize::from_megabytes(0.5)));
        assert_eq!(SchemaSize::parse("n/a"), None);
        assert_eq!(SchemaSize::parse("-1"), None);
    }

    #[test]
    fn test_null_sum_is_no_data() {
        assert_eq!(SizeReport::from(None), SizeReport::NoData);
        assert_eq!(SizeReport::NoData.size(), None);
    }

    #[test]
    fn test_unknown_markers_never_look_like_sizes() {
        let unavailable = SizeReport::unavailable("Cannot connect to server");
        assert!(!unavailable.to_string().ends_with("MB"));
        assert!(!SizeReport::NoData.to_string().ends_with("MB"));
    }

    #[test]
    fn test_report_serializes_with_status_tag() {
        let report = SizeReport::Measured(SchemaSize::from_megabytes(2.5));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "measured");
        assert_eq!(json["megabytes"], 2.5);

        let json = serde_json::to_value(SizeReport::NoData).unwrap();
        assert_eq!(json["status"], "no_data");
    }
}
