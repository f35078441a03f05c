//! Line Validator: a pure function over a single line.

use serde::{Deserialize, Serialize};

use crate::config::ValidatorConfig;
use crate::reference_data::ReferenceData;

/// Maximum number of bytes of the offending line kept in a
/// [`crate::fragment::FirstErrorSample`].
pub const RAW_LINE_SAMPLE_LIMIT: usize = 500;

/// The category of a single line's validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineErrorType {
    /// The line has fewer `;`-separated columns than
    /// [`ValidatorConfig::min_columns`].
    TooFewColumns,
    /// A required field was empty after ASCII-whitespace trimming.
    MissingField,
    /// A required field's value was not a member of its reference data
    /// category.
    InvalidValue {
        /// The reference data category the value was checked against.
        category: String,
    },
}

impl LineErrorType {
    /// Returns the wire/log tag for this error type, matching the
    /// `too_few_columns` / `missing_field` / `invalid_<category>` naming.
    pub fn tag(&self) -> String {
        match self {
            LineErrorType::TooFewColumns => "too_few_columns".to_string(),
            LineErrorType::MissingField => "missing_field".to_string(),
            LineErrorType::InvalidValue { category } => format!("invalid_{category}"),
        }
    }
}

/// A single line's validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineError {
    /// What kind of failure this is.
    pub error_type: LineErrorType,
    /// Human-readable message.
    pub message: String,
    /// Name of the offending field, when applicable.
    pub field_name: Option<String>,
    /// Value of the offending field, when applicable.
    pub field_value: Option<String>,
}

/// The three fields the default rule set extracts and validates against
/// reference data, alongside their category names.
const FIELD_CATEGORIES: [(&str, fn(&ValidatorConfig) -> usize); 3] = [
    ("currencies", |cfg| cfg.currency_field),
    ("provinces", |cfg| cfg.province_field),
    ("products", |cfg| cfg.product_field),
];

/// Validates a single line against the configured rule set.
///
/// Returns `Ok(())` for a valid line, or `Err(LineError)` describing the
/// first rule violated. Empty or whitespace-only lines must be filtered out
/// by the caller before calling this function — they are not validated and
/// do not count toward `processedLines`.
pub fn validate(line: &str, config: &ValidatorConfig, ref_data: &ReferenceData) -> Result<(), LineError> {
    let trimmed_line = line.trim_end_matches('\r');
    let columns: Vec<&str> = trimmed_line.split(';').collect();

    if columns.len() < config.min_columns {
        return Err(LineError {
            error_type: LineErrorType::TooFewColumns,
            message: format!(
                "line has {} columns, expected at least {}",
                columns.len(),
                config.min_columns
            ),
            field_name: None,
            field_value: None,
        });
    }

    for (category, field_index_of) in FIELD_CATEGORIES {
        let field_index = field_index_of(config);
        let Some(raw_value) = columns.get(field_index) else {
            return Err(LineError {
                error_type: LineErrorType::MissingField,
                message: format!("column {field_index} ({category}) is absent"),
                field_name: Some(category.to_string()),
                field_value: None,
            });
        };
        let value = raw_value.trim_matches(|c: char| c.is_ascii_whitespace());

        if value.is_empty() {
            return Err(LineError {
                error_type: LineErrorType::MissingField,
                message: format!("{category} field is empty"),
                field_name: Some(category.to_string()),
                field_value: None,
            });
        }

        if ref_data.is_enforced(category) && !ref_data.contains(category, value) {
            return Err(LineError {
                error_type: LineErrorType::InvalidValue {
                    category: category.to_string(),
                },
                message: format!("{value} is not a known {category} value"),
                field_name: Some(category.to_string()),
                field_value: Some(value.to_string()),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;

    fn config() -> ValidatorConfig {
        ValidatorConfig::new(12, 3, 10, 11)
    }

    fn valid_line() -> String {
        (0..12).map(|i| format!("f{i}")).collect::<Vec<_>>().join(";")
    }

    #[test]
    fn accepts_a_well_formed_line() {
        let ref_data = ReferenceData::default();
        assert!(validate(&valid_line(), &config(), &ref_data).is_ok());
    }

    #[test]
    fn rejects_too_few_columns() {
        let ref_data = ReferenceData::default();
        let err = validate("a;b;c", &config(), &ref_data).unwrap_err();
        assert_eq!(err.error_type, LineErrorType::TooFewColumns);
    }

    #[test]
    fn rejects_empty_required_field() {
        let ref_data = ReferenceData::default();
        let mut columns: Vec<&str> = vec!["a"; 12];
        columns[3] = "   ";
        let line = columns.join(";");
        let err = validate(&line, &config(), &ref_data).unwrap_err();
        assert_eq!(err.error_type, LineErrorType::MissingField);
        assert_eq!(err.field_name.as_deref(), Some("currencies"));
    }

    #[test]
    fn rejects_value_outside_reference_data() {
        let mut categories = HashMap::new();
        categories.insert("currencies".to_string(), HashSet::from(["CAD".to_string()]));
        let ref_data = ReferenceData::new(categories);

        let mut columns: Vec<&str> = vec!["a"; 12];
        columns[3] = "EUR";
        let line = columns.join(";");

        let err = validate(&line, &config(), &ref_data).unwrap_err();
        assert_eq!(
            err.error_type,
            LineErrorType::InvalidValue { category: "currencies".to_string() }
        );
        assert_eq!(err.error_type.tag(), "invalid_currencies");
    }

    #[test]
    fn crlf_suffix_does_not_affect_column_count() {
        let ref_data = ReferenceData::default();
        let line = format!("{}\r", valid_line());
        assert!(validate(&line, &config(), &ref_data).is_ok());
    }

    #[test]
    fn different_source_variants_are_both_valid_configurations() {
        // Open Question A: both 12-column and 18-column variants are valid;
        // neither is hardcoded.
        let eighteen_cols = ValidatorConfig::new(18, 3, 10, 11);
        let ref_data = ReferenceData::default();
        let line = (0..18).map(|i| format!("f{i}")).collect::<Vec<_>>().join(";");
        assert!(validate(&line, &eighteen_cols, &ref_data).is_ok());
    }
}
