//! Structured step results and inputs exchanged with the presentation layer
//!
//! The flow never renders text. A form lists its fields with defaults, the
//! options of a multi-select, classified errors, and the interpolation values
//! that go with them.

use crate::db::sqlite::models::SensorType;
use crate::flow::reconcile::ReconcileReport;
use crate::flow::steps::StepId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const FIELD_BASE: &str = "base";
pub const FIELD_SENSOR_TYPE: &str = "sensor_type";
pub const FIELD_SEARCH_QUERY: &str = "search_query";
pub const FIELD_SELECTED: &str = "selected_cryptos";
pub const FIELD_LABEL: &str = "id";
pub const FIELD_MULTIPLIERS: &str = "multipliers";
pub const FIELD_CURRENCY: &str = "currency_name";
pub const FIELD_UNIT: &str = "unit_of_measurement";
pub const FIELD_UPDATE_FREQUENCY: &str = "update_frequency";
pub const FIELD_MIN_TIME: &str = "min_time_between_requests";
pub const FIELD_BTC_ADDRESS: &str = "btc_address";

/// Classified, recoverable step errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepError {
    /// Item and multiplier counts differ
    MismatchValues,
    NoCryptoSelected,
    /// Search produced no candidates
    NoResults,
    InvalidCryptocurrencyIds,
    BtcAddressRequired,
    PositiveNumberRequired,
    /// Interval longer than the refresh scheduler accepts
    IntervalTooLong,
}

impl StepError {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepError::MismatchValues => "mismatch_values",
            StepError::NoCryptoSelected => "no_crypto_selected",
            StepError::NoResults => "no_results",
            StepError::InvalidCryptocurrencyIds => "invalid_cryptocurrency_ids",
            StepError::BtcAddressRequired => "btc_address_required",
            StepError::PositiveNumberRequired => "positive_number_required",
            StepError::IntervalTooLong => "interval_too_long",
        }
    }
}

/// One input field of a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub required: bool,
    /// Pre-filled value
    pub default: Option<Value>,
    /// Hint shown in an empty optional field; not submitted unless typed
    pub suggested: Option<Value>,
}

impl FormField {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            default: None,
            suggested: None,
        }
    }

    pub fn optional(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            default: None,
            suggested: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_suggested(mut self, value: impl Into<Value>) -> Self {
        self.suggested = Some(value.into());
        self
    }
}

/// A selectable option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// A step waiting for input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepForm {
    pub step_id: StepId,
    pub fields: Vec<FormField>,
    pub options: Vec<SelectOption>,
    pub errors: BTreeMap<String, StepError>,
    pub placeholders: BTreeMap<String, String>,
}

impl StepForm {
    pub fn new(step_id: StepId) -> Self {
        Self {
            step_id,
            fields: Vec::new(),
            options: Vec::new(),
            errors: BTreeMap::new(),
            placeholders: BTreeMap::new(),
        }
    }

    pub fn field(mut self, field: FormField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn error(mut self, field: &str, error: StepError) -> Self {
        self.errors.insert(field.to_string(), error);
        self
    }

    pub fn placeholder(mut self, key: &str, value: impl ToString) -> Self {
        self.placeholders.insert(key.to_string(), value.to_string());
        self
    }

    pub fn base_error(&self) -> Option<StepError> {
        self.errors.get(FIELD_BASE).copied()
    }

    pub fn get_field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Values submitted on the configure steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigureInput {
    #[serde(rename = "id", default)]
    pub label: Option<String>,
    pub multipliers: String,
    pub currency_name: String,
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
    pub update_frequency: f64,
    pub min_time_between_requests: f64,
}

/// Values submitted on the single-source step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInput {
    #[serde(rename = "id", default)]
    pub label: Option<String>,
    pub update_frequency: f64,
    #[serde(default)]
    pub btc_address: Option<String>,
}

/// Input for the current step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepInput {
    Category { sensor_type: SensorType },
    Search {
        #[serde(default)]
        search_query: String,
    },
    Select { selected_cryptos: Vec<String> },
    Configure(ConfigureInput),
    Source(SourceInput),
}

/// Why a flow ended without writing a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    /// Another record already uses the derived key
    DuplicateKey,
    /// Writing the record failed; nothing was changed
    UpstreamFailure(String),
}

/// What a flow step hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    Form(StepForm),
    CreateEntry {
        entry_id: String,
        title: String,
    },
    UpdateEntry {
        entry_id: String,
        title: String,
        reconcile: ReconcileReport,
        warnings: Vec<String>,
    },
    Abort {
        reason: AbortReason,
    },
}

impl FlowResult {
    pub fn form(&self) -> Option<&StepForm> {
        match self {
            FlowResult::Form(form) => Some(form),
            _ => None,
        }
    }
}
