//! Validated payloads forwarded to the registry.
//!
//! Submissions are pass-through: only presence, scalar type, and date fields
//! are checked. Every other key reaches the registry untouched.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::{AppError, FieldErrors};
use crate::models::taxpayer::TaxpayerKind;
use crate::proxy::dates::{parse_flexible, DateStyle};

const TAX_RECORD_REQUIRED: &[&str] = &[
    "jtb_tin",
    "tcc_number",
    "tax_period",
    "turnover",
    "assessable_profit",
    "total_profit",
    "tax_payable",
    "tax_paid",
    "tax_type",
    "tax_authority",
    "EmployerName",
    "TaxPayerAddress",
    "TaxPayerName",
    "Sourceofincome",
];
const TAX_RECORD_DATES: &[&str] = &["payment_date", "expirydate"];

const ASSET_REQUIRED: &[&str] = &["tin", "location", "asset_type", "asset_value", "description"];
const ASSET_DATES: &[&str] = &["date_acquired"];

/// A tax record ready for `SBIR/AddTaxRecord`.
#[derive(Debug, Clone)]
pub struct TaxRecordSubmission {
    fields: Map<String, Value>,
    dates: Vec<(&'static str, NaiveDate)>,
}

impl TaxRecordSubmission {
    pub fn from_json(body: Map<String, Value>) -> Result<Self, AppError> {
        let dates = validate(&body, TAX_RECORD_REQUIRED, TAX_RECORD_DATES)?;
        Ok(Self { fields: body, dates })
    }

    /// Body sent upstream, dates as `dd-mm-yyyy`.
    pub fn to_upstream_body(&self) -> Map<String, Value> {
        with_dates(&self.fields, &self.dates, DateStyle::Dashed)
    }
}

/// An asset ready for `SBIR/AddAssetDetails`.
#[derive(Debug, Clone)]
pub struct AssetSubmission {
    fields: Map<String, Value>,
    dates: Vec<(&'static str, NaiveDate)>,
}

impl AssetSubmission {
    pub fn from_json(body: Map<String, Value>) -> Result<Self, AppError> {
        let dates = validate(&body, ASSET_REQUIRED, ASSET_DATES)?;
        Ok(Self { fields: body, dates })
    }

    /// Body sent upstream, `date_acquired` as `dd/mm/yyyy`.
    pub fn to_upstream_body(&self) -> Map<String, Value> {
        with_dates(&self.fields, &self.dates, DateStyle::Slashed)
    }
}

/// `{fromDate, toDate}` for the taxpayer list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListTaxpayersRequest {
    #[serde(rename = "fromDate", default)]
    pub from_date: Option<Value>,
    #[serde(rename = "toDate", default)]
    pub to_date: Option<Value>,
}

impl ListTaxpayersRequest {
    pub fn validate(&self) -> Result<(NaiveDate, NaiveDate), AppError> {
        let mut errors = FieldErrors::new();
        let from = check_date("fromDate", self.from_date.as_ref(), &mut errors);
        let to = check_date("toDate", self.to_date.as_ref(), &mut errors);
        if let (Some(from), Some(to)) = (from, to) {
            if to < from {
                push(&mut errors, "toDate", "The toDate must be a date after or equal to fromDate.");
            } else {
                return Ok((from, to));
            }
        }
        Err(AppError::Validation(errors))
    }
}

/// `{tin}` for the session-scoped verification endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyTinRequest {
    #[serde(default)]
    pub tin: Option<Value>,
}

impl VerifyTinRequest {
    pub fn validate(&self) -> Result<String, AppError> {
        required_string("tin", self.tin.as_ref())
    }
}

/// `{tin, type}` for the API-token gated verification endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct GatedVerifyRequest {
    #[serde(default)]
    pub tin: Option<Value>,
    #[serde(rename = "type", default)]
    pub kind: Option<Value>,
}

impl GatedVerifyRequest {
    pub fn validate(&self) -> Result<(TaxpayerKind, String), AppError> {
        let mut errors = FieldErrors::new();

        let tin = match required_string("tin", self.tin.as_ref()) {
            Ok(tin) => Some(tin),
            Err(AppError::Validation(e)) => {
                errors.extend(e);
                None
            }
            Err(e) => return Err(e),
        };

        let kind = match self.kind.as_ref() {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                let kind = TaxpayerKind::parse(s);
                if kind.is_none() {
                    push(&mut errors, "type", "The selected type is invalid.");
                }
                kind
            }
            _ => {
                push(&mut errors, "type", "The type field is required.");
                None
            }
        };

        match (kind, tin) {
            (Some(kind), Some(tin)) => Ok((kind, tin)),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

/// Reads a required non-blank string field.
pub fn required_string(name: &str, value: Option<&Value>) -> Result<String, AppError> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            Err(AppError::field(name, format!("The {} field is required.", name)))
        }
        Some(_) => Err(AppError::field(name, format!("The {} field must be a string.", name))),
    }
}

fn validate(
    body: &Map<String, Value>,
    required: &[&str],
    date_fields: &[&'static str],
) -> Result<Vec<(&'static str, NaiveDate)>, AppError> {
    let mut errors = FieldErrors::new();

    for name in required {
        match body.get(*name) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::Number(_)) => {}
            Some(Value::String(_)) | Some(Value::Null) | None => {
                push(&mut errors, name, &format!("The {} field is required.", name));
            }
            Some(_) => {
                push(&mut errors, name, &format!("The {} field must be a string or number.", name));
            }
        }
    }

    let dates: Vec<_> = date_fields
        .iter()
        .filter_map(|name| check_date(name, body.get(*name), &mut errors).map(|d| (*name, d)))
        .collect();

    if errors.is_empty() {
        Ok(dates)
    } else {
        Err(AppError::Validation(errors))
    }
}

fn check_date(name: &str, value: Option<&Value>, errors: &mut FieldErrors) -> Option<NaiveDate> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            let parsed = parse_flexible(s);
            if parsed.is_none() {
                push(errors, name, &format!("The {} field must be a valid date.", name));
            }
            parsed
        }
        _ => {
            push(errors, name, &format!("The {} field is required.", name));
            None
        }
    }
}

fn with_dates(
    fields: &Map<String, Value>,
    dates: &[(&'static str, NaiveDate)],
    style: DateStyle,
) -> Map<String, Value> {
    let mut body = fields.clone();
    for (name, date) in dates {
        body.insert((*name).to_string(), Value::String(style.format(*date)));
    }
    body
}

fn push(errors: &mut FieldErrors, name: &str, message: &str) {
    errors
        .entry(name.to_string())
        .or_default()
        .push(message.to_string());
}
