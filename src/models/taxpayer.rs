use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registry partition a taxpayer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxpayerKind {
    Individual,
    NonIndividual,
}

impl TaxpayerKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "individual" => Some(TaxpayerKind::Individual),
            "non-individual" => Some(TaxpayerKind::NonIndividual),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaxpayerKind::Individual => "individual",
            TaxpayerKind::NonIndividual => "non-individual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndividualTaxpayer {
    pub tin: Option<Value>,
    pub first_name: Option<Value>,
    pub middle_name: Option<Value>,
    pub last_name: Option<Value>,
    pub phone_no: Option<Value>,
    pub email: Option<Value>,
    pub date_of_birth: Option<Value>,
    pub date_of_registration: Option<Value>,
    pub tax_authority: Option<Value>,
    pub tax_office: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NonIndividualTaxpayer {
    pub tin: Option<Value>,
    pub registered_name: Option<Value>,
    pub registration_number: Option<Value>,
    pub phone_no: Option<Value>,
    pub email: Option<Value>,
    pub date_of_incorporation: Option<Value>,
    pub date_of_registration: Option<Value>,
    pub tax_authority: Option<Value>,
    pub tax_office: Option<Value>,
}

/// A verified taxpayer, serialized flat (no variant tag).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaxpayerProfile {
    Individual(IndividualTaxpayer),
    NonIndividual(NonIndividualTaxpayer),
}

impl TaxpayerProfile {
    /// Individuals are recognised by the presence of `first_name`.
    pub fn from_upstream(taxpayer: &Value) -> Self {
        let field = |name: &str| taxpayer.get(name).filter(|v| !v.is_null()).cloned();

        if taxpayer.get("first_name").is_some() {
            TaxpayerProfile::Individual(IndividualTaxpayer {
                tin: field("tin"),
                first_name: field("first_name"),
                middle_name: field("middle_name"),
                last_name: field("last_name"),
                phone_no: field("phone_no"),
                email: field("email"),
                date_of_birth: field("date_of_birth"),
                date_of_registration: field("date_of_registration"),
                tax_authority: field("tax_authority"),
                tax_office: field("tax_office"),
            })
        } else {
            TaxpayerProfile::NonIndividual(NonIndividualTaxpayer {
                tin: field("tin"),
                registered_name: field("registered_name"),
                registration_number: field("registration_number"),
                phone_no: field("phone_no"),
                email: field("email"),
                date_of_incorporation: field("date_of_incorporation"),
                date_of_registration: field("date_of_registration"),
                tax_authority: field("tax_authority"),
                tax_office: field("tax_office"),
            })
        }
    }
}

pub const VERIFIED_CODE: &str = "001";
pub const NO_RECORD_CODES: &[&str] = &["003", "004", "005"];

/// Classification of a TIN validation reply.
#[derive(Debug, Clone, PartialEq)]
pub enum TinOutcome {
    Verified(TaxpayerProfile),
    NoRecord(String),
    Failed(String),
}

impl TinOutcome {
    pub fn from_upstream(body: &Value) -> Self {
        let code = match body.get("ResponseCode") {
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) => n.as_u64().map(|v| format!("{:03}", v)),
            _ => None,
        };
        let description = body
            .get("ResponseDescription")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        match code.as_deref() {
            Some(VERIFIED_CODE) => {
                let empty = Value::Object(Default::default());
                let taxpayer = body.get("Taxpayer").unwrap_or(&empty);
                TinOutcome::Verified(TaxpayerProfile::from_upstream(taxpayer))
            }
            Some(c) if NO_RECORD_CODES.contains(&c) => {
                TinOutcome::NoRecord(description.unwrap_or_else(|| "No record found.".into()))
            }
            _ => TinOutcome::Failed(description.unwrap_or_else(|| "Verification failed.".into())),
        }
    }
}
