use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Filter criteria collected by the search form and posted to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SearchCriteria {
    #[validate(length(min = 1, message = "niche must not be empty"))]
    pub niche: String,

    pub max_traffic: u64,

    #[validate(range(max = 100))]
    pub max_da: u32,

    #[validate(range(max = 100))]
    pub max_dr: u32,

    #[validate(range(max = 100))]
    pub min_spam_score: u32,

    #[serde(default)]
    pub keywords: String,

    #[validate(range(min = 1, max = 1000))]
    pub amount: u32,
}

/// One candidate website returned by the webhook.
///
/// The element is kept exactly as the webhook sent it; the accessors only
/// interpret it for display and never fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRecord(Value);

impl ResultRecord {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_raw(self) -> Value {
        self.0
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Field as display text: strings unquoted, absent or null as empty.
    pub fn text(&self, name: &str) -> String {
        match self.field(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(Value::as_f64)
    }

    pub fn url(&self) -> String {
        self.text("url")
    }

    pub fn country(&self) -> String {
        self.text("country")
    }

    pub fn is_match(&self) -> bool {
        matches!(self.field("match"), Some(Value::Bool(true)))
    }
}

impl From<Value> for ResultRecord {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}
