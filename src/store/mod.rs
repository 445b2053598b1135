//! Record storage — schema-validated flat records with assigned ids.
//!
//! The cache wraps reads against this narrow contract: [`RecordStore`]
//! (`save`/`get`/`all_ids`). Records are flat field maps described by an
//! explicit [`RecordSchema`] — field name, kind, required or optional —
//! checked once at record construction. Primary keys are not client
//! supplied; [`RecordStore::save`] assigns a time-ordered UUIDv7.
//!
//! Two implementations: [`MemoryRecordStore`] for tests and
//! [`RedisRecordStore`], which persists each record as a Redis hash.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use async_trait::async_trait;

pub mod memory;
pub mod redis;

pub use memory::MemoryRecordStore;
pub use redis::RedisRecordStore;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

/// A typed record construction failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record body must be a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("field `{field}` is not a valid {expected}: {reason}")]
    InvalidField {
        field: String,
        expected: &'static str,
        reason: String,
    },
}

/// Record store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record `{0}` not found")]
    NotFound(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("stored record is malformed: {0}")]
    Corrupt(#[source] ValidationError),
}

/// The kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form text.
    Text,
    /// Signed integer; numeric strings are coerced.
    Integer,
    /// ISO-8601 calendar date (`2020-01-02`).
    Date,
    /// Text matching a basic email shape.
    Email,
}

impl FieldKind {
    fn expected(self) -> &'static str {
        match self {
            Self::Text => "text value",
            Self::Integer => "integer",
            Self::Date => "ISO-8601 date",
            Self::Email => "email address",
        }
    }
}

/// One field in a schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    required: bool,
}

impl FieldSpec {
    /// A field that must be present.
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// A field that may be absent.
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// A validated field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
}

impl FieldValue {
    /// The documented, lossless string form: text verbatim, integers in
    /// decimal, dates as ISO-8601. Equal logical values always canonicalize
    /// identically — this is what gets persisted.
    pub fn canonical(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(n) => serde_json::Value::Number((*n).into()),
            Self::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Describes the fields of one record type and validates candidates.
///
/// # Examples
///
/// ```
/// use cachet::store::{FieldKind, FieldSpec, RecordSchema};
///
/// let schema = RecordSchema::new("customer")
///     .field(FieldSpec::required("email", FieldKind::Email))
///     .field(FieldSpec::optional("bio", FieldKind::Text));
///
/// let record = schema
///     .validate(&serde_json::json!({"email": "a@example.com"}))
///     .unwrap();
/// assert_eq!(record.canonical("email"), Some("a@example.com".to_owned()));
/// ```
#[derive(Debug, Clone)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Creates an empty schema named `name` (used as the storage prefix).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Returns the schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates a JSON object into a typed [`Record`].
    ///
    /// Unknown fields are ignored, matching the permissive intake of the
    /// original hash-record model. Numeric strings coerce to integers.
    ///
    /// # Errors
    ///
    /// The first [`ValidationError`] encountered, in schema field order.
    pub fn validate(&self, body: &serde_json::Value) -> Result<Record, ValidationError> {
        let object = body.as_object().ok_or(ValidationError::NotAnObject)?;

        let mut values = BTreeMap::new();
        for spec in &self.fields {
            match object.get(&spec.name) {
                None | Some(serde_json::Value::Null) => {
                    if spec.required {
                        return Err(ValidationError::MissingField(spec.name.clone()));
                    }
                }
                Some(value) => {
                    values.insert(spec.name.clone(), check_field(spec, value)?);
                }
            }
        }

        Ok(Record { values })
    }

    /// Rebuilds a typed [`Record`] from persisted canonical strings.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] when a stored value no longer parses under its
    /// field kind (the store surfaces this as
    /// [`StoreError::Corrupt`]).
    pub fn from_canonical<'a>(
        &self,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Record, ValidationError> {
        let stored: BTreeMap<&str, &str> = fields.into_iter().collect();

        let mut values = BTreeMap::new();
        for spec in &self.fields {
            match stored.get(spec.name.as_str()) {
                None => {
                    if spec.required {
                        return Err(ValidationError::MissingField(spec.name.clone()));
                    }
                }
                Some(raw) => {
                    values.insert(spec.name.clone(), parse_canonical(spec, raw)?);
                }
            }
        }

        Ok(Record { values })
    }
}

// Validate one JSON value against its field spec.
fn check_field(spec: &FieldSpec, value: &serde_json::Value) -> Result<FieldValue, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidField {
        field: spec.name.clone(),
        expected: spec.kind.expected(),
        reason,
    };

    match spec.kind {
        FieldKind::Text => match value.as_str() {
            Some(s) => Ok(FieldValue::Text(s.to_owned())),
            None => Err(invalid(format!("got {value}"))),
        },
        FieldKind::Integer => {
            if let Some(n) = value.as_i64() {
                return Ok(FieldValue::Integer(n));
            }
            match value.as_str() {
                Some(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(FieldValue::Integer)
                    .map_err(|e| invalid(e.to_string())),
                None => Err(invalid(format!("got {value}"))),
            }
        }
        FieldKind::Date => match value.as_str() {
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|e| invalid(e.to_string())),
            None => Err(invalid(format!("got {value}"))),
        },
        FieldKind::Email => match value.as_str() {
            Some(s) if EMAIL_RE.is_match(s) => Ok(FieldValue::Text(s.to_owned())),
            Some(s) => Err(invalid(format!("`{s}` does not look like an email"))),
            None => Err(invalid(format!("got {value}"))),
        },
    }
}

// Parse one persisted canonical string back into its typed value.
fn parse_canonical(spec: &FieldSpec, raw: &str) -> Result<FieldValue, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidField {
        field: spec.name.clone(),
        expected: spec.kind.expected(),
        reason,
    };

    match spec.kind {
        FieldKind::Text | FieldKind::Email => Ok(FieldValue::Text(raw.to_owned())),
        FieldKind::Integer => raw
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|e| invalid(e.to_string())),
        FieldKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(FieldValue::Date)
            .map_err(|e| invalid(e.to_string())),
    }
}

/// A validated record: typed field values in deterministic (name) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Returns a field's typed value.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Returns a field's canonical string form.
    pub fn canonical(&self, name: &str) -> Option<String> {
        self.values.get(name).map(FieldValue::canonical)
    }

    /// Iterates `(name, canonical value)` pairs in name order — the shape
    /// persisted by hash-backed stores.
    pub fn canonical_fields(&self) -> impl Iterator<Item = (&str, String)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.canonical()))
    }

    /// Renders the record as a JSON object, optionally with its primary
    /// key under `"pk"`.
    pub fn to_json(&self, pk: Option<&str>) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        if let Some(pk) = pk {
            object.insert("pk".to_owned(), serde_json::Value::String(pk.to_owned()));
        }
        for (name, value) in &self.values {
            object.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(object)
    }
}

/// Mints a fresh record id: a time-ordered UUIDv7, so listing ids roughly
/// follows insertion order.
pub(crate) fn new_record_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Async contract for durable record storage.
///
/// The response cache only ever wraps *reads* of this contract; creating
/// records goes straight through.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists `record`, assigning and returning its primary key.
    async fn save(&self, record: Record) -> Result<String, StoreError>;

    /// Fetches a record by primary key.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no record has this key.
    async fn get(&self, id: &str) -> Result<Record, StoreError>;

    /// Lists all primary keys.
    async fn all_ids(&self) -> Result<Vec<String>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer_schema() -> RecordSchema {
        RecordSchema::new("customer")
            .field(FieldSpec::required("first_name", FieldKind::Text))
            .field(FieldSpec::required("last_name", FieldKind::Text))
            .field(FieldSpec::required("email", FieldKind::Email))
            .field(FieldSpec::required("join_date", FieldKind::Date))
            .field(FieldSpec::required("age", FieldKind::Integer))
            .field(FieldSpec::optional("bio", FieldKind::Text))
    }

    fn valid_body() -> serde_json::Value {
        json!({
            "first_name": "Andrew",
            "last_name": "Brookins",
            "email": "a@example.com",
            "join_date": "2020-01-02",
            "age": "38",
        })
    }

    #[test]
    fn valid_record_passes() {
        let record = customer_schema().validate(&valid_body()).unwrap();
        assert_eq!(record.get("age"), Some(&FieldValue::Integer(38)));
        assert_eq!(record.canonical("join_date"), Some("2020-01-02".to_owned()));
        assert_eq!(record.get("bio"), None);
    }

    #[test]
    fn numeric_string_coerces_to_integer() {
        let record = customer_schema().validate(&valid_body()).unwrap();
        // "38" came in as a string.
        assert_eq!(record.canonical("age"), Some("38".to_owned()));
    }

    #[test]
    fn missing_required_field_fails() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("email");
        assert_eq!(
            customer_schema().validate(&body),
            Err(ValidationError::MissingField("email".to_owned()))
        );
    }

    #[test]
    fn bad_email_fails() {
        let mut body = valid_body();
        body["email"] = json!("not-an-email");
        assert!(matches!(
            customer_schema().validate(&body),
            Err(ValidationError::InvalidField { field, .. }) if field == "email"
        ));
    }

    #[test]
    fn bad_date_fails() {
        let mut body = valid_body();
        body["join_date"] = json!("02/01/2020");
        assert!(matches!(
            customer_schema().validate(&body),
            Err(ValidationError::InvalidField { field, .. }) if field == "join_date"
        ));
    }

    #[test]
    fn non_numeric_age_fails() {
        let mut body = valid_body();
        body["age"] = json!("thirty-eight");
        assert!(matches!(
            customer_schema().validate(&body),
            Err(ValidationError::InvalidField { field, .. }) if field == "age"
        ));
    }

    #[test]
    fn non_object_body_fails() {
        assert_eq!(
            customer_schema().validate(&json!([1, 2])),
            Err(ValidationError::NotAnObject)
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut body = valid_body();
        body["favorite_color"] = json!("teal");
        let record = customer_schema().validate(&body).unwrap();
        assert_eq!(record.get("favorite_color"), None);
    }

    #[test]
    fn canonical_round_trip() {
        let schema = customer_schema();
        let record = schema.validate(&valid_body()).unwrap();

        let persisted: Vec<(String, String)> = record
            .canonical_fields()
            .map(|(n, v)| (n.to_owned(), v))
            .collect();
        let reloaded = schema
            .from_canonical(persisted.iter().map(|(n, v)| (n.as_str(), v.as_str())))
            .unwrap();

        assert_eq!(reloaded, record);
    }

    #[test]
    fn to_json_renders_typed_values() {
        let record = customer_schema().validate(&valid_body()).unwrap();
        let rendered = record.to_json(Some("01ABC"));
        assert_eq!(rendered["pk"], "01ABC");
        assert_eq!(rendered["age"], 38); // number, not string
        assert_eq!(rendered["join_date"], "2020-01-02");
    }

    #[test]
    fn record_ids_are_unique_v7() {
        let a = new_record_id();
        let b = new_record_id();
        assert_ne!(a, b);
        assert_eq!(uuid::Uuid::parse_str(&a).unwrap().get_version_num(), 7);
    }
}
