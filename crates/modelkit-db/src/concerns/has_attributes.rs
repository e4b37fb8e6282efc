//! Attribute access: mutators, casts, dates, JSON paths and dirty tracking.
//!
//! Reads go raw value → get mutator (if any, and then nothing else) →
//! cast → date conversion. Writes go set mutator (if any, and then
//! nothing else) → date normalisation to the storage format → JSON
//! encoding for json-like casts → `column->path` routing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use modelkit_core::utils::text::snake_case;
use modelkit_core::{ModelError, ModelResult};

use crate::class::{ModelClass, CREATED_AT, UPDATED_AT};
use crate::model::Model;
use crate::traits::TraitBundle;
use crate::value::Value;

use super::string_args;

/// Storage format used when a class declares none.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static STANDARD_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid date pattern"));

static BUNDLE: Lazy<Arc<TraitBundle>> = Lazy::new(|| {
    TraitBundle::builder("HasAttributes")
        .property("snakeAttributes", Value::Bool(true))
        .method("getAttribute", |model, args| {
            model.get_attribute(&string_args(args).concat())
        })
        .method("setAttribute", |model, args| {
            let key = args.first().map(ToString::to_string).unwrap_or_default();
            let value = args.get(1).cloned().unwrap_or(Value::Null);
            model.set_attribute(&key, value)?;
            Ok(Value::Null)
        })
        .method("getOriginal", |model, args| {
            model.get_original(&string_args(args).concat())
        })
        .method("isDirty", |model, args| {
            let keys = string_args(args);
            Ok(Value::Bool(model.is_dirty(&as_strs(&keys))))
        })
        .method("isClean", |model, args| {
            let keys = string_args(args);
            Ok(Value::Bool(model.is_clean(&as_strs(&keys))))
        })
        .method("getDirty", |model, _| Ok(to_json_object(model.get_dirty())))
        .method("syncOriginal", |model, _| {
            model.sync_original();
            Ok(Value::Null)
        })
        .method("attributesToArray", |model, _| {
            Ok(Value::Json(serde_json::Value::Object(
                model.attributes_to_array()?,
            )))
        })
        .build()
});

/// The `HasAttributes` bundle.
pub fn bundle() -> Arc<TraitBundle> {
    Arc::clone(&BUNDLE)
}

fn as_strs(keys: &[String]) -> Vec<&str> {
    keys.iter().map(String::as_str).collect()
}

fn to_json_object(values: BTreeMap<String, Value>) -> Value {
    Value::Json(serde_json::Value::Object(
        values.into_iter().map(|(k, v)| (k, v.to_json())).collect(),
    ))
}

/// A parsed attribute cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cast {
    Int,
    Float,
    Decimal(usize),
    String,
    Bool,
    Json,
    Date,
    DateTime,
    CustomDateTime(String),
    Timestamp,
    /// A cast this layer does not know; values pass through unchanged.
    Other(String),
}

impl Cast {
    /// Parses a cast declaration such as `int`, `decimal:2` or
    /// `custom_datetime:%d/%m/%Y`.
    pub fn parse(key: &str, raw: &str) -> ModelResult<Self> {
        let raw = raw.trim();
        if let Some(format) = raw.strip_prefix("custom_datetime:") {
            return Ok(Self::CustomDateTime(format.to_string()));
        }
        if let Some(digits) = raw.strip_prefix("decimal:") {
            return digits
                .trim()
                .parse()
                .map(Self::Decimal)
                .map_err(|_| ModelError::InvalidCast {
                    key: key.to_string(),
                    cast: raw.to_string(),
                    message: "decimal precision must be a non-negative integer".to_string(),
                });
        }
        Ok(match raw.to_lowercase().as_str() {
            "int" | "integer" => Self::Int,
            "real" | "float" | "double" => Self::Float,
            "string" => Self::String,
            "bool" | "boolean" => Self::Bool,
            "object" | "array" | "json" | "collection" => Self::Json,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "timestamp" => Self::Timestamp,
            other => Self::Other(other.to_string()),
        })
    }

    const fn is_date(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::CustomDateTime(_))
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::List(items) => !items.is_empty(),
        Value::Json(json) => !matches!(json, serde_json::Value::Null | serde_json::Value::Bool(false)),
        Value::Date(_) | Value::DateTime(_) => true,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_number(),
    }
}

fn set_json_path(target: &mut serde_json::Value, path: &[&str], value: serde_json::Value) {
    let Some((first, rest)) = path.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() {
        *target = serde_json::Value::Object(serde_json::Map::new());
    }
    if let serde_json::Value::Object(map) = target {
        let entry = map
            .entry((*first).to_string())
            .or_insert(serde_json::Value::Null);
        set_json_path(entry, rest, value);
    }
}

impl ModelClass {
    /// Whether array keys of mutated attributes are snake cased.
    pub fn snake_attributes(&self) -> bool {
        self.property("snakeAttributes")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }
}

impl Model {
    // ── Reading ──────────────────────────────────────────────────────

    /// The raw attributes.
    pub const fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Returns an attribute, or `Null` if the model has neither the
    /// attribute nor a get mutator for it.
    pub fn get_attribute(&self, key: &str) -> ModelResult<Value> {
        if key.is_empty() {
            return Ok(Value::Null);
        }
        if self.attributes.contains_key(key) || self.has_get_mutator(key) {
            return self.get_attribute_value(key);
        }
        Ok(Value::Null)
    }

    /// Returns an attribute transformed by its mutator, cast or date
    /// handling.
    pub fn get_attribute_value(&self, key: &str) -> ModelResult<Value> {
        let value = self.attributes.get(key).cloned().unwrap_or(Value::Null);
        self.transform_value(key, value)
    }

    fn transform_value(&self, key: &str, value: Value) -> ModelResult<Value> {
        if let Some(mutator) = self.class().get_mutator(key) {
            return Ok(mutator(self, value));
        }
        if self.has_cast(key) {
            return self.cast_attribute(key, value);
        }
        if !value.is_null() && self.get_dates().iter().any(|d| d == key) {
            return self.as_date_time(key, &value).map(Value::DateTime);
        }
        Ok(value)
    }

    /// Returns `true` if the class has a get mutator for `key`.
    pub fn has_get_mutator(&self, key: &str) -> bool {
        self.class().get_mutator(key).is_some()
    }

    /// Returns `true` if the class has a set mutator for `key`.
    pub fn has_set_mutator(&self, key: &str) -> bool {
        self.class().set_mutator(key).is_some()
    }

    fn mutate_attribute(&self, key: &str, value: Value) -> Value {
        match self.class().get_mutator(key) {
            Some(mutator) => mutator(self, value),
            None => value,
        }
    }

    // ── Writing ──────────────────────────────────────────────────────

    /// Sets an attribute through its set mutator, date and JSON handling.
    pub fn set_attribute(&mut self, key: &str, value: Value) -> ModelResult<&mut Self> {
        let class = Arc::clone(self.class());
        if let Some(mutator) = class.set_mutator(key) {
            mutator(self, value)?;
            return Ok(self);
        }

        let mut value = value;
        if !value.is_null() && self.is_date_attribute(key) {
            value = self.from_date_time(key, &value)?;
        }
        if !value.is_null() && self.is_json_castable(key) {
            value = Value::String(serde_json::to_string(&value.to_json())?);
        }
        if key.contains("->") {
            return self.fill_json_attribute(key, value);
        }

        self.attributes.insert(key.to_string(), value);
        Ok(self)
    }

    /// Sets an attribute without any transformation.
    pub fn set_raw_attribute(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Replaces every attribute, optionally syncing the originals too.
    pub fn set_raw_attributes(&mut self, attributes: BTreeMap<String, Value>, sync: bool) -> &mut Self {
        self.attributes = attributes;
        if sync {
            self.sync_original();
        }
        self
    }

    /// Sets a nested value inside a JSON column: `options->theme->color`
    /// writes `color` under `theme` in the `options` column.
    pub fn fill_json_attribute(&mut self, key: &str, value: Value) -> ModelResult<&mut Self> {
        let mut segments = key.split("->");
        let column = segments.next().unwrap_or_default().to_string();
        let path: Vec<&str> = segments.collect();

        let mut root = match self.attributes.get(&column) {
            Some(Value::String(encoded)) if !encoded.is_empty() => serde_json::from_str(encoded)?,
            Some(Value::Json(json)) => json.clone(),
            _ => serde_json::Value::Object(serde_json::Map::new()),
        };
        set_json_path(&mut root, &path, value.to_json());

        self.attributes
            .insert(column, Value::String(serde_json::to_string(&root)?));
        Ok(self)
    }

    // ── Casts ────────────────────────────────────────────────────────

    /// The declared casts, including the primary key cast of incrementing
    /// models.
    pub fn get_casts(&self) -> BTreeMap<String, String> {
        let mut casts: BTreeMap<String, String> = self
            .meta
            .casts
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if self.meta.incrementing {
            casts
                .entry(self.meta.primary_key.clone())
                .or_insert_with(|| self.meta.key_type.clone());
        }
        casts
    }

    fn cast_for(&self, key: &str) -> ModelResult<Option<Cast>> {
        let declared = self.meta.casts.get(key).cloned().or_else(|| {
            (self.meta.incrementing && key == self.meta.primary_key)
                .then(|| self.meta.key_type.clone())
        });
        declared.map(|raw| Cast::parse(key, &raw)).transpose()
    }

    /// Returns `true` if `key` has a cast.
    pub fn has_cast(&self, key: &str) -> bool {
        self.meta.casts.contains_key(key)
            || (self.meta.incrementing && key == self.meta.primary_key)
    }

    /// Returns `true` if `key` is cast to a JSON-like type.
    pub fn is_json_castable(&self, key: &str) -> bool {
        matches!(self.cast_for(key), Ok(Some(Cast::Json)))
    }

    /// Casts `value` to the type declared for `key`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn cast_attribute(&self, key: &str, value: Value) -> ModelResult<Value> {
        let Some(cast) = self.cast_for(key)? else {
            return Ok(value);
        };
        if value.is_null() {
            return Ok(Value::Null);
        }
        let cast_name = self
            .meta
            .casts
            .get(key)
            .map_or(self.meta.key_type.as_str(), String::as_str);
        let invalid = |message: String| ModelError::InvalidCast {
            key: key.to_string(),
            cast: cast_name.to_string(),
            message,
        };

        match cast {
            Cast::Int => match value {
                Value::Int(i) => Ok(Value::Int(i)),
                other => numeric(&other)
                    .map(|n| Value::Int(n.trunc() as i64))
                    .ok_or_else(|| invalid(format!("{other} is not numeric"))),
            },
            Cast::Float => numeric(&value)
                .map(Value::Float)
                .ok_or_else(|| invalid(format!("{value} is not numeric"))),
            Cast::Decimal(places) => numeric(&value)
                .map(|n| Value::String(format!("{n:.places$}")))
                .ok_or_else(|| invalid(format!("{value} is not numeric"))),
            Cast::String => Ok(match value {
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            }),
            Cast::Bool => Ok(Value::Bool(truthy(&value))),
            Cast::Json => match value {
                Value::String(encoded) => serde_json::from_str(&encoded)
                    .map(Value::Json)
                    .map_err(|e| invalid(e.to_string())),
                Value::Json(json) => Ok(Value::Json(json)),
                other => Ok(Value::Json(other.to_json())),
            },
            Cast::Date => self
                .as_date_time(key, &value)
                .map(|dt| Value::Date(dt.date())),
            Cast::DateTime | Cast::CustomDateTime(_) => {
                self.as_date_time(key, &value).map(Value::DateTime)
            }
            Cast::Timestamp => self
                .as_date_time(key, &value)
                .map(|dt| Value::Int(dt.and_utc().timestamp())),
            Cast::Other(_) => Ok(value),
        }
    }

    // ── Dates ────────────────────────────────────────────────────────

    /// The attributes treated as dates, including the timestamp columns
    /// of timestamped models.
    pub fn get_dates(&self) -> Vec<String> {
        let mut dates = self.meta.dates.clone();
        if self.meta.timestamps {
            for column in [CREATED_AT, UPDATED_AT] {
                if !dates.iter().any(|d| d == column) {
                    dates.push(column.to_string());
                }
            }
        }
        dates
    }

    /// Returns `true` if `key` is a date attribute or has a date cast.
    pub fn is_date_attribute(&self, key: &str) -> bool {
        self.get_dates().iter().any(|d| d == key)
            || matches!(self.cast_for(key), Ok(Some(cast)) if cast.is_date())
    }

    /// The storage format of date columns.
    pub fn get_date_format(&self) -> &str {
        self.meta.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)
    }

    /// Sets the storage format of date columns.
    pub fn set_date_format(&mut self, format: impl Into<String>) -> &mut Self {
        self.meta.date_format = Some(format.into());
        self
    }

    /// Converts `value` to a date-time.
    ///
    /// Accepts date-times, dates, UNIX timestamps, `Y-m-d` strings and
    /// strings in the storage format, RFC 3339 or ISO 8601.
    pub fn as_date_time(&self, key: &str, value: &Value) -> ModelResult<NaiveDateTime> {
        let invalid = |message: String| ModelError::InvalidCast {
            key: key.to_string(),
            cast: "datetime".to_string(),
            message,
        };
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            Value::Int(ts) => DateTime::from_timestamp(*ts, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| invalid(format!("timestamp {ts} is out of range"))),
            Value::String(s) => self
                .parse_date_string(s)
                .ok_or_else(|| invalid(format!("unrecognised date [{s}]"))),
            other => Err(invalid(format!("{other} is not a date"))),
        }
    }

    fn parse_date_string(&self, s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        if STANDARD_DATE.is_match(s) {
            return NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN));
        }
        NaiveDateTime::parse_from_str(s, self.get_date_format())
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
            .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
            .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
    }

    /// Converts `value` to the storage string of a date column.
    pub fn from_date_time(&self, key: &str, value: &Value) -> ModelResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let dt = self.as_date_time(key, value)?;
        Ok(Value::String(dt.format(self.get_date_format()).to_string()))
    }

    fn serialize_date(&self, dt: NaiveDateTime) -> String {
        dt.format(self.get_date_format()).to_string()
    }

    // ── Array form ───────────────────────────────────────────────────

    /// The attributes as a JSON object: dates serialized, mutators and
    /// casts applied, appended accessors added.
    pub fn attributes_to_array(&self) -> ModelResult<serde_json::Map<String, serde_json::Value>> {
        let mut out = self.attributes.clone();

        for key in self.get_dates() {
            if let Some(value) = out.get(&key).filter(|v| !v.is_null()) {
                let dt = self.as_date_time(&key, value)?;
                out.insert(key, Value::String(self.serialize_date(dt)));
            }
        }

        // mutated names may be studly; the raw attribute is stored snake-cased
        let mut mutated = Vec::new();
        for key in self.class().mutated_attributes() {
            let source = if self.attributes.contains_key(key) {
                key.clone()
            } else {
                snake_case(key)
            };
            let Some(value) = self.attributes.get(&source) else {
                continue;
            };
            let value = self.mutate_attribute(key, value.clone());
            if source != *key {
                out.remove(&source);
            }
            out.insert(key.clone(), value);
            mutated.push(source);
        }

        for (key, raw) in self.get_casts() {
            if mutated.contains(&key) {
                continue;
            }
            let Some(value) = out.get(&key).cloned() else {
                continue;
            };
            let cast_value = match (self.cast_attribute(&key, value)?, Cast::parse(&key, &raw)?) {
                (Value::DateTime(dt), Cast::CustomDateTime(format)) => {
                    Value::String(dt.format(&format).to_string())
                }
                (Value::DateTime(dt), _) => Value::String(self.serialize_date(dt)),
                (other, _) => other,
            };
            out.insert(key, cast_value);
        }

        for key in &self.meta.appends {
            out.insert(key.clone(), self.mutate_attribute(key, Value::Null));
        }

        Ok(out.into_iter().map(|(k, v)| (k, v.to_json())).collect())
    }

    // ── Dirty tracking ───────────────────────────────────────────────

    /// Snapshots the current attributes as the originals.
    pub fn sync_original(&mut self) -> &mut Self {
        self.original = self.attributes.clone();
        self
    }

    /// Snapshots one attribute as its original.
    pub fn sync_original_attribute(&mut self, key: &str) -> &mut Self {
        match self.attributes.get(key) {
            Some(value) => {
                self.original.insert(key.to_string(), value.clone());
            }
            None => {
                self.original.remove(key);
            }
        }
        self
    }

    /// The original value of `key`, transformed like
    /// [`get_attribute`](Self::get_attribute).
    pub fn get_original(&self, key: &str) -> ModelResult<Value> {
        let value = self.original.get(key).cloned().unwrap_or(Value::Null);
        self.transform_value(key, value)
    }

    /// Every original attribute, untransformed.
    pub const fn get_raw_original(&self) -> &BTreeMap<String, Value> {
        &self.original
    }

    /// The attributes that changed since the last sync.
    pub fn get_dirty(&self) -> BTreeMap<String, Value> {
        self.attributes
            .iter()
            .filter(|(key, value)| !self.original_is_equivalent(key, value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// With no keys: whether anything is dirty. Otherwise whether any of
    /// `keys` is.
    pub fn is_dirty(&self, keys: &[&str]) -> bool {
        Self::has_changes(&self.get_dirty(), keys)
    }

    /// The opposite of [`is_dirty`](Self::is_dirty).
    pub fn is_clean(&self, keys: &[&str]) -> bool {
        !self.is_dirty(keys)
    }

    /// Records the current dirty attributes as the last changes.
    pub fn sync_changes(&mut self) -> &mut Self {
        self.changes = self.get_dirty();
        self
    }

    /// Whether any of `keys` (or anything, with no keys) changed in the
    /// last synced change set.
    pub fn was_changed(&self, keys: &[&str]) -> bool {
        Self::has_changes(&self.changes, keys)
    }

    /// The last synced change set.
    pub const fn get_changes(&self) -> &BTreeMap<String, Value> {
        &self.changes
    }

    fn has_changes(changes: &BTreeMap<String, Value>, keys: &[&str]) -> bool {
        if keys.is_empty() {
            return !changes.is_empty();
        }
        keys.iter().any(|key| changes.contains_key(*key))
    }

    fn original_is_equivalent(&self, key: &str, current: &Value) -> bool {
        let Some(original) = self.original.get(key) else {
            return false;
        };
        if current == original {
            return true;
        }
        if current.is_null() || original.is_null() {
            return false;
        }
        if self.is_date_attribute(key) {
            return match (self.as_date_time(key, current), self.as_date_time(key, original)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
        }
        if self.has_cast(key) {
            if let (Ok(a), Ok(b)) = (
                self.cast_attribute(key, current.clone()),
                self.cast_attribute(key, original.clone()),
            ) {
                return a == b;
            }
        }
        matches!(
            (current.as_number(), original.as_number()),
            (Some(a), Some(b)) if (a - b).abs() < f64::EPSILON
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::registry::ModelRegistry;
    use serde_json::json;

    fn open(builder: ClassBuilder) -> Model {
        let registry = ModelRegistry::new();
        let class = registry.define(builder.guarded(Vec::<String>::new()));
        Model::new(&class).unwrap()
    }

    #[test]
    fn test_missing_attribute_is_null() {
        let m = open(ModelClass::builder("User"));
        assert_eq!(m.get_attribute("nope").unwrap(), Value::Null);
        assert_eq!(m.get_attribute("").unwrap(), Value::Null);
    }

    #[test]
    fn test_scalar_casts() {
        let mut m = open(
            ModelClass::builder("Product")
                .cast("qty", "integer")
                .cast("price", "float")
                .cast("total", "decimal:2")
                .cast("active", "boolean")
                .cast("code", "string"),
        );
        m.set_attribute("qty", Value::from("12.7")).unwrap();
        m.set_attribute("price", Value::from("9.5")).unwrap();
        m.set_attribute("total", Value::from(1.239)).unwrap();
        m.set_attribute("active", Value::from("0")).unwrap();
        m.set_attribute("code", Value::from(42)).unwrap();

        assert_eq!(m.get_attribute("qty").unwrap(), Value::Int(12));
        assert_eq!(m.get_attribute("price").unwrap(), Value::Float(9.5));
        assert_eq!(m.get_attribute("total").unwrap(), Value::from("1.24"));
        assert_eq!(m.get_attribute("active").unwrap(), Value::Bool(false));
        assert_eq!(m.get_attribute("code").unwrap(), Value::from("42"));
    }

    #[test]
    fn test_invalid_int_cast_errors() {
        let mut m = open(ModelClass::builder("Product").cast("qty", "int"));
        m.set_attribute("qty", Value::from("many")).unwrap();
        let err = m.get_attribute("qty").unwrap_err();
        assert!(matches!(err, ModelError::InvalidCast { ref key, .. } if key == "qty"));
    }

    #[test]
    fn test_bad_decimal_precision_errors() {
        let m = open(ModelClass::builder("Product").cast("total", "decimal:x"));
        assert!(m.cast_attribute("total", Value::Int(1)).is_err());
    }

    #[test]
    fn test_json_cast_encodes_on_write_and_decodes_on_read() {
        let mut m = open(ModelClass::builder("User").cast("options", "array"));
        m.set_attribute("options", Value::Json(json!({"theme": "dark"})))
            .unwrap();

        assert_eq!(
            m.attributes().get("options"),
            Some(&Value::from(r#"{"theme":"dark"}"#))
        );
        assert_eq!(
            m.get_attribute("options").unwrap(),
            Value::Json(json!({"theme": "dark"}))
        );
    }

    #[test]
    fn test_fill_json_attribute_sets_nested_path() {
        let mut m = open(ModelClass::builder("User").cast("options", "json"));
        m.set_attribute("options", Value::Json(json!({"theme": "dark"})))
            .unwrap();
        m.set_attribute("options->notify->email", Value::Bool(true))
            .unwrap();

        assert_eq!(
            m.get_attribute("options").unwrap(),
            Value::Json(json!({"theme": "dark", "notify": {"email": true}}))
        );
    }

    #[test]
    fn test_primary_key_is_cast_for_incrementing_models() {
        let mut m = open(ModelClass::builder("User"));
        m.set_attribute("id", Value::from("5")).unwrap();
        assert_eq!(m.get_attribute("id").unwrap(), Value::Int(5));

        let mut uuid = open(ModelClass::builder("Token").incrementing(false));
        uuid.set_attribute("id", Value::from("abc")).unwrap();
        assert_eq!(uuid.get_attribute("id").unwrap(), Value::from("abc"));
    }

    #[test]
    fn test_dates_are_stored_in_date_format() {
        let mut m = open(ModelClass::builder("Post").dates(["published_at"]));
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        m.set_attribute("published_at", Value::DateTime(dt)).unwrap();

        assert_eq!(
            m.attributes().get("published_at"),
            Some(&Value::from("2024-03-01 08:30:00"))
        );
        assert_eq!(m.get_attribute("published_at").unwrap(), Value::DateTime(dt));
    }

    #[test]
    fn test_timestamps_are_dates() {
        let m = open(ModelClass::builder("Post"));
        assert!(m.is_date_attribute(CREATED_AT));
        assert!(m.is_date_attribute(UPDATED_AT));

        let plain = open(ModelClass::builder("Log").timestamps(false));
        assert!(!plain.is_date_attribute(CREATED_AT));
    }

    #[test]
    fn test_standard_date_and_timestamp_inputs() {
        let m = open(ModelClass::builder("Post"));
        let midnight = m.as_date_time("d", &Value::from("2024-01-15")).unwrap();
        assert_eq!(midnight.to_string(), "2024-01-15 00:00:00");

        let epoch = m.as_date_time("d", &Value::Int(0)).unwrap();
        assert_eq!(epoch.to_string(), "1970-01-01 00:00:00");

        assert!(m.as_date_time("d", &Value::from("yesterday")).is_err());
    }

    #[test]
    fn test_date_casts() {
        let mut m = open(
            ModelClass::builder("Event")
                .cast("day", "date")
                .cast("at", "timestamp")
                .cast("shown", "custom_datetime:%d/%m/%Y"),
        );
        m.set_attribute("day", Value::from("2024-01-15 10:00:00")).unwrap();
        m.set_attribute("at", Value::from("1970-01-02 00:00:00")).unwrap();
        m.set_attribute("shown", Value::from("2024-01-15")).unwrap();

        assert_eq!(
            m.get_attribute("day").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(m.get_attribute("at").unwrap(), Value::Int(86_400));

        let array = m.attributes_to_array().unwrap();
        assert_eq!(array["day"], json!("2024-01-15"));
        assert_eq!(array["shown"], json!("15/01/2024"));
        assert_eq!(array["at"], json!(86_400));
    }

    #[test]
    fn test_mutators() {
        let registry = ModelRegistry::new();
        let class = registry.define(
            ModelClass::builder("User")
                .guarded(Vec::<String>::new())
                .get_mutator("first_name", |_, value| {
                    Value::String(value.to_string().to_uppercase())
                })
                .set_mutator("first_name", |model, value| {
                    model.set_raw_attribute("first_name", Value::String(value.to_string().trim().to_string()));
                    Ok(())
                })
                .get_mutator("full_name", |model, _| {
                    Value::String(format!(
                        "{} {}",
                        model.attributes().get("first_name").map(ToString::to_string).unwrap_or_default(),
                        model.attributes().get("last_name").map(ToString::to_string).unwrap_or_default(),
                    ))
                })
                .append("full_name"),
        );
        let mut m = Model::with_attributes(&class, [("first_name", "  ada "), ("last_name", "lovelace")])
            .unwrap();

        assert!(m.has_get_mutator("firstName"));
        assert!(m.has_set_mutator("first_name"));
        assert_eq!(m.attributes().get("first_name"), Some(&Value::from("ada")));
        assert_eq!(m.get_attribute("first_name").unwrap(), Value::from("ADA"));
        assert_eq!(class.mutated_attributes(), ["first_name", "full_name"]);

        let array = m.attributes_to_array().unwrap();
        assert_eq!(array["first_name"], json!("ADA"));
        assert_eq!(array["full_name"], json!("ada lovelace"));

        m.set_attribute("last_name", Value::from("byron")).unwrap();
        assert_eq!(m.get_attribute("full_name").unwrap(), Value::from("ada byron"));
    }

    #[test]
    fn test_array_form_without_snake_attributes() {
        let settings = modelkit_core::Settings {
            snake_attributes: false,
            ..modelkit_core::Settings::default()
        };
        let registry = ModelRegistry::with_settings(settings);
        let class = registry.define(
            ModelClass::builder("User")
                .guarded(Vec::<String>::new())
                .get_mutator("first_name", |_, value| {
                    Value::String(value.to_string().to_uppercase())
                }),
        );
        let m = Model::with_attributes(&class, [("first_name", "ada")]).unwrap();

        assert_eq!(class.mutated_attributes(), ["FirstName"]);
        let array = m.attributes_to_array().unwrap();
        assert_eq!(array["FirstName"], json!("ADA"));
        assert!(!array.contains_key("first_name"));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut m = open(ModelClass::builder("User"));
        m.set_raw_attribute("name", Value::from("a"));
        m.set_raw_attribute("age", Value::Int(30));
        m.sync_original();
        assert!(m.is_clean(&[]));

        m.set_attribute("name", Value::from("b")).unwrap();
        assert!(m.is_dirty(&[]));
        assert!(m.is_dirty(&["name"]));
        assert!(m.is_clean(&["age"]));
        assert_eq!(m.get_original("name").unwrap(), Value::from("a"));

        m.sync_changes();
        assert!(m.was_changed(&["name"]));
        assert!(!m.was_changed(&["age"]));
        assert_eq!(m.get_changes().len(), 1);

        m.sync_original_attribute("name");
        assert!(m.is_clean(&[]));
    }

    #[test]
    fn test_numeric_and_cast_equivalence_is_clean() {
        let mut m = open(
            ModelClass::builder("User")
                .cast("settings", "json")
                .dates(["seen_at"]),
        );
        m.set_raw_attribute("age", Value::Int(30));
        m.set_raw_attribute("settings", Value::from(r#"{"a":1,"b":2}"#));
        m.set_raw_attribute("seen_at", Value::from("2024-01-15 00:00:00"));
        m.sync_original();

        m.set_raw_attribute("age", Value::from("30"));
        m.set_raw_attribute("settings", Value::from(r#"{"b":2,"a":1}"#));
        m.set_raw_attribute("seen_at", Value::from("2024-01-15"));
        assert!(m.is_clean(&[]), "dirty: {:?}", m.get_dirty());

        m.set_raw_attribute("age", Value::from("31"));
        assert_eq!(m.get_dirty().keys().collect::<Vec<_>>(), vec!["age"]);
    }

    #[test]
    fn test_members_callable_by_name() {
        let mut m = open(ModelClass::builder("User"));
        m.call("setAttribute", &[Value::from("name"), Value::from("Ada")])
            .unwrap();
        assert_eq!(
            m.call("getAttribute", &[Value::from("name")]).unwrap(),
            Value::from("Ada")
        );
        assert_eq!(
            m.call("isDirty", &[Value::from("name")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            m.call("getDirty", &[]).unwrap(),
            Value::Json(json!({"name": "Ada"}))
        );
        m.call("syncOriginal", &[]).unwrap();
        assert_eq!(m.call("isClean", &[]).unwrap(), Value::Bool(true));
        assert!(m.class().snake_attributes());
    }
}
