use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use ulid::Ulid;

pub const INVALID_PACKAGING_TYPE: &str = "Invalid packaging type";
pub const INVALID_AMOUNT: &str = "Amount must be a positive number";
pub const MISSING_UNIT: &str = "Unit is required";
pub const INVALID_PACK_DETAILS: &str =
    "packSize and packUnit are required and must be valid for pack-type packaging";
pub const ITEM_NOT_FOUND: &str = "Item not found";
pub const USER_NOT_FOUND: &str = "User not found";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum InventoryError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
}

impl InventoryError {
    fn validation(message: &str) -> Self {
        Self::Validation(message.to_string())
    }
}

macro_rules! ulid_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash,
        )]
        pub struct $name(pub Ulid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Parse a canonical ULID string; `None` when malformed.
            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                Ulid::from_string(raw.trim()).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(ItemId);
ulid_id!(PackagingId);
ulid_id!(UserId);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PackagingType {
    Base,
    Pack,
}

impl PackagingType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Pack => "pack",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "base" => Some(Self::Base),
            "pack" => Some(Self::Pack),
            _ => None,
        }
    }

    /// Parse a client-supplied type, reporting the client-facing validation message.
    ///
    /// # Errors
    /// Returns [`InventoryError::Validation`] unless `value` is `base` or `pack`.
    pub fn from_request(value: Option<&str>) -> Result<Self, InventoryError> {
        value.and_then(Self::parse).ok_or_else(|| InventoryError::validation(INVALID_PACKAGING_TYPE))
    }
}

impl Display for PackagingType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A number as clients send it: a JSON number, a numeric string, or anything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NumericInput {
    Number(serde_json::Number),
    Text(String),
    Other(serde_json::Value),
}

impl NumericInput {
    /// Finite decimal value, if the input reads as one.
    #[must_use]
    pub fn as_decimal(&self) -> Option<f64> {
        let value = match self {
            Self::Number(number) => number.as_f64()?,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
            Self::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Whole non-negative value, if the input reads as one. `2`, `2.0` and `"2"` qualify.
    #[must_use]
    pub fn as_whole(&self) -> Option<u64> {
        match self {
            Self::Number(number) => {
                number.as_u64().or_else(|| number.as_f64().and_then(whole_from_float))
            }
            Self::Text(text) => text.trim().parse::<u64>().ok(),
            Self::Other(_) => None,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
fn whole_from_float(value: f64) -> Option<u64> {
    (value.fract() == 0.0 && value >= 0.0 && value <= f64::from(u32::MAX)).then_some(value as u64)
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map_or_else(|| Self::Text(value.to_string()), Self::Number)
    }
}

impl From<u32> for NumericInput {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

/// A text field as clients send it. Anything that is not a string is kept
/// as raw JSON so validation, not deserialization, decides what it means.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TextInput {
    Text(String),
    Other(serde_json::Value),
}

impl TextInput {
    /// The value when it was sent as a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Other(_) => None,
        }
    }

    /// Non-blank text form of the value. Numbers and `true` read as their JSON
    /// text; `false`, `null`, arrays and objects read as missing.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Other(serde_json::Value::Number(number)) => Some(number.to_string()),
            Self::Other(serde_json::Value::Bool(true)) => Some("true".to_string()),
            Self::Other(_) => None,
        }
        .filter(|text| !text.trim().is_empty())
    }
}

impl From<String> for TextInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for TextInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Body of an add or update packaging request, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackagingRequest {
    #[serde(rename = "type", default)]
    pub packaging_type: Option<TextInput>,
    #[serde(default)]
    pub amount: Option<NumericInput>,
    #[serde(default)]
    pub unit: Option<TextInput>,
    #[serde(default)]
    pub pack_size: Option<NumericInput>,
    #[serde(default)]
    pub pack_unit: Option<TextInput>,
}

impl PackagingRequest {
    /// Check the request in the order clients see errors: type, amount, unit, pack details.
    ///
    /// # Errors
    /// Returns [`InventoryError::Validation`] carrying the message of the first failing rule.
    pub fn validate(&self) -> Result<PackagingSpec, InventoryError> {
        let packaging_type = PackagingType::from_request(self.packaging_type.as_ref().and_then(TextInput::as_str))?;

        let amount = self
            .amount
            .as_ref()
            .and_then(NumericInput::as_decimal)
            .filter(|amount| *amount > 0.0)
            .ok_or_else(|| InventoryError::validation(INVALID_AMOUNT))?;

        let unit = self
            .unit
            .as_ref()
            .and_then(TextInput::as_text)
            .ok_or_else(|| InventoryError::validation(MISSING_UNIT))?;

        match packaging_type {
            PackagingType::Base => Ok(PackagingSpec::Base { amount, unit }),
            PackagingType::Pack => {
                let pack_size = self
                    .pack_size
                    .as_ref()
                    .and_then(NumericInput::as_whole)
                    .filter(|size| *size >= 1)
                    .and_then(|size| u32::try_from(size).ok());
                let pack_unit = self.pack_unit.as_ref().and_then(TextInput::as_text);
                match (pack_size, pack_unit) {
                    (Some(pack_size), Some(pack_unit)) => {
                        Ok(PackagingSpec::Pack { amount, unit, pack_size, pack_unit })
                    }
                    _ => Err(InventoryError::validation(INVALID_PACK_DETAILS)),
                }
            }
        }
    }
}

/// A validated packaging description.
#[derive(Debug, Clone, PartialEq)]
pub enum PackagingSpec {
    Base { amount: f64, unit: String },
    Pack { amount: f64, unit: String, pack_size: u32, pack_unit: String },
}

impl PackagingSpec {
    #[must_use]
    pub fn packaging_type(&self) -> PackagingType {
        match self {
            Self::Base { .. } => PackagingType::Base,
            Self::Pack { .. } => PackagingType::Pack,
        }
    }

    #[must_use]
    pub fn amount(&self) -> f64 {
        match self {
            Self::Base { amount, .. } | Self::Pack { amount, .. } => *amount,
        }
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        match self {
            Self::Base { unit, .. } | Self::Pack { unit, .. } => unit,
        }
    }

    #[must_use]
    pub fn pack_details(&self) -> Option<(u32, &str)> {
        match self {
            Self::Base { .. } => None,
            Self::Pack { pack_size, pack_unit, .. } => Some((*pack_size, pack_unit.as_str())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BasePackaging {
    pub amount: f64,
    pub unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackPackaging {
    pub amount: f64,
    pub unit: String,
    pub pack_size: u32,
    pub pack_unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_packaging: Option<BasePackaging>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_packaging: Option<PackPackaging>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Item {
    #[must_use]
    pub fn new(
        name: String,
        sku: Option<String>,
        description: Option<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: ItemId::new(),
            name,
            sku,
            description,
            base_packaging: None,
            pack_packaging: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// # Errors
    /// Returns [`InventoryError::Validation`] when the name is blank or an embedded
    /// packaging carries a non-positive amount or pack size.
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.name.trim().is_empty() {
            return Err(InventoryError::validation("Item name is required"));
        }
        if let Some(base) = &self.base_packaging {
            if !(base.amount.is_finite() && base.amount > 0.0) {
                return Err(InventoryError::validation(INVALID_AMOUNT));
            }
        }
        if let Some(pack) = &self.pack_packaging {
            if !(pack.amount.is_finite() && pack.amount > 0.0) {
                return Err(InventoryError::validation(INVALID_AMOUNT));
            }
            if pack.pack_size == 0 || pack.pack_unit.trim().is_empty() {
                return Err(InventoryError::validation(INVALID_PACK_DETAILS));
            }
        }
        Ok(())
    }

    /// Replace the embedded packaging of `spec`'s type. The other type is untouched.
    pub fn apply_packaging(&mut self, spec: &PackagingSpec, at: OffsetDateTime) {
        match spec {
            PackagingSpec::Base { amount, unit } => {
                self.base_packaging =
                    Some(BasePackaging { amount: *amount, unit: unit.clone(), created_at: at });
            }
            PackagingSpec::Pack { amount, unit, pack_size, pack_unit } => {
                self.pack_packaging = Some(PackPackaging {
                    amount: *amount,
                    unit: unit.clone(),
                    pack_size: *pack_size,
                    pack_unit: pack_unit.clone(),
                    created_at: at,
                });
            }
        }
        self.updated_at = at;
    }

    pub fn clear_packaging(&mut self, packaging_type: PackagingType, at: OffsetDateTime) {
        match packaging_type {
            PackagingType::Base => self.base_packaging = None,
            PackagingType::Pack => self.pack_packaging = None,
        }
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn new(name: String, email: Option<String>, created_at: OffsetDateTime) -> Self {
        Self { id: UserId::new(), name, email, created_at }
    }

    /// # Errors
    /// Returns [`InventoryError::Validation`] when the name is blank.
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.name.trim().is_empty() {
            return Err(InventoryError::validation("User name is required"));
        }
        Ok(())
    }
}

/// The user a history row is attributed to, as shown in listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Creator {
    pub id: UserId,
    pub name: String,
}

/// One row of the append-only packaging history.
///
/// `C` is the creator representation: a bare [`UserId`] as stored, or an
/// optional [`Creator`] once the reference has been resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackagingRecord<C = UserId> {
    pub id: PackagingId,
    pub item_id: ItemId,
    #[serde(rename = "type")]
    pub packaging_type: PackagingType,
    pub amount: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_unit: Option<String>,
    pub is_active: bool,
    pub created_by: C,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A history row with its creator resolved; `None` when the user no longer exists.
pub type HistoryEntry = PackagingRecord<Option<Creator>>;

impl PackagingRecord {
    /// A fresh active history row describing `spec`.
    #[must_use]
    pub fn active(
        item_id: ItemId,
        spec: &PackagingSpec,
        created_by: UserId,
        created_at: OffsetDateTime,
    ) -> Self {
        let (pack_size, pack_unit) = match spec.pack_details() {
            Some((size, unit)) => (Some(size), Some(unit.to_string())),
            None => (None, None),
        };
        Self {
            id: PackagingId::new(),
            item_id,
            packaging_type: spec.packaging_type(),
            amount: spec.amount(),
            unit: spec.unit().to_string(),
            pack_size,
            pack_unit,
            is_active: true,
            created_by,
            created_at,
        }
    }

    /// # Errors
    /// Returns [`InventoryError::Validation`] when the amount or unit is invalid, or
    /// when pack details are present for `base` rows or missing for `pack` rows.
    pub fn validate(&self) -> Result<(), InventoryError> {
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(InventoryError::validation(INVALID_AMOUNT));
        }
        if self.unit.trim().is_empty() {
            return Err(InventoryError::validation(MISSING_UNIT));
        }
        let has_pack_size = self.pack_size.is_some_and(|size| size >= 1);
        let has_pack_unit = self.pack_unit.as_deref().is_some_and(|unit| !unit.trim().is_empty());
        let expects_pack = self.packaging_type == PackagingType::Pack;
        if expects_pack != has_pack_size || expects_pack != has_pack_unit {
            return Err(InventoryError::validation(INVALID_PACK_DETAILS));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_creator(self, creator: Option<Creator>) -> HistoryEntry {
        PackagingRecord {
            id: self.id,
            item_id: self.item_id,
            packaging_type: self.packaging_type,
            amount: self.amount,
            unit: self.unit,
            pack_size: self.pack_size,
            pack_unit: self.pack_unit,
            is_active: self.is_active,
            created_by: creator,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(value: serde_json::Value) -> PackagingRequest {
        match serde_json::from_value(value) {
            Ok(request) => request,
            Err(err) => panic!("request fixture should deserialize: {err}"),
        }
    }

    fn validation_message(request: &PackagingRequest) -> String {
        match request.validate() {
            Err(InventoryError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn base_request_accepts_numeric_strings() -> Result<(), InventoryError> {
        let spec = request(serde_json::json!({"type": "base", "amount": "2.5", "unit": "kg"}))
            .validate()?;
        assert_eq!(spec, PackagingSpec::Base { amount: 2.5, unit: "kg".to_string() });
        Ok(())
    }

    #[test]
    fn pack_request_reads_camel_case_fields() -> Result<(), InventoryError> {
        let spec = request(serde_json::json!({
            "type": "pack",
            "amount": 1,
            "unit": "bottle",
            "packSize": "6",
            "packUnit": "carton"
        }))
        .validate()?;
        assert_eq!(spec.packaging_type(), PackagingType::Pack);
        assert_eq!(spec.pack_details(), Some((6, "carton")));
        Ok(())
    }

    #[test]
    fn validation_reports_first_failing_rule() {
        let cases = [
            (serde_json::json!({"type": "crate", "amount": 1, "unit": "kg"}), INVALID_PACKAGING_TYPE),
            (serde_json::json!({"amount": 1, "unit": "kg"}), INVALID_PACKAGING_TYPE),
            (serde_json::json!({"type": 5, "amount": 1, "unit": "kg"}), INVALID_PACKAGING_TYPE),
            (serde_json::json!({"type": ["base"], "amount": 1, "unit": "kg"}), INVALID_PACKAGING_TYPE),
            (serde_json::json!({"type": "base", "amount": 0, "unit": "kg"}), INVALID_AMOUNT),
            (serde_json::json!({"type": "base", "amount": "abc", "unit": "kg"}), INVALID_AMOUNT),
            (serde_json::json!({"type": "base", "amount": true, "unit": "kg"}), INVALID_AMOUNT),
            (serde_json::json!({"type": "base", "amount": -3, "unit": ""}), INVALID_AMOUNT),
            (serde_json::json!({"type": "base", "amount": 3}), MISSING_UNIT),
            (serde_json::json!({"type": "base", "amount": 3, "unit": "  "}), MISSING_UNIT),
            (serde_json::json!({"type": "base", "amount": 3, "unit": false}), MISSING_UNIT),
            (serde_json::json!({"type": "base", "amount": 3, "unit": {"a": 1}}), MISSING_UNIT),
            (
                serde_json::json!({"type": "pack", "amount": 3, "unit": "can", "packUnit": "box"}),
                INVALID_PACK_DETAILS,
            ),
            (
                serde_json::json!({"type": "pack", "amount": 3, "unit": "can", "packSize": 0, "packUnit": "box"}),
                INVALID_PACK_DETAILS,
            ),
            (
                serde_json::json!({"type": "pack", "amount": 3, "unit": "can", "packSize": 2.5, "packUnit": "box"}),
                INVALID_PACK_DETAILS,
            ),
            (
                serde_json::json!({"type": "pack", "amount": 3, "unit": "can", "packSize": 4}),
                INVALID_PACK_DETAILS,
            ),
        ];

        for (body, expected) in cases {
            assert_eq!(validation_message(&request(body.clone())), expected, "body={body}");
        }
    }

    #[test]
    fn non_string_units_read_as_their_json_text() -> Result<(), InventoryError> {
        let spec = request(serde_json::json!({
            "type": "pack",
            "amount": 1,
            "unit": 7,
            "packSize": 6,
            "packUnit": 12
        }))
        .validate()?;
        assert_eq!(spec.unit(), "7");
        assert_eq!(spec.pack_details(), Some((6, "12")));
        Ok(())
    }

    #[test]
    fn base_request_ignores_pack_fields() -> Result<(), InventoryError> {
        let spec = request(serde_json::json!({
            "type": "base",
            "amount": 4,
            "unit": "l",
            "packSize": "nonsense"
        }))
        .validate()?;
        assert_eq!(spec.pack_details(), None);
        Ok(())
    }

    #[test]
    fn applying_packaging_replaces_only_matching_type() {
        let created = OffsetDateTime::UNIX_EPOCH;
        let later = created + time::Duration::hours(1);
        let mut item = Item::new("Olive oil".to_string(), None, None, created);

        item.apply_packaging(&PackagingSpec::Base { amount: 1.0, unit: "l".to_string() }, created);
        item.apply_packaging(
            &PackagingSpec::Pack {
                amount: 1.0,
                unit: "bottle".to_string(),
                pack_size: 12,
                pack_unit: "case".to_string(),
            },
            created,
        );
        item.apply_packaging(&PackagingSpec::Base { amount: 0.5, unit: "l".to_string() }, later);

        assert_eq!(item.base_packaging.as_ref().map(|base| base.amount), Some(0.5));
        assert_eq!(item.pack_packaging.as_ref().map(|pack| pack.pack_size), Some(12));
        assert_eq!(item.updated_at, later);

        item.clear_packaging(PackagingType::Pack, later);
        assert!(item.pack_packaging.is_none());
        assert!(item.base_packaging.is_some());
    }

    #[test]
    fn item_serializes_with_camel_case_and_omits_absent_packaging() {
        let mut item = Item::new("Rice".to_string(), Some("RC-1".to_string()), None, OffsetDateTime::UNIX_EPOCH);
        item.apply_packaging(
            &PackagingSpec::Base { amount: 5.0, unit: "kg".to_string() },
            OffsetDateTime::UNIX_EPOCH,
        );
        let value = match serde_json::to_value(&item) {
            Ok(value) => value,
            Err(err) => panic!("item should serialize: {err}"),
        };
        assert!(value.get("basePackaging").is_some());
        assert!(value.get("packPackaging").is_none());
        assert!(value.get("description").is_none());
        assert_eq!(
            value.get("basePackaging").and_then(|base| base.get("unit")).and_then(serde_json::Value::as_str),
            Some("kg")
        );
    }

    #[test]
    fn history_record_validation_ties_pack_fields_to_type() {
        let spec = PackagingSpec::Base { amount: 1.0, unit: "kg".to_string() };
        let mut record =
            PackagingRecord::active(ItemId::new(), &spec, UserId::new(), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(record.validate(), Ok(()));

        record.pack_size = Some(3);
        record.pack_unit = Some("box".to_string());
        assert_eq!(
            record.validate(),
            Err(InventoryError::Validation(INVALID_PACK_DETAILS.to_string()))
        );

        record.packaging_type = PackagingType::Pack;
        assert_eq!(record.validate(), Ok(()));
    }

    #[test]
    fn resolved_history_entry_serializes_creator_name() {
        let spec = PackagingSpec::Base { amount: 1.0, unit: "kg".to_string() };
        let user_id = UserId::new();
        let entry = PackagingRecord::active(ItemId::new(), &spec, user_id, OffsetDateTime::UNIX_EPOCH)
            .with_creator(Some(Creator { id: user_id, name: "Dana".to_string() }));
        let value = match serde_json::to_value(&entry) {
            Ok(value) => value,
            Err(err) => panic!("entry should serialize: {err}"),
        };
        assert_eq!(value.get("type").and_then(serde_json::Value::as_str), Some("base"));
        assert_eq!(
            value.get("createdBy").and_then(|creator| creator.get("name")).and_then(serde_json::Value::as_str),
            Some("Dana")
        );
        assert_eq!(value.get("isActive").and_then(serde_json::Value::as_bool), Some(true));
    }

    #[test]
    fn ids_parse_their_display_form() {
        let id = ItemId::new();
        assert_eq!(ItemId::parse(&id.to_string()), Some(id));
        assert_eq!(ItemId::parse("not-a-ulid"), None);
    }

    proptest! {
        #[test]
        fn positive_amounts_validate(amount in 0.001_f64..1.0e9, unit in "[a-z]{1,8}") {
            let request = PackagingRequest {
                packaging_type: Some("base".into()),
                amount: Some(NumericInput::from(amount)),
                unit: Some(unit.clone().into()),
                ..PackagingRequest::default()
            };
            let spec = request.validate();
            prop_assert_eq!(spec, Ok(PackagingSpec::Base { amount, unit }));
        }

        #[test]
        fn non_positive_amounts_are_rejected(amount in -1.0e9_f64..=0.0) {
            let request = PackagingRequest {
                packaging_type: Some("base".into()),
                amount: Some(NumericInput::from(amount)),
                unit: Some("kg".into()),
                ..PackagingRequest::default()
            };
            prop_assert_eq!(
                request.validate(),
                Err(InventoryError::Validation(INVALID_AMOUNT.to_string()))
            );
        }

        #[test]
        fn pack_sizes_from_one_validate(size in 1_u32..100_000) {
            let request = PackagingRequest {
                packaging_type: Some("pack".into()),
                amount: Some(NumericInput::from(1.0)),
                unit: Some("can".into()),
                pack_size: Some(NumericInput::Text(size.to_string())),
                pack_unit: Some("tray".into()),
            };
            let spec = request.validate();
            prop_assert!(spec.is_ok());
            let spec = spec.unwrap_or(PackagingSpec::Base { amount: 0.0, unit: String::new() });
            prop_assert_eq!(spec.pack_details(), Some((size, "tray")));
        }
    }
}
