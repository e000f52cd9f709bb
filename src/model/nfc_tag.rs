use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::employee::Employee;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TagStatus {
    Active,
    Inactive,
    Lost,
}

/// A physical badge enrolled in the system.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NfcTag {
    pub id: u64,
    /// Normalized UID: upper-case hex, no separators.
    #[schema(example = "04A224B1C25E80")]
    pub tag_uid: String,
    pub employee_id: Option<u64>,
    pub status: TagStatus,
    pub label: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub enrolled_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_used_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewTag {
    #[schema(example = "04:a2:24:b1:c2:5e:80")]
    pub tag_uid: String,
    pub employee_id: Option<u64>,
    pub label: Option<String>,
}

/// Partial update for a badge.
///
/// `employee_id` distinguishes "leave as is" (absent) from "unassign"
/// (`null`), hence the nested option.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TagChanges {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<u64>)]
    pub employee_id: Option<Option<u64>>,
    pub status: Option<TagStatus>,
    pub label: Option<String>,
}

impl TagChanges {
    pub fn is_empty(&self) -> bool {
        self.employee_id.is_none() && self.status.is_none() && self.label.is_none()
    }
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    pub employee_id: Option<u64>,
    pub status: Option<TagStatus>,
}

/// A badge together with the employee it currently resolves to.
#[derive(Debug, Clone)]
pub struct TagBinding {
    pub tag: NfcTag,
    pub employee: Option<Employee>,
}

/// Canonical form of a tag UID as read by phones and readers:
/// `04:a2:24:b1` and `04 A2 24 B1` both become `04A224B1`.
pub fn normalize_tag_uid(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ':' | '-' | ' ' | '\t'))
        .flat_map(char::to_uppercase)
        .collect()
}
