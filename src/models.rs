use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{ChoreError, Result};

/// A raw document as held by the backing store.
pub type Document = Map<String, Value>;

/// Wire field names for chore documents. Casing is inconsistent on purpose:
/// it matches data already persisted by existing clients.
pub mod fields {
    pub const NAME: &str = "Name";
    pub const DATE: &str = "Date";
    pub const DAY: &str = "Day";
    pub const DESCRIPTION: &str = "Description";
    pub const PRIORITY_LEVEL: &str = "PriorityLevel";
    pub const REPETITION_TIME: &str = "RepetitionTime";
    pub const TIME_LENGTH: &str = "TimeLength";
    pub const ASSIGNED_USERS: &str = "assignedUsers";
    pub const COMPLETED: &str = "completed";
    pub const COMPLETED_BY: &str = "completedBy";
    pub const COMPLETED_AT: &str = "completedAt";
    pub const VOTES: &str = "votes";
    pub const VOTERS: &str = "voters";
    pub const PROPOSAL: &str = "proposal";
    pub const CREATED_BY: &str = "createdBy";
    pub const SERIES_ID: &str = "seriesId";
    pub const CHECKLIST: &str = "Checklist";
    pub const MONTHLY_REPEAT_BY_DATE: &str = "MonthlyRepeatByDate";
    pub const MONTHLY_REPEAT_BY_WEEK: &str = "MonthlyRepeatByWeek";

    // member and log documents
    pub const MEMBER_NAME: &str = "name";
    pub const MEMBER_COLOR: &str = "color";
    pub const GROUP_KEY: &str = "groupKey";
    pub const LOG_TIMESTAMP: &str = "timestamp";
    pub const LOG_CHORE: &str = "chore";
}

/// Format every persisted chore date uses.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parses a fixed-width, zero-padded `yyyy-MM-dd` day.
///
/// Inputs chrono would accept but that are not zero-padded (`2025-6-1`) are
/// rejected, since stored dates are compared as plain strings.
pub fn parse_day(s: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(s, DAY_FORMAT)
        .map_err(|_| ChoreError::InvalidDate(s.to_string()))?;
    if date.format(DAY_FORMAT).to_string() != s {
        return Err(ChoreError::InvalidDate(s.to_string()));
    }
    Ok(date)
}

/// Full weekday name stored in the `Day` field.
pub fn weekday_label(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

/// Identifier of a household. Numeric, but also used as the string scope of
/// the group's collections.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub u64);

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(GroupKey)
    }
}

/// How urgent a chore is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PriorityLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl PriorityLevel {
    /// Sort rank: lower sorts first.
    pub fn rank(self) -> u8 {
        match self {
            PriorityLevel::High => 0,
            PriorityLevel::Medium => 1,
            PriorityLevel::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(PriorityLevel::Low),
            "medium" => Some(PriorityLevel::Medium),
            "high" => Some(PriorityLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PriorityLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Unknown or mistyped levels read as the default.
impl<'de> Deserialize<'de> for PriorityLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().and_then(PriorityLevel::parse).unwrap_or_default())
    }
}

/// Repetition period of a chore.
///
/// Values written by other clients that this build does not know are kept
/// verbatim in `Unrecognized` so editing a chore does not rewrite them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum RepetitionTime {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Unrecognized(String),
}

impl RepetitionTime {
    pub fn as_str(&self) -> &str {
        match self {
            RepetitionTime::None => "None",
            RepetitionTime::Daily => "Daily",
            RepetitionTime::Weekly => "Weekly",
            RepetitionTime::Monthly => "Monthly",
            RepetitionTime::Yearly => "Yearly",
            RepetitionTime::Unrecognized(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => RepetitionTime::None,
            "daily" => RepetitionTime::Daily,
            "weekly" => RepetitionTime::Weekly,
            "monthly" => RepetitionTime::Monthly,
            "yearly" => RepetitionTime::Yearly,
            _ => RepetitionTime::Unrecognized(s.to_string()),
        }
    }

    pub fn is_repeating(&self) -> bool {
        !matches!(self, RepetitionTime::None)
    }
}

impl fmt::Display for RepetitionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RepetitionTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RepetitionTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(RepetitionTime::parse).unwrap_or_default())
    }
}

/// A chore belonging to exactly one group.
///
/// Reads are lenient: absent or mistyped fields take their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Chore {
    /// Document identifier, not part of the document body.
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "Name", deserialize_with = "lenient::string")]
    pub name: String,
    /// Calendar day, `yyyy-MM-dd`.
    #[serde(rename = "Date", deserialize_with = "lenient::string")]
    pub date: String,
    /// Weekday label for `date`, e.g. "Monday".
    #[serde(rename = "Day", deserialize_with = "lenient::string")]
    pub day: String,
    #[serde(rename = "Description", deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(rename = "PriorityLevel")]
    pub priority: PriorityLevel,
    /// Expected duration in minutes.
    #[serde(rename = "TimeLength", deserialize_with = "lenient::count")]
    pub duration_minutes: u32,
    #[serde(rename = "RepetitionTime")]
    pub repetition: RepetitionTime,
    #[serde(rename = "assignedUsers", deserialize_with = "lenient::string_list")]
    pub assigned_users: Vec<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub completed: bool,
    /// Display name of whoever completed it; set only while completed.
    #[serde(
        rename = "completedBy",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub completed_by: Option<String>,
    /// RFC 3339 timestamp; set only while completed.
    #[serde(
        rename = "completedAt",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub completed_at: Option<String>,
    #[serde(deserialize_with = "lenient::count")]
    pub votes: u32,
    /// User ids that voted, each at most once.
    #[serde(deserialize_with = "lenient::unique_strings")]
    pub voters: Vec<String>,
    /// Awaiting household approval.
    #[serde(deserialize_with = "lenient::flag")]
    pub proposal: bool,
    #[serde(rename = "createdBy", deserialize_with = "lenient::string")]
    pub created_by: String,
    /// Shared by every occurrence of one recurrence; empty if not repeating.
    #[serde(rename = "seriesId", deserialize_with = "lenient::string")]
    pub series_id: String,
    #[serde(rename = "Checklist", deserialize_with = "lenient::flag")]
    pub checklist: bool,
    #[serde(rename = "MonthlyRepeatByDate", deserialize_with = "lenient::flag")]
    pub monthly_repeat_by_date: bool,
    #[serde(rename = "MonthlyRepeatByWeek", deserialize_with = "lenient::flag")]
    pub monthly_repeat_by_week: bool,
}

impl Chore {
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assigned_users.iter().any(|u| u == user_id)
    }

    pub fn has_voted(&self, user_id: &str) -> bool {
        self.voters.iter().any(|u| u == user_id)
    }

    /// Serializes into the persisted document shape.
    pub fn to_document(&self) -> Result<Document> {
        into_document(self)
    }

    /// Materializes a stored document. Returns `None` when the document has
    /// no usable `Name`.
    pub fn from_document(id: &str, doc: &Document) -> Option<Chore> {
        let mut chore: Chore = serde_json::from_value(Value::Object(doc.clone())).ok()?;
        if chore.name.is_empty() {
            return None;
        }
        chore.id = id.to_string();
        Some(chore)
    }
}

/// What a member fills in when creating a chore. Bookkeeping fields
/// (proposal, votes, series) are decided by the New-Chore operation.
#[derive(Debug, Clone, Default)]
pub struct ChoreDraft {
    pub name: String,
    /// `yyyy-MM-dd`
    pub date: String,
    pub description: String,
    pub priority: PriorityLevel,
    pub duration_minutes: u32,
    pub repetition: RepetitionTime,
    pub assigned_users: Vec<String>,
    pub checklist: bool,
    pub monthly_repeat_by_date: bool,
    pub monthly_repeat_by_week: bool,
}

impl ChoreDraft {
    /// Validates the draft and builds an unsaved, uncompleted chore.
    pub fn into_chore(self, created_by: &str) -> Result<Chore> {
        if self.name.trim().is_empty() {
            return Err(ChoreError::EmptyName);
        }
        let date = parse_day(&self.date)?;
        Ok(Chore {
            id: String::new(),
            name: self.name,
            date: self.date,
            day: weekday_label(date),
            description: self.description,
            priority: self.priority,
            duration_minutes: self.duration_minutes,
            repetition: self.repetition,
            assigned_users: self.assigned_users,
            created_by: created_by.to_string(),
            checklist: self.checklist,
            monthly_repeat_by_date: self.monthly_repeat_by_date,
            monthly_repeat_by_week: self.monthly_repeat_by_week,
            ..Chore::default()
        })
    }
}

/// Display color a member picks for themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemberColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Teal,
    Brown,
    #[default]
    Gray,
}

impl MemberColor {
    pub const ALL: [MemberColor; 10] = [
        MemberColor::Red,
        MemberColor::Orange,
        MemberColor::Yellow,
        MemberColor::Green,
        MemberColor::Blue,
        MemberColor::Purple,
        MemberColor::Pink,
        MemberColor::Teal,
        MemberColor::Brown,
        MemberColor::Gray,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MemberColor::Red => "red",
            MemberColor::Orange => "orange",
            MemberColor::Yellow => "yellow",
            MemberColor::Green => "green",
            MemberColor::Blue => "blue",
            MemberColor::Purple => "purple",
            MemberColor::Pink => "pink",
            MemberColor::Teal => "teal",
            MemberColor::Brown => "brown",
            MemberColor::Gray => "gray",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let s = if s == "grey" { "gray".to_string() } else { s };
        MemberColor::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for MemberColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MemberColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MemberColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().and_then(MemberColor::parse).unwrap_or_default())
    }
}

/// A user profile. Membership of a household is the `group_key` field; there
/// is no separate group document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Member {
    #[serde(skip)]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    pub color: MemberColor,
    #[serde(
        rename = "groupKey",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::group_key"
    )]
    pub group_key: Option<GroupKey>,
}

impl Member {
    pub fn to_document(&self) -> Result<Document> {
        into_document(self)
    }

    /// A profile without a name shows its user id instead.
    pub fn from_document(id: &str, doc: &Document) -> Member {
        let mut member: Member =
            serde_json::from_value(Value::Object(doc.clone())).unwrap_or_default();
        member.id = id.to_string();
        if member.name.is_empty() {
            member.name = id.to_string();
        }
        member
    }
}

/// Append-only record of one completion event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ChoreLog {
    #[serde(skip)]
    pub id: String,
    /// RFC 3339
    #[serde(deserialize_with = "lenient::string")]
    pub timestamp: String,
    #[serde(rename = "chore", deserialize_with = "lenient::string")]
    pub chore_id: String,
    #[serde(rename = "completedBy", deserialize_with = "lenient::string_list")]
    pub completed_by: Vec<String>,
}

impl ChoreLog {
    pub fn to_document(&self) -> Result<Document> {
        into_document(self)
    }

    /// Entries that do not name a chore are unreadable.
    pub fn from_document(id: &str, doc: &Document) -> Option<ChoreLog> {
        let mut entry: ChoreLog = serde_json::from_value(Value::Object(doc.clone())).ok()?;
        if entry.chore_id.is_empty() {
            return None;
        }
        entry.id = id.to_string();
        Some(entry)
    }
}

fn into_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(ChoreError::Serialization(format!(
            "expected a document object, got {}",
            other
        ))),
    }
}

/// Field deserializers that fall back to a default instead of failing when
/// another client wrote a value of the wrong type.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::GroupKey;

    type Result<T, E> = std::result::Result<T, E>;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(optional_string(d)?.unwrap_or_default())
    }

    pub fn optional_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(Value::deserialize(d)?.as_bool().unwrap_or(false))
    }

    /// Non-negative whole number; floats round and numeric strings parse.
    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        })
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Like `string_list`, keeping only the first of any repeated entry.
    pub fn unique_strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let mut unique: Vec<String> = Vec::new();
        for s in string_list(d)? {
            if !unique.contains(&s) {
                unique.push(s);
            }
        }
        Ok(unique)
    }

    /// Group keys are numbers, but older profiles hold them as strings.
    pub fn group_key<'de, D: Deserializer<'de>>(d: D) -> Result<Option<GroupKey>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_u64().map(GroupKey),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_name_is_dropped() {
        let d = doc(json!({ "Date": "2025-01-01", "PriorityLevel": "high" }));
        assert!(Chore::from_document("a", &d).is_none());
        let d = doc(json!({ "Name": "" }));
        assert!(Chore::from_document("a", &d).is_none());
    }

    #[test]
    fn absent_fields_take_defaults() {
        let d = doc(json!({ "Name": "Dishes" }));
        let chore = Chore::from_document("a", &d).unwrap();
        assert_eq!(chore.id, "a");
        assert_eq!(chore.priority, PriorityLevel::Low);
        assert_eq!(chore.repetition, RepetitionTime::None);
        assert_eq!(chore.duration_minutes, 0);
        assert!(!chore.proposal);
        assert!(chore.voters.is_empty());
        assert_eq!(chore.series_id, "");
    }

    #[test]
    fn wire_names_are_preserved() {
        let chore = ChoreDraft {
            name: "Vacuum".into(),
            date: "2025-03-04".into(),
            priority: PriorityLevel::High,
            repetition: RepetitionTime::Weekly,
            duration_minutes: 30,
            ..ChoreDraft::default()
        }
        .into_chore("u1")
        .unwrap();
        let d = chore.to_document().unwrap();
        assert_eq!(d["Name"], json!("Vacuum"));
        assert_eq!(d["Day"], json!("Tuesday"));
        assert_eq!(d["PriorityLevel"], json!("high"));
        assert_eq!(d["RepetitionTime"], json!("Weekly"));
        assert_eq!(d["TimeLength"], json!(30));
        assert_eq!(d["createdBy"], json!("u1"));
        assert!(d.get("completedBy").is_none());
        assert_eq!(Chore::from_document("", &d).unwrap(), chore);
    }

    #[test]
    fn duplicate_voters_collapse_on_read() {
        let d = doc(json!({ "Name": "Trash", "voters": ["a", "b", "a"], "votes": 2 }));
        let chore = Chore::from_document("x", &d).unwrap();
        assert_eq!(chore.voters, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn unknown_repetition_survives() {
        let d = doc(json!({ "Name": "Odd", "RepetitionTime": "Fortnightly" }));
        let chore = Chore::from_document("x", &d).unwrap();
        assert_eq!(chore.repetition, RepetitionTime::Unrecognized("Fortnightly".into()));
        assert!(chore.repetition.is_repeating());
        assert_eq!(chore.to_document().unwrap()["RepetitionTime"], json!("Fortnightly"));
    }

    #[test]
    fn mistyped_fields_fall_back() {
        let d = doc(json!({
            "Name": "Laundry",
            "TimeLength": "15",
            "votes": 2.0,
            "completed": "yes",
            "assignedUsers": "bob",
            "PriorityLevel": 3,
            "completedBy": false
        }));
        let chore = Chore::from_document("x", &d).unwrap();
        assert_eq!(chore.duration_minutes, 15);
        assert_eq!(chore.votes, 2);
        assert!(!chore.completed);
        assert!(chore.assigned_users.is_empty());
        assert_eq!(chore.priority, PriorityLevel::Low);
        assert_eq!(chore.completed_by, None);
    }

    #[test]
    fn non_string_name_is_dropped() {
        let d = doc(json!({ "Name": 42 }));
        assert!(Chore::from_document("x", &d).is_none());
    }

    #[test]
    fn log_entry_needs_a_chore() {
        let d = doc(json!({ "timestamp": "2025-01-01T08:00:00Z", "completedBy": ["u1"] }));
        assert!(ChoreLog::from_document("l1", &d).is_none());
        let d = doc(json!({ "timestamp": "2025-01-01T08:00:00Z", "chore": "c1", "completedBy": ["u1"] }));
        let entry = ChoreLog::from_document("l1", &d).unwrap();
        assert_eq!(entry.chore_id, "c1");
        assert_eq!(entry.to_document().unwrap()["chore"], json!("c1"));
    }

    #[test]
    fn parse_day_requires_padding() {
        assert!(parse_day("2025-06-01").is_ok());
        assert!(matches!(parse_day("2025-6-1"), Err(ChoreError::InvalidDate(_))));
        assert!(parse_day("not a date").is_err());
    }

    #[test]
    fn draft_rejects_empty_name() {
        let draft = ChoreDraft { date: "2025-01-01".into(), ..ChoreDraft::default() };
        assert!(matches!(draft.into_chore("u"), Err(ChoreError::EmptyName)));
    }

    #[test]
    fn member_group_key_reads_number_or_string() {
        let m = Member::from_document("u1", &doc(json!({ "name": "Ann", "groupKey": 123456 })));
        assert_eq!(m.group_key, Some(GroupKey(123456)));
        let m = Member::from_document("u2", &doc(json!({ "groupKey": "42", "color": "Grey" })));
        assert_eq!(m.group_key, Some(GroupKey(42)));
        assert_eq!(m.name, "u2");
        assert_eq!(m.color, MemberColor::Gray);
        let d = m.to_document().unwrap();
        assert_eq!(d["groupKey"], json!(42));
        assert_eq!(d["color"], json!("gray"));
        assert!(d.get("id").is_none());
    }
}
