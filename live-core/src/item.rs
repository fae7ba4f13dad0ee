use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Head numbers at or below this value mark pinned notices.
pub const NOTICE_HEAD_THRESHOLD: i64 = -2_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TitleIcon {
    Notice,
    Survey,
    Ad,
    Issue,
    RecommendTop,
    RecommendImage,
    RecommendText,
    Text,
    Image,
    Movie,
    Other(String),
}

impl TitleIcon {
    pub fn from_code(code: &str, head_num: i64) -> Self {
        if head_num <= NOTICE_HEAD_THRESHOLD {
            return TitleIcon::Notice;
        }
        match code {
            "icon_notice" => TitleIcon::Notice,
            "icon_survey" => TitleIcon::Survey,
            "icon_ad" => TitleIcon::Ad,
            "icon_issue" => TitleIcon::Issue,
            "sp-lst-recotop" | "icon_toprecoming" => TitleIcon::RecommendTop,
            "sp-lst-recoimg" | "icon_recomimg" => TitleIcon::RecommendImage,
            "sp-lst-recotxt" | "icon_recomtxt" => TitleIcon::RecommendText,
            "sp-lst-txt" | "icon_txt" => TitleIcon::Text,
            "sp-lst-img" | "icon_pic" => TitleIcon::Image,
            "sp-lst-play" | "icon_movie" => TitleIcon::Movie,
            other => TitleIcon::Other(other.to_owned()),
        }
    }

    /// Entries dropped from remote lists before they reach the view.
    pub fn is_excluded_from_list(&self) -> bool {
        matches!(self, TitleIcon::Notice | TitleIcon::Survey)
    }

    /// Entries removed from the view outright during deletion detection.
    pub fn is_promotional(&self) -> bool {
        matches!(self, TitleIcon::Ad | TitleIcon::Issue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldGroup {
    Head,
    Title,
    Writer,
    Date,
    Count,
    Recommend,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 6] = [
        FieldGroup::Head,
        FieldGroup::Title,
        FieldGroup::Writer,
        FieldGroup::Date,
        FieldGroup::Count,
        FieldGroup::Recommend,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleCell {
    pub subject: String,
    pub icon: TitleIcon,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WriterCell {
    pub name: String,
    pub user_id: String,
    pub ip: String,
    pub is_member: bool,
    pub nick_type: String,
}

/// Display data of a row, grouped the way the presentation renders cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    pub head: String,
    pub title: TitleCell,
    pub writer: WriterCell,
    pub date: String,
    pub hits: u64,
    pub recommends: u64,
}

impl ItemFields {
    pub fn differing_groups(&self, other: &ItemFields) -> Vec<FieldGroup> {
        FieldGroup::ALL
            .into_iter()
            .filter(|group| match group {
                FieldGroup::Head => self.head != other.head,
                FieldGroup::Title => self.title != other.title,
                FieldGroup::Writer => self.writer != other.writer,
                FieldGroup::Date => self.date != other.date,
                FieldGroup::Count => self.hits != other.hits,
                FieldGroup::Recommend => self.recommends != other.recommends,
            })
            .collect()
    }

    /// Copies the given groups from `fresh`, leaving the others untouched.
    pub fn overwrite(&mut self, fresh: &ItemFields, groups: &[FieldGroup]) {
        for group in groups {
            match group {
                FieldGroup::Head => self.head = fresh.head.clone(),
                FieldGroup::Title => self.title = fresh.title.clone(),
                FieldGroup::Writer => self.writer = fresh.writer.clone(),
                FieldGroup::Date => self.date = fresh.date.clone(),
                FieldGroup::Count => self.hits = fresh.hits,
                FieldGroup::Recommend => self.recommends = fresh.recommends,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub collection: String,
    pub is_notice: bool,
    pub is_checked: bool,
    pub is_open: bool,
    pub is_newly_inserted: bool,
    pub is_marked_deleted: bool,
    pub detail_available: bool,
    pub first_seen: DateTime<Utc>,
    pub fields: ItemFields,
}

impl Item {
    pub fn new(collection: &str, id: u64, fields: ItemFields) -> Self {
        Self {
            id,
            collection: collection.to_owned(),
            is_notice: fields.title.icon == TitleIcon::Notice
                || fields.title.icon == TitleIcon::Survey,
            is_checked: false,
            is_open: false,
            is_newly_inserted: false,
            is_marked_deleted: false,
            detail_available: false,
            first_seen: Utc::now(),
            fields,
        }
    }

    pub fn from_remote(collection: &str, remote: &RemoteItem) -> Option<Self> {
        remote
            .id
            .map(|id| Self::new(collection, id, remote.fields.clone()))
    }
}

/// One entry of a polled remote list.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    pub id: Option<u64>,
    pub fields: ItemFields,
}

impl RemoteItem {
    pub fn icon(&self) -> &TitleIcon {
        &self.fields.title.icon
    }
}

/// Record shape of the remote list endpoint. Numbers may arrive as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRecord {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub no: Option<u64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub headnum: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub headtext: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ip: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub write_time: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub hit: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_comment: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub recommend: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub ismember: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nicktype: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title_icon: String,
}

impl From<RemoteRecord> for RemoteItem {
    fn from(record: RemoteRecord) -> Self {
        let icon = TitleIcon::from_code(&record.title_icon, record.headnum.unwrap_or_default());
        Self {
            id: record.no,
            fields: ItemFields {
                head: record.headtext,
                title: TitleCell {
                    subject: record.subject,
                    icon,
                    comments: record.total_comment.unwrap_or_default(),
                },
                writer: WriterCell {
                    name: record.name,
                    user_id: record.user_id,
                    ip: record.ip,
                    is_member: record.ismember.unwrap_or_default() != 0,
                    nick_type: record.nicktype,
                },
                date: record.write_time,
                hits: record.hit.unwrap_or_default(),
                recommends: record.recommend.unwrap_or_default(),
            },
        }
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(u64::from(b)),
        _ => None,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
