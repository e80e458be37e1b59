//! Record-to-write mapping.
//!
//! Person events become a full-row insert into the person-event table.
//! Consent status changes become an update of one `<channel>_status` column on
//! the rows that supporter got today.

use thiserror::Error;
use tracing::trace;

use crate::config::Config;
use crate::operation::{Filter, Insert, Operation, Update, Value};
use crate::record::{Record, RecordKind};

/// Filler for any person-event field the export omits.
pub const BLANK: &str = " ";

pub const SUPPORTER_ID: &str = "supporter_id";
pub const ACCOUNT_ID: &str = "account_id";
pub const SIGNING_DATE: &str = "signing_date";
pub const TRANSFER_TIME: &str = "transfer_time";

/// Field of a consent-status record holding the status code.
pub const STATUS_CODE_FIELD: &str = "id";

/// Where a person-event column gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Copied from the named record field, or blank.
    Field(&'static str),
    /// Integer supporter id from the named field, or blank.
    SupporterId(&'static str),
    /// Copied from the named field, or the configured account id.
    Account(&'static str),
    /// Server-side current timestamp.
    TransferTime,
}

/// Destination columns of a person event, in insert order.
pub const PERSON_COLUMNS: [(&str, Source); 25] = [
    (SUPPORTER_ID, Source::SupporterId("supporter_id")),
    (ACCOUNT_ID, Source::Account("account_id")),
    ("email", Source::Field("supporter_email")),
    ("title", Source::Field("title")),
    ("first_name", Source::Field("first_name")),
    ("last_name", Source::Field("last_name")),
    ("address", Source::Field("address1")),
    ("postcode", Source::Field("postcode")),
    ("city", Source::Field("city")),
    ("country", Source::Field("country")),
    ("phone", Source::Field("phone_number")),
    ("mobile", Source::Field("mobile_number")),
    ("date_of_birth", Source::Field("date_of_birth")),
    ("campaign_id", Source::Field("campaign_id")),
    ("campaign_type", Source::Field("campaign_type")),
    ("campaign_name", Source::Field("campaign_name")),
    (SIGNING_DATE, Source::Field("campaign_date")),
    ("signing_time", Source::Field("campaign_time")),
    ("source_code", Source::Field("external_reference1")),
    ("utm_source", Source::Field("utm_source")),
    ("utm_medium", Source::Field("utm_medium")),
    ("email_status", Source::Field("email_ok")),
    ("sms_status", Source::Field("sms_ok")),
    ("phone_status", Source::Field("phone_ok")),
    (TRANSFER_TIME, Source::TransferTime),
];

/// Communication channel a consent status applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
    Phone,
}

impl Channel {
    pub fn from_status_code(code: &str) -> Option<Self> {
        match code {
            "email_ok" => Some(Channel::Email),
            "sms_ok" => Some(Channel::Sms),
            "phone_ok" => Some(Channel::Phone),
            _ => None,
        }
    }

    pub fn status_column(self) -> &'static str {
        match self {
            Channel::Email => "email_status",
            Channel::Sms => "sms_status",
            Channel::Phone => "phone_status",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("supporter id {0:?} is not an integer")]
    BadSupporterId(String),
    #[error("{kind} record has no `{field}` field")]
    MissingField {
        kind: RecordKind,
        field: &'static str,
    },
}

/// Maps records to write operations for one run.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    person_table: String,
    account_id: String,
}

impl RecordMapper {
    pub fn new(config: &Config) -> Self {
        Self {
            person_table: config.tables.person_events.clone(),
            account_id: config.account_id.clone(),
        }
    }

    /// Map one record. `Ok(None)` means the record is deliberately ignored.
    pub fn map(&self, record: &Record) -> Result<Option<Operation>, MapError> {
        match record.kind() {
            RecordKind::PersonEvent => self.map_person_event(record).map(Some),
            RecordKind::ConsentStatus => self.map_consent_status(record),
        }
    }

    fn map_person_event(&self, record: &Record) -> Result<Operation, MapError> {
        let mut values = Vec::with_capacity(PERSON_COLUMNS.len());
        for (column, source) in PERSON_COLUMNS {
            let value = match source {
                Source::Field(field) => Value::text(record.get(field).unwrap_or(BLANK)),
                Source::SupporterId(field) => match record.get(field) {
                    Some(raw) => Value::Text(parse_supporter_id(raw)?),
                    None => Value::text(BLANK),
                },
                Source::Account(field) => {
                    Value::text(record.get(field).unwrap_or(&self.account_id))
                }
                Source::TransferTime => Value::CurrentTimestamp,
            };
            values.push((column, value));
        }
        Ok(Operation::Insert(Insert {
            table: self.person_table.clone(),
            values,
        }))
    }

    fn map_consent_status(&self, record: &Record) -> Result<Option<Operation>, MapError> {
        let Some(code) = record.get(STATUS_CODE_FIELD) else {
            trace!("consent status record without status code");
            return Ok(None);
        };
        let Some(channel) = Channel::from_status_code(code) else {
            trace!(code, "ignoring unknown consent status code");
            return Ok(None);
        };
        let raw_id = record.get(SUPPORTER_ID).ok_or(MapError::MissingField {
            kind: RecordKind::ConsentStatus,
            field: SUPPORTER_ID,
        })?;
        let supporter_id = parse_supporter_id(raw_id)?;
        Ok(Some(Operation::Update(Update {
            table: self.person_table.clone(),
            column: channel.status_column().to_string(),
            value: Value::text(code),
            filters: vec![
                Filter::Equals {
                    column: SUPPORTER_ID.to_string(),
                    value: Value::Text(supporter_id),
                },
                Filter::SinceStartOfToday {
                    column: TRANSFER_TIME.to_string(),
                },
            ],
        })))
    }
}

/// Validate a supporter id as an integer and return its canonical form.
pub fn parse_supporter_id(raw: &str) -> Result<String, MapError> {
    raw.trim()
        .parse::<i64>()
        .map(|id| id.to_string())
        .map_err(|_| MapError::BadSupporterId(raw.to_string()))
}
