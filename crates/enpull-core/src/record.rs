//! Export records as delivered by the data service, tagged by their `type` field.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Name of the discriminator field carried by every exported row.
pub const TYPE_FIELD: &str = "type";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has no `type` field")]
    MissingType,
    #[error("unknown record type {0:?}")]
    UnknownType(String),
}

/// The two record types the export service is queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Supporter lead / signup (`PET`).
    PersonEvent,
    /// Consent status change for one channel (`QCB`).
    ConsentStatus,
}

impl RecordKind {
    /// Fetch order within a day: person events land before the status
    /// updates that target them.
    pub const ALL: [RecordKind; 2] = [RecordKind::PersonEvent, RecordKind::ConsentStatus];

    /// Code used both as the `type` value and as the `configTypes` filter.
    pub fn code(self) -> &'static str {
        match self {
            RecordKind::PersonEvent => "PET",
            RecordKind::ConsentStatus => "QCB",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "PET" => Some(RecordKind::PersonEvent),
            "QCB" => Some(RecordKind::ConsentStatus),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One exported row: field name to string value, plus its parsed kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    kind: RecordKind,
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Build a record from raw row fields.
    ///
    /// Blank values are dropped so that they count as omitted and pick up
    /// the mapper's defaults.
    pub fn from_fields(fields: BTreeMap<String, String>) -> Result<Self, RecordError> {
        let fields: BTreeMap<String, String> = fields
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let code = fields.get(TYPE_FIELD).ok_or(RecordError::MissingType)?;
        let kind =
            RecordKind::from_code(code).ok_or_else(|| RecordError::UnknownType(code.clone()))?;
        Ok(Self { kind, fields })
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Value of `name`, if the row carried a non-blank one.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Raw, untyped row fields as parsed from an export document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFields(pub BTreeMap<String, String>);

impl RowFields {
    pub fn into_record(self) -> Result<Record, RecordError> {
        Record::from_fields(self.0)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RowFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RowFields(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
