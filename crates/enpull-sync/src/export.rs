//! Export documents and the source seam the ingest pipeline pulls from.
//!
//! The service answers with an XML document holding one `<row>` element per
//! record, each field a child element:
//!
//! ```xml
//! <rows>
//!   <row><type>QCB</type><supporter_id>42</supporter_id><id>sms_ok</id></row>
//! </rows>
//! ```
//!
//! A failed export carries an `<error>` element instead.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use enpull_core::{RecordKind, RowFields};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::SyncError;

const ROW_ELEMENT: &str = "row";
const ERROR_ELEMENT: &str = "error";

/// Outcome of one export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportBatch {
    Rows(Vec<RowFields>),
    /// The service reported an error; nothing from this batch is written.
    Failed(String),
}

/// Something that can export one day of one record type.
#[async_trait]
pub trait ExportSource {
    async fn fetch(&self, day: NaiveDate, kind: RecordKind) -> Result<ExportBatch, SyncError>;
}

/// Parse an export document into rows, or the error it reports.
///
/// An `<error>` element anywhere outside a row fails the whole batch, even
/// if rows were also present.
pub fn parse_export(body: &str) -> Result<ExportBatch, SyncError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut rows = Vec::new();
    let mut row: Option<BTreeMap<String, String>> = None;
    // Depth below the current <row>; 1 is a field element.
    let mut depth = 0usize;
    let mut field: Option<(String, String)> = None;
    let mut error: Option<String> = None;
    let mut error_text: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(e.local_name().as_ref());
                if row.is_some() {
                    depth += 1;
                    if depth == 1 {
                        field = Some((name, String::new()));
                    }
                } else if error_text.is_none() {
                    if name == ROW_ELEMENT {
                        row = Some(BTreeMap::new());
                        depth = 0;
                    } else if name.eq_ignore_ascii_case(ERROR_ELEMENT) {
                        error_text = Some(String::new());
                    }
                }
            }
            Event::Empty(e) => {
                // Self-closing fields are omitted values.
                if row.is_none() && error_text.is_none() {
                    let name = element_name(e.local_name().as_ref());
                    if name == ROW_ELEMENT {
                        rows.push(RowFields::default());
                    } else if name.eq_ignore_ascii_case(ERROR_ELEMENT) {
                        error.get_or_insert_with(String::new);
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                push_text(&mut field, &mut error_text, depth, &text);
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                push_text(&mut field, &mut error_text, depth, &String::from_utf8_lossy(&raw));
            }
            Event::End(e) => {
                if let Some(fields) = row.as_mut() {
                    if depth == 0 {
                        rows.push(RowFields(std::mem::take(fields)));
                        row = None;
                    } else {
                        if depth == 1 {
                            if let Some((name, value)) = field.take() {
                                fields.insert(name, value);
                            }
                        }
                        depth -= 1;
                    }
                } else if let Some(text) = error_text.take() {
                    let name = element_name(e.local_name().as_ref());
                    if name.eq_ignore_ascii_case(ERROR_ELEMENT) {
                        error = Some(text.trim().to_string());
                    } else {
                        error_text = Some(text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(match error {
        Some(message) => ExportBatch::Failed(message),
        None => ExportBatch::Rows(rows),
    })
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn push_text(
    field: &mut Option<(String, String)>,
    error_text: &mut Option<String>,
    depth: usize,
    text: &str,
) {
    if let Some(buf) = error_text.as_mut() {
        buf.push_str(text);
    } else if depth == 1 {
        if let Some((_, value)) = field.as_mut() {
            value.push_str(text);
        }
    }
}
