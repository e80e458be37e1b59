//! Write operations produced by the mapper and executed by the store.
//!
//! An operation is data, not SQL text: a table, columns, and values. The
//! store executes [`Operation::prepared`] with bound parameters;
//! [`Operation::render`] gives the equivalent literal statement for logs.

use std::fmt;

/// SQL expression for the server-side current timestamp.
pub const NOW_SQL: &str = "CAST(now() AS TIMESTAMP)";
/// SQL expression for the start of the current calendar day.
pub const START_OF_TODAY_SQL: &str = "CAST(current_date AS TIMESTAMP)";

/// A column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Bound as a text parameter.
    Text(String),
    /// Evaluated by the database at execution time.
    CurrentTimestamp,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::CurrentTimestamp => None,
        }
    }

    fn placeholder(&self) -> &'static str {
        match self {
            Value::Text(_) => "?",
            Value::CurrentTimestamp => NOW_SQL,
        }
    }

    fn literal(&self) -> String {
        match self {
            Value::Text(s) => quote_literal(s),
            Value::CurrentTimestamp => NOW_SQL.to_string(),
        }
    }
}

/// Quote `s` as a SQL string literal, doubling embedded single quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Row filter of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Equals { column: String, value: Value },
    /// `column >= start of the current calendar day`
    SinceStartOfToday { column: String },
}

impl Filter {
    fn prepared(&self) -> String {
        match self {
            Filter::Equals { column, value } => format!("{column} = {}", value.placeholder()),
            Filter::SinceStartOfToday { column } => format!("{column} >= {START_OF_TODAY_SQL}"),
        }
    }

    fn rendered(&self) -> String {
        match self {
            Filter::Equals { column, value } => format!("{column} = {}", value.literal()),
            Filter::SinceStartOfToday { column } => format!("{column} >= {START_OF_TODAY_SQL}"),
        }
    }

    fn params(&self) -> Option<&str> {
        match self {
            Filter::Equals { value, .. } => value.as_text(),
            Filter::SinceStartOfToday { .. } => None,
        }
    }
}

/// Insert of one full row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    pub table: String,
    pub values: Vec<(&'static str, Value)>,
}

/// Update of one column on the rows matching every filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub table: String,
    pub column: String,
    pub value: Value,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert(Insert),
    Update(Update),
}

/// A parameterized statement: SQL with `?` placeholders and its text params
/// in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub sql: String,
    pub params: Vec<String>,
}

impl Operation {
    pub fn table(&self) -> &str {
        match self {
            Operation::Insert(i) => &i.table,
            Operation::Update(u) => &u.table,
        }
    }

    /// Value bound to `column`, looking at inserted columns or the updated one.
    pub fn value(&self, column: &str) -> Option<&Value> {
        match self {
            Operation::Insert(i) => i.values.iter().find(|(c, _)| *c == column).map(|(_, v)| v),
            Operation::Update(u) => (u.column == column).then_some(&u.value),
        }
    }

    pub fn prepared(&self) -> Prepared {
        match self {
            Operation::Insert(i) => {
                let columns: Vec<&str> = i.values.iter().map(|(c, _)| *c).collect();
                let placeholders: Vec<&str> = i.values.iter().map(|(_, v)| v.placeholder()).collect();
                let params = i
                    .values
                    .iter()
                    .filter_map(|(_, v)| v.as_text().map(str::to_string))
                    .collect();
                Prepared {
                    sql: format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        i.table,
                        columns.join(", "),
                        placeholders.join(", ")
                    ),
                    params,
                }
            }
            Operation::Update(u) => {
                let mut params: Vec<String> = u.value.as_text().map(str::to_string).into_iter().collect();
                params.extend(u.filters.iter().filter_map(|f| f.params().map(str::to_string)));
                let filters: Vec<String> = u.filters.iter().map(Filter::prepared).collect();
                Prepared {
                    sql: format!(
                        "UPDATE {} SET {} = {}{}",
                        u.table,
                        u.column,
                        u.value.placeholder(),
                        where_clause(&filters)
                    ),
                    params,
                }
            }
        }
    }

    /// The statement with every value inlined as an escaped literal.
    pub fn render(&self) -> String {
        match self {
            Operation::Insert(i) => {
                let columns: Vec<&str> = i.values.iter().map(|(c, _)| *c).collect();
                let literals: Vec<String> = i.values.iter().map(|(_, v)| v.literal()).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    i.table,
                    columns.join(", "),
                    literals.join(", ")
                )
            }
            Operation::Update(u) => {
                let filters: Vec<String> = u.filters.iter().map(Filter::rendered).collect();
                format!(
                    "UPDATE {} SET {} = {}{}",
                    u.table,
                    u.column,
                    u.value.literal(),
                    where_clause(&filters)
                )
            }
        }
    }
}

fn where_clause(filters: &[String]) -> String {
    if filters.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", filters.join(" AND "))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
