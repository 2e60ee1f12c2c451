//! Statement text helpers.

use std::borrow::Cow;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Statements whose first execution can pipeline `[Prepare, Execute]`.
static PREPARABLE_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\s*/\*([^*]|\*[^/])*\*/)*\s*(SELECT|UPDATE|INSERT|DELETE|REPLACE|DO|CALL)")
        .expect("valid pattern")
});

/// True for DML and CALL statements, optionally preceded by comments.
///
/// Anything else is prepared as soon as the statement object is created.
pub fn is_preparable(sql: &str) -> bool {
    PREPARABLE_STATEMENT.is_match(sql)
}

/// Command text carrying the statement's row limit and timeout.
///
/// Without server support for `SET STATEMENT` the text is unchanged.
pub fn command_text<'a>(
    sql: &'a str,
    query_timeout: Option<Duration>,
    max_rows: u64,
    statement_options: bool,
) -> Cow<'a, str> {
    if !statement_options {
        return Cow::Borrowed(sql);
    }
    let timeout = query_timeout.filter(|t| !t.is_zero());
    match (timeout, max_rows) {
        (None, 0) => Cow::Borrowed(sql),
        (Some(t), 0) => Cow::Owned(format!(
            "SET STATEMENT max_statement_time={} FOR {sql}",
            seconds(t)
        )),
        (None, rows) => Cow::Owned(format!("SET STATEMENT SQL_SELECT_LIMIT={rows} FOR {sql}")),
        (Some(t), rows) => Cow::Owned(format!(
            "SET STATEMENT max_statement_time={}, SQL_SELECT_LIMIT={rows} FOR {sql}",
            seconds(t)
        )),
    }
}

fn seconds(t: Duration) -> String {
    match t.subsec_micros() {
        0 => t.as_secs().to_string(),
        micros => format!("{}.{micros:06}", t.as_secs()),
    }
}
