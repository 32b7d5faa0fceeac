//! Decoding of the workflow API's nested table response.
//!
//! The wait-time table is the `TableV2` element of `data`. Its children are
//! rows and each row's children are cells; values are found purely by
//! position, so any layout change on the publisher's side surfaces here as
//! a missing-cell error.

use chrono::{DateTime, Utc};
use chrono_tz::America::Halifax;
use ermon_common::{Error, Result, WaitTimes};
use serde::Deserialize;
use tracing::warn;

const TABLE_TYPE: &str = "TableV2";

// (row, column) of each value in the table.
const WAITING_ROOM: (usize, usize) = (1, 1);
const MOST_URGENT_COUNT: (usize, usize) = (2, 1);
const MOST_URGENT_TIME: (usize, usize) = (2, 2);
const URGENT_COUNT: (usize, usize) = (3, 1);
const URGENT_TIME: (usize, usize) = (3, 2);
const LESS_URGENT_COUNT: (usize, usize) = (4, 1);
const LESS_URGENT_TIME: (usize, usize) = (4, 2);
const BEING_TREATED: (usize, usize) = (5, 1);
const TOTAL_PATIENTS: (usize, usize) = (7, 1);

#[derive(Debug, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub data: Vec<TableElement>,
}

#[derive(Debug, Deserialize)]
pub struct TableElement {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: TableData,
    #[serde(default)]
    pub children: Vec<TableElement>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub text: String,
}

/// Decode a response body into a snapshot for `location`, stamped `observed_at`.
pub fn parse_response(location: &str, body: &[u8], observed_at: DateTime<Utc>) -> Result<WaitTimes> {
    let raw: RawResponse = serde_json::from_slice(body)?;

    // When several tables are present the last one wins.
    let table = raw
        .data
        .iter()
        .rev()
        .find(|el| el.kind == TABLE_TYPE)
        .ok_or_else(|| Error::Parse(format!("no {TABLE_TYPE} element in response")))?;

    let patients_in_waiting_room = count(table, WAITING_ROOM)?;
    let patients_being_treated = count(table, BEING_TREATED)?;
    let total_patients = count(table, TOTAL_PATIENTS)?;

    Ok(WaitTimes {
        location: location.to_string(),
        patients_in_waiting_room,
        most_urgent_count: count(table, MOST_URGENT_COUNT)?,
        most_urgent_time: text(table, MOST_URGENT_TIME)?.to_string(),
        urgent_count: count(table, URGENT_COUNT)?,
        urgent_time: text(table, URGENT_TIME)?.to_string(),
        less_than_urgent_count: count(table, LESS_URGENT_COUNT)?,
        less_than_urgent_time: text(table, LESS_URGENT_TIME)?.to_string(),
        patients_being_treated,
        total_patients,
        patients_waiting_transfer: WaitTimes::derive_waiting_transfer(
            total_patients,
            patients_in_waiting_room,
            patients_being_treated,
        ),
        observed_at,
    })
}

/// Render a timestamp the way the facility reports it: Atlantic local time,
/// `M/D/YYYY HH:MM:SS`.
pub fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Halifax)
        .format("%-m/%-d/%Y %H:%M:%S")
        .to_string()
}

fn text(table: &TableElement, (row, col): (usize, usize)) -> Result<&str> {
    table
        .children
        .get(row)
        .and_then(|r| r.children.get(col))
        .map(|cell| cell.data.text.as_str())
        .ok_or_else(|| Error::Parse(format!("missing cell at row {row}, column {col}")))
}

/// Cells that aren't integers count as zero, matching what the page shows
/// for a blank count.
fn count(table: &TableElement, pos: (usize, usize)) -> Result<i64> {
    let raw = text(table, pos)?;
    Ok(raw.trim().parse().unwrap_or_else(|_| {
        warn!(row = pos.0, column = pos.1, value = raw, "non-numeric count, using 0");
        0
    }))
}
