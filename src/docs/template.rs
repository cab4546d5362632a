//! The entry template: one shared contract between writer and reader.
//!
//! The log document is both the human-readable record and the query store,
//! so the render template and the parse grammar must stay in lockstep —
//! changing a prefix here breaks retroactive parsing of entries already
//! written with the old one. Everything that touches entry text lives in
//! this module: heading builders, body renderers, and the parsers that
//! reconstruct records from the rendered document.

use std::ops::Range;

use chrono::NaiveDate;

use crate::record::{DailyRecord, StretchEntry, WeeklyRecap, NOT_SPECIFIED};

/// Heading prefix for daily check-in entries.
pub const DAILY_HEADING_PREFIX: &str = "Daily Check-in: ";
/// Heading prefix for weekly recap entries.
pub const WEEKLY_HEADING_PREFIX: &str = "Week of ";
/// Heading prefix for the user's post-recap reflection.
pub const WEEKLY_RESPONSE_PREFIX: &str = "Weekly Response: ";
/// Heading prefix for stretch check entries.
pub const STRETCH_HEADING_PREFIX: &str = "Stretch Check: ";

const WORKOUT_BULLET: &str = "• Workout:";
const EATING_BULLET: &str = "• Eating Feelings:";
const GOALS_BULLET: &str = "• Short-term Goals:";
const STRETCHED_FIELD: &str = "Stretched:";
const RESPONSE_FIELD: &str = "Response:";

/// Entry terminator line.
pub const SEPARATOR: &str = "---";

// -- Headings --

pub fn daily_heading(date: NaiveDate) -> String {
    format!("{DAILY_HEADING_PREFIX}{date}")
}

pub fn weekly_heading(week_start: NaiveDate) -> String {
    format!("{WEEKLY_HEADING_PREFIX}{week_start}")
}

pub fn weekly_response_heading(week_start: NaiveDate) -> String {
    format!("{WEEKLY_RESPONSE_PREFIX}{week_start}")
}

pub fn stretch_heading(date: NaiveDate) -> String {
    format!("{STRETCH_HEADING_PREFIX}{date}")
}

// -- Renderers --

/// Goals joined for display, with the sentinel standing in for none.
///
/// The sentinel (not an empty string) is what the parser recognizes, so an
/// empty goal list round-trips.
fn render_goals(goals: &[String]) -> String {
    if goals.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        goals.join(", ")
    }
}

/// Body of a daily check-in entry: the raw reply plus the extracted summary.
pub fn render_daily_body(record: &DailyRecord, raw_text: &str) -> String {
    format!(
        "Raw Response:\n{raw}\n\nSummary:\n{WORKOUT_BULLET} {workout}\n{EATING_BULLET} {eating}\n{GOALS_BULLET} {goals}",
        raw = raw_text.trim(),
        workout = record.workout,
        eating = record.eating_feelings,
        goals = render_goals(&record.short_term_goals),
    )
}

/// Body of a weekly recap entry. One-way: never re-parsed.
pub fn render_weekly_body(recap: &WeeklyRecap) -> String {
    format!(
        "Workout Count: {}\nGeneral Eating Feeling: {}\nSlip-ups: {}\nReflection: {}",
        recap.workout_count,
        recap.general_eating_feeling,
        recap.slip_ups,
        recap.suggested_reflection,
    )
}

/// Body of the user's post-recap reflection entry.
pub fn render_weekly_response_body(raw_text: &str) -> String {
    format!("User Rating & Goals:\n{}", raw_text.trim())
}

/// Body of a stretch check entry.
pub fn render_stretch_body(raw_text: &str, stretched: bool) -> String {
    format!(
        "{STRETCHED_FIELD} {}\n{RESPONSE_FIELD}\n{}",
        if stretched { "Yes" } else { "No" },
        raw_text.trim(),
    )
}

/// The full text block inserted for one entry: blank line, heading, body,
/// blank line, separator. What `append` writes and the parsers read back.
pub fn render_entry(heading: &str, body: &str) -> String {
    format!("\n{heading}\n{body}\n\n{SEPARATOR}\n")
}

/// Where the heading sits inside a rendered entry, as UTF-16 offsets from
/// the insertion point (the Docs API measures ranges in UTF-16 code units).
/// The entry opens with a newline, so the heading starts one unit in.
pub fn heading_span(heading: &str) -> Range<u32> {
    let len = heading.encode_utf16().count() as u32;
    1..1 + len
}

// -- Parsers --

/// Reconstruct up to `limit` daily records from the rendered document text.
///
/// Scans top-to-bottom for daily headings and reads each entry forward to
/// its separator. Entries are newest-first in the document, so scan order
/// is recency order — no date comparison needed. Missing bullets fall back
/// to the sentinel / empty goals; headings with unparseable dates are
/// skipped.
pub fn parse_daily_entries(text: &str, limit: usize) -> Vec<DailyRecord> {
    let mut records = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        if records.len() >= limit {
            break;
        }
        let line = line.trim();
        let Some(date_str) = line.strip_prefix(DAILY_HEADING_PREFIX) else {
            continue;
        };
        let Ok(date) = date_str.trim().parse::<NaiveDate>() else {
            continue;
        };

        let mut record = DailyRecord::unspecified(date);
        for body_line in lines.by_ref() {
            let body_line = body_line.trim();
            if body_line == SEPARATOR {
                break;
            }
            if let Some(rest) = body_line.strip_prefix(WORKOUT_BULLET) {
                record.workout = rest.trim().to_string();
            } else if let Some(rest) = body_line.strip_prefix(EATING_BULLET) {
                record.eating_feelings = rest.trim().to_string();
            } else if let Some(rest) = body_line.strip_prefix(GOALS_BULLET) {
                record.short_term_goals = parse_goals(rest.trim());
            }
        }
        records.push(record);
    }

    records
}

/// The sentinel and the original implementation's empty join both mean
/// "no goals".
fn parse_goals(text: &str) -> Vec<String> {
    if text.is_empty() || text == NOT_SPECIFIED {
        return Vec::new();
    }
    text.split(',')
        .map(|goal| goal.trim().to_string())
        .filter(|goal| !goal.is_empty())
        .collect()
}

/// Collect up to `limit` daily entries as raw text blocks (heading + body),
/// newest first. Used to build short free-text context for the extractor.
pub fn parse_raw_entries(text: &str, limit: usize) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current: Option<Vec<String>> = None;

    for line in text.lines() {
        if entries.len() >= limit {
            break;
        }
        let line = line.trim();
        if line.starts_with(DAILY_HEADING_PREFIX) {
            if let Some(block) = current.take() {
                entries.push(block.join("\n"));
            }
            current = Some(vec![line.to_string()]);
        } else if line == SEPARATOR {
            if let Some(block) = current.take() {
                entries.push(block.join("\n"));
            }
        } else if let Some(block) = current.as_mut() {
            if !line.is_empty() {
                block.push(line.to_string());
            }
        }
    }

    if entries.len() < limit {
        if let Some(block) = current {
            entries.push(block.join("\n"));
        }
    }

    entries
}

/// Find the stretch entry for exactly `date`, newest first.
///
/// A later append for the same date shadows an earlier one purely by scan
/// order; writes are never de-duplicated.
pub fn parse_stretch_entry(text: &str, date: NaiveDate) -> Option<StretchEntry> {
    let wanted = date.to_string();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let line = line.trim();
        let Some(date_str) = line.strip_prefix(STRETCH_HEADING_PREFIX) else {
            continue;
        };
        if date_str.trim() != wanted {
            continue;
        }

        let mut stretched = false;
        let mut raw_lines: Vec<String> = Vec::new();
        let mut in_response = false;
        for body_line in lines.by_ref() {
            let body_line = body_line.trim();
            if body_line == SEPARATOR {
                break;
            }
            if let Some(rest) = body_line.strip_prefix(STRETCHED_FIELD) {
                stretched = rest.trim().eq_ignore_ascii_case("yes");
            } else if body_line == RESPONSE_FIELD {
                in_response = true;
            } else if in_response && !body_line.is_empty() {
                raw_lines.push(body_line.to_string());
            }
        }

        return Some(StretchEntry {
            date,
            stretched,
            raw_text: raw_lines.join("\n"),
        });
    }

    None
}
