//! Appointment lists laid out as a calendar: a `Month Year` header followed by
//! `day weekday time tz description` lines and their detail lines.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::APPOINTMENT_LOOKAHEAD;
use crate::models::Appointment;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static MONTH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})$").unwrap()
});

static MONTH_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(january|february|march|april|may|june|july|august|september|october|november|december)\b").unwrap()
});

static APPOINTMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})\s*(?:mon|tue|wed|thu|fri|sat|sun)?\s*(\d{1,2}:\d{2}\s*[ap]\.?m\.?)\s*(?:[MECP][SD]?T\b)?\s*(.+?)$").unwrap()
});

static DAY_LEAD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}\s").unwrap());

/// Holds the month and year of the last header seen.
#[derive(Debug, Default)]
pub struct AppointmentScan {
    month: Option<u32>,
    year: Option<i32>,
}

impl AppointmentScan {
    pub fn scan(mut self, text: &str) -> Vec<Appointment> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let mut found = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if let Some(caps) = MONTH_HEADER.captures(line) {
                let name = caps[1].to_lowercase();
                self.month = MONTHS.iter().position(|m| *m == name).map(|p| p as u32 + 1);
                self.year = caps[2].parse().ok();
                continue;
            }

            let (Some(month), Some(year)) = (self.month, self.year) else {
                continue;
            };
            let Some(caps) = APPOINTMENT_LINE.captures(line) else {
                continue;
            };
            let Some(date) = caps[1]
                .parse()
                .ok()
                .and_then(|day| NaiveDate::from_ymd_opt(year, month, day))
            else {
                tracing::debug!(line = %line, "Dropped appointment with impossible date");
                continue;
            };

            let mut appt = Appointment::new(date);
            appt.time = Some(caps[2].trim().to_string());
            appt.appointment_type = Some(caps[3].trim().to_string());
            collect_details(&lines[i + 1..], &mut appt);
            found.push(appt);
        }
        found
    }
}

/// `At …`, `Clinic: …` and `Location: …` from the lines right after an
/// appointment, up to the next day or month line.
fn collect_details(following: &[&str], appt: &mut Appointment) {
    for line in following.iter().take(APPOINTMENT_LOOKAHEAD) {
        if let Some(rest) = line.strip_prefix("At ") {
            appt.facility = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Clinic:") {
            appt.clinic = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Location:") {
            appt.location = Some(rest.trim().to_string());
        } else if DAY_LEAD.is_match(line) || MONTH_PREFIX.is_match(line) {
            break;
        }
    }
}
