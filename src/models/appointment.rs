use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub date: NaiveDate,
    pub time: Option<String>,
    pub appointment_type: Option<String>,
    pub facility: Option<String>,
    pub clinic: Option<String>,
    pub location: Option<String>,
}

impl Appointment {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            time: None,
            appointment_type: None,
            facility: None,
            clinic: None,
            location: None,
        }
    }

    /// Composite natural key: date + time + type.
    pub fn key(&self) -> String {
        let time: String = self
            .time
            .as_deref()
            .unwrap_or("unknown")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let kind = super::slugify(self.appointment_type.as_deref().unwrap_or("visit"));
        format!("appt_{}_{}_{}", self.date.format("%Y-%m-%d"), time, kind)
    }
}
