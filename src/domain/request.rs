//! In-seat assistance requests raised during a service

use crate::domain::seat::SectionName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the attendee asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "Pen")]
    Pen,
    #[serde(rename = "Sermon Notes")]
    SermonNotes,
    #[serde(rename = "Offering Envelope")]
    OfferingEnvelope,
    #[serde(rename = "Offering Envelope (Dream Now)")]
    OfferingEnvelopeDreamNow,
    #[serde(rename = "Voiceover Device")]
    VoiceoverDevice,
    #[serde(rename = "Prayer")]
    Prayer,
    #[serde(rename = "Other")]
    Other,
}

impl RequestType {
    pub const ALL: [RequestType; 7] = [
        RequestType::Pen,
        RequestType::SermonNotes,
        RequestType::OfferingEnvelope,
        RequestType::OfferingEnvelopeDreamNow,
        RequestType::VoiceoverDevice,
        RequestType::Prayer,
        RequestType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Pen => "Pen",
            RequestType::SermonNotes => "Sermon Notes",
            RequestType::OfferingEnvelope => "Offering Envelope",
            RequestType::OfferingEnvelopeDreamNow => "Offering Envelope (Dream Now)",
            RequestType::VoiceoverDevice => "Voiceover Device",
            RequestType::Prayer => "Prayer",
            RequestType::Other => "Other",
        }
    }

    /// Physical items, where a quantity makes sense
    pub fn is_quantifiable(&self) -> bool {
        !matches!(self, RequestType::Prayer | RequestType::Other)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown request type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Resolved,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Resolved => "resolved",
        }
    }
}

/// Store-assigned request id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request as raised from the floor, before the store assigns id and time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub section: SectionName,
    pub row: u32,
    /// Free-text location when the row alone is ambiguous (e.g. "aisle seat")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_label: Option<String>,
    pub request_type: RequestType,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub note: String,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub section: SectionName,
    pub row: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_label: Option<String>,
    pub request_type: RequestType,
    pub quantity: u32,
    pub note: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_type_wire_names() {
        let json = serde_json::to_string(&RequestType::OfferingEnvelopeDreamNow).unwrap();
        assert_eq!(json, "\"Offering Envelope (Dream Now)\"");
        assert_eq!("sermon notes".parse::<RequestType>().unwrap(), RequestType::SermonNotes);
    }

    #[test]
    fn test_quantifiable_types() {
        let quantifiable: Vec<RequestType> =
            RequestType::ALL.into_iter().filter(|t| t.is_quantifiable()).collect();
        assert_eq!(quantifiable.len(), 5);
        assert!(!RequestType::Prayer.is_quantifiable());
    }

    #[test]
    fn test_new_request_defaults() {
        let json = r#"{"section":"left","row":3,"request_type":"Pen"}"#;
        let req: NewRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.note.is_empty());
        assert!(req.area_label.is_none());
    }
}
