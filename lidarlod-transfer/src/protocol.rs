//! Wire events
//!
//! Every frame is a JSON object tagged by its `Event` field with PascalCase
//! payload fields, for example `{"Event":"points","Points":[...],"TotalChunks":3}`.

use lidarlod_core::{Error, Result};
use lidarlod_io::LasHeader;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Event")]
pub enum Event {
    #[serde(rename = "sessionId", rename_all = "PascalCase")]
    SessionId { session_id: String },

    #[serde(rename = "headers")]
    Headers(LasHeader),

    /// A slice of the flat point payload, seven floats per point
    #[serde(rename = "points", rename_all = "PascalCase")]
    Points { points: Vec<f64>, total_chunks: usize },

    #[serde(rename = "progress", rename_all = "PascalCase")]
    Progress { message: String },

    #[serde(rename = "done")]
    Done,

    #[serde(rename = "lod-points", rename_all = "PascalCase")]
    LodPoints {
        points: Vec<f64>,
        total_chunks: usize,
        render_distance: f64,
        label: String,
    },

    #[serde(rename = "file-ready", rename_all = "PascalCase")]
    FileReady { file_path: String },
}

impl Event {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionId { .. } => "sessionId",
            Event::Headers(_) => "headers",
            Event::Points { .. } => "points",
            Event::Progress { .. } => "progress",
            Event::Done => "done",
            Event::LodPoints { .. } => "lod-points",
            Event::FileReady { .. } => "file-ready",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidarlod_io::LasVersion;
    use serde_json::{json, Value};

    fn header() -> LasHeader {
        LasHeader {
            point_offset: 227,
            format_id: 3,
            struct_size: 34,
            point_count: 12,
            scale: [0.01, 0.01, 0.01],
            offset: [1.0, 2.0, 3.0],
            maximum_bounds: [10.0, 10.0, 10.0],
            minimum_bounds: [0.0, 0.0, 0.0],
            version: LasVersion::default(),
        }
    }

    #[test]
    fn test_points_wire_shape() {
        let event = Event::Points {
            points: vec![1.0, 2.0],
            total_chunks: 3,
        };
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"Event": "points", "Points": [1.0, 2.0], "TotalChunks": 3}));
    }

    #[test]
    fn test_headers_wire_shape() {
        let value: Value = serde_json::from_str(&Event::Headers(header()).to_json().unwrap()).unwrap();
        assert_eq!(value["Event"], "headers");
        assert_eq!(value["PointOffset"], 227);
        assert_eq!(value["FormatId"], 3);
        assert_eq!(value["StructSize"], 34);
        assert_eq!(value["MinimumBounds"], json!([0.0, 0.0, 0.0]));
        assert!(value.get("Version").is_none());

        let back = Event::from_json(&value.to_string()).unwrap();
        assert_eq!(back, Event::Headers(header()));
    }

    #[test]
    fn test_parses_client_frames() {
        let done = Event::from_json(r#"{"Event":"done"}"#).unwrap();
        assert_eq!(done, Event::Done);
        assert_eq!(done.name(), "done");

        let lod = Event::from_json(
            r#"{"Event":"lod-points","Points":[],"TotalChunks":0,"RenderDistance":200,"Label":"medium"}"#,
        )
        .unwrap();
        assert_eq!(lod.name(), "lod-points");

        let ready = Event::from_json(r#"{"Event":"file-ready","FilePath":"/files/a.las"}"#).unwrap();
        assert_eq!(
            ready,
            Event::FileReady {
                file_path: "/files/a.las".to_string()
            }
        );

        let session = Event::from_json(r#"{"Event":"sessionId","SessionId":"abc"}"#).unwrap();
        assert_eq!(
            session,
            Event::SessionId {
                session_id: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_frames_are_serialization_errors() {
        assert!(matches!(Event::from_json("not json"), Err(Error::Serialization(_))));
        assert!(matches!(
            Event::from_json(r#"{"Event":"teleport"}"#),
            Err(Error::Serialization(_))
        ));
        assert!(Event::from_json(r#"{"Event":"points","Points":[1.0]}"#).is_err());
    }
}
