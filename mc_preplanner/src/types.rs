//! Preplan output shapes (§4.F "Purpose" / "Output").

use std::collections::BTreeMap;

use crate::json_fmt::Json;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    pub min: BTreeMap<char, f64>,
    pub max: BTreeMap<char, f64>,
}

impl Bounds {
    pub fn extend(&mut self, axis: char, value: f64) {
        self.min
            .entry(axis)
            .and_modify(|m| *m = m.min(value))
            .or_insert(value);
        self.max
            .entry(axis)
            .and_modify(|m| *m = m.max(value))
            .or_insert(value);
    }

    pub fn to_json(&self) -> Json {
        let axis_map = |m: &BTreeMap<char, f64>| {
            Json::Object(
                m.iter()
                    .map(|(a, v)| (a.to_string(), Json::Float(*v)))
                    .collect(),
            )
        };
        Json::Object(vec![
            ("min".to_string(), axis_map(&self.min)),
            ("max".to_string(), axis_map(&self.max)),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewData {
    pub time: f64,
    pub lines: u64,
    pub path: Vec<(BTreeMap<char, f64>, f64)>, // (position, speed)
    pub max_speed: f64,
    pub messages: Vec<String>,
}

impl PreviewData {
    pub fn to_json(&self) -> Json {
        let path = self
            .path
            .iter()
            .map(|(pos, speed)| {
                Json::Object(vec![
                    (
                        "position".to_string(),
                        Json::Object(
                            pos.iter()
                                .map(|(a, v)| (a.to_string(), Json::Float(*v)))
                                .collect(),
                        ),
                    ),
                    ("speed".to_string(), Json::Float(*speed)),
                ])
            })
            .collect();

        Json::Object(vec![
            ("time".to_string(), Json::Float(self.time)),
            ("lines".to_string(), Json::Int(self.lines as i64)),
            ("path".to_string(), Json::Array(path)),
            ("maxSpeed".to_string(), Json::Float(self.max_speed)),
            (
                "messages".to_string(),
                Json::Array(self.messages.iter().cloned().map(Json::Str).collect()),
            ),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreplanMeta {
    pub bounds: Bounds,
}

impl PreplanMeta {
    pub fn to_json(&self) -> Json {
        Json::Object(vec![("bounds".to_string(), self.bounds.to_json())])
    }
}
