//! Tolerant reader for layout metadata reports.
//!
//! Extraction scripts have written several shapes over time:
//! `{"cells": 3, "layers": 2, "top_cell": "TOP"}`,
//! `{"cell_count": 3, "layers": [{"layer": 1, "datatype": 0, "name": ""}]}` and
//! `{"dbu": 0.001, "bbox": [...], "layers": ["1/0"]}`. Unknown keys are ignored.

use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutMetadata {
    pub top_cell: Option<String>,
    pub cell_count: Option<u64>,
    pub layer_count: Option<u64>,
    /// `layer/datatype` labels, with the layer name appended when present.
    pub layers: Vec<String>,
    pub dbu: Option<f64>,
    pub bbox: Option<[f64; 4]>,
}

impl LayoutMetadata {
    /// `None` when the text is not a JSON object or carries none of the known keys.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let obj = value.as_object()?;
        let mut meta = LayoutMetadata {
            top_cell: obj
                .get("top_cell")
                .and_then(Value::as_str)
                .map(str::to_string),
            cell_count: obj
                .get("cell_count")
                .and_then(Value::as_u64)
                .or_else(|| obj.get("cells").and_then(Value::as_u64)),
            dbu: obj.get("dbu").and_then(Value::as_f64),
            ..LayoutMetadata::default()
        };
        match obj.get("layers") {
            Some(Value::Number(n)) => meta.layer_count = n.as_u64(),
            Some(Value::Array(items)) => {
                meta.layers = items.iter().filter_map(layer_label).collect();
                meta.layer_count = Some(items.len() as u64);
            }
            _ => {}
        }
        if let Some(Value::Array(coords)) = obj.get("bbox") {
            let nums: Vec<f64> = coords.iter().filter_map(Value::as_f64).collect();
            if nums.len() == 4 {
                meta.bbox = Some([nums[0], nums[1], nums[2], nums[3]]);
            }
        }
        if meta == LayoutMetadata::default() {
            return None;
        }
        Some(meta)
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(top) = &self.top_cell {
            lines.push(format!("Top cell: {}", top));
        }
        if let Some(cells) = self.cell_count {
            lines.push(format!("Cells: {}", cells));
        }
        if let Some(count) = self.layer_count {
            lines.push(format!("Layers: {}", count));
        }
        if !self.layers.is_empty() {
            lines.push(format!("Layer list: {}", self.layers.join(", ")));
        }
        if let Some(dbu) = self.dbu {
            lines.push(format!("Database unit: {} um", dbu));
        }
        if let Some([l, b, r, t]) = self.bbox {
            lines.push(format!("Bounding box: ({}, {}) - ({}, {})", l, b, r, t));
        }
        lines
    }
}

fn layer_label(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => {
            let layer = obj.get("layer").and_then(Value::as_i64)?;
            let datatype = obj.get("datatype").and_then(Value::as_i64).unwrap_or(0);
            match obj.get("name").and_then(Value::as_str) {
                Some(name) if !name.is_empty() => {
                    Some(format!("{}/{} {}", layer, datatype, name))
                }
                _ => Some(format!("{}/{}", layer, datatype)),
            }
        }
        _ => None,
    }
}
