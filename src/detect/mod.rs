// Detector boundary
//
// The object-detection model is an external collaborator. It is loaded once,
// shared read-only across runs, and hands back a lazy stream of per-frame
// detections plus the class-id -> label table it was trained with.
//
// Adapters:
// - sidecar: spawns the detector binary and streams its JSON-lines stdout
// - replay: re-reads a recorded JSON-lines detection log

pub mod reader;
pub mod replay;
pub mod sidecar;

use std::collections::BTreeMap;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PpeWatchError, Result};

pub type ClassId = u32;

/// One detected object instance as emitted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "cls")]
    pub class_id: ClassId,
    /// Not used by scoring; thresholding happens inside the detector.
    #[serde(rename = "conf", default)]
    pub confidence: f32,
}

/// Detector output for one processed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    pub boxes: Vec<RawDetection>,
}

impl RawFrame {
    pub fn from_class_ids(ids: &[ClassId]) -> Self {
        Self {
            boxes: ids
                .iter()
                .map(|&class_id| RawDetection { class_id, confidence: 1.0 })
                .collect(),
        }
    }
}

/// Class-id -> label table supplied by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelTable {
    names: BTreeMap<ClassId, String>,
}

impl LabelTable {
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (ClassId, S)>) -> Self {
        Self {
            names: pairs.into_iter().map(|(id, name)| (id, name.into())).collect(),
        }
    }

    /// Load a label table from a JSON object like `{"0": "Person", "1": "no_helmet"}`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PpeWatchError::LabelTable(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let table: LabelTable = serde_json::from_str(raw)
            .map_err(|e| PpeWatchError::LabelTable(e.to_string()))?;
        if table.is_empty() {
            return Err(PpeWatchError::LabelTable("label table is empty".to_string()));
        }
        Ok(table)
    }

    /// Build a table from string-keyed names such as a detector header.
    /// A key that is not a class id is a label table error.
    pub fn from_string_keys(names: BTreeMap<String, String>) -> Result<Self> {
        let names = names
            .into_iter()
            .map(|(key, name)| {
                key.parse::<ClassId>().map(|id| (id, name)).map_err(|_| {
                    PpeWatchError::LabelTable(format!("class id '{}' is not a number", key))
                })
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { names })
    }

    pub fn resolve(&self, class_id: ClassId) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check that a table announced by the detector agrees with this one.
    /// Every id the detector names must map to the same label here.
    pub fn check_consistent(&self, announced: &LabelTable) -> Result<()> {
        for (id, name) in &announced.names {
            match self.names.get(id) {
                Some(ours) if ours == name => {}
                Some(ours) => {
                    return Err(PpeWatchError::LabelTable(format!(
                        "class {} is '{}' in the detector but '{}' in the label table",
                        id, name, ours
                    )));
                }
                None => {
                    return Err(PpeWatchError::LabelTable(format!(
                        "class {} ('{}') is missing from the label table",
                        id, name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Lazy, finite, non-restartable frame sequence in temporal order.
pub type FrameStream = Box<dyn Iterator<Item = Result<RawFrame>>>;

/// Parameters for one detector invocation.
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub source: PathBuf,
    /// Parent directory for detector runs.
    pub project: PathBuf,
    /// Run directory name under `project`; rendered video lands there.
    pub name: String,
    pub confidence: f32,
    pub iou: f32,
}

impl PredictRequest {
    pub fn run_dir(&self) -> PathBuf {
        self.project.join(&self.name)
    }
}

/// Object detector shared across runs. Implementations must not mutate
/// shared state in `predict`.
pub trait Detector: Send + Sync {
    fn labels(&self) -> &LabelTable;

    /// Run detection on `request.source`, rendering an annotated video into
    /// `request.run_dir()` when the detector supports it.
    fn predict(&self, request: &PredictRequest) -> Result<FrameStream>;
}

/// Header line announcing the detector's label table. JSON object keys are
/// always strings, so ids are parsed after the fact.
#[derive(Debug, Deserialize)]
struct StreamHeader {
    names: BTreeMap<String, String>,
}

/// Frame iterator over the JSON-lines detection format:
/// an optional `{"names": {...}}` header, then one `{"boxes": [...]}` per frame.
pub struct JsonLinesFrames<R> {
    lines: std::io::Lines<R>,
    expected: LabelTable,
    line_no: usize,
    done: bool,
}

impl<R: BufRead> JsonLinesFrames<R> {
    pub fn new(reader: R, expected: LabelTable) -> Self {
        Self {
            lines: reader.lines(),
            expected,
            line_no: 0,
            done: false,
        }
    }

    /// Parse one non-blank line. A header is checked against the expected
    /// table and yields no frame.
    fn parse_record(&self, line: &str) -> Result<Option<RawFrame>> {
        let line_no = self.line_no;
        let malformed = |e: serde_json::Error| {
            PpeWatchError::Detection(format!(
                "malformed detection record on line {}: {}",
                line_no, e
            ))
        };

        let value: serde_json::Value = serde_json::from_str(line).map_err(malformed)?;
        if value.get("names").is_some() {
            let header: StreamHeader = serde_json::from_value(value).map_err(malformed)?;
            let announced = LabelTable::from_string_keys(header.names)?;
            self.expected.check_consistent(&announced)?;
            return Ok(None);
        }

        serde_json::from_value(value).map(Some).map_err(malformed)
    }

    fn fail(&mut self, err: PpeWatchError) -> Option<Result<RawFrame>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for JsonLinesFrames<R> {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return self.fail(PpeWatchError::Detection(format!("read error: {}", e))),
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match self.parse_record(trimmed) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(e) => return self.fail(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn table() -> LabelTable {
        LabelTable::from_pairs([(0, "Person"), (1, "no_helmet"), (2, "none"), (3, "no_gloves")])
    }

    #[test]
    fn test_label_table_from_json() {
        let t = LabelTable::from_json_str(r#"{"0": "Person", "3": "no_gloves"}"#).unwrap();
        assert_eq!(t.resolve(0), Some("Person"));
        assert_eq!(t.resolve(3), Some("no_gloves"));
        assert_eq!(t.resolve(1), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_label_table_rejects_empty() {
        assert!(LabelTable::from_json_str("{}").is_err());
    }

    #[test]
    fn test_label_table_rejects_non_numeric_ids() {
        assert!(LabelTable::from_json_str(r#"{"person": "Person"}"#).is_err());
    }

    #[test]
    fn test_consistency_check() {
        let ours = table();
        let same = LabelTable::from_pairs([(0, "Person"), (1, "no_helmet")]);
        assert!(ours.check_consistent(&same).is_ok());

        let swapped = LabelTable::from_pairs([(0, "no_helmet")]);
        assert!(ours.check_consistent(&swapped).is_err());

        let extra = LabelTable::from_pairs([(9, "forklift")]);
        assert!(ours.check_consistent(&extra).is_err());
    }

    #[test]
    fn test_json_lines_frames() {
        let input = concat!(
            "{\"names\": {\"0\": \"Person\", \"1\": \"no_helmet\"}}\n",
            "{\"boxes\": [{\"cls\": 0, \"conf\": 0.91}, {\"cls\": 1, \"conf\": 0.55}]}\n",
            "\n",
            "{\"boxes\": []}\n",
        );
        let frames: Vec<RawFrame> = JsonLinesFrames::new(Cursor::new(input), table())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].boxes.len(), 2);
        assert_eq!(frames[0].boxes[1].class_id, 1);
        assert!(frames[1].boxes.is_empty());
    }

    #[test]
    fn test_json_lines_malformed_stops_stream() {
        let input = "{\"boxes\": [{\"cls\": 0}]}\n{\"boxs\": []}\n{\"boxes\": []}\n";
        let mut frames = JsonLinesFrames::new(Cursor::new(input), table());

        assert!(frames.next().unwrap().is_ok());
        let err = frames.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_label_table_from_string_keys() {
        let mut names = BTreeMap::new();
        names.insert("2".to_string(), "none".to_string());
        let t = LabelTable::from_string_keys(names).unwrap();
        assert_eq!(t.resolve(2), Some("none"));

        let mut bad = BTreeMap::new();
        bad.insert("two".to_string(), "none".to_string());
        assert!(matches!(LabelTable::from_string_keys(bad), Err(PpeWatchError::LabelTable(_))));
    }

    #[test]
    fn test_json_lines_header_bad_id() {
        let input = "{\"names\": {\"x\": \"Person\"}}\n{\"boxes\": []}\n";
        let mut frames = JsonLinesFrames::new(Cursor::new(input), table());
        assert!(matches!(frames.next(), Some(Err(PpeWatchError::LabelTable(_)))));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_json_lines_header_mismatch() {
        let input = "{\"names\": {\"0\": \"Helmet\"}}\n{\"boxes\": []}\n";
        let mut frames = JsonLinesFrames::new(Cursor::new(input), table());
        assert!(matches!(frames.next(), Some(Err(PpeWatchError::LabelTable(_)))));
        assert!(frames.next().is_none());
    }
}
