// Detection stream reader
// Resolves raw class ids into labels, one FrameDetections per detector frame.

use serde::{Deserialize, Serialize};

use super::{LabelTable, RawFrame};
use crate::error::{PpeWatchError, Result};

/// Labels observed in one frame, one entry per detected object instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub index: usize,
    pub labels: Vec<String>,
}

/// Turns a raw frame stream into labelled frames, preserving order and
/// multiplicity. Stops after the first error.
pub struct DetectionStreamReader<'a, I> {
    frames: I,
    labels: &'a LabelTable,
    index: usize,
    failed: bool,
}

impl<'a, I> DetectionStreamReader<'a, I>
where
    I: Iterator<Item = Result<RawFrame>>,
{
    pub fn new<T>(frames: T, labels: &'a LabelTable) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            frames: frames.into_iter(),
            labels,
            index: 0,
            failed: false,
        }
    }

    fn resolve(&self, frame: RawFrame) -> Result<FrameDetections> {
        let labels = frame
            .boxes
            .iter()
            .map(|det| {
                self.labels
                    .resolve(det.class_id)
                    .map(str::to_string)
                    .ok_or(PpeWatchError::UnknownClassId {
                        frame: self.index,
                        class_id: det.class_id,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FrameDetections { index: self.index, labels })
    }
}

impl<'a, I> Iterator for DetectionStreamReader<'a, I>
where
    I: Iterator<Item = Result<RawFrame>>,
{
    type Item = Result<FrameDetections>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let item = match self.frames.next()? {
            Ok(frame) => self.resolve(frame),
            Err(e) => Err(e),
        };

        match item {
            Ok(frame) => {
                self.index += 1;
                Some(Ok(frame))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
