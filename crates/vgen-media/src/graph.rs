//! Overlay chain construction and `-filter_complex` rendering.

use std::collections::HashSet;
use std::fmt;

use vgen_models::{AssetRole, GeometrySpec};

use crate::error::{MediaError, MediaResult};

/// Index of the base video among encoder inputs.
pub const BASE_INPUT: usize = 0;

/// A stream consumed by an overlay step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamRef {
    /// Video stream of the encoder input at this index
    Input(usize),
    /// Output of an earlier step
    Step(String),
}

impl fmt::Display for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamRef::Input(index) => write!(f, "[{index}:v]"),
            StreamRef::Step(label) => write!(f, "[{label}]"),
        }
    }
}

/// One binary overlay: `overlay` is drawn on `base` with its top-left at (x, y).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayStep {
    pub base: StreamRef,
    pub overlay: StreamRef,
    pub x: i64,
    pub y: i64,
    pub output: String,
}

impl OverlayStep {
    fn to_filter(&self) -> String {
        format!(
            "{}{}overlay=x={}:y={}[{}]",
            self.base, self.overlay, self.x, self.y, self.output
        )
    }
}

/// Ordered overlay chain over the base video and the asset layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionGraph {
    /// Asset roles for encoder inputs 1.., in index order
    inputs: Vec<AssetRole>,
    steps: Vec<OverlayStep>,
}

impl CompositionGraph {
    /// Build the fixed chain: label box, then avatar, then (optionally) text.
    ///
    /// Step order never varies; later layers draw on top of earlier ones.
    pub fn build(geometry: &GeometrySpec, include_text: bool) -> Self {
        let label = geometry.label.origin;
        let anchor = geometry.anchor;

        let mut inputs = vec![AssetRole::Avatar, AssetRole::LabelBackground];
        let mut steps = vec![
            OverlayStep {
                base: StreamRef::Input(BASE_INPUT),
                overlay: StreamRef::Input(AssetRole::LabelBackground.input_index()),
                x: label.x,
                y: label.y,
                output: "v1".to_string(),
            },
            OverlayStep {
                base: StreamRef::Step("v1".to_string()),
                overlay: StreamRef::Input(AssetRole::Avatar.input_index()),
                x: anchor.x,
                y: anchor.y,
                output: "v2".to_string(),
            },
        ];

        if include_text {
            inputs.push(AssetRole::LabelText);
            steps.push(OverlayStep {
                base: StreamRef::Step("v2".to_string()),
                overlay: StreamRef::Input(AssetRole::LabelText.input_index()),
                x: label.x,
                y: label.y,
                output: "v3".to_string(),
            });
        }

        Self { inputs, steps }
    }

    /// Assemble a graph from explicit parts. Call [`validate`](Self::validate)
    /// before handing it to an encoder.
    pub fn from_parts(inputs: Vec<AssetRole>, steps: Vec<OverlayStep>) -> Self {
        Self { inputs, steps }
    }

    pub fn steps(&self) -> &[OverlayStep] {
        &self.steps
    }

    /// Asset roles feeding encoder inputs 1.., in index order.
    pub fn inputs(&self) -> &[AssetRole] {
        &self.inputs
    }

    pub fn includes(&self, role: AssetRole) -> bool {
        self.inputs.contains(&role)
    }

    /// Label of the final composited stream.
    pub fn terminal(&self) -> Option<&str> {
        self.steps.last().map(|s| s.output.as_str())
    }

    /// Check that every step only references the inputs or earlier outputs,
    /// and that output labels are unique.
    pub fn validate(&self) -> MediaResult<()> {
        if self.steps.is_empty() {
            return Err(MediaError::InvalidGraph("graph has no steps".to_string()));
        }

        let input_count = self.inputs.len() + 1;
        let mut produced: HashSet<&str> = HashSet::new();

        for (i, step) in self.steps.iter().enumerate() {
            for stream in [&step.base, &step.overlay] {
                match stream {
                    StreamRef::Input(index) if *index >= input_count => {
                        return Err(MediaError::InvalidGraph(format!(
                            "step {i} references input {index} but only {input_count} inputs exist"
                        )));
                    }
                    StreamRef::Step(label) if !produced.contains(label.as_str()) => {
                        return Err(MediaError::InvalidGraph(format!(
                            "step {i} references [{label}] before it is produced"
                        )));
                    }
                    _ => {}
                }
            }

            if step.output.is_empty() || !produced.insert(step.output.as_str()) {
                return Err(MediaError::InvalidGraph(format!(
                    "step {i} has an empty or duplicate output label [{}]",
                    step.output
                )));
            }
        }

        Ok(())
    }

    /// Render as an ffmpeg `-filter_complex` expression.
    pub fn to_filter_complex(&self) -> String {
        self.steps
            .iter()
            .map(OverlayStep::to_filter)
            .collect::<Vec<_>>()
            .join(";")
    }
}
