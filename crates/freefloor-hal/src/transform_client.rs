//! `TransformSource` trait and the static frame-graph backend.

use freefloor_perception::{RigidTransform, TfEngine};
use freefloor_types::FloorError;
use tracing::debug;

use crate::config::TransformClientConfig;

/// A provider of rigid transforms between named reference frames.
pub trait TransformSource: Send {
    fn id(&self) -> &str;

    /// The transform mapping points expressed in `from_frame` into
    /// `to_frame`.
    ///
    /// # Errors
    ///
    /// Returns [`FloorError::TransformUnavailable`] when the frames are not
    /// connected.
    fn get_transform(&mut self, from_frame: &str, to_frame: &str)
        -> Result<RigidTransform, FloorError>;

    /// Release the client. Calling it more than once is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Answers lookups from a fixed set of frame edges.
pub struct StaticTransformSource {
    id: String,
    tf: TfEngine,
    open: bool,
}

impl StaticTransformSource {
    pub fn new(id: impl Into<String>, tf: TfEngine) -> Self {
        Self {
            id: id.into(),
            tf,
            open: true,
        }
    }

    /// Build the frame graph from the `transforms` list of a
    /// `[TRANSFORM_CLIENT]` section.
    pub fn from_config(config: &TransformClientConfig) -> Self {
        let mut tf = TfEngine::new();
        for edge in &config.transforms {
            debug!(parent = %edge.parent, child = %edge.child, "registering static transform");
            tf.set_transform(
                &edge.parent,
                &edge.child,
                RigidTransform::from_translation_rpy(edge.translation, edge.rpy),
            );
        }
        Self::new(config.device.clone(), tf)
    }
}

impl TransformSource for StaticTransformSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_transform(
        &mut self,
        from_frame: &str,
        to_frame: &str,
    ) -> Result<RigidTransform, FloorError> {
        let unavailable = || FloorError::TransformUnavailable {
            from: from_frame.to_string(),
            to: to_frame.to_string(),
        };
        if !self.open {
            return Err(unavailable());
        }
        self.tf.lookup(from_frame, to_frame).ok_or_else(unavailable)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
