use std::fmt::Display;

use tracing::{debug, warn};

use crate::context::GraphicsContext;
use crate::types::CanvasDimensions;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanvasError {
    #[error("shader preview is not supported here: {0}")]
    Unsupported(String),
}

/// A drawing surface plus the context rendering into it. The canvas is the
/// only place pixel dimensions change.
#[derive(Debug)]
pub struct Canvas<C> {
    context: C,
    /// Size the context actually renders at.
    size: CanvasDimensions,
    /// Last box the canvas was asked to match.
    content_box: CanvasDimensions,
}

impl<C: GraphicsContext> Canvas<C> {
    /// Sizes the surface to at least `floor` on each axis and acquires a
    /// context for it.
    pub fn mount<F, E>(
        container: CanvasDimensions,
        floor: CanvasDimensions,
        acquire: F,
    ) -> Result<Self, CanvasError>
    where
        F: FnOnce(CanvasDimensions) -> Result<C, E>,
        E: Display,
    {
        let size = container.at_least(floor);
        match acquire(size) {
            Ok(context) => {
                debug!(%container, %size, "canvas mounted");
                Ok(Self {
                    context,
                    size,
                    content_box: size,
                })
            }
            Err(err) => {
                warn!(error = %err, "failed to acquire rendering context");
                Err(CanvasError::Unsupported(err.to_string()))
            }
        }
    }

    pub fn size(&self) -> CanvasDimensions {
        self.size
    }

    /// Matches the content box, or as much of it as the context accepts. A
    /// zero-area box is recorded but the context keeps its last configured
    /// surface.
    pub fn observe_resize(&mut self, content_box: CanvasDimensions) {
        if content_box == self.content_box {
            return;
        }
        self.content_box = content_box;
        let applied = if content_box.is_zero_area() {
            content_box
        } else {
            self.context.resize(content_box)
        };
        debug!(from = %self.size, to = %applied, requested = %content_box, "canvas resized");
        self.size = applied;
    }

    /// Catches up with the displayed size when no resize notification has
    /// arrived yet. Returns whether anything changed.
    pub fn reconcile(&mut self, displayed: CanvasDimensions) -> bool {
        if displayed == self.content_box {
            return false;
        }
        self.observe_resize(displayed);
        true
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }
}
