/// Where a voice plays from
///
/// No anchor means 2D playback. A fixed anchor places a 3D voice at a point;
/// a tracked anchor follows a shared transform that the caller moves and the
/// pool re-reads on every update.
use std::cell::Cell;
use std::rc::Rc;

use crate::backend::Position;

/// A position shared between the caller and the voices following it
#[derive(Debug, Clone, Default)]
pub struct TrackedTransform {
    position: Rc<Cell<Position>>,
}

impl TrackedTransform {
    pub fn new(position: Position) -> Self {
        Self {
            position: Rc::new(Cell::new(position)),
        }
    }

    pub fn position(&self) -> Position {
        self.position.get()
    }

    pub fn set_position(&self, position: Position) {
        self.position.set(position);
    }
}

#[derive(Debug, Clone, Default)]
pub enum Anchor {
    #[default]
    Flat,
    Fixed(Position),
    Tracking(TrackedTransform),
}

impl Anchor {
    /// Build from the optional play arguments; tracking wins over position
    pub fn from_options(position: Option<Position>, tracking: Option<TrackedTransform>) -> Self {
        match (tracking, position) {
            (Some(target), _) => Anchor::Tracking(target),
            (None, Some(position)) => Anchor::Fixed(position),
            (None, None) => Anchor::Flat,
        }
    }

    /// Emitter position for 3D voices, `None` for 2D
    pub fn spatial(&self) -> Option<Position> {
        match self {
            Anchor::Flat => None,
            Anchor::Fixed(position) => Some(*position),
            Anchor::Tracking(target) => Some(target.position()),
        }
    }

    pub fn is_spatial(&self) -> bool {
        !matches!(self, Anchor::Flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_options_is_flat() {
        let anchor = Anchor::from_options(None, None);
        assert!(!anchor.is_spatial());
        assert_eq!(anchor.spatial(), None);
    }

    #[test]
    fn test_fixed_position() {
        let anchor = Anchor::from_options(Some([1.0, 2.0, 3.0]), None);
        assert_eq!(anchor.spatial(), Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_tracking_follows_transform() {
        let transform = TrackedTransform::new([0.0; 3]);
        let anchor = Anchor::from_options(Some([9.0; 3]), Some(transform.clone()));

        transform.set_position([4.0, 0.0, 0.0]);
        assert_eq!(anchor.spatial(), Some([4.0, 0.0, 0.0]));
    }
}
