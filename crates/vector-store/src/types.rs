use serde::{Deserialize, Serialize};

/// One nearest-neighbor match: a store position and its squared L2 distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub position: usize,
    pub distance: f32,
}
