use crate::anim::lookup::OFF_SCREEN;

/// Carry-over between interpolation segments. Widths and positions describe
/// the bars as they were at the end of the previous segment, so a segment
/// that is interrupted by a rank change continues from where the bars
/// actually are, not from the previous snapshot's resting layout.
#[derive(Clone, Debug)]
pub struct AnimationState {
    /// Bar widths at the previous snapshot boundary, slot order of that
    /// snapshot.
    pub prev_widths: Vec<f64>,
    /// Display names bound to each slot at the previous snapshot boundary.
    pub prev_names: Vec<String>,
    /// Resting positions the bars were headed to in the previous segment.
    pub prev_positions: Vec<f64>,
    /// Positions the bars actually reached at the last rendered sub-step.
    pub prev_interp_positions: Vec<f64>,
}

impl AnimationState {
    /// Before the first frame every slot is hidden: zero width, no name, and
    /// parked off screen.
    pub fn new(top_n: usize) -> Self {
        Self {
            prev_widths: vec![0.0; top_n],
            prev_names: vec![String::new(); top_n],
            prev_positions: vec![OFF_SCREEN; top_n],
            prev_interp_positions: vec![OFF_SCREEN; top_n],
        }
    }
}
