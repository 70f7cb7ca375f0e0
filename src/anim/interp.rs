use chrono::NaiveDate;

use crate::{
    anim::{
        ease::Ease,
        lookup::{self, OFF_SCREEN, POSITION_MAX},
        state::AnimationState,
        tracker,
    },
    data::event::RankBy,
    foundation::error::{RaceError, RaceResult},
    snapshot::builder::Snapshot,
    snapshot::label,
};

/// Width at which the parent caption is wrapped.
const CAPTION_WRAP_WIDTH: usize = 30;

/// Everything the renderer needs to draw one slot on one frame.
#[derive(Clone, Debug)]
pub struct SlotFrame {
    pub name: String,
    pub label: String,
    /// Wrapped "(parent)" caption, empty when the rank dimension has none.
    pub caption: String,
    /// Interpolated metric value, rendered as the bar's value text.
    pub value: f64,
    /// Bar width in data units after the minimum-width floor.
    pub display_width: f64,
    /// Vertical bar centre in slot-position units.
    pub position: f64,
    pub active: bool,
    pub label_lines: usize,
}

/// Fully resolved geometry of one output frame.
#[derive(Clone, Debug)]
pub struct FrameSpec {
    pub main_frame: usize,
    pub sub_step: usize,
    pub at: NaiveDate,
    pub slots: Vec<SlotFrame>,
    /// Horizontal axis upper bound in data units. Zero on all-hidden frames.
    pub axis_max: f64,
    /// Gap between a bar tip and its value text, in data units.
    pub value_offset: f64,
}

/// Compute frame `frame` of the race and advance `state` past it.
///
/// Frames must be computed in order from frame 0 with the same `state`; the
/// carry-over is what lets a bar interrupted mid-glide continue from where it
/// is instead of snapping back to its resting position.
pub fn compute_frame(
    snapshots: &[Snapshot],
    rank_by: RankBy,
    interp_steps: usize,
    ease: Ease,
    state: &mut AnimationState,
    frame: usize,
) -> RaceResult<FrameSpec> {
    if interp_steps == 0 {
        return Err(RaceError::animation("interp_steps must be >= 1"));
    }
    let main_frame = frame / interp_steps;
    let sub_step = frame % interp_steps;
    let snapshot = snapshots.get(main_frame).ok_or_else(|| {
        RaceError::animation(format!(
            "frame {frame} is past the end of a {}-snapshot timeline",
            snapshots.len()
        ))
    })?;
    let top_n = snapshot.slots.len();

    let target_positions = lookup::slot_positions(top_n);

    // Where each bar starts this sub-step. At a segment boundary the bars of
    // the new ranking are matched back to the old slots by name; mid-segment
    // the bars continue from wherever the previous frame left them.
    let start_positions: Vec<f64> = if sub_step == 0 {
        if frame == 0 {
            vec![OFF_SCREEN; top_n]
        } else {
            let plan = tracker::plan_transition(&state.prev_names, &snapshot.names());
            plan.from_slot
                .iter()
                .map(|src| match src {
                    Some(j) => state.prev_interp_positions[*j],
                    None => OFF_SCREEN,
                })
                .collect()
        }
    } else {
        state.prev_interp_positions.clone()
    };

    let t = if interp_steps > 1 {
        sub_step as f64 / (interp_steps as f64 - 1.0)
    } else {
        1.0
    };
    let t_eased = ease.apply(t);

    let mut interp_positions: Vec<f64> = (0..top_n)
        .map(|i| {
            (start_positions[i] + (target_positions[i] - start_positions[i]) * t_eased)
                .clamp(OFF_SCREEN, POSITION_MAX)
        })
        .collect();

    // Widths interpolate slot-wise against the previous snapshot's widths.
    let target_widths = snapshot.values();
    let interp_widths: Vec<f64> = (0..top_n)
        .map(|i| state.prev_widths[i] + (target_widths[i] - state.prev_widths[i]) * t_eased)
        .collect();

    let max_width = interp_widths.iter().copied().fold(0.0_f64, f64::max);
    let min_width = max_width * lookup::min_width_fraction(top_n);

    let mut display_widths = Vec::with_capacity(top_n);
    let mut active = Vec::with_capacity(top_n);
    for (i, &width) in interp_widths.iter().enumerate() {
        if width > 0.0 && !snapshot.slots[i].name.is_empty() {
            display_widths.push(width.max(min_width));
            active.push(true);
        } else {
            display_widths.push(0.0);
            active.push(false);
        }
    }

    // The very first frame renders empty; bars enter on the frames after it.
    if frame == 0 && sub_step == 0 {
        display_widths = vec![0.0; top_n];
        interp_positions = vec![OFF_SCREEN; top_n];
        active = vec![false; top_n];
    }

    let max_display = display_widths.iter().copied().fold(0.0_f64, f64::max);
    let value_offset = (max_display * 0.03).max(0.01);

    let slots: Vec<SlotFrame> = (0..top_n)
        .map(|i| {
            let slot = &snapshot.slots[i];
            let caption = if rank_by.has_caption() && !slot.parent.is_empty() {
                label::wrap_label(&format!("({})", slot.parent), CAPTION_WRAP_WIDTH)
            } else {
                String::new()
            };
            SlotFrame {
                name: slot.name.clone(),
                label: slot.label.clone(),
                caption,
                value: interp_widths[i],
                display_width: display_widths[i],
                position: interp_positions[i],
                active: active[i],
                label_lines: label::line_count(&slot.label),
            }
        })
        .collect();

    // Carry the state forward. A finished segment snapshots the targets so the
    // next boundary matches against settled bars; otherwise only the live
    // positions advance.
    if sub_step == interp_steps - 1 {
        state.prev_widths = target_widths;
        state.prev_names = snapshot.names();
        state.prev_positions = target_positions.clone();
        state.prev_interp_positions = target_positions;
    } else {
        state.prev_interp_positions = interp_positions;
    }

    Ok(FrameSpec {
        main_frame,
        sub_step,
        at: snapshot.at,
        slots,
        axis_max: max_display * 1.1,
        value_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::builder::Slot;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    fn snap(day: u32, entries: &[(&str, f64)], top_n: usize) -> Snapshot {
        let mut slots: Vec<Slot> = entries
            .iter()
            .map(|(name, value)| Slot {
                name: name.to_string(),
                parent: "X".to_string(),
                label: name.to_string(),
                value: *value,
            })
            .collect();
        slots.resize_with(top_n, Slot::empty);
        Snapshot { at: d(day), slots }
    }

    #[test]
    fn first_frame_is_all_hidden() {
        let snapshots = vec![snap(1, &[("A", 10.0), ("B", 5.0)], 3)];
        let mut state = AnimationState::new(3);
        let spec =
            compute_frame(&snapshots, RankBy::Track, 4, Ease::SmoothStep, &mut state, 0).unwrap();
        for slot in &spec.slots {
            assert!(!slot.active);
            assert_eq!(slot.display_width, 0.0);
            assert_eq!(slot.position, OFF_SCREEN);
        }
        assert_eq!(spec.axis_max, 0.0);
        assert_eq!(spec.value_offset, 0.01);
    }

    #[test]
    fn segment_end_settles_on_targets() {
        let snapshots = vec![snap(1, &[("A", 10.0), ("B", 5.0)], 2)];
        let mut state = AnimationState::new(2);
        let steps = 5;
        let mut last = None;
        for frame in 0..steps {
            last = Some(
                compute_frame(
                    &snapshots,
                    RankBy::Track,
                    steps,
                    Ease::SmoothStep,
                    &mut state,
                    frame,
                )
                .unwrap(),
            );
        }
        let spec = last.unwrap();
        let positions = lookup::slot_positions(2);
        assert!((spec.slots[0].position - positions[0]).abs() < 1e-9);
        assert!((spec.slots[1].position - positions[1]).abs() < 1e-9);
        assert!((spec.slots[0].value - 10.0).abs() < 1e-9);
        assert!((spec.slots[1].value - 5.0).abs() < 1e-9);
        assert_eq!(state.prev_names, vec!["A", "B"]);
        assert_eq!(state.prev_widths, vec![10.0, 5.0]);
    }

    #[test]
    fn rank_swap_glides_from_previous_slot() {
        let snapshots = vec![
            snap(1, &[("A", 10.0), ("B", 5.0)], 2),
            snap(2, &[("B", 20.0), ("A", 12.0)], 2),
        ];
        let mut state = AnimationState::new(2);
        let steps = 3;
        for frame in 0..steps {
            compute_frame(
                &snapshots,
                RankBy::Track,
                steps,
                Ease::SmoothStep,
                &mut state,
                frame,
            )
            .unwrap();
        }
        // First frame of the second segment: t == 0, so B still sits where
        // slot 1 settled and A where slot 0 settled.
        let spec = compute_frame(
            &snapshots,
            RankBy::Track,
            steps,
            Ease::SmoothStep,
            &mut state,
            steps,
        )
        .unwrap();
        let positions = lookup::slot_positions(2);
        assert_eq!(spec.slots[0].name, "B");
        assert!((spec.slots[0].position - positions[1]).abs() < 1e-9);
        assert_eq!(spec.slots[1].name, "A");
        assert!((spec.slots[1].position - positions[0]).abs() < 1e-9);
    }

    #[test]
    fn new_entrant_starts_off_screen() {
        let snapshots = vec![
            snap(1, &[("A", 10.0)], 2),
            snap(2, &[("A", 12.0), ("D", 6.0)], 2),
        ];
        let mut state = AnimationState::new(2);
        let steps = 2;
        for frame in 0..steps {
            compute_frame(
                &snapshots,
                RankBy::Track,
                steps,
                Ease::SmoothStep,
                &mut state,
                frame,
            )
            .unwrap();
        }
        let spec = compute_frame(
            &snapshots,
            RankBy::Track,
            steps,
            Ease::SmoothStep,
            &mut state,
            steps,
        )
        .unwrap();
        assert_eq!(spec.slots[1].name, "D");
        assert_eq!(spec.slots[1].position, OFF_SCREEN);
    }

    #[test]
    fn min_width_floor_applies_to_active_bars_only() {
        // Settle on a snapshot where B is tiny relative to A at top_n = 5.
        let snapshots = vec![snap(1, &[("A", 100.0), ("B", 1.0)], 5)];
        let mut state = AnimationState::new(5);
        let steps = 2;
        let mut spec = None;
        for frame in 0..steps {
            spec = Some(
                compute_frame(
                    &snapshots,
                    RankBy::Track,
                    steps,
                    Ease::SmoothStep,
                    &mut state,
                    frame,
                )
                .unwrap(),
            );
        }
        let spec = spec.unwrap();
        assert_eq!(spec.slots[1].display_width, 100.0 * 0.22);
        // Value text still reports the true interpolated value.
        assert!((spec.slots[1].value - 1.0).abs() < 1e-9);
        // Padding slots stay at zero.
        assert_eq!(spec.slots[4].display_width, 0.0);
        assert!(!spec.slots[4].active);
    }

    #[test]
    fn single_step_segments_jump_to_targets() {
        let snapshots = vec![snap(1, &[("A", 10.0)], 1), snap(2, &[("A", 20.0)], 1)];
        let mut state = AnimationState::new(1);
        compute_frame(&snapshots, RankBy::Track, 1, Ease::Linear, &mut state, 0).unwrap();
        let spec =
            compute_frame(&snapshots, RankBy::Track, 1, Ease::Linear, &mut state, 1).unwrap();
        assert!((spec.slots[0].value - 20.0).abs() < 1e-9);
        assert!((spec.slots[0].position - 4.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_frame_is_an_error() {
        let snapshots = vec![snap(1, &[("A", 10.0)], 1)];
        let mut state = AnimationState::new(1);
        assert!(
            compute_frame(&snapshots, RankBy::Track, 2, Ease::Linear, &mut state, 2).is_err()
        );
    }
}
