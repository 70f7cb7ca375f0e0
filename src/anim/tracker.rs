/// Mapping from the slots of a new snapshot back to the slots of the previous
/// one. `from_slot[i]` is the previous slot whose bar should glide into slot
/// `i`, or `None` when the entity is entering from off screen.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionPlan {
    pub from_slot: Vec<Option<usize>>,
}

/// Match new slots to previous slots by display name, first occurrence wins.
/// Padding slots (empty names) never match and always enter fresh.
pub fn plan_transition(prev_names: &[String], new_names: &[String]) -> TransitionPlan {
    let from_slot = new_names
        .iter()
        .map(|name| {
            if name.is_empty() {
                return None;
            }
            prev_names.iter().position(|prev| prev == name)
        })
        .collect();
    TransitionPlan { from_slot }
}
