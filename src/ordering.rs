use std::cmp::Ordering;

use crate::models::Chore;

/// House chore ordering.
///
/// - **Completion**: incomplete chores come before completed ones.
/// - **Date**: earlier days first (dates are fixed-width `yyyy-MM-dd`).
/// - **Priority**: high, then medium, then low.
pub fn compare_chores(a: &Chore, b: &Chore) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| a.date.cmp(&b.date))
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
}

/// Returns a sorted copy; the snapshot itself is never reordered in place.
pub fn sorted(chores: &[Chore]) -> Vec<Chore> {
    let mut out = chores.to_vec();
    out.sort_by(compare_chores);
    out
}

/// Approved chores, in house order.
pub fn active(chores: &[Chore]) -> Vec<Chore> {
    let approved: Vec<Chore> = chores.iter().filter(|c| !c.proposal).cloned().collect();
    sorted(&approved)
}

/// Chores still waiting for approval, in house order.
pub fn proposals(chores: &[Chore]) -> Vec<Chore> {
    let pending: Vec<Chore> = chores.iter().filter(|c| c.proposal).cloned().collect();
    sorted(&pending)
}

/// Approved chores assigned to `user_id`, in house order.
pub fn assigned_to(chores: &[Chore], user_id: &str) -> Vec<Chore> {
    active(chores)
        .into_iter()
        .filter(|c| c.is_assigned_to(user_id))
        .collect()
}
