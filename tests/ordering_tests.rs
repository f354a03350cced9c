use choreboard::models::{Chore, PriorityLevel};
use choreboard::ordering::{active, assigned_to, proposals, sorted};

fn chore(name: &str, date: &str, priority: PriorityLevel, completed: bool) -> Chore {
    Chore {
        id: name.into(),
        name: name.into(),
        date: date.into(),
        priority,
        completed,
        ..Chore::default()
    }
}

fn names(chores: &[Chore]) -> Vec<&str> {
    chores.iter().map(|c| c.name.as_str()).collect()
}

#[test]
fn test_house_order() {
    let chores = vec![
        chore("done-early", "2025-01-01", PriorityLevel::High, true),
        chore("late-low", "2025-03-01", PriorityLevel::Low, false),
        chore("early-low", "2025-01-02", PriorityLevel::Low, false),
        chore("early-high", "2025-01-02", PriorityLevel::High, false),
        chore("early-medium", "2025-01-02", PriorityLevel::Medium, false),
        chore("done-late", "2025-02-01", PriorityLevel::Low, true),
    ];

    let ordered = sorted(&chores);
    assert_eq!(
        names(&ordered),
        vec!["early-high", "early-medium", "early-low", "late-low", "done-early", "done-late"]
    );
    // the snapshot itself is untouched
    assert_eq!(chores[0].name, "done-early");
}

#[test]
fn test_proposals_are_not_active() {
    let mut pending = chore("pending", "2025-01-01", PriorityLevel::High, false);
    pending.proposal = true;
    let chores = vec![pending, chore("live", "2025-01-05", PriorityLevel::Low, false)];

    assert_eq!(names(&active(&chores)), vec!["live"]);
    assert_eq!(names(&proposals(&chores)), vec!["pending"]);
}

#[test]
fn test_assigned_to_filters_active_chores() {
    let mut mine = chore("mine", "2025-01-01", PriorityLevel::Low, false);
    mine.assigned_users = vec!["ann".into()];
    let mut proposed = chore("proposed", "2025-01-01", PriorityLevel::Low, false);
    proposed.assigned_users = vec!["ann".into()];
    proposed.proposal = true;
    let theirs = chore("theirs", "2025-01-01", PriorityLevel::Low, false);

    let chores = vec![mine, proposed, theirs];
    assert_eq!(names(&assigned_to(&chores, "ann")), vec!["mine"]);
}
