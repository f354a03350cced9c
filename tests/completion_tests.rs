use std::sync::Arc;

use choreboard::{
    ChoreDraft, CompletionOutcome, DocumentStore, GroupKey, Household, MemberColor, MemoryStore,
};

fn household() -> (Household, GroupKey) {
    let backend: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let house = Household::new(backend);
    house.directory.register("ann", "Ann", MemberColor::Green).unwrap();
    let key = house.directory.create_group("ann").unwrap();
    (house, key)
}

fn add(house: &Household, name: &str, assignee: &str) -> String {
    let draft = ChoreDraft {
        name: name.into(),
        date: "2025-05-05".into(),
        assigned_users: vec![assignee.to_string()],
        ..ChoreDraft::default()
    };
    house.proposals.submit(draft, "ann").unwrap().id
}

#[test]
fn test_toggle_completes_and_logs() {
    let (house, key) = household();
    let id = add(&house, "Dishes", "ann");

    let outcome = house.completion.toggle(key, &id, "ann").unwrap();
    assert!(matches!(outcome, CompletionOutcome::Completed { .. }));

    let chore = house.chores.require(key, &id).unwrap();
    assert!(chore.completed);
    assert_eq!(chore.completed_by.as_deref(), Some("Ann"));
    assert!(chore.completed_at.is_some());

    let log = house.completion.history(key).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].chore_id, id);
    assert_eq!(log[0].completed_by, vec!["ann".to_string()]);
}

#[test]
fn test_reopen_keeps_log_history() {
    let (house, key) = household();
    let id = add(&house, "Dishes", "ann");

    house.completion.toggle(key, &id, "ann").unwrap();
    let outcome = house.completion.toggle(key, &id, "ann").unwrap();
    assert_eq!(outcome, CompletionOutcome::Reopened);

    let chore = house.chores.require(key, &id).unwrap();
    assert!(!chore.completed);
    assert!(chore.completed_by.is_none());
    assert!(chore.completed_at.is_none());
    assert_eq!(house.completion.history(key).unwrap().len(), 1);

    house.completion.toggle(key, &id, "ann").unwrap();
    assert_eq!(house.completion.history(key).unwrap().len(), 2);
}

#[test]
fn test_toggle_missing_chore_is_not_found() {
    let (house, key) = household();
    let err = house.completion.toggle(key, "missing", "ann").unwrap_err();
    assert!(matches!(err, choreboard::ChoreError::NotFound { .. }));
}

#[test]
fn test_equity_for_household() {
    let (house, key) = household();
    house.directory.register("bob", "Bob", MemberColor::Red).unwrap();

    let first = add(&house, "Dishes", "ann");
    add(&house, "Laundry", "ann");
    house.completion.toggle(key, &first, "ann").unwrap();

    // bob joins after the chores were created and has nothing assigned
    house.directory.join_group("bob", key).unwrap();

    let report = house.completion.equity(key).unwrap();
    assert_eq!(report.total_chores, 2);
    assert_eq!(report.total_completed, 1);
    assert_eq!(report.house_completion_rate, 0.5);

    let ann = report.members.iter().find(|m| m.member_id == "ann").unwrap();
    assert_eq!(ann.assigned, 2);
    assert_eq!(ann.completion_rate, 0.5);
    assert_eq!(ann.logged_completions, 1);

    let bob = report.members.iter().find(|m| m.member_id == "bob").unwrap();
    assert_eq!(bob.assigned, 0);
    assert_eq!(bob.completion_rate, 0.0);
}

#[test]
fn test_equity_for_empty_household() {
    let (house, key) = household();
    let report = house.completion.equity(key).unwrap();
    assert_eq!(report.total_chores, 0);
    assert_eq!(report.house_completion_rate, 0.0);
}
