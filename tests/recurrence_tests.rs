use std::sync::Arc;

use choreboard::{
    Chore, ChoreError, ChoreStore, DocumentStore, GroupKey, MemoryStore, PriorityLevel,
    RecurrenceGenerator, RepetitionTime,
};

const GROUP: GroupKey = GroupKey(424242);

fn setup() -> (ChoreStore, RecurrenceGenerator) {
    let backend: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    (ChoreStore::new(Arc::clone(&backend)), RecurrenceGenerator::new(backend))
}

fn template(date: &str, repetition: RepetitionTime, series: &str) -> Chore {
    Chore {
        name: "Water plants".into(),
        date: date.into(),
        day: "Wednesday".into(),
        description: "the ones on the balcony".into(),
        priority: PriorityLevel::Medium,
        duration_minutes: 10,
        repetition,
        assigned_users: vec!["ann".into()],
        completed: true,
        completed_by: Some("Ann".into()),
        completed_at: Some("2025-01-01T08:00:00+00:00".into()),
        votes: 3,
        voters: vec!["a".into(), "b".into(), "c".into()],
        created_by: "ann".into(),
        series_id: series.into(),
        checklist: true,
        monthly_repeat_by_week: true,
        ..Chore::default()
    }
}

#[test]
fn test_weekly_generation_from_new_years_day() {
    let (store, generator) = setup();
    let start = store.create(&template("2025-01-01", RepetitionTime::Weekly, "s1"), GROUP).unwrap();

    let created = generator.generate(&start, GROUP, "s1").unwrap();
    let mut dates: Vec<String> = created.iter().map(|c| c.date.clone()).collect();
    dates.sort();
    assert_eq!(dates[0], "2025-01-08");
    assert_eq!(dates[1], "2025-01-15");
    assert!(dates.iter().all(|d| d.as_str() > "2025-01-01" && d.as_str() <= "2026-01-01"));
    assert!(!dates.contains(&"2025-01-01".to_string()));
    assert_eq!(store.list(GROUP).unwrap().len(), 1 + created.len());
}

#[test]
fn test_occurrences_copy_template_but_start_fresh() {
    let (store, generator) = setup();
    let start = store.create(&template("2025-01-01", RepetitionTime::Monthly, "s1"), GROUP).unwrap();
    let created = generator.generate(&start, GROUP, "series-x").unwrap();
    assert_eq!(created.len(), 12);

    let first = store.require(GROUP, &created[0].id).unwrap();
    assert_eq!(first.date, "2025-02-01");
    assert_eq!(first.day, "Saturday");
    assert_eq!(first.name, "Water plants");
    assert_eq!(first.description, "the ones on the balcony");
    assert_eq!(first.priority, PriorityLevel::Medium);
    assert_eq!(first.duration_minutes, 10);
    assert_eq!(first.assigned_users, vec!["ann".to_string()]);
    assert!(first.checklist);
    assert!(first.monthly_repeat_by_week);
    assert!(!first.completed);
    assert!(first.completed_by.is_none());
    assert_eq!(first.votes, 0);
    assert!(first.voters.is_empty());
    assert!(!first.proposal);
    assert_eq!(first.series_id, "series-x");
    assert_ne!(first.id, start.id);
}

#[test]
fn test_generation_no_ops() {
    let (store, generator) = setup();
    let once = template("2025-01-01", RepetitionTime::None, "");
    assert!(generator.generate(&once, GROUP, "s").unwrap().is_empty());

    let bad_date = template("first of may", RepetitionTime::Daily, "s");
    assert!(generator.generate(&bad_date, GROUP, "s").unwrap().is_empty());

    let odd = template("2025-01-01", RepetitionTime::Unrecognized("Hourly".into()), "s");
    assert!(generator.generate(&odd, GROUP, "s").unwrap().is_empty());

    assert!(store.list(GROUP).unwrap().is_empty());
}

#[test]
fn test_delete_future_occurrences_from_date() {
    let (store, generator) = setup();
    let start = store.create(&template("2025-01-01", RepetitionTime::Monthly, "s1"), GROUP).unwrap();
    generator.generate(&start, GROUP, "s1").unwrap();
    store.create(&template("2025-07-01", RepetitionTime::Monthly, "other"), GROUP).unwrap();

    let removed = generator.delete_future_occurrences("s1", "2025-06-01", GROUP).unwrap();
    // 2025-06-01 .. 2026-01-01
    assert_eq!(removed, 8);

    let left = store.list(GROUP).unwrap();
    let series: Vec<&Chore> = left.iter().filter(|c| c.series_id == "s1").collect();
    assert_eq!(series.len(), 5);
    assert!(series.iter().all(|c| c.date.as_str() < "2025-06-01"));
    assert!(left.iter().any(|c| c.series_id == "other"));
}

#[test]
fn test_delete_future_occurrences_no_ops() {
    let (store, generator) = setup();
    store.create(&template("2025-01-01", RepetitionTime::None, ""), GROUP).unwrap();
    assert_eq!(generator.delete_future_occurrences("", "2000-01-01", GROUP).unwrap(), 0);
    assert_eq!(generator.delete_future_occurrences("missing", "2000-01-01", GROUP).unwrap(), 0);
    assert_eq!(store.list(GROUP).unwrap().len(), 1);
}

#[test]
fn test_delete_future_occurrences_rejects_unpadded_date() {
    let (_, generator) = setup();
    let err = generator.delete_future_occurrences("s1", "2025-6-1", GROUP).unwrap_err();
    assert!(matches!(err, ChoreError::InvalidDate(_)));
}
