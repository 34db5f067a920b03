use anyhow::Result;
use chrono::NaiveDate;
use gym_log_lib::dashboard::PendingDelete;
use gym_log_lib::history::muscles_line;
use gym_log_lib::{
    filter_by_range, muscle_label, show_more_label, ActivityForm, ActivityLog, ActivityStats,
    CardioStats, Dashboard, DateRange, DeleteOutcome, HistoryEntry, HistoryWindow, IntentHandler,
    LogBook, LogId, MuscleGroup, NewActivityLog, RecordStore, StatsView, StoreError, ViewState,
    PAGE_SIZE,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn log(id: &str, on: NaiveDate, tags: &[&str]) -> ActivityLog {
    ActivityLog {
        id: LogId::from(id),
        date: on,
        activity_ids: tags.iter().map(|t| t.to_string()).collect(),
        is_cardio: false,
        cardio_time: None,
        cardio_distance: None,
    }
}

fn cardio(id: &str, on: NaiveDate, time: Option<f64>, distance: Option<f64>) -> ActivityLog {
    ActivityLog {
        is_cardio: true,
        cardio_time: time,
        cardio_distance: distance,
        ..log(id, on, &[])
    }
}

fn year_2023() -> DateRange {
    DateRange::new(date(2023, 1, 1), date(2023, 12, 31))
}

/// Newest first, as the store returns them.
fn scenario_a() -> Vec<ActivityLog> {
    vec![
        log("3", date(2023, 10, 5), &["chest"]),
        log("2", date(2023, 10, 5), &["legs"]),
        log("1", date(2023, 10, 1), &["chest", "triceps"]),
    ]
}

fn seven_logs() -> Vec<ActivityLog> {
    (1..=7)
        .rev()
        .map(|day| log(&day.to_string(), date(2023, 3, day), &["back"]))
        .collect()
}

struct ScriptedHost {
    confirm: bool,
    edited: Option<ActivityLog>,
    asked: usize,
}

impl ScriptedHost {
    fn confirming(confirm: bool) -> Self {
        Self {
            confirm,
            edited: None,
            asked: 0,
        }
    }
}

impl IntentHandler for ScriptedHost {
    fn on_edit(&mut self, log: ActivityLog) {
        self.edited = Some(log);
    }

    fn confirm_delete(&mut self, _log: &ActivityLog) -> bool {
        self.asked += 1;
        self.confirm
    }
}

/// Store whose deletes either all succeed or all fail.
struct StubStore {
    fail_deletes: bool,
    deleted: Vec<LogId>,
}

impl RecordStore for StubStore {
    fn list(&self) -> Result<Vec<ActivityLog>, StoreError> {
        Ok(Vec::new())
    }

    fn insert(&mut self, _log: NewActivityLog) -> Result<LogId, StoreError> {
        Err(StoreError::Unsupported("insert"))
    }

    fn update(&mut self, _id: &LogId, _log: NewActivityLog) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("update"))
    }

    fn delete(&mut self, id: &LogId) -> Result<(), StoreError> {
        if self.fail_deletes {
            return Err(StoreError::Remote {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        self.deleted.push(id.clone());
        Ok(())
    }
}

#[test]
fn test_scenario_a_counts_sessions_and_days() {
    let records = scenario_a();
    let filtered = filter_by_range(&records, &year_2023());
    let stats = ActivityStats::compute(filtered);

    assert_eq!(stats.unique_active_days, 2);
    assert_eq!(stats.total_activities, 3);
    assert_eq!(stats.breakdown_count("Chest"), 2);
    assert_eq!(stats.breakdown_count("Triceps"), 1);
    assert_eq!(stats.breakdown_count("Legs"), 1);
    assert_eq!(stats.muscle_breakdown.len(), 3);
}

#[test]
fn test_breakdown_follows_first_seen_order() {
    let records = scenario_a();
    let stats = ActivityStats::compute(&records);
    let labels: Vec<&str> = stats
        .muscle_breakdown
        .iter()
        .map(|(label, _)| label.as_str())
        .collect();
    assert_eq!(labels, vec!["Chest", "Legs", "Triceps"]);
}

#[test]
fn test_breakdown_sums_tag_occurrences_not_sessions() {
    let records = vec![
        log("a", date(2023, 5, 2), &["chest", "triceps", "shoulders"]),
        log("b", date(2023, 5, 2), &["back", "biceps"]),
        log("c", date(2023, 5, 1), &[]),
    ];
    let stats = ActivityStats::compute(&records);

    let tag_total: usize = stats.muscle_breakdown.iter().map(|(_, c)| c).sum();
    assert_eq!(tag_total, 5);
    assert_eq!(stats.total_activities, 3);
    assert!(stats.unique_active_days <= stats.total_activities);
}

#[test]
fn test_duplicate_tag_in_one_record_counts_once() {
    let records = vec![log("a", date(2023, 5, 2), &["legs", "legs"])];
    let stats = ActivityStats::compute(&records);
    assert_eq!(stats.breakdown_count("Legs"), 1);
}

#[test]
fn test_tag_matching_a_label_counts_with_its_group() {
    let records = vec![log("a", date(2023, 5, 2), &["chest", "Chest"])];
    let stats = ActivityStats::compute(&records);
    assert_eq!(stats.muscle_breakdown, vec![("Chest".to_string(), 1)]);
}

#[test]
fn test_unknown_tag_falls_back_to_raw_id() {
    assert_eq!(muscle_label("chest"), "Chest");
    assert_eq!(muscle_label("forearms"), "forearms");

    let records = vec![log("a", date(2023, 5, 2), &["forearms", "abs"])];
    let stats = ActivityStats::compute(&records);
    assert_eq!(stats.breakdown_count("forearms"), 1);
    assert_eq!(stats.breakdown_count("Abs"), 1);
    assert_eq!(muscles_line(&records[0].activity_ids), "forearms, Abs");
}

#[test]
fn test_scenario_b_average_pace() {
    let records = vec![cardio("a", date(2023, 6, 1), Some(20.0), Some(4.0))];
    let stats = ActivityStats::compute(&records);

    assert_eq!(stats.cardio.sessions, 1);
    assert_eq!(stats.cardio.average_pace_display(), "5.00");
    assert_eq!(records[0].pace(), Some(5.0));
}

#[test]
fn test_average_pace_zero_without_distance() {
    let records = vec![
        cardio("a", date(2023, 6, 1), Some(45.0), None),
        cardio("b", date(2023, 6, 2), Some(15.0), Some(0.0)),
    ];
    let stats = ActivityStats::compute(&records);

    assert_eq!(stats.cardio.total_time, 60.0);
    assert_eq!(stats.cardio.total_distance, 0.0);
    assert_eq!(stats.cardio.average_pace(), 0.0);
    assert_eq!(stats.cardio.average_pace_display(), "0.00");
}

#[test]
fn test_cardio_totals_keep_full_precision() {
    let records = vec![
        cardio("a", date(2023, 6, 1), Some(10.004), Some(1.0)),
        cardio("b", date(2023, 6, 2), Some(10.004), Some(1.0)),
    ];
    let stats = ActivityStats::compute(&records);

    assert!((stats.cardio.total_time - 20.008).abs() < 1e-9);
    assert_eq!(stats.cardio.total_time_display(), "20.01");
    assert_eq!(stats.cardio.total_distance_display(), "2.00");
}

#[test]
fn test_non_cardio_metrics_are_ignored() {
    let mut strength = log("a", date(2023, 6, 1), &["legs"]);
    strength.cardio_time = Some(30.0);
    strength.cardio_distance = Some(5.0);

    let stats = ActivityStats::compute(std::slice::from_ref(&strength));
    assert_eq!(stats.cardio, CardioStats::default());
    assert_eq!(strength.pace(), None);
}

#[test]
fn test_record_pace_needs_both_metrics() {
    assert_eq!(cardio("a", date(2023, 6, 1), Some(30.0), None).pace(), None);
    assert_eq!(cardio("b", date(2023, 6, 1), None, Some(5.0)).pace(), None);
    assert_eq!(cardio("c", date(2023, 6, 1), Some(30.0), Some(0.0)).pace(), None);
    assert_eq!(cardio("d", date(2023, 6, 1), Some(30.0), Some(6.0)).pace(), Some(5.0));
}

#[test]
fn test_scenario_c_empty_range_is_no_data() {
    let records = scenario_a();
    let mut dashboard = Dashboard::new(records, ViewState::new(year_2023()));
    dashboard.set_range(DateRange::new(date(2024, 1, 1), date(2024, 1, 1)));

    let view = dashboard.render();
    assert_eq!(view.stats, StatsView::NoData);
    assert!(view.stats.is_empty());
    assert_eq!(view.stats.stats(), ActivityStats::default());
    assert!(view.history.is_empty());
    assert!(!view.has_more());
}

#[test]
fn test_zero_valued_summary_is_not_no_data() {
    let records = vec![log("rest", date(2023, 2, 2), &[])];
    let view = StatsView::from_filtered(&filter_by_range(&records, &year_2023()));

    assert!(!view.is_empty());
    let stats = view.stats();
    assert_eq!(stats.total_activities, 1);
    assert!(stats.muscle_breakdown.is_empty());
}

#[test]
fn test_inverted_range_matches_nothing() {
    let records = scenario_a();
    let inverted = DateRange::new(date(2023, 12, 31), date(2023, 1, 1));
    assert!(inverted.is_inverted());
    assert!(filter_by_range(&records, &inverted).is_empty());
}

#[test]
fn test_range_is_inclusive_on_both_ends() {
    let records = scenario_a();
    let range = DateRange::new(date(2023, 10, 1), date(2023, 10, 5));
    assert_eq!(filter_by_range(&records, &range).len(), 3);

    let only_first = DateRange::new(date(2023, 10, 1), date(2023, 10, 1));
    let filtered = filter_by_range(&records, &only_first);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, LogId::from("1"));
}

#[test]
fn test_current_year_range() {
    let range = DateRange::current_year(date(2024, 7, 15));
    assert_eq!(range, DateRange::new(date(2024, 1, 1), date(2024, 12, 31)));
}

#[test]
fn test_scenario_d_show_more() {
    let mut dashboard = Dashboard::new(seven_logs(), ViewState::new(year_2023()));

    let view = dashboard.render();
    assert_eq!(view.history.len(), 5);
    assert_eq!(view.remaining, 2);
    assert_eq!(show_more_label(view.remaining), "Show More (2 remaining)");
    // newest first, untouched
    assert_eq!(view.history[0].id, LogId::from("7"));

    dashboard.show_more();
    assert_eq!(dashboard.view_state().window().visible_count(), 10);
    let view = dashboard.render();
    assert_eq!(view.history.len(), 7);
    assert!(!view.has_more());
}

#[test]
fn test_window_page_bounds() {
    let records = seven_logs();
    let filtered: Vec<&ActivityLog> = records.iter().collect();

    let mut window = HistoryWindow::default();
    assert_eq!(window.visible_count(), PAGE_SIZE);
    let page = window.page(&filtered[..3]);
    assert_eq!(page.entries.len(), 3);
    assert!(!page.has_more());

    window.show_more();
    window.show_more();
    assert_eq!(window.visible_count(), 15);
    assert_eq!(window.page(&filtered).entries.len(), 7);

    window.reset();
    assert_eq!(window.visible_count(), PAGE_SIZE);
}

#[test]
fn test_range_change_resets_cursor() {
    let mut state = ViewState::new(year_2023());
    state.show_more();
    state.show_more();
    assert_eq!(state.window().visible_count(), 15);

    state.set_range(year_2023()); // same range still resets
    assert_eq!(state.window().visible_count(), 5);

    state.show_more();
    state.set_start(date(2023, 6, 1));
    assert_eq!(state.window().visible_count(), 5);
    assert_eq!(state.range().start, date(2023, 6, 1));

    state.show_more();
    state.set_end(date(2023, 6, 30));
    assert_eq!(state.window().visible_count(), 5);
}

#[test]
fn test_new_records_reset_cursor() {
    let mut dashboard = Dashboard::new(seven_logs(), ViewState::new(year_2023()));
    dashboard.show_more();
    dashboard.replace_records(seven_logs());
    assert_eq!(dashboard.view_state().window().visible_count(), PAGE_SIZE);
}

#[test]
fn test_history_entry_formatting() {
    let entry = HistoryEntry::from_log(&log("x", date(2023, 12, 25), &["chest", "triceps"]));
    assert_eq!(entry.date, "25/12/2023");
    assert_eq!(entry.muscles, "Chest, Triceps");
    assert_eq!(entry.cardio, None);
    assert_eq!(entry.pace, None);

    let entry = HistoryEntry::from_log(&cardio("y", date(2023, 1, 2), Some(20.0), Some(4.0)));
    assert_eq!(entry.muscles, "Rest Day");
    assert_eq!(entry.cardio.as_deref(), Some("Cardio: 20min / 4km"));
    assert_eq!(entry.pace.as_deref(), Some("5.00 min/km"));

    let entry = HistoryEntry::from_log(&cardio("z", date(2023, 1, 2), Some(32.5), None));
    assert_eq!(entry.cardio.as_deref(), Some("Cardio: 32.5min / -km"));
    assert_eq!(entry.pace, None);
}

#[test]
fn test_request_edit_hands_over_record_without_mutating() {
    let dashboard = Dashboard::new(scenario_a(), ViewState::new(year_2023()));
    let mut host = ScriptedHost::confirming(true);

    assert!(dashboard.request_edit(&LogId::from("2"), &mut host));
    assert_eq!(host.edited.as_ref().map(|l| l.id.clone()), Some(LogId::from("2")));
    assert_eq!(dashboard.book().len(), 3);

    assert!(!dashboard.request_edit(&LogId::from("missing"), &mut host));
}

#[test]
fn test_delete_removes_exactly_one_record() -> Result<()> {
    let mut dashboard = Dashboard::new(scenario_a(), ViewState::new(year_2023()));
    dashboard.show_more();
    let before = dashboard.render().stats.stats().total_activities;

    let mut store = StubStore {
        fail_deletes: false,
        deleted: Vec::new(),
    };
    let mut host = ScriptedHost::confirming(true);
    let outcome = dashboard.request_delete(&LogId::from("2"), &mut store, &mut host)?;

    assert_eq!(outcome, DeleteOutcome::Deleted(LogId::from("2")));
    assert_eq!(store.deleted, vec![LogId::from("2")]);
    assert_eq!(dashboard.render().stats.stats().total_activities, before - 1);
    let remaining: Vec<&str> = dashboard.book().logs().iter().map(|l| l.id.as_str()).collect();
    assert_eq!(remaining, vec!["3", "1"]);
    assert_eq!(dashboard.view_state().window().visible_count(), PAGE_SIZE);
    Ok(())
}

#[test]
fn test_failed_delete_restores_record_in_place() {
    let original = scenario_a();
    let mut dashboard = Dashboard::new(original.clone(), ViewState::new(year_2023()));
    let mut store = StubStore {
        fail_deletes: true,
        deleted: Vec::new(),
    };
    let mut host = ScriptedHost::confirming(true);

    let err = dashboard
        .request_delete(&LogId::from("2"), &mut store, &mut host)
        .unwrap_err();

    assert_eq!(err.to_string(), "Service unavailable (HTTP 503)");
    assert_eq!(dashboard.book().logs(), original.as_slice());
}

#[test]
fn test_declined_delete_does_nothing() -> Result<()> {
    let original = scenario_a();
    let mut dashboard = Dashboard::new(original.clone(), ViewState::new(year_2023()));
    let mut store = StubStore {
        fail_deletes: false,
        deleted: Vec::new(),
    };
    let mut host = ScriptedHost::confirming(false);

    let outcome = dashboard.request_delete(&LogId::from("1"), &mut store, &mut host)?;

    assert_eq!(outcome, DeleteOutcome::Cancelled);
    assert_eq!(host.asked, 1);
    assert!(store.deleted.is_empty());
    assert_eq!(dashboard.book().logs(), original.as_slice());
    Ok(())
}

#[test]
fn test_delete_unknown_id_is_not_found() {
    let mut dashboard = Dashboard::new(scenario_a(), ViewState::new(year_2023()));
    let mut store = StubStore {
        fail_deletes: false,
        deleted: Vec::new(),
    };
    let mut host = ScriptedHost::confirming(true);

    let result = dashboard.request_delete(&LogId::from("nope"), &mut store, &mut host);
    assert!(matches!(result, Err(StoreError::NotFound(_))));
    assert_eq!(host.asked, 0);
}

#[test]
fn test_logbook_rollback_reinserts_at_original_index() {
    let mut book = LogBook::new(scenario_a());
    let pending: PendingDelete = book.take(&LogId::from("2")).unwrap();
    assert_eq!(pending.log().id, LogId::from("2"));
    assert_eq!(book.len(), 2);

    book.rollback(pending);
    assert_eq!(book.logs(), scenario_a().as_slice());
    assert!(book.take(&LogId::from("missing")).is_none());
}

#[test]
fn test_form_metric_parsing() {
    assert_eq!(gym_log_lib::parse_metric(""), None);
    assert_eq!(gym_log_lib::parse_metric("abc"), None);
    assert_eq!(gym_log_lib::parse_metric("-3"), None);
    assert_eq!(gym_log_lib::parse_metric("NaN"), None);
    assert_eq!(gym_log_lib::parse_metric("inf"), None);
    assert_eq!(gym_log_lib::parse_metric("0"), Some(0.0));
    assert_eq!(gym_log_lib::parse_metric(" 12.5 "), Some(12.5));
}

#[test]
fn test_form_toggle_keeps_selection_order() {
    let mut form = ActivityForm::new(date(2023, 4, 4));
    form.toggle(MuscleGroup::Triceps);
    form.toggle(MuscleGroup::Chest);
    form.toggle(MuscleGroup::Legs);
    form.toggle(MuscleGroup::Chest);
    assert_eq!(form.selected(), &[MuscleGroup::Triceps, MuscleGroup::Legs]);
    assert!(!form.is_selected(MuscleGroup::Chest));

    let built = form.build();
    assert_eq!(built.activity_ids, vec!["triceps", "legs"]);
    assert_eq!(built.date, date(2023, 4, 4));
}

#[test]
fn test_form_drops_cardio_metrics_when_not_cardio() {
    let mut form = ActivityForm::new(date(2023, 4, 4));
    form.cardio_time = "30".to_string();
    form.cardio_distance = "5".to_string();
    let built = form.build();
    assert!(!built.is_cardio);
    assert_eq!(built.cardio_time, None);
    assert_eq!(built.cardio_distance, None);

    form.is_cardio = true;
    form.cardio_distance = "five".to_string();
    let built = form.build();
    assert_eq!(built.cardio_time, Some(30.0));
    assert_eq!(built.cardio_distance, None);
}

#[test]
fn test_form_from_log_round_trips_fields() {
    let mut existing = cardio("e", date(2023, 8, 9), Some(25.0), Some(5.5));
    existing.activity_ids = vec!["legs".into(), "calves".into(), "abs".into()];

    let form = ActivityForm::from_log(&existing);
    assert_eq!(form.selected(), &[MuscleGroup::Legs, MuscleGroup::Abs]);
    assert_eq!(form.cardio_time, "25");
    assert_eq!(form.cardio_distance, "5.5");

    let built = form.build();
    assert_eq!(built.activity_ids, vec!["legs", "calves", "abs"]);
    assert_eq!(built.cardio_time, Some(25.0));
    assert_eq!(built.cardio_distance, Some(5.5));
}

#[test]
fn test_form_edit_keeps_tag_order() {
    let existing = log("e", date(2023, 8, 9), &["calves", "chest"]);

    let form = ActivityForm::from_log(&existing);
    assert_eq!(form.build().activity_ids, vec!["calves", "chest"]);

    let mut form = ActivityForm::from_log(&existing);
    form.set_selected([MuscleGroup::Back]);
    assert_eq!(form.build().activity_ids, vec!["calves", "back"]);
}

#[test]
fn test_muscle_group_parsing() {
    assert_eq!(" Chest ".parse::<MuscleGroup>(), Ok(MuscleGroup::Chest));
    assert_eq!("SHOULDERS".parse::<MuscleGroup>(), Ok(MuscleGroup::Shoulders));
    assert!("calves".parse::<MuscleGroup>().is_err());
    assert_eq!(MuscleGroup::from_id("Chest"), None);
}
