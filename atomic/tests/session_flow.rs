use atomic::storage::{self, JsonFileRepository, TaskRepository};
use atomic::{
    Area, Category, DayClassification, Mode, PresentationSink, Session, Task, TaskStore, View,
    YearSummary, day_classification, intensity_level, monthly_summary,
};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Recolor(NaiveDate, u8),
    Tasks(NaiveDate, Category, Vec<Task>),
    Year(i32),
}

#[derive(Debug, Default)]
struct RecordingSink {
    events: Vec<Event>,
}

impl RecordingSink {
    fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

impl PresentationSink for RecordingSink {
    fn recolor(&mut self, date: NaiveDate, level: u8) {
        self.events.push(Event::Recolor(date, level));
    }

    fn show_tasks(&mut self, date: NaiveDate, category: Category, tasks: &[Task]) {
        self.events.push(Event::Tasks(date, category, tasks.to_vec()));
    }

    fn show_year(&mut self, summary: &YearSummary) {
        self.events.push(Event::Year(summary.year));
    }
}

#[test]
fn open_paints_every_recorded_date() {
    let mut store = TaskStore::new();
    let done = date(2024, 3, 1);
    store.add_task(done, Category::new(Mode::Ideal, Area::Health), "Run 5k");
    store.set_completion(done, "Run 5k", true);
    store.add_task(date(2024, 3, 8), Category::new(Mode::Ideal, Area::Wealth), "Invest");

    let mut sink = RecordingSink::default();
    let session = Session::open(store, &mut sink, date(2024, 3, 8));
    assert!(!session.is_dirty());
    drop(session);

    let events = sink.take();
    assert_eq!(events[0], Event::Recolor(done, 4));
    assert_eq!(events[1], Event::Recolor(date(2024, 3, 8), 0));
    let lists = events[2..]
        .iter()
        .filter(|e| matches!(e, Event::Tasks(..)))
        .count();
    assert_eq!(lists, Category::ALL.len());
}

#[test]
fn each_mutation_notifies_once() {
    let mut sink = RecordingSink::default();
    let day = date(2024, 3, 2);
    let mut session = Session::open(TaskStore::new(), &mut sink, day);

    let maint = Category::new(Mode::Maintenance, Area::Wealth);
    let ideal = Category::new(Mode::Ideal, Area::Health);
    session.add_task(maint, "Pay rent").expect("added");
    assert!(session.set_completion("Pay rent", true));
    let run = session.add_task(ideal, "Run 5k").expect("added");
    assert!(session.set_completion_by_id(run, true));
    assert!(session.add_task(ideal, "  ").is_none());
    assert!(!session.set_completion("Nope", true));
    assert!(session.is_dirty());

    let store = session.into_store();
    assert!(store.tasks_for(day, maint).iter().all(|t| !t.completed));
    assert_eq!(day_classification(&store, day), DayClassification::Ideal);

    let recolors: Vec<_> = sink
        .take()
        .into_iter()
        .filter_map(|e| match e {
            Event::Recolor(d, level) => Some((d, level)),
            _ => None,
        })
        .collect();
    // 0/1, 1/1, 1/2, then 1/2 again once the maintenance task is reset.
    assert_eq!(recolors, [(day, 0), (day, 4), (day, 2), (day, 2)]);
}

#[test]
fn refreshed_lists_are_copies_of_the_selected_day() {
    let mut sink = RecordingSink::default();
    let first = date(2024, 6, 1);
    let second = date(2024, 6, 2);
    let category = Category::new(Mode::Ideal, Area::Happiness);
    let mut session = Session::open(TaskStore::new(), &mut sink, first);
    session.add_task(category, "Paint");
    session.select_date(second);
    drop(session);

    let last_lists: Vec<_> = sink
        .take()
        .into_iter()
        .rev()
        .take(Category::ALL.len())
        .collect();
    assert!(last_lists.iter().all(|e| match e {
        Event::Tasks(d, _, tasks) => *d == second && tasks.is_empty(),
        _ => false,
    }));
}

#[test]
fn removing_the_last_task_clears_the_cell() {
    let mut sink = RecordingSink::default();
    let day = date(2024, 9, 9);
    let mut session = Session::open(TaskStore::new(), &mut sink, day);
    let id = session
        .add_task(Category::new(Mode::Maintenance, Area::Health), "Walk")
        .expect("added");
    session.set_completion_by_id(id, true);
    let removed = session.remove_task(id).expect("removed");
    assert_eq!(removed.text, "Walk");
    assert!(session.store().is_empty());
    drop(session);

    let events = sink.take();
    let last_recolor = events
        .iter()
        .rev()
        .find_map(|e| match e {
            Event::Recolor(d, level) => Some((*d, *level)),
            _ => None,
        })
        .expect("recolor");
    assert_eq!(last_recolor, (day, 0));
}

#[test]
fn year_view_uses_the_selected_year() {
    let mut sink = RecordingSink::default();
    let mut session = Session::open(TaskStore::new(), &mut sink, date(2023, 5, 5));
    session.switch_view(View::Year);
    assert_eq!(session.view(), View::Year);
    session.switch_view(View::Month);
    drop(session);

    let years: Vec<_> = sink
        .take()
        .into_iter()
        .filter_map(|e| match e {
            Event::Year(y) => Some(y),
            _ => None,
        })
        .collect();
    assert_eq!(years, [2023]);
}

#[test]
fn saved_sessions_reload_identically() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let repo = JsonFileRepository::new(tmp.path().join("todo_data.json"));

    let mut sink = RecordingSink::default();
    let store = repo.load().expect("first run");
    let mut session = Session::open(store, &mut sink, date(2024, 2, 29));
    session.add_task(Category::new(Mode::Ideal, Area::Health), "Leap");
    session.set_completion("Leap", true);
    session.select_date(date(2024, 3, 1));
    session.add_task(Category::new(Mode::Maintenance, Area::Happiness), "Rest");
    let store = session.into_store();
    repo.save(&store).expect("save");

    let reloaded = repo.load().expect("reload");
    assert_eq!(reloaded, store);
    assert_eq!(intensity_level(&reloaded, date(2024, 2, 29)), 4);

    let months = monthly_summary(&reloaded, 2024);
    assert_eq!(months[1].ideal, 1);
    assert_eq!(months[2].missed, 1);
    let recorded: u32 = months.iter().map(|m| m.recorded_days()).sum();
    assert_eq!(recorded as usize, reloaded.len());

    let raw = std::fs::read(repo.path()).expect("read");
    assert_eq!(storage::load(&raw).expect("decode"), reloaded);
}
