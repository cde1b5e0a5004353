//! The signals page: a counter and a todo list.

use trellis_core::reactive::{batch, flush_effects, Effect, Memo, Owner, Signal};

#[derive(Debug, Clone, PartialEq)]
pub struct Todo {
    pub id: u32,
    pub text: String,
    pub completed: bool,
}

impl Todo {
    fn new(id: u32, text: &str, completed: bool) -> Self {
        Self {
            id,
            text: text.to_string(),
            completed,
        }
    }
}

pub fn starter_todos() -> Vec<Todo> {
    vec![
        Todo::new(1, "Learn Signals", true),
        Todo::new(2, "Master Computed Signals", false),
        Todo::new(3, "Understand Effects", false),
    ]
}

/// Rounded share of completed todos, 0 for an empty list.
pub fn completion_percentage(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as u32
}

pub struct SignalsPage {
    pub count: Signal<i64>,
    pub doubled: Memo<i64>,
    pub todos: Signal<Vec<Todo>>,
    pub completed: Memo<usize>,
    pub total: Memo<usize>,
    pub percentage: Memo<u32>,
    logger: Effect,
    owner: Owner,
}

impl SignalsPage {
    pub fn new() -> Self {
        let count = Signal::new(0i64);
        let doubled = {
            let count = count.clone();
            Memo::new(move || count.get() * 2)
        };

        let todos = Signal::new(starter_todos());
        let completed = {
            let todos = todos.clone();
            Memo::new(move || todos.with(|list| list.iter().filter(|todo| todo.completed).count()))
        };
        let total = {
            let todos = todos.clone();
            Memo::new(move || todos.with(Vec::len))
        };
        let percentage = {
            let (completed, total) = (completed.clone(), total.clone());
            Memo::new(move || completion_percentage(completed.get(), total.get()))
        };

        let owner = Owner::new("signals-page");
        let logger = {
            let (completed, total) = (completed.clone(), total.clone());
            owner.effect(move || {
                let (completed, total) = (completed.get(), total.get());
                tracing::info!(completed, total, "todos updated");
            })
        };

        Self {
            count,
            doubled,
            todos,
            completed,
            total,
            percentage,
            logger,
            owner,
        }
    }

    pub fn increment(&self) {
        self.count.update(|count| count + 1);
    }

    pub fn toggle_todo(&self, id: u32) {
        self.todos.update(|todos| {
            todos
                .iter()
                .map(|todo| Todo {
                    completed: todo.completed != (todo.id == id),
                    ..todo.clone()
                })
                .collect()
        });
    }

    /// How many times the logging effect has run.
    pub fn log_count(&self) -> usize {
        self.logger.run_count()
    }

    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Count: {}", self.count.get()),
            format!("Doubled (computed): {}", self.doubled.get()),
        ];
        lines.extend(self.todos.get().iter().map(|todo| {
            let mark = if todo.completed { 'x' } else { ' ' };
            format!("[{mark}] {}", todo.text)
        }));
        lines.push(format!("Completed: {} / {}", self.completed.get(), self.total.get()));
        lines.push(format!("Progress: {}%", self.percentage.get()));
        lines
    }

    pub fn dispose(&self) {
        self.owner.dispose();
    }
}

impl Default for SignalsPage {
    fn default() -> Self {
        Self::new()
    }
}

/// Scripted session: three increments, then tick off a todo.
pub fn run() -> SignalsPage {
    let page = SignalsPage::new();
    print_block("signals page", &page.render());

    for _ in 0..3 {
        page.increment();
    }
    flush_effects();
    print_block("after three increments", &page.render());

    // Toggling twice in one batch is a no-op for the logger.
    batch(|| {
        page.toggle_todo(3);
        page.toggle_todo(3);
    });
    page.toggle_todo(2);
    flush_effects();
    print_block("after completing a todo", &page.render());

    page
}

pub(crate) fn print_block(title: &str, lines: &[String]) {
    println!("== {title}");
    for line in lines {
        println!("   {line}");
    }
}
