use clap::Subcommand;
use pomozen_core::Task;
use uuid::Uuid;

use crate::common::open_app;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to the board
    Add {
        title: String,
        /// Estimated work intervals
        #[arg(long, default_value = "1")]
        est: u32,
    },
    /// List tasks
    List {
        #[arg(long)]
        json: bool,
    },
    /// Toggle a task's completed flag
    Done { id: String },
    /// Make a task the active one (omit the id to deactivate)
    Active { id: Option<String> },
    /// Remove a task
    Remove { id: String },
    /// Remove tasks (all, or only completed ones)
    Clear {
        #[arg(long)]
        completed: bool,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app();
    let tasks = &app.tasks;
    match action {
        TaskAction::Add { title, est } => {
            let id = tasks.add_task(&title, est);
            println!("added {id}");
        }
        TaskAction::List { json } => {
            let all = tasks.tasks();
            if json {
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                let active = tasks.active_task_id();
                for task in &all {
                    println!("{}", render(task, active == Some(task.id)));
                }
            }
        }
        TaskAction::Done { id } => {
            tasks.toggle_task(resolve(&tasks.tasks(), &id)?);
        }
        TaskAction::Active { id } => match id {
            Some(id) => tasks.set_active_task(Some(resolve(&tasks.tasks(), &id)?)),
            None => tasks.set_active_task(None),
        },
        TaskAction::Remove { id } => {
            tasks.delete_task(resolve(&tasks.tasks(), &id)?);
        }
        TaskAction::Clear { completed } => {
            if completed {
                tasks.clear_completed_tasks();
            } else {
                tasks.clear_tasks();
            }
        }
    }
    Ok(())
}

fn render(task: &Task, active: bool) -> String {
    format!(
        "{} {} {}  {}/{} pomodoros  {}",
        if active { "*" } else { " " },
        if task.completed { "[x]" } else { "[ ]" },
        task.id.simple(),
        task.act_pomodoros,
        task.est_pomodoros,
        task.title,
    )
}

/// Match a full or prefixed task id.
fn resolve(tasks: &[Task], id: &str) -> Result<Uuid, Box<dyn std::error::Error>> {
    if let Ok(full) = id.parse::<Uuid>() {
        return Ok(full);
    }
    let needle = id.to_lowercase();
    let mut matches = tasks
        .iter()
        .filter(|t| t.id.simple().to_string().starts_with(&needle));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id),
        (Some(_), Some(_)) => Err(format!("task id '{id}' is ambiguous").into()),
        (None, _) => Err(format!("no task matches '{id}'").into()),
    }
}
