//! Composition root: one instance of every store, wired together explicitly
//! and handed to the commands.

use std::sync::Arc;

use pomozen_core::{
    storage, EventBus, SafeStorage, SettingsStore, StorageWarning, TaskStore, TickWorker,
    TimerEngine,
};

pub struct App {
    pub storage: Arc<SafeStorage>,
    pub settings: Arc<SettingsStore>,
    pub tasks: Arc<TaskStore>,
    pub worker: Arc<TickWorker>,
    pub timer: TimerEngine,
}

pub fn open_app() -> App {
    let storage = Arc::new(storage::open_default());
    storage.set_warning_handler(|warning| match warning {
        StorageWarning::Degraded => {
            eprintln!("warning: durable storage unavailable; data will not survive this session");
        }
        StorageWarning::QuotaExceeded => {
            eprintln!("warning: storage is full; the latest change was not saved");
        }
        StorageWarning::WriteFailed => {
            eprintln!("warning: saving failed; changes may not persist");
        }
    });

    let settings = Arc::new(SettingsStore::load(Arc::clone(&storage)));
    let tasks = Arc::new(TaskStore::load(Arc::clone(&storage)));
    let worker = Arc::new(TickWorker::new());
    let timer = TimerEngine::new(
        Arc::clone(&settings),
        Arc::clone(&tasks),
        EventBus::new(),
        Arc::clone(&worker) as _,
        Arc::clone(&storage),
    );

    App {
        storage,
        settings,
        tasks,
        worker,
        timer,
    }
}
