use std::path::PathBuf;

use clap::Subcommand;
use pomozen_core::{export_backup, import_backup};

use crate::common::open_app;

#[derive(Subcommand)]
pub enum DataAction {
    /// Write all persisted state to one JSON document
    Export {
        /// Destination (default: pomozen-backup-YYYY-MM-DD.json)
        path: Option<PathBuf>,
    },
    /// Restore state from a backup document (all-or-nothing)
    Import { path: PathBuf },
}

pub fn run(action: DataAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app();
    match action {
        DataAction::Export { path } => {
            let backup = export_backup(&app.timer, &app.tasks, &app.settings);
            let path = path.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "pomozen-backup-{}.json",
                    chrono::Local::now().format("%Y-%m-%d")
                ))
            });
            std::fs::write(&path, serde_json::to_string_pretty(&backup)?)?;
            println!("exported to {}", path.display());
        }
        DataAction::Import { path } => {
            let json = std::fs::read_to_string(&path)?;
            import_backup(&json, &app.timer, &app.tasks, &app.settings)?;
            println!("imported {}", path.display());
        }
    }
    Ok(())
}
