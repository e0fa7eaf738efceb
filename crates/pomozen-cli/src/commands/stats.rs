use clap::Subcommand;

use crate::common::open_app;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Daily completion history
    Show {
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app();
    match action {
        StatsAction::Show { json } => {
            let history = app.timer.history();
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
                return Ok(());
            }
            if history.is_empty() {
                println!("no completed intervals yet");
                return Ok(());
            }
            println!("{:<12} {:>9} {:>7} {:>6}", "date", "pomodoros", "short", "long");
            let (mut p, mut s, mut l) = (0u64, 0u64, 0u64);
            for (date, day) in &history {
                println!(
                    "{:<12} {:>9} {:>7} {:>6}",
                    date, day.pomodoro, day.short, day.long
                );
                p += u64::from(day.pomodoro);
                s += u64::from(day.short);
                l += u64::from(day.long);
            }
            println!("{:<12} {p:>9} {s:>7} {l:>6}", "total");
            println!(
                "\nsession cycle position: {} completed",
                app.timer.pomodoros_completed()
            );
        }
    }
    Ok(())
}
