use clap::Subcommand;
use evergreen_core::{Config, StudyLedger};

#[derive(Subcommand)]
pub enum StudyAction {
    /// Record study hours for a date
    Set {
        /// Hours studied (0 to 24)
        hours: f64,
        /// Date as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Print the ledger as JSON
    Show,
}

pub fn run(action: StudyAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = super::ledger_store(&config)?;

    match action {
        StudyAction::Set { hours, date } => {
            let mut ledger = StudyLedger::open(store);
            let date = super::date_or_today(date);
            ledger.set_hours(&date, hours)?.wait()?;
            super::print_json(ledger.data())?;
        }
        StudyAction::Show => {
            let ledger = StudyLedger::open(store);
            super::print_json(ledger.data())?;
        }
    }
    Ok(())
}
