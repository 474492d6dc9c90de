use clap::Subcommand;
use evergreen_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "pomodoro.work_duration_secs", "growth.threshold")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None if config.keys().contains(&key) => println!(),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let values: serde_json::Map<String, serde_json::Value> = config
                .keys()
                .into_iter()
                .map(|key| {
                    let value = config
                        .get(&key)
                        .map_or(serde_json::Value::Null, serde_json::Value::String);
                    (key, value)
                })
                .collect();
            super::print_json(&values)?;
        }
    }
    Ok(())
}
