use colored::Colorize;
use log::Level;

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];

/// All output goes to stderr; stdout carries the line protocol.
pub fn init_logger() {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                message
            ))
        })
        .filter(|meta| {
            let is_local = meta.target().starts_with("trackedd");
            let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&meta.level());

            is_local || is_severe
        })
        .chain(std::io::stderr())
        .apply()
        .expect("logging is initialized")
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}
