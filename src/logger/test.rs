//! A logger for use in tests and the simulator, with per-target coloring
//! so the narrative of a scenario (`"sim"`) stands out from ordinary
//! module logs.
use log::*;

struct Logger {
    level: Level,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        use colored::Colorize;

        match record.target() {
            "sim" => {
                println!("{}  {}", "sim:".bold(), record.args().to_string().bold())
            }
            target => {
                if self.enabled(record.metadata()) {
                    let s = format!("{:<12} {}", format!("{target}:"), record.args());
                    println!("{}", s.dimmed());
                }
            }
        }
    }

    fn flush(&self) {}
}

/// Install the test logger. Safe to call more than once; only the first
/// call wins (later calls are ignored by `log::set_boxed_logger`).
pub fn init(level: Level) {
    let logger = Logger { level };

    log::set_boxed_logger(Box::new(logger)).ok();
    log::set_max_level(level.to_level_filter());
}
