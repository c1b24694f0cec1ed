//! Routes the `log` facade to the serial console.

use kernel_hal::println;
use log::{Level, LevelFilter, Metadata, Record};

static LOGGER: SerialLogger = SerialLogger;

struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

pub fn init(max_level: LevelFilter) {
    log::set_logger(&LOGGER).expect("logger already initialized");
    log::set_max_level(max_level);
}
