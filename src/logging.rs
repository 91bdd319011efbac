use crate::store::store_path;
use crate::types::AppResult;
use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

pub const LOG_FILENAME: &str = "chconn.log";

/// Sends every log record at `level` or above to the log file in the
/// platform config directory.
pub fn init_logging(level: LevelFilter) -> AppResult<()> {
    let logfile_path = store_path(LOG_FILENAME)?;
    let logfile = FileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new("{d} {l} {t} - {m}\n")))
        .build(logfile_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder().appender("logfile").build(level))?;

    log4rs::init_config(config)?;
    Ok(())
}
