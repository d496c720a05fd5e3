//! Per-handle log verbosity.
//!
//! Records are emitted through the [`log`] facade; the process-wide logger installed by the
//! embedding application acts as the sink. Each parser handle carries its own [`LogLevel`],
//! so two handles in one process may log at different verbosities.
use log::{Level, LevelFilter};

/// Log verbosity of a parser handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Silent.
    Lv0,

    /// Warnings and errors (e.g., dropped sections, CRC mismatches).
    Lv1,

    /// Stream level information (detected format, resolved PIDs).
    Lv2,

    /// Per-sample information.
    Lv3,

    /// Per-bitfield trace.
    Lv4,
}
impl LogLevel {
    /// Converts a numeric level (`0..=4`) into `LogLevel`.
    ///
    /// Values above 4 saturate at `Lv4`.
    pub fn from_u8(n: u8) -> Self {
        match n {
            0 => LogLevel::Lv0,
            1 => LogLevel::Lv1,
            2 => LogLevel::Lv2,
            3 => LogLevel::Lv3,
            _ => LogLevel::Lv4,
        }
    }

    /// Returns the equivalent `log` crate filter.
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Lv0 => LevelFilter::Off,
            LogLevel::Lv1 => LevelFilter::Warn,
            LogLevel::Lv2 => LevelFilter::Info,
            LogLevel::Lv3 => LevelFilter::Debug,
            LogLevel::Lv4 => LevelFilter::Trace,
        }
    }

    /// Returns `true` if records of the given level should be emitted.
    pub fn enabled(self, level: Level) -> bool {
        level <= self.to_level_filter()
    }
}
impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Lv0
    }
}

macro_rules! mpeg_log {
    ($ctx:expr, $lvl:expr, $($arg:tt)+) => {
        if $ctx.enabled($lvl) {
            log::log!($lvl, $($arg)+);
        }
    };
}
