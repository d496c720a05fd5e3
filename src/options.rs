use crate::logging::LogLevel;
use crate::ts::Pid;
use crate::{ErrorKind, Result};

/// Default number of video samples examined by `MpegStream::stream_info`.
pub const DEFAULT_PROBE_LIMIT: usize = 300;

/// Caller supplied parser configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// PID of the PMT to use instead of the first one that describes a video or audio stream.
    pub pmt_pid: Option<u16>,

    /// Forced video PID.
    pub video_pid: Option<u16>,

    /// Forced audio PID.
    pub audio_pid: Option<u16>,

    /// If `true`, PSI sections whose CRC32 does not match are rejected.
    pub strict_crc: bool,

    /// Log verbosity of the handle.
    pub log_level: LogLevel,

    /// Maximum number of video samples examined by a stream probe.
    pub probe_limit: usize,
}
impl ParserOptions {
    /// Makes a new `ParserOptions` instance with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the PMT PID override.
    pub fn pmt_pid(mut self, pid: u16) -> Self {
        self.pmt_pid = Some(pid);
        self
    }

    /// Sets the video PID override.
    pub fn video_pid(mut self, pid: u16) -> Self {
        self.video_pid = Some(pid);
        self
    }

    /// Sets the audio PID override.
    pub fn audio_pid(mut self, pid: u16) -> Self {
        self.audio_pid = Some(pid);
        self
    }

    /// Enables or disables CRC32 enforcement of PSI sections.
    pub fn strict_crc(mut self, strict: bool) -> Self {
        self.strict_crc = strict;
        self
    }

    /// Sets the log verbosity.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Sets the bound of the stream probe.
    pub fn probe_limit(mut self, limit: usize) -> Self {
        self.probe_limit = limit;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for pid in [self.pmt_pid, self.video_pid, self.audio_pid].iter().flatten() {
            track_assert!(
                *pid <= Pid::MAX,
                ErrorKind::InvalidInput,
                "Too large PID: {}",
                pid
            );
        }
        Ok(())
    }
}
impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            pmt_pid: None,
            video_pid: None,
            audio_pid: None,
            strict_crc: false,
            log_level: LogLevel::default(),
            probe_limit: DEFAULT_PROBE_LIMIT,
        }
    }
}
