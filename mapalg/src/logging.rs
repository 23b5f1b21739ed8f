//! Channelled diagnostics for graph construction, loop lowering and the
//! engine boundary.
//!
//! `MAPALG_LOG` holds a comma separated filter. A bare level applies to
//! every channel and `channel=level` overrides one of them, so
//! `warn,engine=trace` keeps graph and loop output at warnings while
//! logging every `ma_*` crossing. Unset means errors only.

use std::env;
use std::fmt::{self, Arguments};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "MAPALG_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Node construction and handle bookkeeping.
    Graph,
    /// The two-pass loop lowering protocol.
    Loop,
    /// Calls crossing into an engine.
    Engine,
}

impl Channel {
    const ALL: [Channel; 3] = [Channel::Graph, Channel::Loop, Channel::Engine];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Graph => "graph",
            Channel::Loop => "loop",
            Channel::Engine => "engine",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == value)
            .ok_or_else(|| format!("unknown log channel '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Off,
    Error,
    Warn,
    Trace,
}

impl Level {
    fn label(self) -> (&'static str, &'static str) {
        match self {
            Level::Off => ("OFF", "0"),
            Level::Error => ("ERROR", "91"),
            Level::Warn => ("WARNING", "33"),
            Level::Trace => ("TRACE", "34"),
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "off" | "0" => Ok(Level::Off),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "trace" | "1" | "full" => Ok(Level::Trace),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Per-channel verbosity parsed from a filter string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    levels: [Level; 3],
}

impl Default for LogFilter {
    fn default() -> Self {
        Self::uniform(Level::Error)
    }
}

impl LogFilter {
    pub fn uniform(level: Level) -> Self {
        Self { levels: [level; 3] }
    }

    /// Parses `level` and `channel=level` directives. Unknown directives are
    /// skipped so a typo never silences the remaining ones.
    pub fn parse(spec: &str) -> Self {
        let mut filter = Self::default();
        let mut overrides = Vec::new();
        for directive in spec.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let directive = directive.to_ascii_lowercase();
            match directive.split_once('=') {
                Some((channel, level)) => {
                    if let (Ok(channel), Ok(level)) =
                        (channel.trim().parse::<Channel>(), level.trim().parse::<Level>())
                    {
                        overrides.push((channel, level));
                    }
                }
                None => {
                    if let Ok(level) = directive.parse::<Level>() {
                        filter = Self::uniform(level);
                    }
                }
            }
        }
        for (channel, level) in overrides {
            filter.levels[channel.slot()] = level;
        }
        filter
    }

    pub fn level(&self, channel: Channel) -> Level {
        self.levels[channel.slot()]
    }

    pub fn enabled(&self, channel: Channel, level: Level) -> bool {
        level != Level::Off && level <= self.level(channel)
    }
}

static FILTER: OnceLock<LogFilter> = OnceLock::new();

fn filter() -> &'static LogFilter {
    FILTER.get_or_init(|| {
        env::var(LOG_ENV)
            .map(|spec| LogFilter::parse(&spec))
            .unwrap_or_default()
    })
}

pub fn enabled(channel: Channel, level: Level) -> bool {
    filter().enabled(channel, level)
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs() % 86_400;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3_600,
        (secs % 3_600) / 60,
        secs % 60,
        now.subsec_millis()
    )
}

fn write_line(channel: Channel, kind: &str, color: &str, args: Arguments) {
    eprintln!(
        "{} [\u{001b}[{color}m{kind}\u{001b}[0m {channel}] -- {args}",
        timestamp()
    );
}

pub fn emit(channel: Channel, level: Level, args: Arguments) {
    if enabled(channel, level) {
        let (kind, color) = level.label();
        write_line(channel, kind, color, args);
    }
}

/// Always printed; used where an error cannot be propagated.
pub fn emit_critical(channel: Channel, args: Arguments) {
    write_line(channel, "CRITICAL", "31", args);
}

/// One outbound call into the engine, rendered as `-> ma_symbol(args)`.
pub fn emit_call(symbol: &str, args: Arguments) {
    if enabled(Channel::Engine, Level::Trace) {
        write_line(Channel::Engine, "CALL", "32", format_args!("-> ma_{symbol}({args})"));
    }
}

/// The node or status an engine call handed back.
pub fn emit_return(symbol: &str, args: Arguments) {
    if enabled(Channel::Engine, Level::Trace) {
        write_line(Channel::Engine, "CALL", "32", format_args!("<- ma_{symbol} = {args}"));
    }
}

#[macro_export]
macro_rules! trace {
    ($channel:ident, $($arg:tt)*) => {
        $crate::logging::emit(
            $crate::logging::Channel::$channel,
            $crate::logging::Level::Trace,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! warning {
    ($channel:ident, $($arg:tt)*) => {
        $crate::logging::emit(
            $crate::logging::Channel::$channel,
            $crate::logging::Level::Warn,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! error {
    ($channel:ident, $($arg:tt)*) => {
        $crate::logging::emit(
            $crate::logging::Channel::$channel,
            $crate::logging::Level::Error,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! critical {
    ($channel:ident, $($arg:tt)*) => {
        $crate::logging::emit_critical($crate::logging::Channel::$channel, format_args!($($arg)*))
    };
}

/// `engine_call!("loopCond", "{cond}")` logs `-> ma_loopCond(n3)`.
#[macro_export]
macro_rules! engine_call {
    ($symbol:expr) => {
        $crate::logging::emit_call($symbol, format_args!(""))
    };
    ($symbol:expr, $($arg:tt)*) => {
        $crate::logging::emit_call($symbol, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! engine_return {
    ($symbol:expr, $($arg:tt)*) => {
        $crate::logging::emit_return($symbol, format_args!($($arg)*))
    };
}
