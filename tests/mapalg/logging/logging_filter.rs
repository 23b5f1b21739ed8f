use mapalg::logging::{Channel, Level, LogFilter};

#[test]
fn unset_filter_keeps_errors_only() {
    let filter = LogFilter::default();
    for channel in [Channel::Graph, Channel::Loop, Channel::Engine] {
        assert!(filter.enabled(channel, Level::Error));
        assert!(!filter.enabled(channel, Level::Warn));
    }
}

#[test]
fn channel_override_beats_bare_level() {
    let filter = LogFilter::parse("engine=trace, warn");
    assert_eq!(filter.level(Channel::Engine), Level::Trace);
    assert_eq!(filter.level(Channel::Graph), Level::Warn);
    assert_eq!(filter.level(Channel::Loop), Level::Warn);
    assert!(filter.enabled(Channel::Engine, Level::Trace));
    assert!(!filter.enabled(Channel::Loop, Level::Trace));
}

#[test]
fn unknown_directives_are_skipped() {
    let filter = LogFilter::parse("loop=verbose,LOOP=Trace,disk=warn,full");
    assert_eq!(filter, LogFilter::uniform(Level::Trace));
}

#[test]
fn off_disables_a_channel() {
    let filter = LogFilter::parse("trace,graph=off");
    assert!(!filter.enabled(Channel::Graph, Level::Error));
    assert!(filter.enabled(Channel::Loop, Level::Warn));
    assert!(!LogFilter::uniform(Level::Trace).enabled(Channel::Engine, Level::Off));
}
