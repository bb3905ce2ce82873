/// Seconds since the start of the service day.
pub type Time = i32;

/// A duration in seconds. Negative durations never occur in valid input.
pub type DurationSec = i32;

/// Generalized cost in centi-units (c1), accumulated along a journey.
pub type Cost = i32;

/// Raptor round counter. Round 0 is the access round, round `n` is the
/// n-th transit ride.
pub type Round = u32;

/// Sentinel for "no departure exists in the window".
pub const NO_DEPARTURE: Time = -1;

/// Sentinel arrival time of an unreached stop in a forward search.
pub const UNREACHED_FORWARD: Time = Time::MAX;

/// Sentinel arrival time of an unreached stop in a reverse search.
pub const UNREACHED_REVERSE: Time = Time::MIN;

/// Step between two range-raptor iterations of the search window.
pub const ITERATION_STEP: DurationSec = 60;

pub fn fmt_time(t: Time) -> String {
    if t == UNREACHED_FORWARD || t == UNREACHED_REVERSE {
        return "--:--:--".to_string();
    }
    let s = t.rem_euclid(60);
    let m = (t / 60).rem_euclid(60);
    let h = t / 3600;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Parses a `HH:MM:SS` clock value into seconds since midnight. Hours may
/// exceed 24 for trips running past the end of the service day.
pub fn parse_time(text: &str) -> Result<Time, String> {
    let mut parts = text.split(':');
    let mut next = |name: &str| {
        parts
            .next()
            .ok_or_else(|| format!("missing {name} in time value {text:?}"))?
            .parse::<Time>()
            .map_err(|e| format!("bad {name} in time value {text:?}: {e}"))
    };
    let h = next("hours")?;
    let m = next("minutes")?;
    let s = next("seconds")?;
    if !(0..60).contains(&m) || !(0..60).contains(&s) {
        return Err(format!("out-of-range time value {text:?}"));
    }
    Ok(h * 3600 + m * 60 + s)
}
