use std::env;
use std::time::{Duration, Instant};

pub fn stats_enabled() -> bool {
    matches!(env::var("KIRA_STATS").as_deref(), Ok("1"))
}

pub fn stage<T, F>(stats: bool, name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let t = Instant::now();
    let res = f();
    stage_done(stats, name, t);
    res
}

pub fn stage_done(stats: bool, name: &str, t: Instant) {
    if stats {
        eprintln!("KIRA_STATS stage={} time={}", name, fmt_dur(t.elapsed()));
    }
}

pub fn fmt_dur(d: Duration) -> String {
    if d.as_secs_f64() < 1.0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}
