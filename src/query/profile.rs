use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use serde::Serialize;

/// A snapshot of compile and result-shaping profiling metrics.
///
/// Profiling is enabled via the `QUARRY_PROFILE` environment variable and
/// tracks time spent in each authoring and display phase.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ShapingProfileSnapshot {
    /// Total nanoseconds spent compiling graphs into hops.
    pub compile_ns: u64,
    /// Number of compile calls.
    pub compile_count: u64,
    /// Total nanoseconds spent expanding hops into graphs.
    pub expand_ns: u64,
    /// Number of expand calls.
    pub expand_count: u64,
    /// Total nanoseconds spent parsing flattened payloads.
    pub flatten_ns: u64,
    /// Number of flattened payloads parsed.
    pub flatten_count: u64,
    /// Total nanoseconds spent assembling nested blocks.
    pub nested_ns: u64,
    /// Number of nested blocks assembled.
    pub nested_count: u64,
}

#[derive(Default)]
struct ShapingProfileCounters {
    compile_ns: AtomicU64,
    compile_count: AtomicU64,
    expand_ns: AtomicU64,
    expand_count: AtomicU64,
    flatten_ns: AtomicU64,
    flatten_count: AtomicU64,
    nested_ns: AtomicU64,
    nested_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<ShapingProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("QUARRY_PROFILE").is_some())
}

fn counters() -> Option<&'static ShapingProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(ShapingProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum ProfileKind {
    /// Graph to pattern compilation.
    Compile,
    /// Pattern to graph expansion.
    Expand,
    /// Flattened payload parsing.
    Flatten,
    /// Nested block assembly.
    Nested,
}

pub(crate) fn record_profile_timer(kind: ProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    let (ns, count) = match kind {
        ProfileKind::Compile => (&counters.compile_ns, &counters.compile_count),
        ProfileKind::Expand => (&counters.expand_ns, &counters.expand_count),
        ProfileKind::Flatten => (&counters.flatten_ns, &counters.flatten_count),
        ProfileKind::Nested => (&counters.nested_ns, &counters.nested_count),
    };
    ns.fetch_add(nanos, Ordering::Relaxed);
    count.fetch_add(1, Ordering::Relaxed);
}

/// Retrieves a snapshot of current profiling metrics.
///
/// Returns `None` unless `QUARRY_PROFILE` is set. With `reset`, counters are
/// zeroed as they are read.
///
/// ```no_run
/// use quarry::query::profile::profile_snapshot;
///
/// if let Some(snapshot) = profile_snapshot(false) {
///     println!("compiled {} graphs", snapshot.compile_count);
/// }
/// ```
pub fn profile_snapshot(reset: bool) -> Option<ShapingProfileSnapshot> {
    let counters = counters()?;
    let load = |counter: &AtomicU64| {
        if reset {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    };
    Some(ShapingProfileSnapshot {
        compile_ns: load(&counters.compile_ns),
        compile_count: load(&counters.compile_count),
        expand_ns: load(&counters.expand_ns),
        expand_count: load(&counters.expand_count),
        flatten_ns: load(&counters.flatten_ns),
        flatten_count: load(&counters.flatten_count),
        nested_ns: load(&counters.nested_ns),
        nested_count: load(&counters.nested_count),
    })
}
