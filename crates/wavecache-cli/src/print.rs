//! Plain-text rendering of API responses.

use wavecache_api_types::StatusResponse;

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

pub fn status(status: &StatusResponse) {
    println!(
        "switches   update={} invalidate={} precompute={}",
        on_off(status.switches.update),
        on_off(status.switches.invalidate),
        on_off(status.switches.precompute),
    );
    println!(
        "precompute quota={} in_flight={}",
        status.precompute.quota, status.precompute.in_flight,
    );
    println!(
        "entries    valid={} invalid={} precomputing={}",
        status.entries.valid, status.entries.invalid, status.entries.precomputing,
    );
}
