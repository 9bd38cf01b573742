use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("streamchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("streamchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("streamchat.client.request_duration_seconds");
pub(crate) static CLIENT_PROBES: Counter = Counter::new("streamchat.client.probes");
pub(crate) static CLIENT_PROBE_FAILURES: Counter =
    Counter::new("streamchat.client.probe_failures");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("streamchat.stream.chunks");
pub(crate) static STREAM_BYTES: Counter = Counter::new("streamchat.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("streamchat.stream.errors");
pub(crate) static STREAM_TTFB: Moments = Moments::new("streamchat.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("streamchat.stream.duration_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("streamchat.session.turns");
pub(crate) static SESSION_TURN_FAILURES: Counter =
    Counter::new("streamchat.session.turn_failures");
pub(crate) static SESSION_REJECTED_SENDS: Counter =
    Counter::new("streamchat.session.rejected_sends");
pub(crate) static SESSION_STALE_PROBES: Counter =
    Counter::new("streamchat.session.stale_probes");
pub(crate) static SESSION_CANCELLED_TURNS: Counter =
    Counter::new("streamchat.session.cancelled_turns");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);
    collector.register_counter(&CLIENT_PROBES);
    collector.register_counter(&CLIENT_PROBE_FAILURES);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_TURN_FAILURES);
    collector.register_counter(&SESSION_REJECTED_SENDS);
    collector.register_counter(&SESSION_STALE_PROBES);
    collector.register_counter(&SESSION_CANCELLED_TURNS);
}
