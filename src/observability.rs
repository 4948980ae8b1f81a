use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("ahuri.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("ahuri.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("ahuri.client.request_duration_seconds");

pub(crate) static STREAM_SESSIONS: Counter = Counter::new("ahuri.stream.sessions");
pub(crate) static STREAM_CONNECT_ERRORS: Counter = Counter::new("ahuri.stream.connect_errors");
pub(crate) static STREAM_FRAMES: Counter = Counter::new("ahuri.stream.frames");
pub(crate) static STREAM_MESSAGES: Counter = Counter::new("ahuri.stream.messages");
pub(crate) static STREAM_DECODE_ERRORS: Counter = Counter::new("ahuri.stream.decode_errors");
pub(crate) static STREAM_INVALID_RESPONSES: Counter =
    Counter::new("ahuri.stream.invalid_responses");
pub(crate) static STREAM_CANCELLED: Counter = Counter::new("ahuri.stream.cancelled");
pub(crate) static STREAM_DURATION: Moments = Moments::new("ahuri.stream.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_SESSIONS);
    collector.register_counter(&STREAM_CONNECT_ERRORS);
    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_MESSAGES);
    collector.register_counter(&STREAM_DECODE_ERRORS);
    collector.register_counter(&STREAM_INVALID_RESPONSES);
    collector.register_counter(&STREAM_CANCELLED);
    collector.register_moments(&STREAM_DURATION);
}
