pub const EVENTS_PREFIX: &str = "coap/events";
