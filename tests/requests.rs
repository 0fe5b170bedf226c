use std::cell::RefCell;
use std::net::SocketAddr;

use coap_lite::{
    CoapOption, MessageClass, MessageType, Packet, RequestType, ResponseType,
};

use device_coap::data_mgmt::models::Value;
use device_coap::data_mgmt::publish::ReadingPublisher;
use device_coap::interfaces::FileRegistry;
use device_coap::server::coap::CoapService;
use device_coap::server::RequestHandler;

mod stubs;

#[derive(Default)]
struct Recorder(RefCell<Vec<(String, String, Value)>>);

impl ReadingPublisher for Recorder {
    fn post_reading(&self, device_name: &str, resource_name: &str, value: Value) {
        self.0
            .borrow_mut()
            .push((device_name.into(), resource_name.into(), value));
    }
}

fn handler() -> RequestHandler<FileRegistry, Recorder> {
    let registry = FileRegistry::from_str(stubs::registry::REGISTRY).unwrap();
    RequestHandler::new(registry, Recorder::default())
}

fn peer() -> SocketAddr {
    "192.0.2.10:5683".parse().unwrap()
}

fn request(method: RequestType, path: &str, format: Option<u8>, payload: &[u8]) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(MessageType::Confirmable);
    packet.header.code = MessageClass::Request(method);
    packet.header.message_id = 0x1234;
    packet.set_token(vec![1, 2, 3, 4]);
    for segment in path.split('/') {
        packet.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
    }
    match format {
        Some(0) => packet.add_option(CoapOption::ContentFormat, vec![]),
        Some(cf) => packet.add_option(CoapOption::ContentFormat, vec![cf]),
        None => {}
    }
    packet.payload = payload.to_vec();
    packet
}

fn status(reply: &Packet) -> ResponseType {
    match reply.header.code {
        MessageClass::Response(status) => status,
        other => panic!("not a response: {other:?}"),
    }
}

#[test]
fn float_reading_is_published() {
    let handler = handler();
    let reply = handler
        .handle_packet(
            &request(RequestType::Post, "a1r/device-1/temp", Some(0), b"23.5"),
            peer(),
        )
        .unwrap();

    assert_eq!(status(&reply), ResponseType::Changed);
    assert_eq!(reply.header.get_type(), MessageType::Acknowledgement);
    assert_eq!(reply.header.message_id, 0x1234);
    assert_eq!(reply.get_token(), &[1, 2, 3, 4]);
    assert!(reply.payload.is_empty());
    assert_eq!(
        *handler.publisher().0.borrow(),
        vec![("device-1".to_string(), "temp".to_string(), Value::Float64(23.5))]
    );
    assert_eq!(handler.registry().outstanding_leases(), 0);
}

#[test]
fn trailing_garbage_is_bad_request() {
    let handler = handler();
    let reply = handler
        .handle_packet(
            &request(RequestType::Post, "a1r/device-1/temp", Some(0), b"23.5x"),
            peer(),
        )
        .unwrap();

    assert_eq!(status(&reply), ResponseType::BadRequest);
    assert_eq!(reply.payload, b"payload not valid");
    assert!(handler.publisher().0.borrow().is_empty());
    assert_eq!(handler.registry().outstanding_leases(), 0);
}

#[test]
fn json_on_numeric_resource_is_unsupported() {
    let handler = handler();
    let reply = handler
        .handle_packet(
            &request(RequestType::Post, "a1r/device-1/temp", Some(50), b"23.5"),
            peer(),
        )
        .unwrap();

    assert_eq!(status(&reply), ResponseType::UnsupportedContentFormat);
    assert!(handler.publisher().0.borrow().is_empty());
    assert_eq!(handler.registry().outstanding_leases(), 0);
}

#[test]
fn unknown_device_is_not_found() {
    let handler = handler();
    let reply = handler
        .handle_packet(
            &request(RequestType::Post, "a1r/unknown-device/temp", Some(0), b"1"),
            peer(),
        )
        .unwrap();

    assert_eq!(status(&reply), ResponseType::NotFound);
    assert!(handler.publisher().0.borrow().is_empty());
}

#[test]
fn put_is_not_allowed() {
    let handler = handler();
    let reply = handler
        .handle_packet(
            &request(RequestType::Put, "a1r/device-1/temp", Some(0), b"23.5"),
            peer(),
        )
        .unwrap();

    assert_eq!(status(&reply), ResponseType::MethodNotAllowed);
    assert!(handler.publisher().0.borrow().is_empty());
    assert_eq!(handler.registry().outstanding_leases(), 0);
}

#[test]
fn put_to_unknown_device_is_not_allowed() {
    let handler = handler();
    let reply = handler
        .handle_packet(
            &request(RequestType::Put, "a1r/unknown-device/temp", Some(0), b"23.5"),
            peer(),
        )
        .unwrap();

    assert_eq!(status(&reply), ResponseType::MethodNotAllowed);
}

#[test]
fn bool_resource_is_internal_error() {
    let handler = handler();
    let reply = handler
        .handle_packet(
            &request(RequestType::Post, "a1r/switch-1/on", Some(0), b"true"),
            peer(),
        )
        .unwrap();

    assert_eq!(status(&reply), ResponseType::InternalServerError);
    assert_eq!(handler.registry().outstanding_leases(), 0);
}

#[test]
fn int32_limits() {
    let handler = handler();
    for (payload, expected) in [
        (&b"2147483647"[..], ResponseType::Changed),
        (&b"-2147483648"[..], ResponseType::Changed),
        (&b"2147483648"[..], ResponseType::BadRequest),
        (&b"-000000000001"[..], ResponseType::BadRequest),
    ] {
        let reply = handler
            .handle_packet(
                &request(RequestType::Post, "a1r/device-1/count", Some(0), payload),
                peer(),
            )
            .unwrap();
        assert_eq!(status(&reply), expected, "payload {payload:?}");
    }
    let published: Vec<Value> = handler
        .publisher()
        .0
        .borrow()
        .iter()
        .map(|(_, _, value)| value.clone())
        .collect();
    assert_eq!(published, vec![Value::Int32(i32::MAX), Value::Int32(i32::MIN)]);
}

#[test]
fn string_reading_from_later_profile() {
    let handler = handler();
    let reply = handler
        .handle_packet(
            &request(RequestType::Post, "a1r/device-1/label", Some(50), br#"{"a":1}"#),
            peer(),
        )
        .unwrap();

    assert_eq!(status(&reply), ResponseType::Changed);
    assert_eq!(
        handler.publisher().0.borrow()[0].2,
        Value::String(r#"{"a":1}"#.into())
    );
}

#[test]
fn non_confirmable_request_gets_non_response() {
    let handler = handler();
    let mut packet = request(RequestType::Post, "a1r/device-1/temp", Some(0), b"1.5");
    packet.header.set_type(MessageType::NonConfirmable);
    let reply = handler.handle_packet(&packet, peer()).unwrap();
    assert_eq!(reply.header.get_type(), MessageType::NonConfirmable);
    assert_eq!(status(&reply), ResponseType::Changed);
}

#[test]
fn repeated_requests_leave_no_leases() {
    const N: usize = 100;
    let handler = handler();
    let packet = request(RequestType::Post, "a1r/device-1/temp", Some(0), b"23.5");
    for _ in 0..N {
        let reply = handler.handle_packet(&packet, peer()).unwrap();
        assert_eq!(status(&reply), ResponseType::Changed);
    }
    assert_eq!(handler.publisher().0.borrow().len(), N);
    assert_eq!(handler.registry().outstanding_leases(), 0);
}
