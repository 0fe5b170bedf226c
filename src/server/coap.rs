use std::net::SocketAddr;

use coap_lite::{CoapOption, CoapResponse, MessageClass, MessageType, Packet};

use crate::data_mgmt::publish::ReadingPublisher;
use crate::interfaces::registry::DeviceRegistry;

use super::handler::{ContentFormat, Outcome, Request, RequestHandler};
use super::router::RoutingError;

/// A CoAP resource served by the transport. Returns the message to send back
/// to `peer`, if any.
pub trait CoapService {
    fn handle_packet(&self, packet: &Packet, peer: SocketAddr) -> Option<Packet>;
}

impl<R: DeviceRegistry, P: ReadingPublisher> CoapService for RequestHandler<R, P> {
    fn handle_packet(&self, packet: &Packet, peer: SocketAddr) -> Option<Packet> {
        let MessageClass::Request(method) = packet.header.code else {
            return None;
        };
        // Confirmable and non-confirmable requests only
        let mut response = CoapResponse::new(packet)?;

        let request = Request {
            method,
            path: uri_path(packet),
            content_format: content_format(packet),
            payload: (!packet.payload.is_empty()).then_some(packet.payload.as_slice()),
        };
        log::debug!("{:?} from {peer}", request.method);

        let outcome = self.handle(&request);
        write_outcome(&mut response, &outcome);
        Some(response.message)
    }
}

fn write_outcome(response: &mut CoapResponse, outcome: &Outcome) {
    response.set_status(outcome.status);
    response.message.payload = outcome
        .body
        .map(|body| body.as_bytes().to_vec())
        .unwrap_or_default();
}

/// Join Uri-Path options with '/'. A segment that is not UTF-8, or that
/// contains '/' itself, makes the path unroutable.
pub fn uri_path(packet: &Packet) -> Result<String, RoutingError> {
    let Some(options) = packet.get_option(CoapOption::UriPath) else {
        return Ok(String::new());
    };
    let mut segments = Vec::with_capacity(options.len());
    for (i, option) in options.iter().enumerate() {
        let segment = std::str::from_utf8(option).map_err(|_| RoutingError::NotUtf8(i))?;
        if segment.contains('/') {
            return Err(RoutingError::SlashInSegment(i));
        }
        segments.push(segment);
    }
    Ok(segments.join("/"))
}

/// Decode the Content-Format option, a big-endian uint of at most two bytes.
/// Absent or overlong values are treated as undefined.
pub fn content_format(packet: &Packet) -> Option<ContentFormat> {
    let raw = packet.get_option(CoapOption::ContentFormat)?.front()?;
    if raw.len() > 2 {
        return None;
    }
    let value = raw
        .iter()
        .fold(0u16, |acc, byte| (acc << 8) | u16::from(*byte));
    Some(ContentFormat::from(value))
}

/// Reset message for an empty confirmable message (CoAP ping)
pub fn ping_reset(packet: &Packet) -> Option<Packet> {
    if packet.header.code != MessageClass::Empty
        || packet.header.get_type() != MessageType::Confirmable
    {
        return None;
    }
    let mut reset = Packet::new();
    reset.header.set_type(MessageType::Reset);
    reset.header.message_id = packet.header.message_id;
    Some(reset)
}

#[cfg(test)]
mod tests {
    use coap_lite::{RequestType, ResponseType};

    use super::*;

    fn request(path: &[&[u8]]) -> Packet {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Confirmable);
        packet.header.code = MessageClass::Request(RequestType::Post);
        packet.header.message_id = 7;
        packet.set_token(vec![0xca, 0xfe]);
        for segment in path {
            packet.add_option(CoapOption::UriPath, segment.to_vec());
        }
        packet
    }

    #[test]
    fn test_uri_path() {
        assert_eq!(
            uri_path(&request(&[b"a1r", b"device-1", b"temp"])).as_deref(),
            Ok("a1r/device-1/temp")
        );
        assert_eq!(uri_path(&request(&[])).as_deref(), Ok(""));
        assert_eq!(
            uri_path(&request(&[b"a1r", b"dev\xff", b"temp"])),
            Err(RoutingError::NotUtf8(1))
        );
        assert_eq!(
            uri_path(&request(&[b"a1r", b"dev/ice", b"temp"])),
            Err(RoutingError::SlashInSegment(1))
        );
        assert_eq!(
            uri_path(&request(&[b"a1r", b"device-1", b"/"])).unwrap_err().to_string(),
            "URI segment 2 contains '/'"
        );
    }

    #[test]
    fn test_content_format() {
        let mut packet = request(&[]);
        assert_eq!(content_format(&packet), None);

        // text/plain is encoded as a zero-length option
        packet.add_option(CoapOption::ContentFormat, vec![]);
        assert_eq!(content_format(&packet), Some(ContentFormat::TextPlain));

        let mut packet = request(&[]);
        packet.add_option(CoapOption::ContentFormat, vec![50]);
        assert_eq!(content_format(&packet), Some(ContentFormat::ApplicationJson));

        let mut packet = request(&[]);
        packet.add_option(CoapOption::ContentFormat, vec![0x2d, 0x16]);
        assert_eq!(content_format(&packet), Some(ContentFormat::Other(11542)));

        let mut packet = request(&[]);
        packet.add_option(CoapOption::ContentFormat, vec![0, 0, 0]);
        assert_eq!(content_format(&packet), None);
    }

    #[test]
    fn test_write_outcome_replaces_payload() {
        let mut packet = request(&[]);
        packet.payload = b"23.5x".to_vec();
        let mut response = CoapResponse::new(&packet).unwrap();

        write_outcome(
            &mut response,
            &Outcome {
                status: ResponseType::BadRequest,
                body: Some("payload not valid"),
            },
        );
        assert_eq!(response.message.payload, b"payload not valid");
        assert_eq!(response.message.header.get_type(), MessageType::Acknowledgement);
        assert_eq!(response.message.header.message_id, 7);
        assert_eq!(response.message.get_token(), &[0xca, 0xfe]);

        write_outcome(
            &mut response,
            &Outcome {
                status: ResponseType::Changed,
                body: None,
            },
        );
        assert!(response.message.payload.is_empty());
        assert_eq!(
            response.message.header.code,
            MessageClass::Response(ResponseType::Changed)
        );
    }

    #[test]
    fn test_ping_reset() {
        let mut ping = Packet::new();
        ping.header.set_type(MessageType::Confirmable);
        ping.header.code = MessageClass::Empty;
        ping.header.message_id = 99;

        let reset = ping_reset(&ping).unwrap();
        assert_eq!(reset.header.get_type(), MessageType::Reset);
        assert_eq!(reset.header.message_id, 99);

        assert!(ping_reset(&request(&[])).is_none());
    }
}
