//! Per-request state machine for pushed readings.
//!
//! A request moves through method check, path routing, content-format check,
//! payload decode and publish; every step can reject it with a response code.

use coap_lite::{RequestType, ResponseType};

use crate::data_mgmt::{decode::Decoder, publish::ReadingPublisher};
use crate::interfaces::registry::DeviceRegistry;

use super::router::{self, RoutingError};

pub const MSG_PAYLOAD_INVALID: &str = "payload not valid";

/// CoAP Content-Format values the handler distinguishes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentFormat {
    TextPlain,
    ApplicationJson,
    Other(u16),
}

impl ContentFormat {
    pub const TEXT_PLAIN: u16 = 0;
    pub const APPLICATION_JSON: u16 = 50;
}

impl From<u16> for ContentFormat {
    fn from(value: u16) -> Self {
        match value {
            ContentFormat::TEXT_PLAIN => ContentFormat::TextPlain,
            ContentFormat::APPLICATION_JSON => ContentFormat::ApplicationJson,
            other => ContentFormat::Other(other),
        }
    }
}

/// Inbound request, reduced to what the handler looks at
#[derive(Clone, Debug)]
pub struct Request<'a> {
    pub method: RequestType,
    /// Uri-Path segments joined with '/', or why they cannot be joined
    pub path: Result<String, RoutingError>,
    /// `None` when the option is absent
    pub content_format: Option<ContentFormat>,
    /// `None` when the request carries no payload
    pub payload: Option<&'a [u8]>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub status: ResponseType,
    pub body: Option<&'static str>,
}

impl Outcome {
    fn status(status: ResponseType) -> Self {
        Self { status, body: None }
    }

    fn payload_invalid() -> Self {
        Self {
            status: ResponseType::BadRequest,
            body: Some(MSG_PAYLOAD_INVALID),
        }
    }
}

pub struct RequestHandler<R, P> {
    registry: R,
    publisher: P,
}

impl<R: DeviceRegistry, P: ReadingPublisher> RequestHandler<R, P> {
    pub fn new(registry: R, publisher: P) -> Self {
        Self {
            registry,
            publisher,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Process one pushed reading. The device lease taken while routing is
    /// released when this returns, whatever the outcome.
    pub fn handle(&self, request: &Request) -> Outcome {
        // Only the push method is served; PUT reaches us through the
        // catch-all resource and is refused like everything else.
        if request.method != RequestType::Post {
            log::info!("method {:?} not allowed", request.method);
            return Outcome::status(ResponseType::MethodNotAllowed);
        }

        let routed = match &request.path {
            Ok(path) => router::route(path, &self.registry),
            Err(e) => Err(e.clone()),
        };
        let route = match routed {
            Ok(route) => route,
            Err(e) => {
                log::info!("{e}");
                return Outcome::status(ResponseType::NotFound);
            }
        };

        let kind = route.resource.value_type;
        let Some(decoder) = Decoder::for_kind(kind) else {
            log::error!("unsupported resource type {kind}");
            return Outcome::status(ResponseType::InternalServerError);
        };

        if !accepts_format(decoder, request.content_format) {
            log::info!(
                "content format {:?} not acceptable for {kind}",
                request.content_format
            );
            return Outcome::status(ResponseType::UnsupportedContentFormat);
        }

        let Some(data) = request.payload else {
            log::info!("invalid data of len 0");
            return Outcome::payload_invalid();
        };

        let value = match decoder.decode(data) {
            Ok(value) => value,
            Err(e) => {
                log::info!("{e}");
                return Outcome::payload_invalid();
            }
        };

        log::debug!(
            "posting {:?} for {}/{}",
            value,
            route.device_name(),
            route.resource.name
        );
        self.publisher
            .post_reading(route.device_name(), &route.resource.name, value);

        Outcome::status(ResponseType::Changed)
    }
}

/// Numeric kinds are sent as text; strings may also come as JSON.
fn accepts_format(decoder: Decoder, format: Option<ContentFormat>) -> bool {
    match decoder {
        Decoder::Float64 | Decoder::Int32 => matches!(format, Some(ContentFormat::TextPlain)),
        Decoder::String => matches!(
            format,
            Some(ContentFormat::TextPlain) | Some(ContentFormat::ApplicationJson)
        ),
    }
}
