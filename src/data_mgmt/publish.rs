use std::env;
use std::thread::JoinHandle;

use rumqttc::Client;

use crate::{
    constants::{envvars, topics},
    helpers::now_epoch_nanos,
    interfaces::mqtt::{self, MqttError, MqttMessage},
};

use super::{
    models::{Reading, Value},
    payload::EventPayload,
};

/// Downstream event pipeline. Posting is fire-and-forget: failures are
/// handled (or not) by the implementation and never reach the requester.
pub trait ReadingPublisher {
    fn post_reading(&self, device_name: &str, resource_name: &str, value: Value);
}

/// Publishes each reading as a JSON event on `<prefix>/<device>/<resource>`
pub struct MqttPublisher {
    client: Client,
    topic_prefix: String,
    _event_loop: JoinHandle<()>,
}

impl MqttPublisher {
    pub fn connect() -> Result<Self, MqttError> {
        let topic_prefix = env::var(envvars::MQTT_TOPIC_PREFIX)
            .unwrap_or_else(|_| topics::EVENTS_PREFIX.to_string());
        let (client, connection) = mqtt::client_conn(mqtt::get_rand_client_id(Some("device-coap")), None);
        let event_loop = mqtt::spawn_event_loop(connection)?;
        Ok(Self {
            client,
            topic_prefix,
            _event_loop: event_loop,
        })
    }
}

impl ReadingPublisher for MqttPublisher {
    fn post_reading(&self, device_name: &str, resource_name: &str, value: Value) {
        let reading = Reading::new(device_name, resource_name, value);
        let msg = match construct_message(&self.topic_prefix, reading, now_epoch_nanos()) {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("Could not serialize event for {device_name}/{resource_name}: {e}");
                return;
            }
        };
        if let Err(e) = mqtt::try_publish(&self.client, msg) {
            log::error!("Dropped event for {device_name}/{resource_name}: {e}");
        }
    }
}

fn construct_message(
    topic_prefix: &str,
    reading: Reading,
    origin: i64,
) -> Result<MqttMessage, serde_json::Error> {
    let topic = format!(
        "{}/{}/{}",
        topic_prefix, reading.device_name, reading.resource_name
    );
    let payload = serde_json::to_string(&EventPayload::from_reading(reading, origin))?;
    Ok(MqttMessage::new(topic, payload))
}
