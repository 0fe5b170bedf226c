use std::env;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use thiserror::Error;

use crate::constants::{defaults, envvars};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CHANNEL_CAPACITY: usize = 64;

static MQTT_BRIDGE_HOST: Lazy<String> = Lazy::new(|| {
    if let Ok(host) = env::var(envvars::MQTT_BRIDGE_HOST) {
        return host;
    }
    defaults::MQTT_BRIDGE_HOST.to_string()
});

static MQTT_BRIDGE_PORT: Lazy<u16> = Lazy::new(|| {
    if let Ok(port_str) = env::var(envvars::MQTT_BRIDGE_PORT) {
        if let Ok(port) = port_str.parse::<u16>() {
            return port;
        }
    }
    defaults::MQTT_BRIDGE_PORT
});

#[derive(Debug)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

impl MqttMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MqttError {
    #[error(transparent)]
    MqttClient(#[from] rumqttc::ClientError),
    #[error("could not start MQTT event loop: {0}")]
    EventLoop(#[from] std::io::Error),
}

pub fn get_rand_client_id(prefix: Option<&str>) -> String {
    let rand: [u8; 3] = rand::random();
    let randhex = hex::encode(rand);

    if let Some(pref) = prefix {
        format!("{pref}-{randhex}")
    } else {
        randhex
    }
}

pub fn client_conn(client_id: String, clean_session: Option<bool>) -> (Client, Connection) {
    let host = MQTT_BRIDGE_HOST.clone();
    let port = *MQTT_BRIDGE_PORT;
    log::info!("Establishing MQTT connection to {host}:{port} as {client_id}");

    let mut mqttoptions = MqttOptions::new(client_id, host, port);
    mqttoptions.set_clean_session(clean_session.unwrap_or(true));

    Client::new(mqttoptions, REQUEST_CHANNEL_CAPACITY)
}

/// Queue a message without waiting for the broker.
pub fn try_publish(client: &Client, msg: MqttMessage) -> Result<(), MqttError> {
    log::debug!("Publishing to {}: {}", msg.topic, msg.payload);

    client.try_publish(msg.topic, QoS::AtLeastOnce, false, msg.payload.into_bytes())?;
    Ok(())
}

/// Drive the connection's event loop on a dedicated thread. Connection errors
/// are logged and the connection is retried after a delay; the thread exits
/// once the client is dropped.
pub fn spawn_event_loop(mut connection: Connection) -> Result<thread::JoinHandle<()>, MqttError> {
    let handle = thread::Builder::new()
        .name("mqtt-event-loop".into())
        .spawn(move || {
            for notification in connection.iter() {
                match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => log::info!("MQTT connected"),
                    Ok(notification) => log::trace!("Notification = {:?}", notification),
                    Err(rumqttc::ConnectionError::RequestsDone) => break,
                    Err(e) => {
                        log::error!("MQTT connection error: {e}");
                        thread::sleep(RECONNECT_DELAY);
                    }
                }
            }
            log::debug!("MQTT event loop finished");
        })?;
    Ok(handle)
}
