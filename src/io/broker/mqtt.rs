//! MQTT channel for brokers without AMQP
//!
//! MQTT has no queues or bindings: `declare` and `bind` are no-ops and each
//! message goes to the topic `<exchange>/<routing_key>` at QoS 1.

use super::{ChannelError, MessageChannel};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
}

pub struct MqttChannel {
    client: AsyncClient,
}

pub fn topic_for(exchange: &str, routing_key: &str) -> String {
    if exchange.is_empty() {
        routing_key.to_string()
    } else {
        format!("{}/{}", exchange, routing_key)
    }
}

impl MqttChannel {
    /// Connect and wait for the CONNACK before returning, so bad credentials
    /// surface here instead of on the first publish.
    pub async fn connect(settings: &MqttSettings) -> Result<Self, ChannelError> {
        let client_id = format!("sensor-gateway-{}", std::process::id());
        let mut mqttoptions = MqttOptions::new(client_id, &settings.host, settings.port);
        mqttoptions.set_keep_alive(Duration::from_secs(30));
        mqttoptions.set_clean_session(true);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            mqttoptions.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);

        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(ConnectionError::ConnectionRefused(code)) => {
                        return Err(ChannelError::Auth(format!("{:?}", code)))
                    }
                    Err(e) => return Err(ChannelError::Connect(e.to_string())),
                }
            }
        };
        match tokio::time::timeout(settings.connect_timeout, handshake).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(ChannelError::Connect("connack timeout".to_string())),
        }
        info!(host = %settings.host, port = settings.port, "mqtt_connected");

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::PubAck(_))) => {
                        debug!("mqtt_puback");
                    }
                    Ok(_) => {}
                    Err(ConnectionError::RequestsDone) => break,
                    Err(e) => {
                        warn!(error = %e, "mqtt_eventloop_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self { client })
    }
}

#[async_trait]
impl MessageChannel for MqttChannel {
    async fn declare(&self, _queue: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn bind(&self, _: &str, _: &str, _: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), ChannelError> {
        let topic = topic_for(exchange, routing_key);
        self.client
            .publish(&topic, QoS::AtLeastOnce, false, body.to_vec())
            .await
            .map_err(|e| ChannelError::InvalidState(e.to_string()))?;
        debug!(topic = %topic, bytes = body.len(), "mqtt_published");
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.client.disconnect().await.map_err(|e| ChannelError::InvalidState(e.to_string()))?;
        info!("mqtt_closed");
        Ok(())
    }
}
