//! RabbitMQ channel (AMQP 0-9-1)

use super::{ChannelError, MessageChannel};
use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, info, warn};

/// Persistent delivery mode
const DELIVERY_MODE_PERSISTENT: u8 = 2;

#[derive(Debug, Clone)]
pub struct AmqpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub exchange: String,
}

impl AmqpSettings {
    pub fn uri(&self) -> String {
        let vhost = if self.vhost == "/" { "%2f".to_string() } else { self.vhost.clone() };
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, vhost
        )
    }
}

pub struct AmqpChannel {
    connection: Connection,
    channel: Channel,
}

impl AmqpChannel {
    /// Open the connection and declare the logging exchange.
    ///
    /// Failures here are fatal to the caller; nothing is buffered.
    pub async fn connect(settings: &AmqpSettings) -> Result<Self, ChannelError> {
        info!(host = %settings.host, port = settings.port, vhost = %settings.vhost, "amqp_connecting");

        let connection = Connection::connect(&settings.uri(), ConnectionProperties::default())
            .await
            .map_err(connect_error)?;
        let channel = connection.create_channel().await.map_err(connect_error)?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(connect_error)?;

        channel
            .exchange_declare(
                &settings.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(connect_error)?;

        info!(exchange = %settings.exchange, "amqp_connected");
        Ok(Self { connection, channel })
    }
}

fn connect_error(e: lapin::Error) -> ChannelError {
    match e {
        // the broker answers bad credentials with ACCESS_REFUSED
        lapin::Error::ProtocolError(err) => ChannelError::Auth(err.to_string()),
        other => ChannelError::Connect(other.to_string()),
    }
}

/// Broker verdict on one publish; a nack may clear on retry
fn confirmation_result(confirmation: Confirmation) -> Result<(), ChannelError> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(ChannelError::Transient("publish nacked by broker".to_string())),
        Confirmation::NotRequested => {
            Err(ChannelError::InvalidState("publisher confirms not enabled".to_string()))
        }
    }
}

fn channel_error(e: lapin::Error) -> ChannelError {
    match e {
        lapin::Error::InvalidChannelState(_)
        | lapin::Error::InvalidConnectionState(_)
        | lapin::Error::ProtocolError(_) => ChannelError::InvalidState(e.to_string()),
        other => ChannelError::Transient(other.to_string()),
    }
}

#[async_trait]
impl MessageChannel for AmqpChannel {
    async fn declare(&self, queue: &str) -> Result<(), ChannelError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(channel_error)?;
        Ok(())
    }

    async fn bind(
        &self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> Result<(), ChannelError> {
        self.channel
            .queue_bind(queue, exchange, routing_key, QueueBindOptions::default(), FieldTable::default())
            .await
            .map_err(channel_error)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), ChannelError> {
        let properties = BasicProperties::default()
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .with_content_type("application/json".into());

        let confirm = self
            .channel
            .basic_publish(exchange, routing_key, BasicPublishOptions::default(), body, properties)
            .await
            .map_err(channel_error)?;
        confirmation_result(confirm.await.map_err(channel_error)?)?;

        debug!(exchange = %exchange, routing_key = %routing_key, bytes = body.len(), "amqp_published");
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        if let Err(e) = self.channel.close(200, "bye").await {
            warn!(error = %e, "amqp_channel_close_failed");
        }
        self.connection.close(200, "bye").await.map_err(channel_error)?;
        info!("amqp_closed");
        Ok(())
    }
}
