// MQTT transport implementation (rumqttc)
use crate::application::transport::{
    BrokerAddress, BrokerScheme, TransportConnector, TransportError, TransportEvent,
    TransportSession,
};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use std::time::Duration;
use tracing::debug;

/// Time allowed for the DISCONNECT packet to flush on close.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct MqttConnector {
    client_id: String,
    keep_alive: Duration,
    channel_capacity: usize,
}

impl MqttConnector {
    pub fn new(client_id: String, keep_alive: Duration, channel_capacity: usize) -> Self {
        Self {
            client_id,
            keep_alive,
            channel_capacity: channel_capacity.max(1),
        }
    }

    fn options_for(&self, address: &BrokerAddress) -> MqttOptions {
        let mut options = match address.scheme {
            BrokerScheme::Tcp => MqttOptions::new(&self.client_id, &address.host, address.port),
            BrokerScheme::Ws | BrokerScheme::Wss => {
                // websocket transports take the full url as host
                let mut options =
                    MqttOptions::new(&self.client_id, address.to_string(), address.port);
                if address.scheme == BrokerScheme::Ws {
                    options.set_transport(Transport::Ws);
                } else {
                    options.set_transport(Transport::wss_with_default_config());
                }
                options
            }
        };

        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options
    }
}

#[async_trait]
impl TransportConnector for MqttConnector {
    async fn connect(
        &self,
        address: &BrokerAddress,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        // MqttOptions::new panics on these
        if self.client_id.is_empty() || self.client_id.starts_with(char::is_whitespace) {
            return Err(TransportError::Connect {
                address: address.to_string(),
                message: format!("invalid client id {:?}", self.client_id),
            });
        }

        debug!(address = %address, client_id = %self.client_id, "Opening MQTT session");
        let (client, eventloop) = AsyncClient::new(self.options_for(address), self.channel_capacity);

        Ok(Box::new(MqttSession {
            client,
            eventloop,
            closed: false,
            failed: false,
        }))
    }
}

/// One broker connection. The network connection is made lazily by the
/// first `next_event` poll, which reports the CONNACK as `Connected`.
pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    closed: bool,
    /// Set once the broker connection is gone; polling again would redial.
    failed: bool,
}

#[async_trait]
impl TransportSession for MqttSession {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!(code = ?ack.code, "CONNACK received");
                    return TransportEvent::Connected;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload,
                    };
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.failed = true;
                    return TransportEvent::Disconnected;
                }
                Ok(_) => continue,
                Err(e) => {
                    self.failed = true;
                    return TransportEvent::Error(TransportError::Connection(e.to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.failed {
            debug!("Session already failed, skipping DISCONNECT");
            return;
        }
        if self.client.try_disconnect().is_err() {
            return;
        }

        let flush = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(CLOSE_GRACE, flush).await.is_err() {
            debug!("MQTT disconnect did not flush before the grace period");
        }
    }
}
