//! NATS implementation of the messaging ports.
//!
//! Connects with mutual TLS, binds the durable JetStream consumers for this
//! agent (creating its own updater stream), joins the restart queue group, and forwards everything to the
//! dispatcher through one mpsc channel in arrival order. The client
//! reconnects on its own once connected; the updater only retries the
//! initial connect and subscribe.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_nats::jetstream::{self, AckKind, consumer};
use async_nats::{Client, ConnectOptions, Event, Subject};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use updater_common::{
    agent_stream_subjects, consumer_name, delays, messenger_broadcast_subjects,
    messenger_consumer_name, restart_subject, stream, updater_stream_name,
    updater_stream_subjects,
};

use crate::application::ports::{Channel, Delivery, DurableMessage, RestartRequest};
use crate::domain::config::{CertificatePaths, UpdaterConfig};

pub type NatsDelivery = Delivery<JetStreamMessage, NatsRestartRequest>;

// ── Messages ──────────────────────────────────────────────────────────────────

pub struct JetStreamMessage {
    inner: jetstream::Message,
    sequence: Option<u64>,
}

impl JetStreamMessage {
    fn new(inner: jetstream::Message) -> Self {
        let sequence = inner.info().ok().map(|info| info.stream_sequence);
        Self { inner, sequence }
    }

    async fn ack_with(&self, kind: AckKind) -> Result<()> {
        self.inner.ack_with(kind).await.map_err(|e| anyhow!(e))
    }
}

impl DurableMessage for JetStreamMessage {
    fn subject(&self) -> &str {
        self.inner.subject.as_str()
    }

    fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    async fn ack(&self) -> Result<()> {
        self.inner.ack().await.map_err(|e| anyhow!(e))
    }

    async fn nak_with_delay(&self, delay: Duration) -> Result<()> {
        self.ack_with(AckKind::Nak(Some(delay))).await
    }

    async fn term(&self) -> Result<()> {
        self.ack_with(AckKind::Term).await
    }

    async fn in_progress(&self) -> Result<()> {
        self.ack_with(AckKind::Progress).await
    }
}

pub struct NatsRestartRequest {
    client: Client,
    reply: Option<Subject>,
}

impl RestartRequest for NatsRestartRequest {
    async fn respond(self) -> Result<()> {
        let Some(reply) = self.reply else {
            return Ok(());
        };
        self.client
            .publish(reply, bytes::Bytes::new())
            .await
            .context("publishing restart reply")?;
        self.client.flush().await.context("flushing restart reply")
    }
}

// ── Channel ───────────────────────────────────────────────────────────────────

pub struct NatsChannel {
    agent_id: String,
    servers: Vec<String>,
    certificates: CertificatePaths,
    client: Mutex<Option<Client>>,
    forwarders: Mutex<Vec<AbortHandle>>,
    outbound: mpsc::Sender<NatsDelivery>,
}

/// Consumer replicas: one per server up to the cluster maximum; left to the
/// server default for a single server.
#[must_use]
pub fn consumer_replicas(servers: usize) -> usize {
    if servers > 1 {
        servers.min(stream::MAX_REPLICAS)
    } else {
        0
    }
}

impl NatsChannel {
    /// A channel for `config` whose deliveries go to `outbound`.
    #[must_use]
    pub fn new(config: &UpdaterConfig, outbound: mpsc::Sender<NatsDelivery>) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            servers: config.nats_servers.clone(),
            certificates: config.certificates.clone(),
            client: Mutex::new(None),
            forwarders: Mutex::new(Vec::new()),
            outbound,
        }
    }

    fn client_slot(&self) -> MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn forwarders(&self) -> MutexGuard<'_, Vec<AbortHandle>> {
        self.forwarders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect_options(&self) -> ConnectOptions {
        let certs = &self.certificates;
        ConnectOptions::new()
            .name(format!("agent-updater-{}", self.agent_id))
            .require_tls(true)
            .add_root_certificates(certs.ca_cert.clone())
            .add_client_certificate(certs.agent_cert.clone(), certs.agent_key.clone())
            .event_callback(|event| async move {
                match event {
                    Event::Connected => tracing::info!("messaging connection restored"),
                    Event::Disconnected => tracing::warn!("messaging connection lost"),
                    other => tracing::debug!(event = %other, "messaging event"),
                }
            })
    }

    fn consumer_config(
        &self,
        name: String,
        filter_subjects: Vec<String>,
    ) -> consumer::pull::Config {
        consumer::pull::Config {
            durable_name: Some(name),
            filter_subjects,
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: delays::ACK_WAIT,
            num_replicas: consumer_replicas(self.servers.len()),
            ..Default::default()
        }
    }

    /// Create or update a durable consumer on `stream` and forward its
    /// messages. The setup deadline is not renewed once the consumer is bound.
    async fn consume(
        &self,
        stream: &jetstream::stream::Stream,
        config: consumer::pull::Config,
    ) -> Result<()> {
        let name = config.durable_name.clone().unwrap_or_default();
        let setup = async {
            let consumer: consumer::PullConsumer = stream
                .create_consumer(config)
                .await
                .map_err(|e| anyhow!(e))
                .with_context(|| format!("creating or updating consumer {name}"))?;
            consumer
                .messages()
                .await
                .map_err(|e| anyhow!(e))
                .context("starting consumer message stream")
        };
        let mut messages = tokio::time::timeout(delays::SETUP_TIMEOUT, setup)
            .await
            .context("consumer setup timed out")??;

        let outbound = self.outbound.clone();
        let task = tokio::spawn(async move {
            while let Some(next) = messages.next().await {
                match next {
                    Ok(msg) => {
                        let delivery = Delivery::Durable(JetStreamMessage::new(msg));
                        if outbound.send(delivery).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!(consumer = %name, error = %e, "consumer delivery error"),
                }
            }
            tracing::error!(consumer = %name, "consumer message stream ended");
        });
        self.forwarders().push(task.abort_handle());
        Ok(())
    }

    /// Bind the three durable consumers feeding the dispatcher:
    /// - `agent.update.<id>` on the shared stream;
    /// - the per-agent updater stream, created or updated here;
    /// - the messenger broadcasts on the shared stream, optional.
    async fn bind_consumers(&self, client: &Client) -> Result<()> {
        let js = jetstream::new(client.clone());
        let id = &self.agent_id;

        let lookup = tokio::time::timeout(delays::SETUP_TIMEOUT, js.get_stream(stream::NAME))
            .await
            .context("stream lookup timed out")?;
        let shared = lookup
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("looking up stream {}", stream::NAME))?;
        self.consume(
            &shared,
            self.consumer_config(consumer_name(id), agent_stream_subjects(id)),
        )
        .await?;

        let updater_name = updater_stream_name(id);
        let own = async {
            js.create_or_update_stream(jetstream::stream::Config {
                name: updater_name.clone(),
                subjects: updater_stream_subjects(id),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("creating or updating stream {updater_name}"))?;
            js.get_stream(&updater_name)
                .await
                .map_err(|e| anyhow!(e))
                .with_context(|| format!("looking up stream {updater_name}"))
        };
        let own = tokio::time::timeout(delays::SETUP_TIMEOUT, own)
            .await
            .context("stream setup timed out")??;
        tracing::info!(stream = %updater_name, "updater stream created or updated");
        self.consume(
            &own,
            self.consumer_config(consumer_name(id), updater_stream_subjects(id)),
        )
        .await?;

        let broadcasts = self.consumer_config(
            messenger_consumer_name(id),
            messenger_broadcast_subjects(),
        );
        if let Err(e) = self.consume(&shared, broadcasts).await {
            tracing::warn!(error = %format!("{e:#}"), "messenger broadcasts unavailable");
        }
        Ok(())
    }

    async fn join_restart_group(&self, client: &Client) -> Result<()> {
        let subject = restart_subject(&self.agent_id);
        let mut requests = client
            .queue_subscribe(subject.clone(), stream::RESTART_QUEUE_GROUP.to_string())
            .await
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("subscribing to {subject}"))?;

        let outbound = self.outbound.clone();
        let reply_client = client.clone();
        let task = tokio::spawn(async move {
            while let Some(msg) = requests.next().await {
                let request = NatsRestartRequest {
                    client: reply_client.clone(),
                    reply: msg.reply,
                };
                if outbound.send(Delivery::Restart(request)).await.is_err() {
                    return;
                }
            }
        });
        self.forwarders().push(task.abort_handle());
        Ok(())
    }

    /// Stop forwarding and drain the client.
    pub async fn close(&self) {
        for task in self.forwarders().drain(..) {
            task.abort();
        }
        let client = self.client_slot().take();
        if let Some(client) = client {
            if let Err(e) = client.drain().await {
                tracing::debug!(error = %e, "draining messaging client");
            }
        }
    }
}

impl Channel for NatsChannel {
    fn is_connected(&self) -> bool {
        self.client_slot().as_ref().is_some_and(|c| {
            c.connection_state() == async_nats::connection::State::Connected
        })
    }

    async fn connect(&self) -> Result<()> {
        let servers = self.servers.join(",");
        let client = self
            .connect_options()
            .connect(servers.as_str())
            .await
            .with_context(|| format!("connecting to {servers}"))?;
        *self.client_slot() = Some(client);
        Ok(())
    }

    async fn subscribe(&self) -> Result<()> {
        let client = self
            .client_slot()
            .clone()
            .ok_or_else(|| anyhow!("not connected"))?;
        for task in self.forwarders().drain(..) {
            task.abort();
        }
        self.bind_consumers(&client).await?;
        self.join_restart_group(&client).await
    }
}
