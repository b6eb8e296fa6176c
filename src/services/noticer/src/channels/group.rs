//! Group robot channels
//!
//! Both providers post into a chat group through one of several registered
//! robots, failing over between them with the shared cooldown gate.

use super::{ChannelInfo, NoticeChannel};
use crate::config::GroupRobotConfig;
use crate::cooldown::CooldownGate;
use crate::dispatch::{DispatchReport, Dispatcher, ProviderProfile};
use crate::error::Result;
use crate::message::{DingGroupMessage, YachGroupMessage};
use crate::metrics::DispatchMetrics;
use crate::store::CounterStore;
use crate::transport::{EndpointTransport, RobotHttpTransport};
use noticer_shared::{Context, Endpoint};
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

fn dispatcher<T: EndpointTransport>(
    profile: ProviderProfile,
    config: &GroupRobotConfig,
    store: Arc<dyn CounterStore>,
    transport: T,
    metrics: Option<Arc<DispatchMetrics>>,
) -> Dispatcher<T> {
    info!(
        channel = %profile.channel,
        limit = config.cooldown.window_limit,
        window_seconds = config.cooldown.window_seconds,
        "Initializing group robot channel"
    );
    let gate = CooldownGate::new(store, config.cooldown.clone(), profile.channel);
    let dispatcher = Dispatcher::new(profile, gate, transport);
    match metrics {
        Some(metrics) => dispatcher.with_metrics(metrics),
        None => dispatcher,
    }
}

fn group_info<T: EndpointTransport>(dispatcher: &Dispatcher<T>, enabled: bool, description: &str) -> ChannelInfo {
    ChannelInfo {
        kind: dispatcher.profile().channel,
        description: description.to_string(),
        enabled,
        supports_failover: true,
        window_limit: Some(dispatcher.gate().config().window_limit),
    }
}

/// DingTalk group robot channel
pub struct DingGroupChannel<T = RobotHttpTransport> {
    dispatcher: Dispatcher<T>,
    enabled: bool,
}

impl DingGroupChannel<RobotHttpTransport> {
    /// Channel posting to the configured push URI over HTTP
    pub fn from_config(
        config: &GroupRobotConfig,
        client: Client,
        store: Arc<dyn CounterStore>,
        metrics: Option<Arc<DispatchMetrics>>,
    ) -> Self {
        let transport = RobotHttpTransport::new(client, config.uri_push.clone());
        Self::new(config, store, transport, metrics)
    }
}

impl<T: EndpointTransport> DingGroupChannel<T> {
    pub fn new(
        config: &GroupRobotConfig,
        store: Arc<dyn CounterStore>,
        transport: T,
        metrics: Option<Arc<DispatchMetrics>>,
    ) -> Self {
        Self {
            dispatcher: dispatcher(ProviderProfile::ding_group(), config, store, transport, metrics),
            enabled: config.enabled,
        }
    }

    /// Deliver through the first available robot
    ///
    /// `options` is merged into the message body, e.g. `{"at": {"isAtAll": true}}`.
    pub async fn send(
        &self,
        message: &DingGroupMessage,
        robots: &[Endpoint],
        options: Option<&Context>,
    ) -> Result<DispatchReport> {
        self.dispatcher.send(message, robots, options).await
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }
}

impl<T: EndpointTransport> NoticeChannel for DingGroupChannel<T> {
    fn channel_info(&self) -> ChannelInfo {
        group_info(&self.dispatcher, self.enabled, "DingTalk group robots with failover")
    }
}

/// Yach group robot channel
pub struct YachGroupChannel<T = RobotHttpTransport> {
    dispatcher: Dispatcher<T>,
    enabled: bool,
}

impl YachGroupChannel<RobotHttpTransport> {
    pub fn from_config(
        config: &GroupRobotConfig,
        client: Client,
        store: Arc<dyn CounterStore>,
        metrics: Option<Arc<DispatchMetrics>>,
    ) -> Self {
        let transport = RobotHttpTransport::new(client, config.uri_push.clone());
        Self::new(config, store, transport, metrics)
    }
}

impl<T: EndpointTransport> YachGroupChannel<T> {
    pub fn new(
        config: &GroupRobotConfig,
        store: Arc<dyn CounterStore>,
        transport: T,
        metrics: Option<Arc<DispatchMetrics>>,
    ) -> Self {
        Self {
            dispatcher: dispatcher(ProviderProfile::yach_group(), config, store, transport, metrics),
            enabled: config.enabled,
        }
    }

    pub async fn send(&self, message: &YachGroupMessage, robots: &[Endpoint]) -> Result<DispatchReport> {
        self.dispatcher.send(message, robots, None).await
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }
}

impl<T: EndpointTransport> NoticeChannel for YachGroupChannel<T> {
    fn channel_info(&self) -> ChannelInfo {
        group_info(&self.dispatcher, self.enabled, "Yach group robots with failover")
    }
}
