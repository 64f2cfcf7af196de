use super::classification::{ErrorMapper, ResponseClassifier};
use super::core::NetworkClient;
use super::dispatch::{Pipeline, TransportTerminal};
use crate::decoding::{Decoder, JsonDecoder};
use crate::dedup::{InFlightRegistry, RequestKeyGenerator};
use crate::interceptors::{Interceptor, InterceptorChain};
use crate::logging::{NetworkLogger, TracingLogger};
use crate::transport::{HttpTransport, HttpTransportConfig, Transport};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Builder for [`NetworkClient`].
///
/// Anything not set falls back to a default: the reqwest transport configured
/// from `NETWORK_CLIENT_*` environment variables, [`JsonDecoder`],
/// [`TracingLogger`] and the status-only error mapper.
pub struct NetworkClientBuilder<D = JsonDecoder> {
    chain: InterceptorChain,
    decoder: D,
    logger: Option<Arc<dyn NetworkLogger>>,
    transport: Option<Arc<dyn Transport>>,
    transport_config: Option<HttpTransportConfig>,
    error_mapper: Option<Arc<dyn ErrorMapper>>,
    keys: RequestKeyGenerator,
    maintenance_interval: Option<Duration>,
}

impl NetworkClientBuilder<JsonDecoder> {
    pub fn new() -> Self {
        Self {
            chain: InterceptorChain::new(),
            decoder: JsonDecoder::default(),
            logger: None,
            transport: None,
            transport_config: None,
            error_mapper: None,
            keys: RequestKeyGenerator::new(),
            maintenance_interval: None,
        }
    }
}

impl Default for NetworkClientBuilder<JsonDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Decoder> NetworkClientBuilder<D> {
    /// Append an interceptor. Registration order is application order.
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.chain = self.chain.with(interceptor);
        self
    }

    pub fn interceptor_arc(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.chain.push_arc(interceptor);
        self
    }

    /// Swap the decoder, changing the client's decoder type.
    pub fn decoder<D2: Decoder>(self, decoder: D2) -> NetworkClientBuilder<D2> {
        NetworkClientBuilder {
            chain: self.chain,
            decoder,
            logger: self.logger,
            transport: self.transport,
            transport_config: self.transport_config,
            error_mapper: self.error_mapper,
            keys: self.keys,
            maintenance_interval: self.maintenance_interval,
        }
    }

    pub fn logger(mut self, logger: Arc<dyn NetworkLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Use a custom transport. Takes precedence over [`transport_config`](Self::transport_config).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn transport_config(mut self, config: HttpTransportConfig) -> Self {
        self.transport_config = Some(config);
        self
    }

    pub fn error_mapper(mut self, mapper: Arc<dyn ErrorMapper>) -> Self {
        self.error_mapper = Some(mapper);
        self
    }

    pub fn key_generator(mut self, keys: RequestKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    /// Period of the background scan that sweeps stale in-flight entries.
    ///
    /// Defaults to `NETWORK_CLIENT_MAINTENANCE_INTERVAL_MS`; unset or zero
    /// disables the scan (fetches still prune before every lookup).
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<NetworkClient<D>> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::with_config(
                self.transport_config
                    .unwrap_or_else(HttpTransportConfig::from_env),
            )?),
        };
        let logger: Arc<dyn NetworkLogger> = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingLogger::default()));
        let classifier = match self.error_mapper {
            Some(mapper) => ResponseClassifier::new(mapper),
            None => ResponseClassifier::default(),
        };

        let registry = InFlightRegistry::new();
        let interval = self.maintenance_interval.or_else(|| {
            std::env::var("NETWORK_CLIENT_MAINTENANCE_INTERVAL_MS")
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        });
        let maintenance = match interval.filter(|d| !d.is_zero()) {
            Some(interval) => match tokio::runtime::Handle::try_current() {
                Ok(_) => Some(registry.spawn_maintenance(interval)),
                Err(_) => {
                    warn!("no tokio runtime at build time, in-flight maintenance scan disabled");
                    None
                }
            },
            None => None,
        };

        Ok(NetworkClient {
            pipeline: Arc::new(Pipeline {
                chain: self.chain,
                terminal: TransportTerminal {
                    transport,
                    classifier,
                    logger: logger.clone(),
                },
            }),
            registry,
            keys: self.keys,
            decoder: self.decoder,
            logger,
            maintenance,
        })
    }
}
