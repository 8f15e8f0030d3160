//! Device probes: per-node side-car exporters for GPU, NPU and network.
//!
//! A node's telemetry is its primary cluster metrics endpoint plus up to
//! three fixed-port probes. All of them are scraped concurrently. Only a
//! failure of the primary endpoint is an error; a failed probe degrades
//! its values to 0.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use wadas_core::{DeviceCandidate, MetricNames, NodeInfo, NodeLoad, ProbeEndpoint, ProbeSettings};

use crate::client::{MetricsClient, ScrapeResult};
use crate::exposition::MetricSnapshot;

/// One of the well-known side-car exporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProbe {
    /// `npu_utilization`, queried only on nodes advertising an NPU.
    Npu,
    /// `gpu_utilization`, queried only on nodes advertising a GPU.
    Gpu,
    /// Network tx/rx bytes per second, queried when the policy needs it.
    Network,
}

impl DeviceProbe {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceProbe::Npu => "npu",
            DeviceProbe::Gpu => "gpu",
            DeviceProbe::Network => "network",
        }
    }

    /// Whether this probe should be scraped for `node`.
    pub fn applies_to(&self, node: &NodeInfo, needs_network: bool) -> bool {
        match self {
            DeviceProbe::Npu => node.has_device(DeviceCandidate::Npu),
            DeviceProbe::Gpu => node.has_device(DeviceCandidate::Gpu),
            DeviceProbe::Network => needs_network,
        }
    }

    pub fn endpoint<'a>(&self, probes: &'a ProbeSettings) -> &'a ProbeEndpoint {
        match self {
            DeviceProbe::Npu => &probes.npu,
            DeviceProbe::Gpu => &probes.gpu,
            DeviceProbe::Network => &probes.network,
        }
    }

    pub fn targets(&self, names: &MetricNames) -> HashSet<String> {
        match self {
            DeviceProbe::Npu => HashSet::from([names.npu_utilization.clone()]),
            DeviceProbe::Gpu => HashSet::from([names.gpu_utilization.clone()]),
            DeviceProbe::Network => names.network_targets(),
        }
    }
}

/// Collects and normalizes the telemetry of a single node.
#[derive(Debug, Clone)]
pub struct NodeProber {
    client: MetricsClient,
    names: MetricNames,
    probes: ProbeSettings,
    timeout: Duration,
}

impl NodeProber {
    pub fn new(
        client: MetricsClient,
        names: MetricNames,
        probes: ProbeSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            names,
            probes,
            timeout,
        }
    }

    /// Scrape the node's primary endpoint and applicable probes.
    ///
    /// Returns an error only if the primary metrics endpoint is unreachable.
    pub async fn collect(&self, node: &NodeInfo, needs_network: bool) -> ScrapeResult<NodeLoad> {
        let cluster_url = node.metrics_url();
        let cluster_targets = self.names.cluster_targets();

        let (cluster, npu, gpu, network) = tokio::join!(
            self.client.try_scrape(&cluster_url, &cluster_targets, self.timeout),
            self.probe(DeviceProbe::Npu, node, needs_network),
            self.probe(DeviceProbe::Gpu, node, needs_network),
            self.probe(DeviceProbe::Network, node, needs_network),
        );
        let cluster = cluster?;

        let load = self.normalize(&cluster, &npu, &gpu, &network);
        debug!(node_id = %node.id, ?load, "collected node telemetry");
        Ok(load)
    }

    async fn probe(&self, probe: DeviceProbe, node: &NodeInfo, needs_network: bool) -> MetricSnapshot {
        if !probe.applies_to(node, needs_network) {
            return MetricSnapshot::new();
        }

        let url = probe.endpoint(&self.probes).url(&node.ip);
        match self
            .client
            .try_scrape(&url, &probe.targets(&self.names), self.timeout)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    node_id = %node.id,
                    probe = probe.name(),
                    %url,
                    error = %e,
                    "device probe unavailable, defaulting to 0"
                );
                MetricSnapshot::new()
            }
        }
    }

    fn normalize(
        &self,
        cluster: &MetricSnapshot,
        npu: &MetricSnapshot,
        gpu: &MetricSnapshot,
        network: &MetricSnapshot,
    ) -> NodeLoad {
        let n = &self.names;
        NodeLoad {
            cpu_utilization: percent(cluster.get_or(&n.cpu_utilization, 0.0)),
            gpu_utilization: percent(gpu.get_or(&n.gpu_utilization, 0.0)),
            npu_utilization: percent(npu.get_or(&n.npu_utilization, 0.0)),
            mem_used: cluster.get_or(&n.mem_used, 0.0),
            mem_total: cluster.get_or(&n.mem_total, 0.0),
            disk_read_speed: cluster.get_or(&n.disk_read_speed, 0.0),
            disk_write_speed: cluster.get_or(&n.disk_write_speed, 0.0),
            tx_bytes_per_second: network.get_or(&n.network_tx, 0.0),
            rx_bytes_per_second: network.get_or(&n.network_rx, 0.0),
        }
    }
}

/// Exporters publish utilization as 0..100; policies work on fractions.
fn percent(value: f64) -> f64 {
    value / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::client::{FetchFuture, MetricsTransport, ScrapeError};

    #[derive(Default)]
    struct RecordingTransport {
        bodies: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl MetricsTransport for RecordingTransport {
        fn fetch<'a>(&'a self, url: &'a str, _timeout: Duration) -> FetchFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(url.to_string());
            let result = self.bodies.get(url).cloned().ok_or(ScrapeError::Status(404));
            Box::pin(async move { result })
        }
    }

    fn node(resources: &[(&str, f64)]) -> NodeInfo {
        NodeInfo {
            id: "node-a".to_string(),
            ip: "10.0.0.7".to_string(),
            metrics_port: 8080,
            resources: resources
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn prober(transport: Arc<RecordingTransport>) -> NodeProber {
        NodeProber::new(
            MetricsClient::with_transport(transport).unwrap(),
            MetricNames::default(),
            ProbeSettings::default(),
            Duration::from_secs(1),
        )
    }

    const CLUSTER: &str = "ray_node_cpu_utilization{ip=\"10.0.0.7\"} 25\n\
                           ray_node_mem_total{ip=\"10.0.0.7\"} 8\n\
                           ray_node_mem_used{ip=\"10.0.0.7\"} 2\n\
                           ray_node_disk_io_read_speed{ip=\"10.0.0.7\"} 100\n\
                           ray_node_disk_io_write_speed{ip=\"10.0.0.7\"} 50\n";

    #[tokio::test]
    async fn cpu_only_node_skips_device_probes() {
        let mut t = RecordingTransport::default();
        t.bodies.insert("http://10.0.0.7:8080/metrics".to_string(), CLUSTER.to_string());
        let t = Arc::new(t);

        let load = prober(t.clone()).collect(&node(&[("CPU", 8.0)]), false).await.unwrap();

        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
        assert_eq!(load.cpu_utilization, 0.25);
        assert_eq!(load.mem_total, 8.0);
        assert_eq!(load.mem_used, 2.0);
        assert_eq!(load.disk_read_speed, 100.0);
        assert_eq!(load.disk_write_speed, 50.0);
        assert_eq!(load.gpu_utilization, 0.0);
    }

    #[tokio::test]
    async fn probes_advertised_devices_and_network() {
        let mut t = RecordingTransport::default();
        t.bodies.insert("http://10.0.0.7:8080/metrics".to_string(), CLUSTER.to_string());
        t.bodies.insert(
            "http://10.0.0.7:8002/".to_string(),
            "gpu_utilization{empty=\"\"} 40\n".to_string(),
        );
        t.bodies.insert(
            "http://10.0.0.7:8000/".to_string(),
            "npu_utilization{empty=\"\"} 10\n".to_string(),
        );
        t.bodies.insert(
            "http://10.0.0.7:8004/".to_string(),
            "network_tx_bytes_per_second{iface=\"eth0\"} 1000\n\
             network_rx_bytes_per_second{iface=\"eth0\"} 3000\n"
                .to_string(),
        );
        let t = Arc::new(t);

        let load = prober(t.clone())
            .collect(&node(&[("CPU", 8.0), ("GPU", 1.0), ("NPU", 1.0)]), true)
            .await
            .unwrap();

        assert_eq!(t.calls.load(Ordering::SeqCst), 4);
        assert_eq!(load.gpu_utilization, 0.40);
        assert_eq!(load.npu_utilization, 0.10);
        assert_eq!(load.tx_bytes_per_second, 1000.0);
        assert_eq!(load.rx_bytes_per_second, 3000.0);
    }

    #[tokio::test]
    async fn failed_probe_degrades_to_zero() {
        let mut t = RecordingTransport::default();
        t.bodies.insert("http://10.0.0.7:8080/metrics".to_string(), CLUSTER.to_string());
        let t = Arc::new(t);

        let load = prober(t.clone())
            .collect(&node(&[("CPU", 8.0), ("GPU", 1.0)]), true)
            .await
            .unwrap();

        let requested = t.requested.lock().unwrap().clone();
        assert!(requested.contains(&"http://10.0.0.7:8002/".to_string()));
        assert!(requested.contains(&"http://10.0.0.7:8004/".to_string()));
        assert_eq!(load.gpu_utilization, 0.0);
        assert_eq!(load.tx_bytes_per_second, 0.0);
        assert_eq!(load.cpu_utilization, 0.25);
    }

    #[tokio::test]
    async fn unreachable_primary_is_an_error() {
        let t = Arc::new(RecordingTransport::default());
        let result = prober(t).collect(&node(&[("CPU", 8.0)]), false).await;
        assert!(result.is_err());
    }

    #[test]
    fn probe_applicability() {
        let n = node(&[("CPU", 4.0), ("NPU", 1.0)]);
        assert!(DeviceProbe::Npu.applies_to(&n, false));
        assert!(!DeviceProbe::Gpu.applies_to(&n, true));
        assert!(!DeviceProbe::Network.applies_to(&n, false));
        assert!(DeviceProbe::Network.applies_to(&n, true));
    }
}
