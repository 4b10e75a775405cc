//! Endpoint registry.
//!
//! # Responsibilities
//! - Hold one circuit per configured address
//! - Preserve configured priority order for scans
//! - Resolve an address back to its circuit
//!
//! # Design Decisions
//! - Built once per configuration, read-only afterwards (no locking on lookups)
//! - Duplicate addresses collapse to one entry at the first position, last one wins

use std::collections::HashMap;
use std::sync::Arc;

use crate::circuit::{Circuit, CircuitSnapshot, Clock, MonotonicClock};
use crate::config::{BreakerConfig, ClusterConfig};
use crate::observability::metrics;

/// Ordered address → circuit mapping.
#[derive(Debug)]
pub struct EndpointRegistry {
    circuits: Vec<Arc<Circuit>>,
    index: HashMap<String, usize>,
    settings: Arc<BreakerConfig>,
}

impl EndpointRegistry {
    /// Build a registry on the monotonic clock.
    pub fn build_from<I, S>(addresses: I, settings: BreakerConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_clock(addresses, settings, Arc::new(MonotonicClock::new()))
    }

    /// Build a registry whose circuits read time from `clock`.
    pub fn with_clock<I, S>(addresses: I, settings: BreakerConfig, clock: Arc<dyn Clock>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let settings = Arc::new(settings);
        let mut circuits: Vec<Arc<Circuit>> = Vec::new();
        let mut index = HashMap::new();

        for address in addresses {
            let address = address.into();
            let circuit = Arc::new(Circuit::new(address.clone(), settings.clone(), clock.clone()));
            match index.get(&address) {
                Some(&position) => {
                    tracing::debug!(address = %address, "Duplicate address collapsed");
                    circuits[position] = circuit;
                }
                None => {
                    index.insert(address, circuits.len());
                    circuits.push(circuit);
                }
            }
        }

        for circuit in &circuits {
            metrics::record_circuit_state(circuit.address(), circuit.state().kind());
        }

        tracing::info!(
            nodes = ?circuits.iter().map(|c| c.address()).collect::<Vec<_>>(),
            failure_threshold = settings.failure_threshold,
            reset_timeout_ms = settings.reset_timeout_ms,
            "Failover registry built"
        );

        Self {
            circuits,
            index,
            settings,
        }
    }

    /// Build from loaded configuration.
    pub fn from_config(cluster: &ClusterConfig, breaker: &BreakerConfig) -> Self {
        Self::build_from(cluster.addresses.iter().cloned(), *breaker)
    }

    pub fn lookup(&self, address: &str) -> Option<&Arc<Circuit>> {
        self.index.get(address).map(|&i| &self.circuits[i])
    }

    /// Circuits in configured priority order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Circuit>)> + '_ {
        self.circuits.iter().map(|c| (c.address(), c))
    }

    /// First circuit, in priority order, that reports availability.
    ///
    /// The scan stops at the first hit, so at most one open circuit is moved
    /// to half-open per call.
    pub fn first_available(&self) -> Option<&Arc<Circuit>> {
        self.circuits.iter().find(|c| {
            let available = c.is_available();
            tracing::trace!(circuit = %c, available, "Checking target");
            available
        })
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    pub fn settings(&self) -> &BreakerConfig {
        &self.settings
    }

    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        self.circuits.iter().map(|c| c.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{CircuitState, ManualClock};
    use std::time::Duration;

    #[test]
    fn test_preserves_configured_order() {
        let registry = EndpointRegistry::build_from(["http://c", "http://a", "http://b"], BreakerConfig::default());
        let order: Vec<_> = registry.iter().map(|(a, _)| a.to_string()).collect();
        assert_eq!(order, vec!["http://c", "http://a", "http://b"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicates_collapse() {
        let registry = EndpointRegistry::build_from(["http://a", "http://b", "http://a"], BreakerConfig::default());
        assert_eq!(registry.len(), 2);
        let order: Vec<_> = registry.iter().map(|(a, _)| a).collect();
        assert_eq!(order, vec!["http://a", "http://b"]);
        assert!(Arc::ptr_eq(
            registry.lookup("http://a").unwrap(),
            registry.iter().next().unwrap().1
        ));
    }

    #[test]
    fn test_lookup() {
        let registry = EndpointRegistry::build_from(vec!["http://a".to_string()], BreakerConfig::default());
        assert_eq!(registry.lookup("http://a").unwrap().address(), "http://a");
        assert!(registry.lookup("http://a/path").is_none());
        assert!(registry.lookup("http://zzz").is_none());
    }

    #[test]
    fn test_first_available_skips_open_circuits() {
        let clock = Arc::new(ManualClock::new(0));
        let registry = EndpointRegistry::with_clock(["A", "B"], BreakerConfig::new(0, 100), clock.clone());

        assert_eq!(registry.first_available().unwrap().address(), "A");
        registry.lookup("A").unwrap().on_error();
        assert_eq!(registry.first_available().unwrap().address(), "B");

        clock.advance(Duration::from_millis(101));
        assert_eq!(registry.first_available().unwrap().address(), "A");
        assert_eq!(registry.lookup("A").unwrap().state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_scan_probes_at_most_one_circuit() {
        let clock = Arc::new(ManualClock::new(0));
        let registry = EndpointRegistry::with_clock(["A", "B"], BreakerConfig::new(0, 10), clock.clone());
        registry.lookup("A").unwrap().on_error();
        registry.lookup("B").unwrap().on_error();
        clock.advance(Duration::from_millis(11));

        assert_eq!(registry.first_available().unwrap().address(), "A");
        assert_eq!(registry.lookup("A").unwrap().state(), CircuitState::HalfOpen);
        assert!(matches!(registry.lookup("B").unwrap().state(), CircuitState::Open { .. }));
    }

    #[test]
    fn test_empty_registry() {
        let registry = EndpointRegistry::build_from(Vec::<String>::new(), BreakerConfig::default());
        assert!(registry.is_empty());
        assert!(registry.first_available().is_none());
    }

    #[test]
    fn test_from_config() {
        let mut cluster = ClusterConfig::default();
        cluster.addresses = vec!["http://n1".into(), "http://n2".into()];
        let registry = EndpointRegistry::from_config(&cluster, &BreakerConfig::new(5, 10));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.settings().failure_threshold, 5);
        assert_eq!(registry.snapshot()[1].address, "http://n2");
    }

    mod gauges {
        use ::metrics::{Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
        use std::sync::{Arc, Mutex};

        type Sets = Arc<Mutex<Vec<(String, f64)>>>;

        /// Records every gauge `set` with its `address` label.
        #[derive(Default)]
        pub struct GaugeCapture {
            pub sets: Sets,
        }

        struct CapturedGauge {
            address: String,
            sets: Sets,
        }

        impl GaugeFn for CapturedGauge {
            fn increment(&self, _: f64) {}
            fn decrement(&self, _: f64) {}
            fn set(&self, value: f64) {
                self.sets.lock().unwrap().push((self.address.clone(), value));
            }
        }

        impl Recorder for GaugeCapture {
            fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

            fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
                Counter::noop()
            }

            fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
                let address = key
                    .labels()
                    .find(|l| l.key() == "address")
                    .map(|l| l.value().to_string())
                    .unwrap_or_default();
                Gauge::from_arc(Arc::new(CapturedGauge {
                    address,
                    sets: self.sets.clone(),
                }))
            }

            fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
                Histogram::noop()
            }
        }
    }

    #[test]
    fn test_state_gauge_published_on_build() {
        let capture = gauges::GaugeCapture::default();
        let registry = ::metrics::with_local_recorder(&capture, || {
            EndpointRegistry::build_from(["http://a", "http://b", "http://a"], BreakerConfig::default())
        });
        assert_eq!(registry.len(), 2);

        let sets = capture.sets.lock().unwrap().clone();
        assert_eq!(sets, vec![("http://a".to_string(), 0.0), ("http://b".to_string(), 0.0)]);
    }
}
