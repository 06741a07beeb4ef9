use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    pub total_requests: u64,
    pub requested_ids: u64,
    pub cache_hits: u64,
    pub latencies: VecDeque<u64>, // microseconds
}

#[derive(Debug, Clone, Default)]
pub struct TransportMetrics {
    pub network_fetches: u64,
    pub searches: u64,
    pub failures: u64,
    pub merged_entities: u64,
}

#[derive(Clone)]
pub struct StoreMetrics {
    state: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    requests: RequestMetrics,
    transport: TransportMetrics,
    max_history: usize,
}

impl StoreMetrics {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                requests: RequestMetrics::default(),
                transport: TransportMetrics::default(),
                max_history,
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MetricsState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn record_request(&self, latency_us: u64, requested: usize, served_from_cache: usize) {
        self.with_state(|state| {
            state.requests.total_requests += 1;
            state.requests.requested_ids += requested as u64;
            state.requests.cache_hits += served_from_cache as u64;
            state.requests.latencies.push_back(latency_us);
            if state.requests.latencies.len() > state.max_history {
                state.requests.latencies.pop_front();
            }
        });
    }

    pub fn record_fetch(&self, merged: usize) {
        self.with_state(|state| {
            state.transport.network_fetches += 1;
            state.transport.merged_entities += merged as u64;
        });
    }

    pub fn record_search(&self, merged: usize) {
        self.with_state(|state| {
            state.transport.searches += 1;
            state.transport.merged_entities += merged as u64;
        });
    }

    pub fn record_failure(&self) {
        self.with_state(|state| state.transport.failures += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.with_state(|state| {
            let q = &state.requests;
            let t = &state.transport;

            let mut sorted_latencies: Vec<u64> = q.latencies.iter().copied().collect();
            sorted_latencies.sort_unstable();

            let hit_rate = if q.requested_ids > 0 {
                q.cache_hits as f32 / q.requested_ids as f32
            } else {
                0.0
            };

            MetricsSnapshot {
                total_requests: q.total_requests,
                requested_ids: q.requested_ids,
                cache_hits: q.cache_hits,
                hit_rate,
                network_fetches: t.network_fetches,
                searches: t.searches,
                transport_failures: t.failures,
                merged_entities: t.merged_entities,
                p50: percentile(&sorted_latencies, 50.0),
                p95: percentile(&sorted_latencies, 95.0),
                p99: percentile(&sorted_latencies, 99.0),
                history_count: q.latencies.len(),
            }
        })
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub requested_ids: u64,
    pub cache_hits: u64,
    pub hit_rate: f32,
    pub network_fetches: u64,
    pub searches: u64,
    pub transport_failures: u64,
    pub merged_entities: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub history_count: usize,
}
