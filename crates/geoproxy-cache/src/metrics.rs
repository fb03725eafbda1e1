//! Cache metrics recording.

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Registra las metricas de cache.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_cache_metrics() {
    metrics::describe_counter!("geoproxy_cache_hits_total", "Total number of cache hits");
    metrics::describe_counter!("geoproxy_cache_misses_total", "Total number of cache misses");
    metrics::describe_counter!("geoproxy_cache_sets_total", "Total number of cache writes");
    metrics::describe_counter!(
        "geoproxy_cache_invalidations_total",
        "Total number of explicit invalidations and clears"
    );
    metrics::describe_counter!(
        "geoproxy_cache_evictions_total",
        "Total number of entries evicted from the in-process store"
    );
    metrics::describe_gauge!(
        "geoproxy_cache_entries",
        "Current number of entries in the in-process store"
    );
    metrics::describe_histogram!(
        "geoproxy_cache_operation_seconds",
        "Time spent on cache operations"
    );
}

/// Snapshot de solo lectura de los contadores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
}

impl MetricsSnapshot {
    /// Calcula hit rate (para logging/debugging)
    pub fn hit_rate(&self) -> f64 {
        let total = (self.hits + self.misses) as f64;
        if total == 0.0 {
            0.0
        } else {
            self.hits as f64 / total
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    entries: AtomicU64,
}

/// Recorder de metricas de cache.
/// Usa atomic counters internos y replica cada incremento en la fachada
/// `metrics`, etiquetado con el namespace del cache.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    namespace: Arc<str>,
    counters: Arc<Counters>,
}

impl CacheMetrics {
    pub fn new(namespace: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Registra un cache hit
    pub fn record_hit(&self) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        counter!("geoproxy_cache_hits_total", "namespace" => self.label()).increment(1);
    }

    /// Registra un cache miss
    pub fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        counter!("geoproxy_cache_misses_total", "namespace" => self.label()).increment(1);
    }

    /// Registra una escritura
    pub fn record_set(&self) {
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        counter!("geoproxy_cache_sets_total", "namespace" => self.label()).increment(1);
    }

    /// Registra una invalidacion (por key o clear completo)
    pub fn record_invalidation(&self) {
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        counter!("geoproxy_cache_invalidations_total", "namespace" => self.label()).increment(1);
    }

    /// Registra una eviction
    pub fn record_eviction(&self, reason: &'static str) {
        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        counter!(
            "geoproxy_cache_evictions_total",
            "namespace" => self.label(),
            "reason" => reason
        )
        .increment(1);
    }

    /// Actualiza el gauge de entries
    pub fn update_entry_count(&self, count: usize) {
        self.counters.entries.store(count as u64, Ordering::Relaxed);
        gauge!("geoproxy_cache_entries", "namespace" => self.label()).set(count as f64);
    }

    /// Registra la duracion de una operacion
    pub fn record_operation_duration(&self, operation: &'static str, duration: Duration) {
        histogram!(
            "geoproxy_cache_operation_seconds",
            "namespace" => self.label(),
            "operation" => operation
        )
        .record(duration.as_secs_f64());
    }

    /// Retorna un snapshot de los contadores, sin efectos secundarios.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Retorna el numero de evictions del store local
    pub fn evictions(&self) -> u64 {
        self.counters.evictions.load(Ordering::Relaxed)
    }

    /// Retorna el ultimo valor publicado en el gauge de entries
    pub fn entry_count(&self) -> u64 {
        self.counters.entries.load(Ordering::Relaxed)
    }

    /// Retorna el namespace al que pertenecen estas metricas
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn label(&self) -> String {
        self.namespace.to_string()
    }
}
