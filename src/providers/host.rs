//! Host resource monitoring: the one provider that reads real OS counters
//! instead of generating values.
//!
//! Counter categories are collected independently; a category that cannot be
//! read is omitted from the batch rather than failing the provider.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use sysinfo::{
    CpuRefreshKind, Disks, MemoryRefreshKind, Networks, Pid, ProcessRefreshKind, RefreshKind,
    System,
};

use super::{uniform, Provider};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::metrics::{clamp_score, MetricBatch, ProviderKind};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

pub struct HostProvider {
    sys: System,
    /// Unavailable when the current pid cannot be resolved; process metrics
    /// are then omitted.
    pid: Option<Pid>,
    rng: StdRng,
    /// Scales the simulated application error rate
    error_rate_variance: f64,
}

impl HostProvider {
    pub fn new(config: &SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &SimulationConfig, rng: StdRng) -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything())
                .with_processes(ProcessRefreshKind::everything()),
        );
        Self {
            sys,
            pid: sysinfo::get_current_pid().ok(),
            rng,
            error_rate_variance: config.error_rate_variance,
        }
    }

    fn cpu_metrics(&self) -> MetricBatch {
        let mut m = MetricBatch::new();
        m.insert(
            "cpu_usage_percent",
            self.sys.global_cpu_info().cpu_usage() as f64,
        );

        let cpus = self.sys.cpus();
        if !cpus.is_empty() {
            let usages: Vec<f64> = cpus.iter().map(|c| c.cpu_usage() as f64).collect();
            m.insert("cpu_core_count", usages.len() as f64);
            m.insert(
                "cpu_max_core_usage",
                usages.iter().cloned().fold(f64::MIN, f64::max),
            );
            m.insert(
                "cpu_min_core_usage",
                usages.iter().cloned().fold(f64::MAX, f64::min),
            );
            m.insert(
                "cpu_avg_core_usage",
                usages.iter().sum::<f64>() / usages.len() as f64,
            );
            m.insert("cpu_frequency_mhz", cpus[0].frequency() as f64);
        }

        let load = System::load_average();
        m.insert("load_avg_1min", load.one);
        m.insert("load_avg_5min", load.five);
        m.insert("load_avg_15min", load.fifteen);

        m
    }

    fn memory_metrics(&self) -> MetricBatch {
        let mut m = MetricBatch::new();
        let total = self.sys.total_memory() as f64;
        let used = self.sys.used_memory() as f64;
        m.insert("memory_total_gb", total / GIB);
        m.insert("memory_used_gb", used / GIB);
        m.insert("memory_available_gb", self.sys.available_memory() as f64 / GIB);
        m.insert("memory_free_gb", self.sys.free_memory() as f64 / GIB);
        if total > 0.0 {
            m.insert("memory_usage_percent", used / total * 100.0);
        }

        let swap_total = self.sys.total_swap() as f64;
        let swap_used = self.sys.used_swap() as f64;
        m.insert("swap_total_gb", swap_total / GIB);
        m.insert("swap_used_gb", swap_used / GIB);
        m.insert("swap_free_gb", self.sys.free_swap() as f64 / GIB);
        if swap_total > 0.0 {
            m.insert("swap_usage_percent", swap_used / swap_total * 100.0);
        }

        if let Some(process) = self.pid.and_then(|pid| self.sys.process(pid)) {
            m.insert("process_memory_rss_mb", process.memory() as f64 / MIB);
            m.insert(
                "process_memory_vms_mb",
                process.virtual_memory() as f64 / MIB,
            );
            if total > 0.0 {
                m.insert(
                    "process_memory_percent",
                    process.memory() as f64 / total * 100.0,
                );
            }
        }

        m
    }

    fn disk_metrics(&self) -> MetricBatch {
        let mut m = MetricBatch::new();
        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| disks.list().first());

        if let Some(disk) = root {
            let total = disk.total_space() as f64;
            let free = disk.available_space() as f64;
            let used = total - free;
            m.insert("disk_total_gb", total / GIB);
            m.insert("disk_used_gb", used / GIB);
            m.insert("disk_free_gb", free / GIB);
            if total > 0.0 {
                m.insert("disk_usage_percent", used / total * 100.0);
            }
        }

        // I/O counters are per-process; the OS does not expose a system-wide
        // view through sysinfo.
        if let Some(process) = self.pid.and_then(|pid| self.sys.process(pid)) {
            let io = process.disk_usage();
            m.insert("disk_read_bytes", io.read_bytes as f64);
            m.insert("disk_write_bytes", io.written_bytes as f64);
            m.insert("disk_total_read_bytes", io.total_read_bytes as f64);
            m.insert("disk_total_write_bytes", io.total_written_bytes as f64);
        }

        m
    }

    fn network_metrics(&self) -> MetricBatch {
        let mut m = MetricBatch::new();
        let networks = Networks::new_with_refreshed_list();

        let mut bytes_recv = 0u64;
        let mut bytes_sent = 0u64;
        let mut packets_recv = 0u64;
        let mut packets_sent = 0u64;
        let mut errors_in = 0u64;
        let mut errors_out = 0u64;
        for (_name, data) in &networks {
            bytes_recv += data.total_received();
            bytes_sent += data.total_transmitted();
            packets_recv += data.total_packets_received();
            packets_sent += data.total_packets_transmitted();
            errors_in += data.total_errors_on_received();
            errors_out += data.total_errors_on_transmitted();
        }

        m.insert("network_bytes_sent", bytes_sent as f64);
        m.insert("network_bytes_recv", bytes_recv as f64);
        m.insert("network_packets_sent", packets_sent as f64);
        m.insert("network_packets_recv", packets_recv as f64);
        m.insert("network_errors_in", errors_in as f64);
        m.insert("network_errors_out", errors_out as f64);

        m
    }

    fn process_metrics(&self) -> MetricBatch {
        let mut m = MetricBatch::new();
        if let Some(process) = self.pid.and_then(|pid| self.sys.process(pid)) {
            m.insert("process_cpu_percent", process.cpu_usage() as f64);
            m.insert("process_uptime_seconds", process.run_time() as f64);
            m.insert("process_status", 1.0);
        }
        m
    }

    fn system_metrics(&self) -> MetricBatch {
        let mut m = MetricBatch::new();
        let uptime = System::uptime() as f64;
        m.insert("system_uptime_seconds", uptime);
        m.insert("system_uptime_hours", uptime / 3600.0);
        m.insert("system_process_count", self.sys.processes().len() as f64);
        m
    }

    /// Application-level figures are synthetic, like the other providers.
    fn application_metrics(&mut self) -> MetricBatch {
        let mut m = MetricBatch::new();
        m.insert("app_response_time_ms", self.rng.gen_range(50.0..500.0));
        m.insert("app_requests_per_second", self.rng.gen_range(10.0..100.0));
        m.insert(
            "app_error_rate_percent",
            uniform(&mut self.rng, 0.0, 100.0 * self.error_rate_variance),
        );
        m.insert("app_cache_hit_rate", self.rng.gen_range(70.0..95.0));
        m.insert("app_cache_size_mb", self.rng.gen_range(50.0..200.0));
        m.insert("app_queue_depth", self.rng.gen_range(0..=50) as f64);
        m.insert("app_queue_processing_rate", self.rng.gen_range(5.0..20.0));
        m
    }
}

impl Provider for HostProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Host
    }

    fn produce(&mut self) -> Result<MetricBatch> {
        self.sys.refresh_cpu();
        self.sys.refresh_memory();
        self.sys.refresh_processes();

        let mut batch = MetricBatch::new();
        batch.merge(self.cpu_metrics());
        batch.merge(self.memory_metrics());
        batch.merge(self.disk_metrics());
        batch.merge(self.network_metrics());
        batch.merge(self.process_metrics());
        batch.merge(self.system_metrics());
        batch.merge(self.application_metrics());

        // Mean headroom across cpu/memory/disk, clamped.
        let cpu_score = 100.0 - batch.get("cpu_usage_percent").unwrap_or(0.0);
        let memory_score = 100.0 - batch.get("memory_usage_percent").unwrap_or(0.0);
        let disk_score = 100.0 - batch.get("disk_usage_percent").unwrap_or(0.0);
        batch.insert(
            "system_health_score",
            clamp_score(
                (clamp_score(cpu_score) + clamp_score(memory_score) + clamp_score(disk_score))
                    / 3.0,
            ),
        );

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_is_finite_and_scored() {
        let mut p =
            HostProvider::with_rng(&SimulationConfig::default(), StdRng::seed_from_u64(1));
        let batch = p.produce().unwrap();

        assert!(!batch.is_empty());
        for (name, value) in batch.iter() {
            assert!(value.is_finite(), "{name} produced non-finite value");
        }
        let score = batch.get("system_health_score").unwrap();
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_disk_io_counters_follow_process_availability() {
        let mut p =
            HostProvider::with_rng(&SimulationConfig::default(), StdRng::seed_from_u64(3));
        let batch = p.produce().unwrap();

        // Both categories hinge on resolving the current process.
        if batch.get("process_status").is_some() {
            for key in [
                "disk_read_bytes",
                "disk_write_bytes",
                "disk_total_read_bytes",
                "disk_total_write_bytes",
            ] {
                assert!(batch.get(key).is_some(), "missing metric {key}");
            }
        }
    }

    #[test]
    fn test_application_metrics_always_present() {
        // The synthetic category never depends on OS counter availability.
        let mut p =
            HostProvider::with_rng(&SimulationConfig::default(), StdRng::seed_from_u64(2));
        let batch = p.produce().unwrap();
        for key in [
            "app_response_time_ms",
            "app_requests_per_second",
            "app_error_rate_percent",
            "app_queue_depth",
        ] {
            assert!(batch.get(key).is_some(), "missing metric {key}");
        }
        let error_rate = batch.get("app_error_rate_percent").unwrap();
        assert!((0.0..=5.0).contains(&error_rate));
    }
}
