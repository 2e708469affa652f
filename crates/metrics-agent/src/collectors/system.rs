//! Host memory and per-CPU utilization, independent of the runtime
//! collector. A failure in one sub-metric (e.g. CPU enumeration returning
//! nothing) is logged and the rest still publish.

use metrics_core::Metric;
use sysinfo::System;

pub fn collect() -> Vec<Metric> {
    let mut system = System::new_all();
    system.refresh_all();

    let mut metrics = Vec::with_capacity(2 + num_cpus::get());

    metrics.push(Metric::gauge("TotalMemory", system.total_memory() as f64));
    metrics.push(Metric::gauge("FreeMemory", system.free_memory() as f64));

    let cpus = system.cpus();
    if cpus.is_empty() {
        tracing::warn!("sysinfo reported zero CPUs, skipping per-CPU utilization");
    } else {
        for (i, cpu) in cpus.iter().enumerate() {
            metrics.push(Metric::gauge(
                format!("CPUutilization{}", i + 1),
                cpu.cpu_usage() as f64,
            ));
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_includes_total_and_free_memory() {
        let metrics = collect();
        assert!(metrics.iter().any(|m| m.id == "TotalMemory"));
        assert!(metrics.iter().any(|m| m.id == "FreeMemory"));
    }

    #[test]
    fn collect_includes_per_cpu_utilization() {
        let metrics = collect();
        assert!(metrics.iter().any(|m| m.id.starts_with("CPUutilization")));
    }
}
