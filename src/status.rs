//! Workspace device status summarization.
//!
//! Groups per-service run states across a workspace's devices and flags
//! devices running low on main storage.

use crate::api::types::DeviceStatus;
use std::collections::{BTreeMap, HashSet};

/// Storage percentage above which a device is flagged.
pub const LOW_STORAGE_THRESHOLD: f64 = 95.0;

/// Run-state breakdown for one service across devices.
#[derive(Debug, Clone, Default)]
pub struct ServiceSummary {
    /// Devices where the service reports RUNNING
    pub running: Vec<String>,
    /// Non-running devices grouped by reported state
    pub not_running: BTreeMap<String, Vec<String>>,
}

impl ServiceSummary {
    pub fn device_count(&self) -> usize {
        self.running.len() + self.not_running.values().map(Vec::len).sum::<usize>()
    }
}

/// Summary of a workspace status listing.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// Per-service summaries, keyed by service name
    pub services: BTreeMap<String, ServiceSummary>,
    /// Devices above the storage threshold, with their usage percentage
    pub low_storage: Vec<(String, f64)>,
}

/// Summarize a status listing, optionally restricted to an allowlist of
/// device ids.
pub fn summarize(devices: &[DeviceStatus], allowlist: Option<&HashSet<String>>) -> StatusReport {
    let mut report = StatusReport::default();

    for device in devices {
        if let Some(allowed) = allowlist {
            if !allowed.contains(&device.device_id) {
                continue;
            }
        }
        for service in &device.services {
            let summary = report.services.entry(service.name.clone()).or_default();
            if service.status.status == "RUNNING" {
                summary.running.push(device.device_id.clone());
            } else {
                summary
                    .not_running
                    .entry(service.status.status.clone())
                    .or_default()
                    .push(device.device_id.clone());
            }
        }
        if device.main_memory_storage.percentage_use > LOW_STORAGE_THRESHOLD {
            report
                .low_storage
                .push((device.device_id.clone(), device.main_memory_storage.percentage_use));
        }
    }

    report
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Service Status:")?;
        for (name, summary) in &self.services {
            writeln!(f, "=> {name}")?;
            writeln!(f, "\t- Running on {} device(s)", summary.running.len())?;
            if !summary.not_running.is_empty() {
                let stopped = summary.device_count() - summary.running.len();
                writeln!(f, "\t- Not running on {stopped} device(s):")?;
                for (state, devices) in &summary.not_running {
                    writeln!(f, "\t\t- In {state} state on {}", devices.join(", "))?;
                }
            }
        }
        if !self.low_storage.is_empty() {
            writeln!(f)?;
            writeln!(f, "Low Storage Status:")?;
            for (device, percentage) in &self.low_storage {
                writeln!(f, "\t- {device} storage is {percentage}% full")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ServiceState, ServiceStatus, StorageStatus};

    fn device(id: &str, service: &str, state: &str, storage: f64) -> DeviceStatus {
        DeviceStatus {
            device_id: id.to_string(),
            services: vec![ServiceStatus {
                name: service.to_string(),
                status: ServiceState {
                    status: state.to_string(),
                },
            }],
            main_memory_storage: StorageStatus {
                percentage_use: storage,
            },
        }
    }

    #[test]
    fn test_summarize_groups_by_service_and_state() {
        let devices = vec![
            device("BAI_0000001", "acquisition", "RUNNING", 40.0),
            device("BAI_0000002", "acquisition", "STOPPED", 50.0),
            device("BAI_0000003", "acquisition", "STOPPED", 96.5),
        ];
        let report = summarize(&devices, None);

        let summary = &report.services["acquisition"];
        assert_eq!(summary.running, vec!["BAI_0000001"]);
        assert_eq!(
            summary.not_running["STOPPED"],
            vec!["BAI_0000002", "BAI_0000003"]
        );
        assert_eq!(report.low_storage, vec![("BAI_0000003".to_string(), 96.5)]);
    }

    #[test]
    fn test_summarize_respects_allowlist() {
        let devices = vec![
            device("BAI_0000001", "acquisition", "RUNNING", 40.0),
            device("BAI_0000002", "acquisition", "RUNNING", 99.0),
        ];
        let allow: HashSet<String> = ["BAI_0000001".to_string()].into();
        let report = summarize(&devices, Some(&allow));

        assert_eq!(report.services["acquisition"].device_count(), 1);
        assert!(report.low_storage.is_empty());
    }

    #[test]
    fn test_display_mentions_states() {
        let devices = vec![
            device("BAI_0000001", "acquisition", "RUNNING", 40.0),
            device("BAI_0000002", "acquisition", "CRASHED", 50.0),
        ];
        let rendered = summarize(&devices, None).to_string();
        assert!(rendered.contains("=> acquisition"));
        assert!(rendered.contains("Running on 1 device(s)"));
        assert!(rendered.contains("In CRASHED state on BAI_0000002"));
    }
}
