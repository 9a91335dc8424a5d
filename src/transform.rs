use crate::config::ReportMode;
use crate::model::{AdapterRecord, Bandwidth, DeviceState, FieldValue, MetricPoint};
use tracing::debug;

pub const STATE_MEASUREMENT: &str = "state";
pub const BANDWIDTH_MEASUREMENT: &str = "bandwidth";

/// Points produced for one host, plus how many disabled adapters were dropped.
#[derive(Debug, Clone, Default)]
pub struct HostPoints {
    pub points: Vec<MetricPoint>,
    pub disabled_skipped: usize,
}

/// Last slot of the leading run of non-zero adapter types.
///
/// The scan halts at the first zero, so `[1, 0, 2]` reports only slot 0 even
/// though slot 2 is configured. Slot 0 is reported whenever the device has any
/// slots at all.
pub fn pivot_end(types: &[i64]) -> Option<usize> {
    if types.is_empty() {
        return None;
    }
    Some(types.iter().take_while(|code| **code != 0).count().saturating_sub(1))
}

pub fn extract_adapters(state: &DeviceState) -> Vec<AdapterRecord> {
    let Some(end) = pivot_end(&state.ad_type) else {
        return Vec::new();
    };
    let columns = state.columns();

    (0..=end)
        .map(|index| {
            let mut values = Vec::with_capacity(columns.len());
            for (name, column) in &columns {
                match column.get(index) {
                    Some(value) => values.push((*name, value.clone())),
                    None => debug!(column = *name, index, "state column shorter than ad_type"),
                }
            }
            AdapterRecord {
                index,
                type_code: state.ad_type[index],
                disabled: state
                    .ad_disabled
                    .get(index)
                    .map(FieldValue::as_flag)
                    .unwrap_or(false),
                pids: state.ad_pids.get(index).cloned(),
                values,
            }
        })
        .collect()
}

pub fn adapter_point(host: &str, adapter: &AdapterRecord) -> MetricPoint {
    let mut point = MetricPoint::new(STATE_MEASUREMENT)
        .tag("host", host)
        .tag("adapter", adapter.name())
        .field("ad_idx", adapter.index as f64)
        .field("ad_type", adapter.type_code as f64)
        .field("ad_pidcount", adapter.pid_count() as f64)
        .field("ad_active", adapter.active());
    if let Some(pids) = &adapter.pids {
        point = point.field("ad_pids", pids.as_str());
    }
    for (name, value) in &adapter.values {
        point = point.field(*name, value.clone());
    }
    point
}

/// One `state` point per enabled adapter in the pivot prefix.
pub fn state_points(host: &str, state: &DeviceState) -> HostPoints {
    let mut out = HostPoints::default();
    for adapter in extract_adapters(state) {
        if adapter.disabled {
            out.disabled_skipped += 1;
            continue;
        }
        out.points.push(adapter_point(host, &adapter));
    }
    out
}

pub fn bandwidth_point(host: &str, bandwidth: &Bandwidth) -> MetricPoint {
    MetricPoint::new(BANDWIDTH_MEASUREMENT)
        .tag("host", host)
        .field("bandwidthBps", bandwidth.bw * 1000.0 * 8.0)
        .field("totalTrafficBytes", bandwidth.tbw * 1024.0 * 1024.0)
        .field("reads", bandwidth.reads)
        .field("writes", bandwidth.writes)
        .field("nsPerRead", bandwidth.ns_read)
        .field("tt", bandwidth.tt)
}

/// Adapter points first, then the bandwidth point. `state` is ignored in
/// bandwidth-only mode.
pub fn host_points(
    host: &str,
    mode: ReportMode,
    state: Option<&DeviceState>,
    bandwidth: &Bandwidth,
) -> HostPoints {
    let mut out = match (mode, state) {
        (ReportMode::Full, Some(state)) => state_points(host, state),
        _ => HostPoints::default(),
    };
    out.points.push(bandwidth_point(host, bandwidth));
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn state_with_types(types: &[i64]) -> DeviceState {
        let n = types.len();
        DeviceState {
            ad_enabled: vec![FieldValue::Float(1.0); n],
            ad_disabled: vec![FieldValue::Float(0.0); n],
            ad_type: types.to_vec(),
            ad_strength: (0..n).map(|i| FieldValue::Float(200.0 + i as f64)).collect(),
            ad_snr: vec![FieldValue::Float(12.0); n],
            ad_sys: vec![FieldValue::String("dvbs2".to_string()); n],
            ad_pids: vec!["none".to_string(); n],
            ad_ccerr: vec![FieldValue::Float(0.0); n],
            ..DeviceState::default()
        }
    }

    pub(crate) fn sample_bandwidth() -> Bandwidth {
        Bandwidth {
            bw: 10.0,
            tbw: 2.0,
            reads: 5.0,
            writes: 1.0,
            ns_read: 100.0,
            tt: 50.0,
        }
    }

    #[test]
    fn pivot_stops_at_first_zero() {
        let state = state_with_types(&[2, 2, 0, 0]);
        let adapters = extract_adapters(&state);
        let indices: Vec<usize> = adapters.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn pivot_hides_adapters_after_a_gap() {
        assert_eq!(pivot_end(&[1, 0, 2]), Some(0));
        assert_eq!(pivot_end(&[3, 3, 3]), Some(2));
        assert_eq!(pivot_end(&[0, 1]), Some(0));
        assert_eq!(pivot_end(&[]), None);
        assert!(extract_adapters(&DeviceState::default()).is_empty());
    }

    #[test]
    fn disabled_adapters_are_skipped() {
        let mut state = state_with_types(&[1, 1, 1]);
        state.ad_disabled[1] = FieldValue::Float(1.0);
        state.ad_pids[1] = "0,16".to_string();

        let out = state_points("rx1", &state);
        assert_eq!(out.disabled_skipped, 1);
        let adapters: Vec<&str> = out
            .points
            .iter()
            .map(|p| p.tags["adapter"].as_str())
            .collect();
        assert_eq!(adapters, vec!["DVB 0", "DVB 2"]);
    }

    #[test]
    fn adapter_point_carries_raw_and_derived_fields() {
        let mut state = state_with_types(&[2, 2, 0]);
        state.ad_pids[1] = "100,101,102".to_string();

        let out = state_points("rx1", &state);
        assert_eq!(out.points.len(), 2);
        let point = &out.points[1];
        assert_eq!(point.measurement, "state");
        assert_eq!(point.tags["host"], "rx1");
        assert_eq!(point.tags["adapter"], "SAT>IP 1");
        assert_eq!(point.field_value("ad_idx"), Some(&FieldValue::Float(1.0)));
        assert_eq!(point.field_value("ad_type"), Some(&FieldValue::Float(2.0)));
        assert_eq!(point.field_value("ad_strength"), Some(&FieldValue::Float(201.0)));
        assert_eq!(point.field_value("ad_pidcount"), Some(&FieldValue::Float(3.0)));
        assert_eq!(point.field_value("ad_active"), Some(&FieldValue::Boolean(true)));
        assert_eq!(
            point.field_value("ad_pids"),
            Some(&FieldValue::String("100,101,102".to_string()))
        );

        let idle = &out.points[0];
        assert_eq!(idle.field_value("ad_pidcount"), Some(&FieldValue::Float(0.0)));
        assert_eq!(idle.field_value("ad_active"), Some(&FieldValue::Boolean(false)));
    }

    #[test]
    fn short_columns_drop_fields_not_points() {
        let mut state = state_with_types(&[1, 1]);
        state.ad_snr.truncate(1);
        state.ad_disabled.clear();

        let out = state_points("rx1", &state);
        assert_eq!(out.points.len(), 2);
        assert!(out.points[0].field_value("ad_snr").is_some());
        assert!(out.points[1].field_value("ad_snr").is_none());
        assert!(out.points[1].field_value("ad_disabled").is_none());
    }

    #[test]
    fn unknown_type_code_keeps_the_point() {
        let state = state_with_types(&[7]);
        let out = state_points("rx1", &state);
        assert_eq!(out.points.len(), 1);
        assert_eq!(out.points[0].tags["adapter"], "0");
    }

    #[test]
    fn bandwidth_units_are_converted() {
        let point = bandwidth_point("rx1", &sample_bandwidth());
        assert_eq!(point.measurement, "bandwidth");
        assert_eq!(point.tags.len(), 1);
        assert_eq!(point.tags["host"], "rx1");
        assert_eq!(point.field_value("bandwidthBps"), Some(&FieldValue::Float(80000.0)));
        assert_eq!(
            point.field_value("totalTrafficBytes"),
            Some(&FieldValue::Float(2097152.0))
        );
        assert_eq!(point.field_value("reads"), Some(&FieldValue::Float(5.0)));
        assert_eq!(point.field_value("writes"), Some(&FieldValue::Float(1.0)));
        assert_eq!(point.field_value("nsPerRead"), Some(&FieldValue::Float(100.0)));
        assert_eq!(point.field_value("tt"), Some(&FieldValue::Float(50.0)));
    }

    #[test]
    fn bandwidth_point_is_emitted_for_zeroes() {
        let point = bandwidth_point("rx1", &Bandwidth::default());
        assert_eq!(point.field_value("bandwidthBps"), Some(&FieldValue::Float(0.0)));
    }

    #[test]
    fn bandwidth_mode_drops_adapter_points() {
        let state = state_with_types(&[1, 1]);
        let full = host_points("rx1", ReportMode::Full, Some(&state), &sample_bandwidth());
        let minimal = host_points("rx1", ReportMode::Bandwidth, Some(&state), &sample_bandwidth());

        let kinds: Vec<&str> = full.points.iter().map(|p| p.measurement.as_str()).collect();
        assert_eq!(kinds, vec!["state", "state", "bandwidth"]);
        assert_eq!(minimal.points.len(), 1);
        assert_eq!(minimal.points[0].measurement, "bandwidth");
    }
}
