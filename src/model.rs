use serde::Deserialize;
use std::collections::BTreeMap;

pub const PIDS_NONE: &str = "none";

/// A scalar as it travels from a device document into a point. Numbers are
/// always floats, whether the device printed `1` or `1.0`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Float(f64),
    String(String),
}

impl FieldValue {
    /// Device flags are `0`/`1` integers; only an exact `1` (or `true`) counts as set.
    pub fn as_flag(&self) -> bool {
        match self {
            FieldValue::Boolean(v) => *v,
            FieldValue::Float(v) => *v == 1.0,
            FieldValue::String(_) => false,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// `state.json`: one parallel array per adapter property, indexed by slot.
/// `ad_type` is required; a body without it is not a minisatip state document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub ad_enabled: Vec<FieldValue>,
    #[serde(default)]
    pub ad_disabled: Vec<FieldValue>,
    pub ad_type: Vec<i64>,
    #[serde(default)]
    pub ad_pos: Vec<FieldValue>,
    #[serde(default)]
    pub ad_strength: Vec<FieldValue>,
    #[serde(default)]
    pub ad_snr: Vec<FieldValue>,
    #[serde(default)]
    pub ad_ber: Vec<FieldValue>,
    #[serde(default)]
    pub ad_pol: Vec<FieldValue>,
    #[serde(default)]
    pub ad_sr: Vec<FieldValue>,
    #[serde(default)]
    pub ad_bw: Vec<FieldValue>,
    #[serde(default)]
    pub ad_stream: Vec<FieldValue>,
    #[serde(default)]
    pub ad_fe: Vec<FieldValue>,
    #[serde(default)]
    pub ad_master: Vec<FieldValue>,
    #[serde(default)]
    pub ad_sidcount: Vec<FieldValue>,
    #[serde(default)]
    pub ad_phyad: Vec<FieldValue>,
    #[serde(default)]
    pub ad_sys: Vec<FieldValue>,
    #[serde(default)]
    pub ad_mtype: Vec<FieldValue>,
    #[serde(default)]
    pub ad_allsys: Vec<FieldValue>,
    #[serde(default)]
    pub ad_pids: Vec<String>,
    #[serde(default)]
    pub ad_ccerr: Vec<FieldValue>,
    #[serde(default)]
    pub ad_decerr: Vec<FieldValue>,
}

impl DeviceState {
    /// Scalar columns copied verbatim into every adapter record. `ad_type` and
    /// `ad_pids` are typed separately because the extractor reasons about them.
    pub fn columns(&self) -> [(&'static str, &[FieldValue]); 19] {
        [
            ("ad_enabled", self.ad_enabled.as_slice()),
            ("ad_disabled", self.ad_disabled.as_slice()),
            ("ad_pos", self.ad_pos.as_slice()),
            ("ad_strength", self.ad_strength.as_slice()),
            ("ad_snr", self.ad_snr.as_slice()),
            ("ad_ber", self.ad_ber.as_slice()),
            ("ad_pol", self.ad_pol.as_slice()),
            ("ad_sr", self.ad_sr.as_slice()),
            ("ad_bw", self.ad_bw.as_slice()),
            ("ad_stream", self.ad_stream.as_slice()),
            ("ad_fe", self.ad_fe.as_slice()),
            ("ad_master", self.ad_master.as_slice()),
            ("ad_sidcount", self.ad_sidcount.as_slice()),
            ("ad_phyad", self.ad_phyad.as_slice()),
            ("ad_sys", self.ad_sys.as_slice()),
            ("ad_mtype", self.ad_mtype.as_slice()),
            ("ad_allsys", self.ad_allsys.as_slice()),
            ("ad_ccerr", self.ad_ccerr.as_slice()),
            ("ad_decerr", self.ad_decerr.as_slice()),
        ]
    }
}

/// `bandwidth.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bandwidth {
    /// KB/s
    pub bw: f64,
    /// MiB
    pub tbw: f64,
    pub reads: f64,
    pub writes: f64,
    pub ns_read: f64,
    pub tt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterType {
    Dvb,
    SatIp,
    Netceiver,
    Ci,
}

impl AdapterType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(AdapterType::Dvb),
            2 => Some(AdapterType::SatIp),
            3 => Some(AdapterType::Netceiver),
            4 => Some(AdapterType::Ci),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AdapterType::Dvb => "DVB",
            AdapterType::SatIp => "SAT>IP",
            AdapterType::Netceiver => "Netceiver",
            AdapterType::Ci => "CI",
        }
    }
}

/// One adapter slot pivoted out of [`DeviceState`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterRecord {
    pub index: usize,
    pub type_code: i64,
    pub disabled: bool,
    pub pids: Option<String>,
    pub values: Vec<(&'static str, FieldValue)>,
}

impl AdapterRecord {
    pub fn active(&self) -> bool {
        matches!(self.pids.as_deref(), Some(pids) if !pids.is_empty() && pids != PIDS_NONE)
    }

    pub fn pid_count(&self) -> usize {
        match self.pids.as_deref() {
            Some(pids) if self.active() => pids.split(',').count(),
            _ => 0,
        }
    }

    pub fn adapter_type(&self) -> Option<AdapterType> {
        AdapterType::from_code(self.type_code)
    }

    /// `"SAT>IP 1"` for known types, just the slot index otherwise.
    pub fn name(&self) -> String {
        match self.adapter_type() {
            Some(kind) => format!("{} {}", kind.label(), self.index),
            None => self.index.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl MetricPoint {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[cfg(test)]
    pub fn field_value(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}
