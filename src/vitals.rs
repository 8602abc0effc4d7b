//! Vitals payload decoding and report formatting.
//!
//! Devices upload a loosely structured JSON object in which every field is
//! optional. Decoding is best effort: anything that is not a JSON object
//! degrades to a raw-text report line instead of an error, and the caller
//! always acknowledges the upload the same way.

use std::net::IpAddr;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Decoded request body, in precedence order.
#[derive(Debug)]
pub enum Payload {
    /// Empty body, or none was read.
    Empty,
    /// Body bytes that are not valid UTF-8.
    Binary(Vec<u8>),
    /// UTF-8 text that is not a JSON object.
    Text(String),
    /// A JSON object with the recognized vitals fields split out.
    Vitals(VitalsPayload),
}

/// One optional slot per recognized upload key, plus a residual map.
///
/// Absent keys stay `None`; display defaults are applied at format time,
/// never here. Keys outside the recognized set land in `extra` and are
/// echoed under "Additional Fields".
#[derive(Debug, Deserialize)]
pub struct VitalsPayload {
    userid: Option<Value>,
    #[serde(rename = "deviceId")]
    device_id: Option<Value>,
    timestamp: Option<Value>,
    hr: Option<Value>,
    hr2: Option<Value>,
    bp: Option<Value>,
    bo: Option<Value>,
    temp: Option<Value>,
    ecg: Option<Value>,
    // Raw oximetry waveform blob: recognized so it stays out of the
    // additional-fields section, but too noisy to echo in the report.
    #[serde(rename = "boWave")]
    _bo_wave: Option<IgnoredAny>,
    #[serde(rename = "respWave")]
    resp_wave: Option<Value>,
    #[serde(rename = "boWaveSamples")]
    bo_wave_samples: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Decode a request body.
///
/// A top-level array or scalar is well-formed JSON but carries no vitals
/// semantics, so it is reported as raw text, same as malformed JSON.
pub fn decode(body: &[u8]) -> Payload {
    if body.is_empty() {
        return Payload::Empty;
    }
    let Ok(text) = std::str::from_utf8(body) else {
        return Payload::Binary(body.to_vec());
    };
    match serde_json::from_str::<VitalsPayload>(text) {
        Ok(vitals) => Payload::Vitals(vitals),
        Err(_) => Payload::Text(text.to_owned()),
    }
}

/// Render the report for a decoded payload.
///
/// `peer` stands in for the device id when the upload does not name one.
pub fn report_lines(payload: &Payload, peer: IpAddr) -> Vec<String> {
    match payload {
        Payload::Empty => vec!["No payload received".to_owned()],
        Payload::Binary(bytes) => {
            vec![format!("Raw payload (unable to decode as UTF-8): {bytes:?}")]
        }
        Payload::Text(text) => vec![format!("Raw payload: {text}")],
        Payload::Vitals(vitals) => vitals.report_lines(peer),
    }
}

impl VitalsPayload {
    fn report_lines(&self, peer: IpAddr) -> Vec<String> {
        let user = present(&self.userid)
            .map_or_else(|| "unknown".to_owned(), render_scalar);
        let device = present(&self.device_id)
            .map_or_else(|| peer.to_string(), render_scalar);
        let timestamp = present(&self.timestamp)
            .map_or_else(|| "unknown".to_owned(), render_scalar);

        let mut lines = Vec::with_capacity(10 + self.extra.len());
        lines.push(format!(
            "Vitals Report (user: {user}, device: {device}, timestamp: {timestamp})"
        ));
        lines.push(labeled("Heart Rate", &self.hr, Some("bpm")));
        lines.push(labeled("Heart Rate Secondary", &self.hr2, Some("bpm")));
        lines.push(labeled("Blood Pressure", &self.bp, Some("mmHg")));
        lines.push(labeled("Blood Oxygen Saturation", &self.bo, Some("%")));
        lines.push(labeled("Body Temperature", &self.temp, Some("degC")));
        lines.push(labeled("Electrocardiogram", &self.ecg, None));
        lines.push(self.waveform_summary());
        lines.push(labeled("Respiration Waveform", &self.resp_wave, None));

        if !self.extra.is_empty() {
            lines.push("Additional Fields:".to_owned());
            for (key, value) in &self.extra {
                lines.push(format!("  {key}: {}", render_scalar(value)));
            }
        }

        lines
    }

    fn waveform_summary(&self) -> String {
        match present(&self.bo_wave_samples) {
            Some(Value::Array(samples)) => {
                format!("Blood Oxygen Waveform Samples: {} points", samples.len())
            }
            _ => "Blood Oxygen Waveform Samples: N/A".to_owned(),
        }
    }
}

/// JSON null counts as absent, matching the uploader's own treatment.
fn present(field: &Option<Value>) -> Option<&Value> {
    field.as_ref().filter(|value| !value.is_null())
}

/// Strings render bare, everything else in its JSON text form.
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn labeled(label: &str, field: &Option<Value>, unit: Option<&str>) -> String {
    match (present(field), unit) {
        (Some(value), Some(unit)) => format!("{label}: {} {unit}", render_scalar(value)),
        (Some(value), None) => format!("{label}: {}", render_scalar(value)),
        (None, _) => format!("{label}: N/A"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn peer() -> IpAddr {
        "10.0.0.5".parse().unwrap()
    }

    fn lines_for(payload: &Value) -> Vec<String> {
        report_lines(&decode(payload.to_string().as_bytes()), peer())
    }

    #[test]
    fn empty_body_yields_fallback_line() {
        let lines = report_lines(&decode(b""), peer());
        assert_eq!(lines, vec!["No payload received".to_owned()]);
    }

    #[test]
    fn non_utf8_bytes_reported_as_undecodable() {
        let lines = report_lines(&decode(&[0xff, 0xfe, 0x01]), peer());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Raw payload (unable to decode as UTF-8):"));
    }

    #[test]
    fn plain_text_reported_raw() {
        let lines = report_lines(&decode(b"not json at all"), peer());
        assert_eq!(lines, vec!["Raw payload: not json at all".to_owned()]);
    }

    #[test]
    fn json_array_treated_as_raw_text() {
        let lines = report_lines(&decode(b"[1,2,3]"), peer());
        assert_eq!(lines, vec!["Raw payload: [1,2,3]".to_owned()]);
    }

    #[test]
    fn json_scalar_treated_as_raw_text() {
        let lines = report_lines(&decode(b"42"), peer());
        assert_eq!(lines, vec!["Raw payload: 42".to_owned()]);
    }

    #[test]
    fn minimal_report_uses_display_defaults() {
        let lines = lines_for(&json!({"userid": "u1", "hr": 72, "bo": 98}));
        assert_eq!(
            lines,
            vec![
                "Vitals Report (user: u1, device: 10.0.0.5, timestamp: unknown)",
                "Heart Rate: 72 bpm",
                "Heart Rate Secondary: N/A",
                "Blood Pressure: N/A",
                "Blood Oxygen Saturation: 98 %",
                "Body Temperature: N/A",
                "Electrocardiogram: N/A",
                "Blood Oxygen Waveform Samples: N/A",
                "Respiration Waveform: N/A",
            ]
        );
    }

    #[test]
    fn device_id_overrides_peer_and_extras_are_listed() {
        let lines = lines_for(&json!({"deviceId": "dev-7", "foo": "bar", "hr": 60}));
        assert!(lines[0].contains("device: dev-7"));
        assert!(lines.contains(&"Heart Rate: 60 bpm".to_owned()));
        let header = lines.iter().position(|l| l == "Additional Fields:").unwrap();
        assert_eq!(lines[header + 1], "  foo: bar");
        assert_eq!(lines.len(), header + 2);
    }

    #[test]
    fn waveform_samples_are_counted() {
        let lines = lines_for(&json!({"boWaveSamples": [1, 2, 3, 4, 5]}));
        assert!(lines.contains(&"Blood Oxygen Waveform Samples: 5 points".to_owned()));
    }

    #[test]
    fn non_array_waveform_samples_render_na() {
        let lines = lines_for(&json!({"boWaveSamples": "not-a-list"}));
        assert!(lines.contains(&"Blood Oxygen Waveform Samples: N/A".to_owned()));
    }

    #[test]
    fn null_field_renders_na() {
        let lines = lines_for(&json!({"hr": null, "userid": null}));
        assert!(lines.contains(&"Heart Rate: N/A".to_owned()));
        assert!(lines[0].contains("user: unknown"));
    }

    #[test]
    fn string_values_render_bare_with_unit() {
        let lines = lines_for(&json!({"bp": "120/80"}));
        assert!(lines.contains(&"Blood Pressure: 120/80 mmHg".to_owned()));
    }

    #[test]
    fn ecg_and_respiration_have_no_unit() {
        let lines = lines_for(&json!({"ecg": "sinus", "respWave": 17}));
        assert!(lines.contains(&"Electrocardiogram: sinus".to_owned()));
        assert!(lines.contains(&"Respiration Waveform: 17".to_owned()));
    }

    #[test]
    fn reserved_keys_never_appear_as_additional_fields() {
        let lines = lines_for(&json!({
            "userid": "u1", "deviceId": "d1", "timestamp": 1_700_000_000,
            "hr": 70, "hr2": 71, "bp": "120/80", "bo": 97, "temp": 36.6,
            "ecg": "sinus", "boWave": [0, 1, 0], "respWave": 12,
            "boWaveSamples": [1, 2], "battery": 88
        }));
        let header = lines.iter().position(|l| l == "Additional Fields:").unwrap();
        assert_eq!(lines[header + 1..].to_vec(), vec!["  battery: 88".to_owned()]);
    }

    #[test]
    fn bo_wave_is_consumed_but_never_reported() {
        let lines = lines_for(&json!({"boWave": [9, 9, 9]}));
        assert!(!lines.iter().any(|l| l.contains("boWave")));
        assert!(!lines.contains(&"Additional Fields:".to_owned()));
    }

    #[test]
    fn structured_extras_render_in_json_form() {
        let lines = lines_for(&json!({"meta": {"fw": "1.2"}}));
        let header = lines.iter().position(|l| l == "Additional Fields:").unwrap();
        assert_eq!(lines[header + 1], r#"  meta: {"fw":"1.2"}"#);
    }
}
