//! Attribute payloads for session slots and diagnostic sensors

use serde_json::{json, Value};
use tautulli_api::{redact_secret, Session};
use tautulli_core::{attrs, Attributes};

use crate::format::{format_hms, format_mbps, kbps_to_mbps};
use crate::snapshot::{ActivitySnapshot, Diagnostics};

pub const SLOT_ICON: &str = "mdi:plex";

/// Stand-in for text fields Tautulli left empty
pub const PLACEHOLDER: &str = "unknown";

fn text(value: &str) -> Value {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        json!(PLACEHOLDER)
    } else {
        json!(trimmed)
    }
}

/// Percent in 0..=100; NaN and infinities read as 0
fn progress(percent: f64) -> f64 {
    if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Display name of slot `index` (1-based)
pub fn slot_name(title: &str, index: usize) -> String {
    format!("Plex Session {} ({})", index, title)
}

/// Attributes of a slot with no session
pub fn idle_attributes(name: &str) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(attrs::FRIENDLY_NAME.to_string(), json!(name));
    attributes.insert(attrs::ICON.to_string(), json!(SLOT_ICON));
    attributes
}

/// Attributes of a slot showing `session`
pub fn session_attributes(name: &str, session: &Session, advanced: bool) -> Attributes {
    let mut a = idle_attributes(name);
    let mut put = |key: &str, value: Value| {
        a.insert(key.to_string(), value);
    };

    let bandwidth = session.bandwidth.unwrap_or(0);
    let view_offset = session.view_offset.unwrap_or(0);
    let stream_duration = session.stream_duration.unwrap_or(0);

    put("user", text(&session.user));
    put("username", text(&session.username));
    put("user_friendly_name", text(&session.friendly_name));
    put("session_id", text(&session.session_id));
    put("session_key", text(&session.session_key));
    put("full_title", text(&session.full_title));
    put("title", text(&session.title));
    put("grandparent_title", text(&session.grandparent_title));
    put("media_type", text(&session.media_type));
    put("progress_percent", json!(progress(session.progress_percent)));
    put("bandwidth", json!(bandwidth));
    put("bandwidth_mbps", json!(format_mbps(bandwidth)));
    put("player", text(&session.player));
    put("product", text(&session.product));
    put("device", text(&session.device));
    put("platform", text(&session.platform));
    put("location", text(&session.location));
    put("ip_address", text(&session.ip_address));
    put("transcode_decision", text(&session.transcode_decision));
    put("video_resolution", text(&session.video_resolution));
    put("stream_video_resolution", text(&session.stream_video_resolution));
    put("thumb", json!(session.thumb));
    put("grandparent_thumb", json!(session.grandparent_thumb));
    put("image_url", json!(session.image_url));
    put("view_offset", json!(view_offset));
    if advanced {
        put("stream_duration", json!(format_hms(stream_duration)));
        put(
            "stream_remaining",
            json!(format_hms(stream_duration.saturating_sub(view_offset))),
        );
    } else {
        put("stream_duration", json!(stream_duration));
    }
    put("start_time_raw", json!(session.start_time_raw));

    for (key, value) in &session.extra {
        if !a.contains_key(key) {
            a.insert(key.clone(), value.clone());
        }
    }

    a
}

/// One `sessions` entry on the stream count sensor
pub fn session_summary(session: &Session) -> Value {
    let passthrough = |key: &str| session.extra.get(key).cloned().unwrap_or(Value::Null);
    json!({
        "username": session.username.trim().to_lowercase(),
        "user": session.user.trim().to_lowercase(),
        "full_title": text(&session.full_title),
        "state": session.state.as_str(),
        "stream_start_time": passthrough("start_time"),
        "start_time_raw": session.start_time_raw,
        "Stream_paused_duration_sec": passthrough("Stream_paused_duration_sec"),
        "session_id": text(&session.session_id),
    })
}

/// The server-wide diagnostic sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSensor {
    StreamCount,
    DirectPlay,
    DirectStream,
    Transcode,
    TotalBandwidth,
    LanBandwidth,
    WanBandwidth,
}

impl DiagnosticSensor {
    pub const ALL: [DiagnosticSensor; 7] = [
        DiagnosticSensor::StreamCount,
        DiagnosticSensor::DirectPlay,
        DiagnosticSensor::DirectStream,
        DiagnosticSensor::Transcode,
        DiagnosticSensor::TotalBandwidth,
        DiagnosticSensor::LanBandwidth,
        DiagnosticSensor::WanBandwidth,
    ];

    /// Object id before collision suffixes
    pub fn object_id(&self) -> &'static str {
        match self {
            DiagnosticSensor::StreamCount => "tautulli_stream_count",
            DiagnosticSensor::DirectPlay => "tautulli_stream_count_direct_play",
            DiagnosticSensor::DirectStream => "tautulli_stream_count_direct_stream",
            DiagnosticSensor::Transcode => "tautulli_stream_count_transcode",
            DiagnosticSensor::TotalBandwidth => "tautulli_total_bandwidth",
            DiagnosticSensor::LanBandwidth => "tautulli_lan_bandwidth",
            DiagnosticSensor::WanBandwidth => "tautulli_wan_bandwidth",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DiagnosticSensor::StreamCount => "Stream Count",
            DiagnosticSensor::DirectPlay => "Direct Play",
            DiagnosticSensor::DirectStream => "Direct Stream",
            DiagnosticSensor::Transcode => "Transcode",
            DiagnosticSensor::TotalBandwidth => "Total Bandwidth",
            DiagnosticSensor::LanBandwidth => "LAN Bandwidth",
            DiagnosticSensor::WanBandwidth => "WAN Bandwidth",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            DiagnosticSensor::StreamCount => "mdi:plex",
            DiagnosticSensor::DirectPlay => "mdi:play-circle",
            DiagnosticSensor::DirectStream => "mdi:play-network",
            DiagnosticSensor::Transcode => "mdi:cog",
            DiagnosticSensor::TotalBandwidth => "mdi:access-point-network",
            DiagnosticSensor::LanBandwidth => "mdi:lan",
            DiagnosticSensor::WanBandwidth => "mdi:wan",
        }
    }

    fn is_bandwidth(&self) -> bool {
        matches!(
            self,
            DiagnosticSensor::TotalBandwidth
                | DiagnosticSensor::LanBandwidth
                | DiagnosticSensor::WanBandwidth
        )
    }

    pub fn name(&self, title: &str) -> String {
        format!("{} {}", title, self.label())
    }

    /// State value for the given counters
    pub fn state(&self, diagnostics: &Diagnostics) -> String {
        match self {
            DiagnosticSensor::StreamCount => diagnostics.stream_count.to_string(),
            DiagnosticSensor::DirectPlay => diagnostics.stream_count_direct_play.to_string(),
            DiagnosticSensor::DirectStream => diagnostics.stream_count_direct_stream.to_string(),
            DiagnosticSensor::Transcode => diagnostics.stream_count_transcode.to_string(),
            DiagnosticSensor::TotalBandwidth => kbps_to_mbps(diagnostics.total_bandwidth).to_string(),
            DiagnosticSensor::LanBandwidth => kbps_to_mbps(diagnostics.lan_bandwidth).to_string(),
            DiagnosticSensor::WanBandwidth => kbps_to_mbps(diagnostics.wan_bandwidth).to_string(),
        }
    }

    pub fn attributes(&self, title: &str, snapshot: &ActivitySnapshot) -> Attributes {
        let mut a = Attributes::new();
        a.insert(attrs::FRIENDLY_NAME.to_string(), json!(self.name(title)));
        a.insert(attrs::ICON.to_string(), json!(self.icon()));
        a.insert(attrs::STATE_CLASS.to_string(), json!("measurement"));
        a.insert(attrs::ENTITY_CATEGORY.to_string(), json!("diagnostic"));
        if self.is_bandwidth() {
            a.insert(attrs::UNIT_OF_MEASUREMENT.to_string(), json!("Mbps"));
        }
        if *self == DiagnosticSensor::StreamCount {
            a.insert("poll_status".to_string(), json!(snapshot.status.as_str()));
            let sessions: Vec<Value> = snapshot.sessions.iter().map(session_summary).collect();
            a.insert("sessions".to_string(), Value::Array(sessions));
        }
        a
    }
}

/// Replace `secret`, raw or URL-encoded, in every string inside `attributes`
pub fn redact_attributes(attributes: &mut Attributes, secret: &str) {
    if secret.is_empty() {
        return;
    }
    for value in attributes.values_mut() {
        redact_value(value, secret);
    }
}

fn redact_value(value: &mut Value, secret: &str) {
    match value {
        Value::String(s) => *s = redact_secret(s, secret),
        Value::Array(items) => items.iter_mut().for_each(|v| redact_value(v, secret)),
        Value::Object(map) => map.values_mut().for_each(|v| redact_value(v, secret)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tautulli_api::PlaybackState;

    fn playing() -> Session {
        let mut session = Session {
            session_id: "abc".into(),
            user: "Alice".into(),
            friendly_name: "Ally".into(),
            full_title: "Movie A".into(),
            state: PlaybackState::Playing,
            progress_percent: 145.0,
            bandwidth: Some(10123),
            view_offset: Some(1_800_000),
            stream_duration: Some(5_400_000),
            image_url: Some("/api/tautulli/image?entry_id=e&img=x".into()),
            ..Default::default()
        };
        session.extra.insert("library_name".into(), json!("Movies"));
        session
    }

    #[test]
    fn test_basic_attributes() {
        let a = session_attributes("Plex Session 1 (Tautulli)", &playing(), false);

        assert_eq!(a["friendly_name"], json!("Plex Session 1 (Tautulli)"));
        assert_eq!(a["icon"], json!("mdi:plex"));
        assert_eq!(a["user"], json!("Alice"));
        assert_eq!(a["user_friendly_name"], json!("Ally"));
        assert_eq!(a["username"], json!("unknown"));
        assert_eq!(a["progress_percent"], json!(100.0));
        assert_eq!(a["bandwidth"], json!(10123));
        assert_eq!(a["bandwidth_mbps"], json!("10.1 Mbps"));
        assert_eq!(a["stream_duration"], json!(5_400_000));
        assert_eq!(a["thumb"], Value::Null);
        assert_eq!(a["start_time_raw"], Value::Null);
        assert_eq!(a["library_name"], json!("Movies"));
        assert!(!a.contains_key("stream_remaining"));
    }

    #[test]
    fn test_advanced_attributes() {
        let a = session_attributes("n", &playing(), true);
        assert_eq!(a["stream_duration"], json!("1:30:00"));
        assert_eq!(a["stream_remaining"], json!("1:00:00"));
    }

    #[test]
    fn test_missing_numbers_default_to_zero() {
        let a = session_attributes("n", &Session::default(), false);
        assert_eq!(a["bandwidth"], json!(0));
        assert_eq!(a["progress_percent"], json!(0.0));
        assert_eq!(a["view_offset"], json!(0));
        assert_eq!(a["image_url"], Value::Null);
        assert_eq!(a["session_id"], json!("unknown"));
    }

    #[test]
    fn test_idle_attributes() {
        let a = idle_attributes("Plex Session 4 (Tautulli)");
        assert_eq!(a.len(), 2);
        assert_eq!(a["icon"], json!("mdi:plex"));
    }

    #[test]
    fn test_session_summary_lowercases_user_and_username() {
        let mut session = playing();
        session.user = "Alice Smith".into();
        session.username = "ASmith".into();
        session.start_time_raw = Some(1_700_000_000);
        session.extra.insert("start_time".into(), json!("8:15 PM"));
        session.extra.insert("Stream_paused_duration_sec".into(), json!(42));

        let summary = session_summary(&session);
        assert_eq!(summary["username"], json!("asmith"));
        assert_eq!(summary["user"], json!("alice smith"));
        assert_eq!(summary["state"], json!("playing"));
        assert_eq!(summary["stream_start_time"], json!("8:15 PM"));
        assert_eq!(summary["start_time_raw"], json!(1_700_000_000u64));
        assert_eq!(summary["Stream_paused_duration_sec"], json!(42));

        let bare = session_summary(&Session::default());
        assert_eq!(bare["username"], json!(""));
        assert_eq!(bare["stream_start_time"], Value::Null);
        assert_eq!(bare["Stream_paused_duration_sec"], Value::Null);
    }

    #[test]
    fn test_non_finite_progress_reads_as_zero() {
        for percent in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let session = Session {
                progress_percent: percent,
                ..Default::default()
            };
            let a = session_attributes("n", &session, false);
            assert_eq!(a["progress_percent"], json!(0.0));
        }
        let a = session_attributes("n", &playing(), false);
        assert_eq!(a["progress_percent"], json!(100.0));
    }

    #[test]
    fn test_bandwidth_sensor() {
        let diagnostics = Diagnostics {
            total_bandwidth: 20123,
            ..Default::default()
        };
        assert_eq!(DiagnosticSensor::TotalBandwidth.state(&diagnostics), "20.1");
        assert_eq!(DiagnosticSensor::LanBandwidth.state(&diagnostics), "0");

        let a = DiagnosticSensor::TotalBandwidth.attributes("Tautulli", &ActivitySnapshot::pending());
        assert_eq!(a["unit_of_measurement"], json!("Mbps"));
        assert_eq!(a["friendly_name"], json!("Tautulli Total Bandwidth"));
    }

    #[test]
    fn test_redact_nested_values() {
        let mut a = Attributes::new();
        a.insert("url".into(), json!("http://t/?apikey=SECRET"));
        a.insert("list".into(), json!([{"deep": "xSECRETx"}, 3]));

        redact_attributes(&mut a, "SECRET");

        assert_eq!(a["url"], json!("http://t/?apikey=**REDACTED**"));
        assert_eq!(a["list"], json!([{"deep": "x**REDACTED**x"}, 3]));
    }

    #[test]
    fn test_redact_url_encoded_key() {
        let key = "ab/cd+ef";
        let mut session = playing();
        session.thumb = Some(key.into());
        session.image_url = Some(tautulli_api::ImageRequest::new(key).proxy_path("e"));
        let mut a = session_attributes("n", &session, false);
        assert!(a["image_url"].as_str().unwrap().contains("ab%2Fcd%2Bef"));

        redact_attributes(&mut a, key);

        assert_eq!(a["thumb"], json!("**REDACTED**"));
        let image_url = a["image_url"].as_str().unwrap();
        assert!(image_url.contains("img=**REDACTED**&"), "{}", image_url);
        assert!(!image_url.contains("ab%2Fcd%2Bef"));
    }
}
