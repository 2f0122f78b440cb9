//! Requesting-device classification.

use serde::{Deserialize, Serialize};

/// The class of device a request comes from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Device {
  Mobile,
  #[default]
  Desktop,
}

/// User-agent fragments that mark a handset or small tablet.
const MOBILE_MARKERS: &[&str] = &[
  "mobi",
  "android",
  "iphone",
  "ipod",
  "blackberry",
  "opera mini",
  "iemobile",
  "windows phone",
];

/// Classify a request from its `Sec-CH-UA-Mobile` client hint and
/// `User-Agent` header. The client hint wins when present; anything that
/// cannot be classified is treated as desktop.
pub fn detect(user_agent: Option<&str>, ch_ua_mobile: Option<&str>) -> Device {
  match ch_ua_mobile.map(str::trim) {
    Some("?1") => return Device::Mobile,
    Some("?0") => return Device::Desktop,
    _ => {}
  }

  let Some(ua) = user_agent else {
    return Device::Desktop;
  };
  let ua = ua.to_ascii_lowercase();
  if MOBILE_MARKERS.iter().any(|m| ua.contains(m)) {
    Device::Mobile
  } else {
    Device::Desktop
  }
}
