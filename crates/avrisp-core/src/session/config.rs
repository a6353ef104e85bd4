//! Session configuration and TOML fuse profiles
//!
//! Profiles are parsed from TOML files (requires the `std` feature):
//!
//! ```toml
//! [fuses]
//! low = 0xF7
//! high = 0xD0
//! extended = 0xFD
//!
//! [lock]
//! during = 0x03
//! after = 0x0F
//!
//! [poll]
//! max_polls = 100000
//! delay_us = 10
//! ```
//!
//! Every table and key is optional; missing values keep their defaults.
//! Byte values may be written as integers or as `"0x.."` strings.

use crate::fuse::FuseConfiguration;
use crate::protocol::PollPolicy;

/// Everything a programming session writes and how it waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    /// Fuse and lock bytes
    pub fuses: FuseConfiguration,
    /// Busy-poll policy for every write and erase cycle
    pub poll: PollPolicy,
}

#[cfg(feature = "std")]
mod toml_profile {
    use std::format;
    use std::fs;
    use std::path::Path;
    use std::string::String;

    use super::SessionConfig;
    use crate::error::{Error, Result};
    use crate::protocol::PollPolicy;

    #[derive(Debug, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TomlProfile {
        #[serde(default)]
        fuses: TomlFuses,
        #[serde(default)]
        lock: TomlLock,
        poll: Option<TomlPoll>,
    }

    #[derive(Debug, Default, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TomlFuses {
        #[serde(default, deserialize_with = "deserialize_hex_u8_opt")]
        low: Option<u8>,
        #[serde(default, deserialize_with = "deserialize_hex_u8_opt")]
        high: Option<u8>,
        #[serde(default, deserialize_with = "deserialize_hex_u8_opt")]
        extended: Option<u8>,
    }

    #[derive(Debug, Default, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TomlLock {
        #[serde(default, deserialize_with = "deserialize_hex_u8_opt")]
        during: Option<u8>,
        #[serde(default, deserialize_with = "deserialize_hex_u8_opt")]
        after: Option<u8>,
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TomlPoll {
        /// Omitted or 0 polls forever
        #[serde(default)]
        max_polls: u32,
        #[serde(default = "default_delay_us")]
        delay_us: u32,
    }

    fn default_delay_us() -> u32 {
        PollPolicy::DEFAULT_POLL_DELAY_US
    }

    /// Deserialize a byte that can be an integer or a hex / decimal string
    fn deserialize_hex_u8_opt<'de, D>(deserializer: D) -> core::result::Result<Option<u8>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum HexOrInt {
            Int(i64),
            Str(String),
        }

        let value = match HexOrInt::deserialize(deserializer)? {
            HexOrInt::Int(n) => n,
            HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom)?,
        };
        u8::try_from(value)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("{} does not fit in a byte", value)))
    }

    /// Parse a number that can be hex (0x...) or decimal
    fn parse_number(s: &str) -> core::result::Result<i64, String> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
        } else {
            s.parse().map_err(|e| format!("invalid number: {}", e))
        }
    }

    impl SessionConfig {
        /// Load a profile from a TOML file
        pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let content = fs::read_to_string(path).map_err(|e| {
                log::error!("Cannot read profile {}: {}", path.display(), e);
                Error::ProfileError
            })?;
            Self::from_toml_str(&content)
        }

        /// Parse a profile from a TOML string
        pub fn from_toml_str(content: &str) -> Result<Self> {
            let profile: TomlProfile = toml::from_str(content).map_err(|e| {
                log::error!("Invalid profile: {}", e);
                Error::ProfileError
            })?;

            let mut config = SessionConfig::default();
            let fuses = &mut config.fuses;
            fuses.low = profile.fuses.low.unwrap_or(fuses.low);
            fuses.high = profile.fuses.high.unwrap_or(fuses.high);
            fuses.extended = profile.fuses.extended.unwrap_or(fuses.extended);
            fuses.lock_during = profile.lock.during.unwrap_or(fuses.lock_during);
            fuses.lock_after = profile.lock.after.unwrap_or(fuses.lock_after);

            if let Some(poll) = profile.poll {
                config.poll = PollPolicy {
                    max_polls: (poll.max_polls > 0).then_some(poll.max_polls),
                    poll_delay_us: poll.delay_us,
                };
            }
            Ok(config)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_full_profile() {
            let config = SessionConfig::from_toml_str(
                r#"
                [fuses]
                low = 0xE2
                high = "0xD9"
                extended = 255

                [lock]
                after = "0x3C"

                [poll]
                max_polls = 500
                delay_us = 20
                "#,
            )
            .unwrap();
            assert_eq!(config.fuses.low, 0xE2);
            assert_eq!(config.fuses.high, 0xD9);
            assert_eq!(config.fuses.extended, 0xFF);
            assert_eq!(config.fuses.lock_during, 0x03);
            assert_eq!(config.fuses.lock_after, 0x3C);
            assert_eq!(config.poll, PollPolicy::bounded(500, 20));
        }

        #[test]
        fn test_empty_profile_is_default() {
            assert_eq!(
                SessionConfig::from_toml_str("").unwrap(),
                SessionConfig::default()
            );
        }

        #[test]
        fn test_unbounded_poll() {
            let config = SessionConfig::from_toml_str("[poll]\ndelay_us = 0\n").unwrap();
            assert_eq!(config.poll, PollPolicy::unbounded());
        }

        #[test]
        fn test_rejects_bad_values() {
            assert_eq!(
                SessionConfig::from_toml_str("[fuses]\nlow = 0x1FF\n"),
                Err(Error::ProfileError)
            );
            assert_eq!(
                SessionConfig::from_toml_str("[fuses]\nlow = \"zz\"\n"),
                Err(Error::ProfileError)
            );
            assert_eq!(
                SessionConfig::from_toml_str("[fuse]\nlow = 1\n"),
                Err(Error::ProfileError)
            );
        }
    }
}
