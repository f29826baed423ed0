use log::debug;

use crate::config::types::ChannelKeys;
use crate::error::ParseSkip;
use crate::pipeline::gauge::{Channel, Reading};
use crate::pipeline::types::SerialMessage;

/// Parses `key=value` pairs such as `fl=2.3,fr=1.1` into readings.
///
/// Parsing is total: malformed tokens and unknown keys are skipped, the rest of the
/// message is still used.
#[derive(Debug, Clone)]
pub struct TelemetryParser {
    keys: Vec<(String, Channel)>,
}

impl TelemetryParser {
    pub fn new(keys: &ChannelKeys) -> Self {
        TelemetryParser {
            keys: vec![
                (keys.left.clone(), Channel::Left),
                (keys.right.clone(), Channel::Right),
            ],
        }
    }

    pub fn parse(&self, message: &SerialMessage) -> Vec<Reading> {
        self.parse_body(message.body())
    }

    pub fn parse_body(&self, body: &str) -> Vec<Reading> {
        body.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .filter_map(|token| match self.parse_token(token) {
                Ok(reading) => Some(reading),
                Err(skip) => {
                    debug!("Skipping telemetry token: {}", skip);
                    None
                },
            })
            .collect()
    }

    fn parse_token(&self, token: &str) -> Result<Reading, ParseSkip> {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| ParseSkip::NotAPair { token: token.to_string() })?;

        let channel = self.channel_for_key(key.trim())
            .ok_or_else(|| ParseSkip::UnknownKey { token: token.to_string() })?;

        // out-of-range values saturate to infinity and are clamped by the gauge, NaN is not a force
        let value = value.trim()
            .parse::<f32>()
            .ok()
            .filter(|value| !value.is_nan())
            .ok_or_else(|| ParseSkip::BadValue { token: token.to_string() })?;

        Ok(Reading::new(channel, value))
    }

    fn channel_for_key(&self, key: &str) -> Option<Channel> {
        self.keys
            .iter()
            .find(|(known, _)| known == key)
            .map(|(_, channel)| *channel)
    }
}

impl Default for TelemetryParser {
    fn default() -> Self {
        TelemetryParser::new(&ChannelKeys::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gauge::GaugeState;

    fn parse(body: &str) -> Vec<Reading> {
        TelemetryParser::default().parse_body(body)
    }

    #[test]
    fn test_parse_both_channels() {
        assert_eq!(
            parse("fl=2.5,fr=1.0"),
            vec![Reading::new(Channel::Left, 2.5), Reading::new(Channel::Right, 1.0)],
        );
    }

    #[test]
    fn test_malformed_value_is_skipped() {
        assert_eq!(parse("fl=banana,fr=1.0"), vec![Reading::new(Channel::Right, 1.0)]);
    }

    #[test]
    fn test_empty_message() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_unknown_keys_and_garbage_are_skipped() {
        assert_eq!(
            parse("temp=21.0,fr,=3,fl=,fl=4.5"),
            vec![Reading::new(Channel::Left, 4.5)],
        );
    }

    #[test]
    fn test_nan_is_skipped() {
        assert_eq!(parse("fl=NaN,fr=1.0"), vec![Reading::new(Channel::Right, 1.0)]);
    }

    #[test]
    fn test_huge_value_fills_the_gauge() {
        let readings = parse("fl=1e39,fr=1e300");
        assert_eq!(
            readings,
            vec![Reading::new(Channel::Left, f32::INFINITY), Reading::new(Channel::Right, f32::INFINITY)],
        );

        let mut gauges = GaugeState::new(30.0);
        for reading in readings {
            gauges.update(reading);
        }
        assert_eq!(gauges.fill_height(Channel::Left, 100.0), 100.0);
        assert_eq!(gauges.fill_height(Channel::Right, 100.0), 100.0);
    }

    #[test]
    fn test_whitespace_around_tokens() {
        assert_eq!(
            parse(" fl = 1.5 , fr=-2 "),
            vec![Reading::new(Channel::Left, 1.5), Reading::new(Channel::Right, -2.0)],
        );
    }

    #[test]
    fn test_parse_framed_message() {
        let message = SerialMessage::new("<fl=3.0,fr=0.0>".to_string());
        assert_eq!(
            TelemetryParser::default().parse(&message),
            vec![Reading::new(Channel::Left, 3.0), Reading::new(Channel::Right, 0.0)],
        );
    }

    #[test]
    fn test_configured_keys() {
        let keys = ChannelKeys { left: "L".to_string(), right: "R".to_string() };
        let parser = TelemetryParser::new(&keys);
        assert_eq!(
            parser.parse_body("L=1,fl=2,R=3"),
            vec![Reading::new(Channel::Left, 1.0), Reading::new(Channel::Right, 3.0)],
        );
    }

    #[test]
    fn test_value_may_contain_equals() {
        // split once: "1=2" is not a number
        assert_eq!(parse("fl=1=2,fr=0.5"), vec![Reading::new(Channel::Right, 0.5)]);
    }
}
