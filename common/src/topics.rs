//! MQTT topic layout shared by the daemon, the simulator, and any bridge
//! exposing real devices. Discovery, thermostat status, and plug state are
//! published retained so a freshly connected client sees the current world.

pub const TOPIC_DISCOVERY_WILDCARD: &str = "stovewatch/discovery/+";
pub const TOPIC_THERMOSTAT_STATUS_WILDCARD: &str = "stovewatch/thermostat/+/status";
pub const TOPIC_PLUG_STATE_WILDCARD: &str = "stovewatch/plug/+/state";
pub const TOPIC_PLUG_CMD_WILDCARD: &str = "stovewatch/cmnd/plug/+/power";

pub const TOPIC_WATCHDOG_STATE: &str = "stovewatch/watchdog/state";

pub fn discovery_topic(mac: &str) -> String {
    format!("stovewatch/discovery/{mac}")
}

pub fn thermostat_status_topic(mac: &str) -> String {
    format!("stovewatch/thermostat/{mac}/status")
}

pub fn plug_cmd_topic(mac: &str) -> String {
    format!("stovewatch/cmnd/plug/{mac}/power")
}

pub fn plug_state_topic(mac: &str) -> String {
    format!("stovewatch/plug/{mac}/state")
}

pub fn parse_discovery(topic: &str) -> Option<&str> {
    topic.strip_prefix("stovewatch/discovery/")
}

pub fn parse_thermostat_status(topic: &str) -> Option<&str> {
    topic
        .strip_prefix("stovewatch/thermostat/")?
        .strip_suffix("/status")
}

pub fn parse_plug_cmd(topic: &str) -> Option<&str> {
    topic
        .strip_prefix("stovewatch/cmnd/plug/")?
        .strip_suffix("/power")
}

pub fn parse_plug_state(topic: &str) -> Option<&str> {
    topic.strip_prefix("stovewatch/plug/")?.strip_suffix("/state")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_and_parsers_round_trip() {
        assert_eq!(parse_discovery(&discovery_topic("AA11")), Some("AA11"));
        assert_eq!(
            parse_thermostat_status(&thermostat_status_topic("AA11")),
            Some("AA11")
        );
        assert_eq!(parse_plug_cmd(&plug_cmd_topic("BB22")), Some("BB22"));
        assert_eq!(parse_plug_state(&plug_state_topic("BB22")), Some("BB22"));
    }

    #[test]
    fn parsers_reject_foreign_topics() {
        assert_eq!(parse_discovery("stovewatch/watchdog/state"), None);
        assert_eq!(parse_thermostat_status("stovewatch/thermostat/AA11"), None);
        assert_eq!(parse_plug_state("stovewatch/cmnd/plug/BB22/power"), None);
    }
}
