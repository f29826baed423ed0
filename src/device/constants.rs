use uuid::Uuid;

/**
 * How often (milliseconds) to check the connection status and poll the adapter state.
 */
pub const POLL_DELAY: u64 = 500;

/**
 * How often (milliseconds) to attempt to rescan / reconnect.
 */
pub const CONNECT_DELAY: u64 = 1000;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) tearing down a link may take
 */
pub const DISCONNECT_DEADLINE: u64 = 2000;

/**
 * The UUID of the Bluetooth BLE service of HM-10 style serial modules
 */
pub const HM10_SERIAL_SERVICE: &str = "0000ffe0-0000-1000-8000-00805f9b34fb";

/**
 * The UUID of the characteristic that carries the serial data, in both directions.
 * Incoming data arrives as notifications.
 */
pub const HM10_SERIAL_CHARACTERISTIC: &str = "0000ffe1-0000-1000-8000-00805f9b34fb";

/**
 * Used when the peripheral does not advertise a local name.
 */
pub const UNKNOWN_PERIPHERAL_NAME: &str = "Unknown peripheral";

pub fn make_serial_service_uuid() -> Uuid {
    Uuid::parse_str(HM10_SERIAL_SERVICE).unwrap()
}

pub fn make_serial_characteristic_uuid() -> Uuid {
    Uuid::parse_str(HM10_SERIAL_CHARACTERISTIC).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuids_parse() {
        assert_eq!(make_serial_service_uuid().as_u128(), 0x0000ffe0_0000_1000_8000_00805f9b34fb);
        assert_eq!(make_serial_characteristic_uuid().as_u128(), 0x0000ffe1_0000_1000_8000_00805f9b34fb);
    }
}
