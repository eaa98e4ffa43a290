#![no_main]

use libfuzzer_sys::fuzz_target;
use voltage_modbus_slave::handler::process_request;
use voltage_modbus_slave::{FrameBuffer, InMemoryStore, RequestBuilder, SlaveConfig};

fuzz_target!(|data: &[u8]| {
    let config = SlaveConfig::default();
    let mut store = InMemoryStore::<32>::new(0x8000);
    let mut outbound = FrameBuffer::new();

    // Raw bytes: almost always dropped on the CRC
    let outcome = process_request(&config, &mut store, data, &mut outbound);
    assert_eq!(outcome.len(), outbound.len());

    // Same payload behind our address and a valid CRC reaches the handlers
    if let Some((&fc, payload)) = data.split_first() {
        if let Ok(frame) = RequestBuilder::build_raw(config.slave_id, fc, payload) {
            let outcome = process_request(&config, &mut store, frame.as_slice(), &mut outbound);
            assert_eq!(outcome.len(), outbound.len());
            if !outcome.is_empty() {
                assert_eq!(outbound.slave_id(), Some(config.slave_id));
                assert_eq!(outbound.function_code(), Some(fc));
            }
        }
    }
});
