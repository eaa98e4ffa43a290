#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use voltage_modbus_slave::{Event, InMemoryStore, RtuSlave, SerialPort, SlaveConfig};

#[derive(Debug, Arbitrary)]
enum Input {
    Byte(u8),
    Silence,
    Tick,
}

#[derive(Default)]
struct NullPort {
    transmitted: usize,
}

impl SerialPort for NullPort {
    fn enable_receive(&mut self, _enabled: bool) {}
    fn enable_transmit(&mut self, _enabled: bool) {}
    fn transmit(&mut self, frame: &[u8]) {
        assert!(frame.len() <= 256);
        self.transmitted += 1;
    }
}

fuzz_target!(|inputs: Vec<Input>| {
    let mut slave = match RtuSlave::new(SlaveConfig::default(), InMemoryStore::<32>::new(0x8000)) {
        Ok(slave) => slave,
        Err(_) => return,
    };
    let mut port = NullPort::default();

    for input in inputs {
        let event = match input {
            Input::Byte(byte) => Event::ByteReceived(byte),
            Input::Silence => Event::SilenceElapsed,
            Input::Tick => Event::Tick,
        };
        slave.handle_event(event, &mut port);
    }

    assert_eq!(slave.stats().responses_sent as usize, port.transmitted);
});
