//! Voltage Modbus Slave Demo
//!
//! Demonstrates the voltage_modbus_slave library:
//! - Driving the RTU slave engine by hand through its event queue
//! - Byte order of 32-bit register cells on the wire
//! - Serving a master over an async stream with the host server
//!
//! Usage: cargo run --bin demo

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::timeout;
use voltage_modbus_slave::bytes::cell_to_wire;
use voltage_modbus_slave::frame::read_response_registers;
use voltage_modbus_slave::{
    ByteOrder, Event, EventQueue, FrameBuffer, InMemoryStore, ProtocolState, RegisterStore,
    RequestBuilder, RtuSlave, RtuSlaveServer, SerialPort, SlaveConfig,
};

/// Serial port that prints every line change
#[derive(Default)]
struct ConsolePort {
    sent: Vec<Vec<u8>>,
}

impl SerialPort for ConsolePort {
    fn enable_receive(&mut self, enabled: bool) {
        println!("    UART rx {}", if enabled { "on" } else { "off" });
    }

    fn enable_transmit(&mut self, enabled: bool) {
        println!("    UART tx {}", if enabled { "on" } else { "off" });
    }

    fn transmit(&mut self, frame: &[u8]) {
        println!("    UART → {}", hex(frame));
        self.sent.push(frame.to_vec());
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Send one request and collect the response until the line goes quiet
async fn exchange(master: &mut DuplexStream, request: &FrameBuffer) -> std::io::Result<Vec<u8>> {
    master.write_all(request.as_slice()).await?;
    println!("  → {}", hex(request.as_slice()));

    let mut response = Vec::new();
    let mut buffer = [0u8; 256];
    while let Ok(read) = timeout(Duration::from_millis(50), master.read(&mut buffer)).await {
        let n = read?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&buffer[..n]);
    }

    if response.is_empty() {
        println!("  ← (no response)");
    } else {
        println!("  ← {}", hex(&response));
    }
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 Voltage Modbus Slave v{} Demo", voltage_modbus_slave::VERSION);
    println!("==================================");
    println!("Modbus RTU slave core showcase\n");

    // =========================================================================
    // Part 1: Engine driven by events (no runtime required)
    // =========================================================================
    println!("⚙️  Part 1: Event-driven slave engine");
    println!("-------------------------------------");

    let config = SlaveConfig::new(1);
    let mut store = InMemoryStore::<64>::new(0x8000);
    store.write(0x8000, 0x1234_5678)?;
    let mut slave = RtuSlave::new(config, store)?;
    let mut port = ConsolePort::default();
    let mut events: EventQueue = EventQueue::new();

    let request = RequestBuilder::build_read_holding_registers(1, 0x0000, 2)?;
    println!("  Request: {}", hex(request.as_slice()));

    events.push(Event::Tick)?;
    events.push_bytes(request.as_slice())?;
    events.push(Event::SilenceElapsed)?;
    while slave.state() != ProtocolState::Silence || port.sent.is_empty() {
        events.push(Event::Tick)?;
        slave.process_events(&mut events, &mut port);
        println!("    state: {}", slave.state());
    }

    let registers = read_response_registers(&port.sent[0])?;
    println!("  Registers: {:04X?}", registers.as_slice());

    // =========================================================================
    // Part 2: Byte order of a storage cell
    // =========================================================================
    println!("\n🔄 Part 2: Cell byte order");
    println!("--------------------------");

    let cell = 0x1234_5678u32;
    println!("  Cell value: 0x{:08X}", cell);
    for order in [
        ByteOrder::BigEndian,
        ByteOrder::LittleEndian,
        ByteOrder::BigEndianSwap,
        ByteOrder::LittleEndianSwap,
    ] {
        println!("    {:<28} -> {}", order.as_str(), hex(&cell_to_wire(cell, order)));
    }

    // =========================================================================
    // Part 3: Host server over an async stream
    // =========================================================================
    println!("\n🔌 Part 3: Host server");
    println!("----------------------");

    let (mut master, slave_end) = tokio::io::duplex(256);
    let slave = RtuSlave::new(
        SlaveConfig::new(7).with_baud_rate(115200),
        InMemoryStore::<64>::new(0x8000),
    )?;
    let mut server = RtuSlaveServer::new(slave, slave_end)?
        .with_silence(Duration::from_millis(5))
        .with_packet_logging(true);
    let handle = tokio::spawn(async move {
        let result = server.run().await;
        (server, result)
    });

    println!("  Write registers 0..3 = [0x0001, 0x0002, 0x0003]");
    exchange(
        &mut master,
        &RequestBuilder::build_write_multiple_registers(7, 0x0000, &[0x0001, 0x0002, 0x0003])?,
    )
    .await?;

    println!("  Write single register 4 = 0xBEEF");
    exchange(
        &mut master,
        &RequestBuilder::build_write_single_register(7, 0x0004, 0xBEEF)?,
    )
    .await?;

    println!("  Read input registers 0..6");
    let response = exchange(
        &mut master,
        &RequestBuilder::build_read_input_registers(7, 0x0000, 6)?,
    )
    .await?;
    println!(
        "  Registers: {:04X?}",
        read_response_registers(&response)?.as_slice()
    );

    println!("  Unsupported function (0x01 Read Coils)");
    exchange(
        &mut master,
        &RequestBuilder::build_raw(7, 0x01, &[0x00, 0x00, 0x00, 0x08])?,
    )
    .await?;

    println!("  Request for another slave (id 9)");
    exchange(
        &mut master,
        &RequestBuilder::build_read_holding_registers(9, 0x0000, 1)?,
    )
    .await?;

    drop(master);
    let (server, result) = handle.await?;
    result?;

    let stats = server.slave().stats();
    println!("\n📈 Statistics");
    println!("-------------");
    println!("  Frames received:    {}", stats.frames_received);
    println!("  Responses sent:     {}", stats.responses_sent);
    println!("  Exceptions sent:    {}", stats.exceptions_sent);
    println!("  Register reads:     {}", stats.register_reads);
    println!("  Register writes:    {}", stats.register_writes);
    println!("  Address mismatches: {}", stats.address_mismatches);

    println!("\n✅ Demo complete");
    Ok(())
}
