//! Request dispatcher and function handlers
//!
//! Turns one inbound frame into the outbound frame. The outcome tells the
//! caller whether anything should be transmitted.
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Short frame, CRC mismatch | dropped, length 0 |
//! | Address is not ours | dropped, length 0 |
//! | Unsupported or disabled function | Illegal Function (0x01), 5 bytes |
//! | Register range outside the store | Illegal Data Address (0x02), 5 bytes |
//! | Quantity / byte count invalid | Illegal Data Value (0x03), 5 bytes |

use tracing::{debug, trace, warn};

use crate::bytes::{cell_to_wire, merge_first_register, registers_to_cell, single_register_cell};
use crate::checksum::verify_crc;
use crate::config::SlaveConfig;
use crate::constants::{
    BROADCAST_ADDRESS, CRC_LEN, EXCEPTION_FLAG, EXCEPTION_RESPONSE_LEN, MIN_FRAME_LEN,
    READ_RESPONSE_HEADER_LEN, WORDS_PER_CELL, WRITE_RESPONSE_LEN,
};
use crate::error::{Exception, SlaveError, SlaveResult};
use crate::frame::FrameBuffer;
use crate::function::{FunctionCode, Request};
use crate::store::RegisterStore;

/// Why a frame got no response at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DropReason {
    /// Fewer bytes than any valid frame, or too short for its function
    TooShort,
    /// Trailing CRC does not verify
    CrcMismatch,
    /// Addressed to another slave
    NotForUs,
    /// Response did not fit the outbound buffer
    Overflow,
}

/// Result of handling one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Nothing to transmit
    Dropped(DropReason),
    /// Normal response of `len` bytes
    Response { len: usize },
    /// Exception response of `len` bytes
    Exception { exception: Exception, len: usize },
}

impl Outcome {
    /// Bytes to transmit (0 = do not transmit)
    pub fn len(&self) -> usize {
        match self {
            Self::Dropped(_) => 0,
            Self::Response { len } | Self::Exception { len, .. } => *len,
        }
    }

    /// Whether nothing should be transmitted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle one inbound frame, writing the response into `outbound`.
///
/// `outbound` is cleared first, so no byte of a previous response survives.
pub fn process_request<S>(
    config: &SlaveConfig,
    store: &mut S,
    inbound: &[u8],
    outbound: &mut FrameBuffer,
) -> Outcome
where
    S: RegisterStore + ?Sized,
{
    outbound.clear();

    if inbound.len() < MIN_FRAME_LEN {
        debug!("Dropping frame: {} bytes is below the minimum", inbound.len());
        return Outcome::Dropped(DropReason::TooShort);
    }

    if let Err(e) = verify_crc(inbound) {
        debug!("Dropping frame: {}", e);
        return Outcome::Dropped(DropReason::CrcMismatch);
    }

    let slave_id = inbound[0];
    if slave_id == BROADCAST_ADDRESS {
        debug!("Broadcast frame ignored");
        return Outcome::Dropped(DropReason::NotForUs);
    }
    if slave_id != config.slave_id {
        trace!(
            "Frame for slave {} ignored (we are {})",
            slave_id,
            config.slave_id
        );
        return Outcome::Dropped(DropReason::NotForUs);
    }

    let function_code = inbound[1];
    let body = &inbound[..inbound.len() - CRC_LEN];

    // Header copy cannot fail on a cleared buffer
    if outbound.extend(&[slave_id, function_code]).is_err() {
        return Outcome::Dropped(DropReason::Overflow);
    }

    let result = check_enabled(config, function_code)
        .and_then(|()| {
            Request::parse(body, config.max_read_registers, config.max_write_registers)
        })
        .and_then(|request| dispatch(config, store, &request, outbound));

    match result {
        Ok(()) => {
            trace!("Response ready: {} bytes", outbound.len());
            Outcome::Response {
                len: outbound.len(),
            }
        }
        Err(e) => match e.exception() {
            Some(exception) => {
                debug!(
                    "FC{:02X} answered with exception {}: {}",
                    function_code, exception, e
                );
                match write_exception(config, slave_id, function_code, exception, outbound) {
                    Ok(len) => Outcome::Exception { exception, len },
                    Err(_) => Outcome::Dropped(DropReason::Overflow),
                }
            }
            None => {
                outbound.clear();
                match e {
                    SlaveError::BufferOverflow { .. } => {
                        warn!("Response for FC{:02X} overflowed: {}", function_code, e);
                        Outcome::Dropped(DropReason::Overflow)
                    }
                    _ => {
                        debug!("Dropping FC{:02X} frame: {}", function_code, e);
                        Outcome::Dropped(DropReason::TooShort)
                    }
                }
            }
        },
    }
}

/// Supported and enabled, judged on the function byte alone.
fn check_enabled(config: &SlaveConfig, code: u8) -> SlaveResult<()> {
    let function = FunctionCode::try_from(code)?;
    if !config.functions.contains(function) {
        return Err(SlaveError::IllegalFunction { code });
    }
    Ok(())
}

fn dispatch<S>(
    config: &SlaveConfig,
    store: &mut S,
    request: &Request<'_>,
    outbound: &mut FrameBuffer,
) -> SlaveResult<()>
where
    S: RegisterStore + ?Sized,
{
    trace!(
        "Dispatching {} at 0x{:04X}",
        request.function(),
        request.address()
    );
    match *request {
        Request::ReadRegisters {
            function,
            address,
            quantity,
        } => read_registers(config, store, function, address, quantity, outbound),
        Request::WriteSingleRegister { address, value } => {
            write_single_register(config, store, address, value, outbound)
        }
        Request::WriteMultipleRegisters {
            address,
            quantity,
            values,
        } => write_multiple_registers(config, store, address, quantity, values, outbound),
    }
}

/// Storage address of cell `index` of a request starting at `start`.
#[inline]
fn cell_address(start: u32, index: u32) -> SlaveResult<u32> {
    index
        .checked_mul(WORDS_PER_CELL)
        .and_then(|offset| start.checked_add(offset))
        .ok_or(SlaveError::AddressOutOfRange { address: start })
}

/// Check that every cell touched by `quantity` registers exists.
fn check_range<S>(store: &S, start: u32, quantity: u16) -> SlaveResult<u32>
where
    S: RegisterStore + ?Sized,
{
    let cells = (quantity as u32).div_ceil(WORDS_PER_CELL);
    for index in 0..cells {
        let address = cell_address(start, index)?;
        if !store.contains(address) {
            return Err(SlaveError::AddressOutOfRange { address });
        }
    }
    Ok(cells)
}

/// FC03 / FC04
fn read_registers<S>(
    config: &SlaveConfig,
    store: &S,
    function: FunctionCode,
    address: u16,
    quantity: u16,
    outbound: &mut FrameBuffer,
) -> SlaveResult<()>
where
    S: RegisterStore + ?Sized,
{
    let start = config.memory_map.compose(function.code(), address);
    let cells = check_range(store, start, quantity)?;

    let byte_count = quantity as usize * 2;
    outbound.push(byte_count as u8)?;

    let mut remaining = quantity;
    for index in 0..cells {
        let value = store.read(cell_address(start, index)?)?;
        let wire = cell_to_wire(value, config.byte_order);
        // An odd quantity takes only the first register of the last cell
        let take = if remaining >= 2 { 4 } else { 2 };
        outbound.extend(&wire[..take])?;
        remaining -= (take / 2) as u16;
    }

    debug_assert_eq!(outbound.len(), READ_RESPONSE_HEADER_LEN + byte_count);
    outbound.append_crc()?;

    debug!(
        "{}: {} registers from 0x{:08X} ({} cells)",
        function, quantity, start, cells
    );
    Ok(())
}

/// FC06
fn write_single_register<S>(
    config: &SlaveConfig,
    store: &mut S,
    address: u16,
    value: u16,
    outbound: &mut FrameBuffer,
) -> SlaveResult<()>
where
    S: RegisterStore + ?Sized,
{
    let function = FunctionCode::WriteSingleRegister;
    let target = config.memory_map.compose(function.code(), address);
    if !store.contains(target) {
        return Err(SlaveError::AddressOutOfRange { address: target });
    }

    store.write(target, single_register_cell(value, config.byte_order))?;

    // Echo what the cell now holds
    let stored = cell_to_wire(store.read(target)?, config.byte_order);
    outbound.push_u16(address)?;
    outbound.extend(&stored[..2])?;
    outbound.append_crc()?;
    debug_assert_eq!(outbound.len(), WRITE_RESPONSE_LEN);

    debug!("{}: 0x{:08X} <- 0x{:04X}", function, target, value);
    Ok(())
}

/// FC16
fn write_multiple_registers<S>(
    config: &SlaveConfig,
    store: &mut S,
    address: u16,
    quantity: u16,
    values: &[u8],
    outbound: &mut FrameBuffer,
) -> SlaveResult<()>
where
    S: RegisterStore + ?Sized,
{
    let function = FunctionCode::WriteMultipleRegisters;
    let start = config.memory_map.compose(function.code(), address);
    // Validate the whole range before touching anything
    check_range(store, start, quantity)?;

    for (index, chunk) in values.chunks(4).enumerate() {
        let target = cell_address(start, index as u32)?;
        let first = u16::from_be_bytes([chunk[0], chunk[1]]);

        let cell = if chunk.len() == 4 {
            let second = u16::from_be_bytes([chunk[2], chunk[3]]);
            registers_to_cell(first, second, config.byte_order)
        } else {
            // Odd trailing register: keep the other half of the cell
            merge_first_register(store.read(target)?, first, config.byte_order)
        };
        store.write(target, cell)?;
    }

    outbound.push_u16(address)?;
    outbound.push_u16(quantity)?;
    outbound.append_crc()?;
    debug_assert_eq!(outbound.len(), WRITE_RESPONSE_LEN);

    debug!(
        "{}: {} registers to 0x{:08X}",
        function, quantity, start
    );
    Ok(())
}

/// Write `[slave][fc][code][crc]`, returning its length.
fn write_exception(
    config: &SlaveConfig,
    slave_id: u8,
    function_code: u8,
    exception: Exception,
    outbound: &mut FrameBuffer,
) -> SlaveResult<usize> {
    let function_byte = if config.exception_flag {
        function_code | EXCEPTION_FLAG
    } else {
        function_code
    };

    outbound.clear();
    outbound.extend(&[slave_id, function_byte, exception.code()])?;
    outbound.append_crc()?;
    debug_assert_eq!(outbound.len(), EXCEPTION_RESPONSE_LEN);
    Ok(outbound.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::ByteOrder;
    use crate::checksum::crc_bytes;
    use crate::frame::{read_response_registers, RequestBuilder};
    use crate::store::{InMemoryStore, MmioStore};

    type Store = InMemoryStore<64>;

    fn store() -> Store {
        InMemoryStore::new(0x8000)
    }

    fn handle(config: &SlaveConfig, store: &mut Store, request: &[u8]) -> (Outcome, FrameBuffer) {
        let mut outbound = FrameBuffer::new();
        let outcome = process_request(config, store, request, &mut outbound);
        (outcome, outbound)
    }

    #[test]
    fn test_read_holding_registers_wire_order() {
        let config = SlaveConfig::default();
        let mut store = store();
        store.write(0x8000, 0x1234_5678).unwrap();
        store.write(0x8002, 0xAABB_CCDD).unwrap();

        let request = RequestBuilder::build_read_holding_registers(1, 0x0000, 4).unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(outcome, Outcome::Response { len: 13 });
        assert_eq!(
            tx.body(),
            &[0x01, 0x03, 0x08, 0x56, 0x78, 0x12, 0x34, 0xCC, 0xDD, 0xAA, 0xBB]
        );
        assert!(verify_crc(tx.as_slice()).is_ok());
    }

    #[test]
    fn test_read_odd_quantity_uses_first_half_of_last_cell() {
        let config = SlaveConfig::default();
        let mut store = store();
        store.write(0x8000, 0x1111_2222).unwrap();
        store.write(0x8002, 0x3333_4444).unwrap();

        let request = RequestBuilder::build_read_input_registers(1, 0x0000, 3).unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(outcome.len(), 3 + 6 + 2);
        let registers = read_response_registers(tx.as_slice()).unwrap();
        assert_eq!(registers.as_slice(), &[0x2222, 0x1111, 0x4444]);
    }

    #[test]
    fn test_read_single_register() {
        let config = SlaveConfig::default();
        let mut store = store();
        store.write(0x8000, 0x0000_0042).unwrap();

        let request = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A];
        let (outcome, tx) = handle(&config, &mut store, &request);

        assert_eq!(outcome, Outcome::Response { len: 7 });
        assert_eq!(tx.body(), &[0x01, 0x03, 0x02, 0x00, 0x42]);
    }

    #[test]
    fn test_read_out_of_range() {
        let config = SlaveConfig::default();
        let mut store = store();

        // 64 cells cover 0x8000..0x8080; the second cell, 0x8081, is outside
        let request = RequestBuilder::build_read_holding_registers(1, 0x007F, 4).unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(
            outcome,
            Outcome::Exception {
                exception: Exception::IllegalDataAddress,
                len: 5
            }
        );
        assert_eq!(&tx.as_slice()[..3], &[0x01, 0x03, 0x02]);
    }

    #[test]
    fn test_read_quantity_above_limit() {
        let config = SlaveConfig::default().with_max_read_registers(10);
        let mut store = store();

        let request = RequestBuilder::build_read_holding_registers(1, 0, 11).unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(
            outcome,
            Outcome::Exception {
                exception: Exception::IllegalDataValue,
                len: 5
            }
        );
        assert_eq!(&tx.as_slice()[..3], &[0x01, 0x03, 0x03]);
    }

    #[test]
    fn test_write_single_register_echo_and_zeroed_high_half() {
        let config = SlaveConfig::default();
        let mut store = store();
        store.write(0x8004, 0xFFFF_FFFF).unwrap();

        let request = RequestBuilder::build_write_single_register(1, 0x0004, 0xBEEF).unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(outcome, Outcome::Response { len: 8 });
        assert_eq!(tx.body(), &[0x01, 0x06, 0x00, 0x04, 0xBE, 0xEF]);
        assert_eq!(store.read(0x8004), Ok(0x0000_BEEF));
    }

    #[test]
    fn test_write_multiple_registers_even() {
        let config = SlaveConfig::default();
        let mut store = store();

        let request =
            RequestBuilder::build_write_multiple_registers(1, 0x0000, &[0x5678, 0x1234, 0xCCDD, 0xAABB])
                .unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(outcome, Outcome::Response { len: 8 });
        assert_eq!(tx.body(), &[0x01, 0x10, 0x00, 0x00, 0x00, 0x04]);
        assert_eq!(store.read(0x8000), Ok(0x1234_5678));
        assert_eq!(store.read(0x8002), Ok(0xAABB_CCDD));
    }

    #[test]
    fn test_write_multiple_registers_odd_preserves_high_half() {
        let config = SlaveConfig::default();
        let mut store = store();
        store.write(0x8002, 0xDEAD_0000).unwrap();

        let request =
            RequestBuilder::build_write_multiple_registers(1, 0x0000, &[0x0001, 0x0002, 0x0003])
                .unwrap();
        let (outcome, _) = handle(&config, &mut store, request.as_slice());

        assert_eq!(outcome, Outcome::Response { len: 8 });
        assert_eq!(store.read(0x8000), Ok(0x0002_0001));
        assert_eq!(store.read(0x8002), Ok(0xDEAD_0003));
    }

    #[test]
    fn test_write_multiple_out_of_range_writes_nothing() {
        let config = SlaveConfig::default();
        let mut store = store();

        // Cells 0x807E and 0x8080; the second is outside the store
        let request =
            RequestBuilder::build_write_multiple_registers(1, 0x007E, &[1, 2, 3, 4]).unwrap();
        let (outcome, _) = handle(&config, &mut store, request.as_slice());

        assert_eq!(
            outcome,
            Outcome::Exception {
                exception: Exception::IllegalDataAddress,
                len: 5
            }
        );
        assert_eq!(store.read(0x807E), Ok(0));
    }

    #[test]
    fn test_odd_address_reads_the_written_cell() {
        let config = SlaveConfig::default();
        let mut store = store();

        let write =
            RequestBuilder::build_write_multiple_registers(1, 0x0000, &[0x1111, 0x2222]).unwrap();
        handle(&config, &mut store, write.as_slice());
        assert_eq!(store.cells()[0], 0x2222_1111);
        assert!(store.cells()[1..].iter().all(|&cell| cell == 0));

        // 0x8001 shares the cell of 0x8000
        let read = RequestBuilder::build_read_holding_registers(1, 0x0001, 2).unwrap();
        let (_, tx) = handle(&config, &mut store, read.as_slice());
        let registers = read_response_registers(tx.as_slice()).unwrap();
        assert_eq!(registers.as_slice(), &[0x1111, 0x2222]);
    }

    #[test]
    fn test_write_multiple_fills_contiguous_mmio_cells() {
        let config = SlaveConfig::default();
        let mut cells = [0u32; 4];
        {
            let mut store =
                unsafe { MmioStore::new(cells.as_mut_ptr(), 0x8000, 4) }.unwrap();
            let mut outbound = FrameBuffer::new();

            let request =
                RequestBuilder::build_write_multiple_registers(1, 0x0000, &[1, 2, 3, 4, 5, 6, 7, 8])
                    .unwrap();
            let outcome = process_request(&config, &mut store, request.as_slice(), &mut outbound);
            assert_eq!(outcome, Outcome::Response { len: 8 });

            let request =
                RequestBuilder::build_write_multiple_registers(1, 0x0008, &[9, 10]).unwrap();
            let outcome = process_request(&config, &mut store, request.as_slice(), &mut outbound);
            assert_eq!(outcome.len(), 5);
        }

        assert_eq!(cells, [0x0002_0001, 0x0004_0003, 0x0006_0005, 0x0008_0007]);
    }

    #[test]
    fn test_write_multiple_with_big_endian_cells() {
        let config = SlaveConfig::default().with_byte_order(ByteOrder::BigEndian);
        let mut store = store();
        store.write(0x8002, 0x0000_BEEF).unwrap();

        let request =
            RequestBuilder::build_write_multiple_registers(1, 0x0000, &[0x1234, 0x5678, 0x9ABC])
                .unwrap();
        handle(&config, &mut store, request.as_slice());

        assert_eq!(store.read(0x8000), Ok(0x1234_5678));
        assert_eq!(store.read(0x8002), Ok(0x9ABC_BEEF));
    }

    #[test]
    fn test_illegal_function_is_five_bytes() {
        let config = SlaveConfig::default();
        let mut store = store();

        let request = RequestBuilder::build_raw(1, 0x2B, &[0x0E, 0x01, 0x00]).unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(
            outcome,
            Outcome::Exception {
                exception: Exception::IllegalFunction,
                len: 5
            }
        );
        let crc = crc_bytes(&[0x01, 0x2B, 0x01]);
        assert_eq!(tx.as_slice(), &[0x01, 0x2B, 0x01, crc[0], crc[1]]);
    }

    #[test]
    fn test_exception_flag_sets_high_bit() {
        let config = SlaveConfig::default().with_exception_flag(true);
        let mut store = store();

        let request = RequestBuilder::build_raw(1, 0x05, &[0x00, 0x01, 0xFF, 0x00]).unwrap();
        let (_, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(&tx.as_slice()[..3], &[0x01, 0x85, 0x01]);
    }

    #[test]
    fn test_disabled_function_is_illegal() {
        let config = SlaveConfig::default().without_function(FunctionCode::WriteSingleRegister);
        let mut store = store();

        let request = RequestBuilder::build_write_single_register(1, 0, 7).unwrap();
        let (outcome, _) = handle(&config, &mut store, request.as_slice());

        assert_eq!(
            outcome,
            Outcome::Exception {
                exception: Exception::IllegalFunction,
                len: 5
            }
        );
        assert_eq!(store.read(0x8000), Ok(0));
    }

    #[test]
    fn test_disabled_function_wins_over_malformed_body() {
        let config = SlaveConfig::default().without_function(FunctionCode::WriteMultipleRegisters);
        let mut store = store();

        // Byte count 3 for two registers
        let request =
            RequestBuilder::build_raw(1, 0x10, &[0x00, 0x00, 0x00, 0x02, 0x03, 0x00, 0x01, 0x00])
                .unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(
            outcome,
            Outcome::Exception {
                exception: Exception::IllegalFunction,
                len: 5
            }
        );
        assert_eq!(&tx.as_slice()[..3], &[0x01, 0x10, 0x01]);

        // A too-short body is answered the same way
        let request = RequestBuilder::build_raw(1, 0x10, &[0x00]).unwrap();
        let (outcome, _) = handle(&config, &mut store, request.as_slice());
        assert_eq!(outcome.len(), 5);
    }

    #[test]
    fn test_address_mismatch_is_dropped() {
        let config = SlaveConfig::new(2);
        let mut store = store();

        let request = RequestBuilder::build_write_single_register(1, 0, 7).unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());

        assert_eq!(outcome, Outcome::Dropped(DropReason::NotForUs));
        assert_eq!(outcome.len(), 0);
        assert!(tx.is_empty());
        assert_eq!(store.read(0x8000), Ok(0));
    }

    #[test]
    fn test_broadcast_is_not_answered() {
        let config = SlaveConfig::default();
        let mut store = store();

        let request = RequestBuilder::build_write_single_register(0, 0, 7).unwrap();
        let (outcome, _) = handle(&config, &mut store, request.as_slice());

        assert_eq!(outcome, Outcome::Dropped(DropReason::NotForUs));
        assert_eq!(store.read(0x8000), Ok(0));
    }

    #[test]
    fn test_crc_mismatch_and_short_frames_are_dropped() {
        let config = SlaveConfig::default();
        let mut store = store();

        let (outcome, _) = handle(&config, &mut store, &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x0A, 0x84]);
        assert_eq!(outcome, Outcome::Dropped(DropReason::CrcMismatch));

        let (outcome, _) = handle(&config, &mut store, &[0x01, 0x03, 0x00]);
        assert_eq!(outcome, Outcome::Dropped(DropReason::TooShort));

        // Valid CRC, but a read needs six body bytes
        let request = RequestBuilder::build_raw(1, 0x03, &[0x00]).unwrap();
        let (outcome, tx) = handle(&config, &mut store, request.as_slice());
        assert_eq!(outcome, Outcome::Dropped(DropReason::TooShort));
        assert!(tx.is_empty());
    }

    #[test]
    fn test_previous_response_is_cleared() {
        let config = SlaveConfig::default();
        let mut store = store();
        let mut tx = FrameBuffer::from_slice(&[0xEE; 40]).unwrap();

        let request = RequestBuilder::build_write_single_register(1, 0, 1).unwrap();
        let outcome = process_request(&config, &mut store, request.as_slice(), &mut tx);

        assert_eq!(outcome.len(), 8);
        assert!(tx.window(40)[8..].iter().all(|&b| b == 0));
    }
}
