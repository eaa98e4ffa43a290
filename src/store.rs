//! # Register Store Adapter
//!
//! Translates a (function code, wire address) pair into a storage address and
//! performs 32-bit cell accesses against a [`RegisterStore`].
//!
//! ## Address Composition
//!
//! Each function family maps to one base offset ([`MemoryMap`]); the storage
//! address is `base | wire_address`. The coil space and the register space
//! must not overlap in their low bits. That is a property of the deployment's
//! memory layout and cannot be checked here.
//!
//! ## Cell Width
//!
//! A cell holds 32 bits, i.e. two wire registers, and spans two
//! consecutive storage addresses. Register pair `k` of a request that starts
//! at storage address `A` lives in the cell at `A + 2k`. An odd address
//! names the same cell as the even address below it.

use core::ptr::NonNull;

use crate::constants::{
    DEFAULT_COIL_BASE, DEFAULT_REGISTER_BASE, FC_READ_COILS, FC_READ_DISCRETE_INPUTS,
    FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS, FC_WRITE_MULTIPLE_COILS,
    FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, WORDS_PER_CELL,
};
use crate::error::{SlaveError, SlaveResult};

/// Base offsets of the two function-code families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryMap {
    /// Base of the coil / discrete input space (FC01, FC02, FC05, FC15)
    pub coil_base: u32,
    /// Base of the holding / input register space (FC03, FC04, FC06, FC16)
    pub register_base: u32,
}

impl MemoryMap {
    /// Create a map with explicit bases.
    pub const fn new(coil_base: u32, register_base: u32) -> Self {
        Self {
            coil_base,
            register_base,
        }
    }

    /// Base offset for a function code.
    ///
    /// Unknown codes map to 0.
    pub fn base_for(&self, function_code: u8) -> u32 {
        match function_code {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS | FC_WRITE_SINGLE_COIL
            | FC_WRITE_MULTIPLE_COILS => self.coil_base,
            FC_READ_HOLDING_REGISTERS
            | FC_READ_INPUT_REGISTERS
            | FC_WRITE_SINGLE_REGISTER
            | FC_WRITE_MULTIPLE_REGISTERS => self.register_base,
            _ => 0,
        }
    }

    /// Storage address of a wire address: `base | address`.
    #[inline]
    pub fn compose(&self, function_code: u8, address: u16) -> u32 {
        self.base_for(function_code) | address as u32
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new(DEFAULT_COIL_BASE, DEFAULT_REGISTER_BASE)
    }
}

/// Cell index of `address` in a window of `cells` cells starting at `start`.
fn cell_index(start: u32, cells: usize, address: u32) -> SlaveResult<usize> {
    address
        .checked_sub(start)
        .map(|offset| (offset / WORDS_PER_CELL) as usize)
        .filter(|&index| index < cells)
        .ok_or(SlaveError::AddressOutOfRange { address })
}

/// Addressable store of 32-bit cells.
///
/// `write` is the only way the core mutates device state.
pub trait RegisterStore {
    /// Whether `address` names a cell of this store.
    fn contains(&self, address: u32) -> bool;

    /// Read the cell at `address`.
    fn read(&self, address: u32) -> SlaveResult<u32>;

    /// Overwrite the cell at `address`.
    fn write(&mut self, address: u32, value: u32) -> SlaveResult<()>;
}

impl<S: RegisterStore + ?Sized> RegisterStore for &mut S {
    #[inline]
    fn contains(&self, address: u32) -> bool {
        (**self).contains(address)
    }

    #[inline]
    fn read(&self, address: u32) -> SlaveResult<u32> {
        (**self).read(address)
    }

    #[inline]
    fn write(&mut self, address: u32, value: u32) -> SlaveResult<()> {
        (**self).write(address, value)
    }
}

/// Fixed window of `N` cells starting at `start`.
///
/// The window answers storage addresses `start..start + 2 * N`.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_slave::{InMemoryStore, RegisterStore};
///
/// let mut store = InMemoryStore::<16>::new(0x8000);
/// store.write(0x8002, 0x1234_5678).unwrap();
/// assert_eq!(store.read(0x8003).unwrap(), 0x1234_5678);
/// assert_eq!(store.cells()[1], 0x1234_5678);
/// assert!(store.contains(0x801F));
/// assert!(!store.contains(0x8020));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryStore<const N: usize> {
    start: u32,
    cells: [u32; N],
}

impl<const N: usize> InMemoryStore<N> {
    /// Zero-filled window starting at `start`
    pub const fn new(start: u32) -> Self {
        Self {
            start,
            cells: [0; N],
        }
    }

    /// First address of the window
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Raw cell contents
    pub fn cells(&self) -> &[u32; N] {
        &self.cells
    }

    fn index(&self, address: u32) -> SlaveResult<usize> {
        cell_index(self.start, N, address)
    }
}

impl<const N: usize> RegisterStore for InMemoryStore<N> {
    fn contains(&self, address: u32) -> bool {
        self.index(address).is_ok()
    }

    fn read(&self, address: u32) -> SlaveResult<u32> {
        Ok(self.cells[self.index(address)?])
    }

    fn write(&mut self, address: u32, value: u32) -> SlaveResult<()> {
        let index = self.index(address)?;
        self.cells[index] = value;
        Ok(())
    }
}

/// Memory-mapped cell array accessed with volatile reads and writes.
///
/// Storage addresses `start + 2i` and `start + 2i + 1` both map to
/// `base.add(i)`.
#[derive(Debug)]
pub struct MmioStore {
    base: NonNull<u32>,
    start: u32,
    len: u32,
}

impl MmioStore {
    /// Wrap `len` cells at `base`, answering storage addresses
    /// `start..start + 2 * len`.
    ///
    /// Returns `None` for a null `base`.
    ///
    /// # Safety
    ///
    /// `base` must be valid for volatile reads and writes of `len`
    /// consecutive, properly aligned `u32` cells for as long as the store
    /// lives, and nothing else may create Rust references to that memory.
    pub unsafe fn new(base: *mut u32, start: u32, len: u32) -> Option<Self> {
        NonNull::new(base).map(|base| Self { base, start, len })
    }

    fn offset(&self, address: u32) -> SlaveResult<usize> {
        cell_index(self.start, self.len as usize, address)
    }
}

impl RegisterStore for MmioStore {
    fn contains(&self, address: u32) -> bool {
        self.offset(address).is_ok()
    }

    fn read(&self, address: u32) -> SlaveResult<u32> {
        let offset = self.offset(address)?;
        // SAFETY: offset < len, and the constructor's contract covers len cells.
        Ok(unsafe { self.base.as_ptr().add(offset).read_volatile() })
    }

    fn write(&mut self, address: u32, value: u32) -> SlaveResult<()> {
        let offset = self.offset(address)?;
        // SAFETY: as in `read`.
        unsafe { self.base.as_ptr().add(offset).write_volatile(value) };
        Ok(())
    }
}
