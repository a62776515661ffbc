//! SMA inverter over Modbus TCP.
//!
//! All relevant registers are 32-bit and span two words, high word first.

use std::time::Duration;

use sgready_quantities::{Percent, Watts};
use tokio::{
    net::{TcpStream, lookup_host},
    time::timeout,
};
use tokio_modbus::{
    Slave,
    client::{Reader, tcp::attach_slave},
};

use crate::prelude::*;

/// Holding register addresses.
#[derive(Copy, Clone, Debug)]
pub struct Registers {
    pub state_of_charge: u16,
    pub battery_capacity: u16,
    pub active_power: u16,
    pub battery_charging: u16,
    pub battery_discharging: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            state_of_charge: 30845,
            battery_capacity: 30847,
            active_power: 30775,
            battery_charging: 31393,
            battery_discharging: 31395,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InverterState {
    pub state_of_charge: Percent,

    /// Zero when there is no battery behind the inverter.
    pub battery_capacity: Percent,

    pub active_power: Watts,
    pub battery_charging: Watts,
    pub battery_discharging: Watts,
}

impl InverterState {
    #[must_use]
    pub fn has_battery(&self) -> bool {
        self.battery_capacity > Percent::ZERO
    }

    /// Power the installation generates: what the inverter outputs plus what goes into the
    /// battery, minus what comes out of it.
    pub fn generator_power(&self) -> Watts {
        self.active_power + self.battery_charging - self.battery_discharging.abs()
    }
}

pub struct Client {
    context: tokio_modbus::client::Context,
    registers: Registers,
}

impl Client {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const READ_TIMEOUT: Duration = Duration::from_secs(10);

    /// Signed 32-bit "not available" marker.
    const NAN_S32: u32 = 0x8000_0000;

    /// Unsigned 32-bit "not available" marker.
    const NAN_U32: u32 = 0xFFFF_FFFF;

    #[instrument(skip_all, fields(address = address, slave_id = slave_id))]
    pub async fn connect(address: &str, slave_id: u8, registers: Registers) -> Result<Self> {
        info!("connecting…");
        let addresses: Vec<_> = lookup_host(address)
            .await
            .with_context(|| format!("failed to resolve `{address}`"))?
            .collect();
        ensure!(!addresses.is_empty(), "`{address}` resolved to no addresses");
        let tcp_stream = timeout(Self::CONNECT_TIMEOUT, TcpStream::connect(&*addresses))
            .await
            .context("timeout connecting to the inverter")?
            .context("failed to connect to the inverter")?;
        info!("connected");
        Ok(Self { context: attach_slave(tcp_stream, Slave(slave_id)), registers })
    }

    #[instrument(skip_all)]
    pub async fn read_state(&mut self) -> Result<InverterState> {
        let registers = self.registers;
        let state = InverterState {
            state_of_charge: Percent::from(f64::from(
                self.read_u32(registers.state_of_charge).await?,
            )),
            battery_capacity: Percent::from(f64::from(
                self.read_u32(registers.battery_capacity).await?,
            )),
            active_power: Watts::from(self.read_s32(registers.active_power).await?),
            battery_charging: Watts::from(f64::from(
                self.read_u32(registers.battery_charging).await?,
            )),
            battery_discharging: Watts::from(f64::from(
                self.read_u32(registers.battery_discharging).await?,
            )),
        };
        debug!(?state, generator_power = ?state.generator_power(), "read");
        Ok(state)
    }

    async fn read_u32(&mut self, address: u16) -> Result<u32> {
        Ok(Self::u32_or_zero(self.read_double_word(address).await?))
    }

    async fn read_s32(&mut self, address: u16) -> Result<i32> {
        Ok(Self::s32_or_zero(self.read_double_word(address).await?))
    }

    #[instrument(skip_all, level = "debug", fields(address = address))]
    async fn read_double_word(&mut self, address: u16) -> Result<u32> {
        const N_WORDS: u16 = 2;
        let words = timeout(Self::READ_TIMEOUT, self.context.read_holding_registers(address, N_WORDS))
            .await
            .context("timeout reading the register")???;
        ensure!(
            words.len() == usize::from(N_WORDS),
            "read {} words from #{address} while expected {N_WORDS}",
            words.len(),
        );
        Ok(u32::from(words[0]) << 16 | u32::from(words[1]))
    }

    const fn u32_or_zero(raw: u32) -> u32 {
        if raw == Self::NAN_U32 { 0 } else { raw }
    }

    #[expect(clippy::cast_possible_wrap)]
    const fn s32_or_zero(raw: u32) -> i32 {
        if raw == Self::NAN_S32 { 0 } else { raw as i32 }
    }
}
