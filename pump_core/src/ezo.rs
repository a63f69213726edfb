//! EZO probe command façade (C3, §4.5), grounded on the mbed `EZO` class.
//!
//! Every method issues one ASCII command over [`I2cProbe`], waits the
//! command's fixed delay, and decodes the status byte. Unlike the mbed
//! source, commands are built with `format!` rather than hand-packed byte
//! arrays, which incidentally avoids two bugs present there: `Tcompensation`
//! packed raw decimal digit *values* instead of ASCII digit characters, and
//! `changeUART` indexed digit slots that were never written for bauds under
//! four digits. `QTcompensation`'s command byte is explicitly the `?`
//! query character at index 2, per the open-question resolution recorded in
//! `DESIGN.md` (the source left that byte uninitialized).

use pump_common::consts::ezo_delay_ms;
use pump_common::hal::{EzoStatus, HalError, I2cProbe};
use pump_common::protocol::unpack_str;

/// Outcome of a query-style EZO command whose payload is a short ASCII
/// string (device info, status, calibration query, slope).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EzoTextReply {
    /// Well-formed payload string.
    Ok(String),
    /// Command still processing.
    Pending,
    /// No data available.
    NoData,
    /// Command failed.
    Failed,
}

fn exchange(
    probe: &mut impl I2cProbe,
    command: &str,
    delay_ms: u32,
) -> Result<(EzoStatus, Vec<u8>), HalError> {
    let response = probe.command(command, delay_ms)?;
    let status = EzoStatus::from_byte(*response.first().unwrap_or(&0));
    Ok((status, response))
}

fn text_reply(status: EzoStatus, payload: &[u8]) -> EzoTextReply {
    match status {
        EzoStatus::Ok => EzoTextReply::Ok(unpack_str(payload)),
        EzoStatus::Pending => EzoTextReply::Pending,
        EzoStatus::NoData => EzoTextReply::NoData,
        EzoStatus::Failed(_) => EzoTextReply::Failed,
    }
}

/// `T,<value>` — set temperature compensation.
pub fn set_temperature_compensation(probe: &mut impl I2cProbe, celsius: f32) -> Result<bool, HalError> {
    let cmd = format!("T,{celsius:.2}");
    let (status, _) = exchange(probe, &cmd, ezo_delay_ms::DEFAULT)?;
    Ok(status == EzoStatus::Ok)
}

/// `T,?` — query temperature compensation.
pub fn query_temperature_compensation(probe: &mut impl I2cProbe) -> Result<Option<f32>, HalError> {
    let (status, resp) = exchange(probe, "T,?", ezo_delay_ms::DEFAULT)?;
    if status != EzoStatus::Ok {
        return Ok(None);
    }
    Ok(unpack_str(&resp[1..]).split(',').nth(1).and_then(|v| v.parse().ok()))
}

/// `I` — device information string.
pub fn get_sensor_info(probe: &mut impl I2cProbe) -> Result<EzoTextReply, HalError> {
    let (status, resp) = exchange(probe, "I", ezo_delay_ms::DEFAULT)?;
    Ok(text_reply(status, resp.get(1..).unwrap_or(&[])))
}

/// `STATUS` — device status string.
pub fn get_sensor_status(probe: &mut impl I2cProbe) -> Result<EzoTextReply, HalError> {
    let (status, resp) = exchange(probe, "STATUS", ezo_delay_ms::DEFAULT)?;
    Ok(text_reply(status, resp.get(1..).unwrap_or(&[])))
}

/// `R` — issue a read and block for the read's fixed delay, returning the
/// parsed value directly (used outside the async `SEND_READ_CMD` flow).
pub fn read(probe: &mut impl I2cProbe) -> Result<Option<f32>, HalError> {
    let (status, resp) = exchange(probe, "R", ezo_delay_ms::READ)?;
    if status != EzoStatus::Ok {
        return Ok(None);
    }
    Ok(unpack_str(&resp[1..]).parse().ok())
}

/// `R` — fire the read command without waiting for the probe to finish
/// converting. The commanded-read flow (§4.3) arms a 1 s soft-timer deadline
/// and collects the value later with [`receive_reading`].
pub fn send_read_cmd(probe: &mut impl I2cProbe) -> Result<(), HalError> {
    probe.write_only("R")
}

/// Collect the reading armed by [`send_read_cmd`] once its deadline has
/// elapsed, without reissuing the command.
pub fn receive_reading(probe: &mut impl I2cProbe) -> Result<Option<f32>, HalError> {
    let resp = probe.read_only()?;
    let status = EzoStatus::from_byte(*resp.first().unwrap_or(&0));
    if status != EzoStatus::Ok {
        return Ok(None);
    }
    Ok(unpack_str(&resp[1..]).parse().ok())
}

/// `L,{0,1}` — set the sensor LED.
pub fn set_led(probe: &mut impl I2cProbe, on: bool) -> Result<bool, HalError> {
    let cmd = if on { "L,1" } else { "L,0" };
    let (status, _) = exchange(probe, cmd, ezo_delay_ms::DEFAULT)?;
    Ok(status == EzoStatus::Ok)
}

/// `L,?` — query the sensor LED state.
///
/// Per the documented resolution for this query's ambiguous source
/// behavior: returns the raw queried bit from a well-formed response, `None`
/// for any other status.
pub fn query_led(probe: &mut impl I2cProbe) -> Result<Option<bool>, HalError> {
    let (status, resp) = exchange(probe, "L,?", ezo_delay_ms::DEFAULT)?;
    if status != EzoStatus::Ok {
        return Ok(None);
    }
    Ok(unpack_str(&resp[1..]).split(',').next_back().map(|v| v.trim() == "1"))
}

/// `Cal,clear` — clear all calibration points.
pub fn calibration_clear(probe: &mut impl I2cProbe) -> Result<bool, HalError> {
    let (status, _) = exchange(probe, "Cal,clear", ezo_delay_ms::DEFAULT)?;
    Ok(status == EzoStatus::Ok)
}

/// `Cal,low,<value>` — low-point calibration.
pub fn calibrate_low(probe: &mut impl I2cProbe, value: f32) -> Result<bool, HalError> {
    let cmd = format!("Cal,low,{value:.2}");
    let (status, _) = exchange(probe, &cmd, ezo_delay_ms::CALIBRATION)?;
    Ok(status == EzoStatus::Ok)
}

/// `Cal,mid,<value>` — mid-point calibration.
pub fn calibrate_mid(probe: &mut impl I2cProbe, value: f32) -> Result<bool, HalError> {
    let cmd = format!("Cal,mid,{value:.2}");
    let (status, _) = exchange(probe, &cmd, ezo_delay_ms::CALIBRATION)?;
    Ok(status == EzoStatus::Ok)
}

/// `Cal,high,<value>` — high-point calibration.
pub fn calibrate_high(probe: &mut impl I2cProbe, value: f32) -> Result<bool, HalError> {
    let cmd = format!("Cal,high,{value:.2}");
    let (status, _) = exchange(probe, &cmd, ezo_delay_ms::CALIBRATION)?;
    Ok(status == EzoStatus::Ok)
}

/// `Factory` — factory reset.
pub fn factory_reset(probe: &mut impl I2cProbe) -> Result<bool, HalError> {
    let (status, _) = exchange(probe, "Factory", ezo_delay_ms::DEFAULT)?;
    Ok(status == EzoStatus::Ok)
}

/// `I2C,<address>` — reassign the probe's bus address. The caller must
/// update its own handle's address afterward (§4.4).
pub fn set_address(probe: &mut impl I2cProbe, address: u8) -> Result<bool, HalError> {
    let cmd = format!("I2C,{address}");
    let (status, _) = exchange(probe, &cmd, ezo_delay_ms::DEFAULT)?;
    if status == EzoStatus::Ok {
        probe.set_bus_address(address);
    }
    Ok(status == EzoStatus::Ok)
}

/// `PLOCK,{0,1}` — enable/disable protocol lock (I²C-only mode).
pub fn set_protocol_lock(probe: &mut impl I2cProbe, on: bool) -> Result<bool, HalError> {
    let cmd = if on { "PLOCK,1" } else { "PLOCK,0" };
    let (status, _) = exchange(probe, cmd, ezo_delay_ms::DEFAULT)?;
    Ok(status == EzoStatus::Ok)
}

/// `PLOCK,?` — query protocol lock state.
///
/// Same resolution as [`query_led`]: raw queried bit on success, `None`
/// otherwise.
pub fn query_protocol_lock(probe: &mut impl I2cProbe) -> Result<Option<bool>, HalError> {
    let (status, resp) = exchange(probe, "PLOCK,?", ezo_delay_ms::DEFAULT)?;
    if status != EzoStatus::Ok {
        return Ok(None);
    }
    Ok(unpack_str(&resp[1..]).split(',').next_back().map(|v| v.trim() == "1"))
}

/// `SERIAL,<baud>` — switch the probe to UART mode at the given baud rate.
/// Emits ordinary base-10 ASCII, per the documented open-question
/// resolution (the source's digit-packing logic is buggy).
pub fn change_uart(probe: &mut impl I2cProbe, baud_rate: u32) -> Result<(), HalError> {
    let cmd = format!("SERIAL,{baud_rate}");
    probe.command(&cmd, ezo_delay_ms::DEFAULT)?;
    Ok(())
}
