//! The `async_trans` co-simulation test sequence.

use log::error;

use crate::error::{Result, TransactorError};
use crate::tick::TestOutcome;
use crate::transaction::Width;
use crate::transactor::Transactor;

pub const TEST_NAME: &str = "CoSim_async_trans";

/// Exercises async single-beat writes at every width, async bursts,
/// decoupled address/data writes and reads, and pattern bursts, then ends
/// the test after ten settling cycles.
pub async fn async_trans(cosim: &mut Transactor) -> Result<TestOutcome> {
    let mut error = false;

    // 32-bit async writes, closed by a blocking write
    let addr = 0x8000_1000u32;
    let wdata32 = 0x12ff_34ddu32;
    for i in 0..3 {
        cosim.write_async(addr + i * 4, wdata32 + i)?;
    }
    cosim.write(addr + 12, wdata32 + 3).await?;
    for i in 0..4 {
        cosim.read_check(addr + i * 4, wdata32 + i).await?;
    }

    // 16-bit
    let addr = 0x8000_2000u32;
    let wdata16 = 0x95b3u16;
    for i in 0..3u16 {
        cosim.write_async(addr + u32::from(i) * 2, wdata16.wrapping_add(i * 0x1111))?;
    }
    cosim.write(addr + 6, wdata16.wrapping_add(3 * 0x1111)).await?;
    for i in 0..4u16 {
        cosim
            .read_check(addr + u32::from(i) * 2, wdata16.wrapping_add(i * 0x1111))
            .await?;
    }

    // 8-bit, starting off word alignment
    let addr = 0x8000_3001u32;
    let wdata8 = 0x17u8;
    for i in 0..3u8 {
        cosim.write_async(addr + u32::from(i), wdata8.wrapping_add(i * 0x22))?;
    }
    cosim.write(addr + 3, wdata8.wrapping_add(3 * 0x22)).await?;
    for i in 0..4u8 {
        cosim
            .read_check(addr + u32::from(i), wdata8.wrapping_add(i * 0x22))
            .await?;
    }

    // Async bursts, closed by a blocking burst
    let addr = 0x8000_4964u32;
    let wbuf: Vec<u8> = (0..128u32).map(|i| (0x23 + i * 3) as u8).collect();
    cosim.burst_write_async(addr, &wbuf[0..32])?;
    cosim.burst_write_async(addr + 32, &wbuf[32..64])?;
    cosim.burst_write_async(addr + 64, &wbuf[64..80])?;
    cosim.burst_write(addr + 80, &wbuf[80..128]).await?;

    let rbuf = cosim.burst_read(addr, 128).await?;
    for (got, exp) in rbuf.iter().zip(&wbuf) {
        if got != exp {
            error!("***ERROR: mismatch for async burst write. Got 0x{got:02x}, exp 0x{exp:02x}");
            error = true;
        }
    }

    // Decoupled write address and data
    let addr = 0x8001_0000u32;
    cosim.write_data_async(0xcafe_f00du32, None)?;
    cosim.write_data_async(0x0badu16, None)?;

    cosim.write_address_async(addr, Width::W32)?;
    cosim.write_address_async(addr + 4, Width::W16)?;
    cosim.write_address_async(addr + 6, Width::W16)?;
    for offset in 8..12 {
        cosim.write_address_async(addr + offset, Width::W8)?;
    }

    cosim.write_data_async(0x0fabu16, Some(2))?;
    cosim.write_data_async(0xaau8, Some(0))?;
    cosim.write_data_async(0x55u8, Some(1))?;
    cosim.write_data_async(0xbbu8, Some(2))?;
    cosim.write_data_async(0xddu8, Some(3))?;

    let expdata32 = [0xcafe_f00du32, 0x0fab_0bad, 0xddbb_55aa];
    for (i, &exp) in (0u32..).zip(&expdata32) {
        let got: u32 = cosim.read(addr + i * 4).await?;
        if got != exp {
            error!("***ERROR: mismatch for async write address/data. Got 0x{got:08x}, exp 0x{exp:08x}");
            error = true;
        }
    }

    // Decoupled read address and data
    for offset in 0..4 {
        cosim.read_address_async(addr + offset, Width::W8)?;
    }
    for exp in [0x0du8, 0xf0, 0xfe, 0xca] {
        cosim.read_data_check(exp).await?;
    }

    cosim.read_address_async(addr + 4, Width::W32)?;
    cosim.read_data_check(expdata32[1]).await?;

    cosim.read_address_async(addr + 8, Width::W16)?;
    cosim.read_address_async(addr + 10, Width::W16)?;
    for i in 0..2 {
        cosim
            .read_data_check((expdata32[2] >> (i * 16)) as u16)
            .await?;
    }

    // Increment and random pattern bursts
    let addr = 0x7009_1230u32;
    let seed = 0x57u8;
    cosim.burst_write_increment_async(addr, seed, 16)?;
    cosim.burst_write_increment(addr + 16, seed.wrapping_add(16), 32).await?;
    cosim.burst_read_check_increment(addr, seed, 48).await?;

    let addr = 0x5a96_07a8u32;
    let seed = 0xdfu8;
    cosim.burst_write_random_async(addr, seed, 64)?;
    cosim.burst_write_random(addr + 64, seed ^ 0xff, 48).await?;
    cosim.burst_read_check_random(addr, seed, 64).await?;
    cosim.burst_read_check_random(addr + 64, seed ^ 0xff, 48).await?;

    let node = cosim.node();
    cosim
        .tick(10, true, error)
        .await?
        .ok_or(TransactorError::Halted { node })
}
