//! Common wire-level data types shared between the codec and core crates.

use binrw::{Endian, prelude::*};
use rand::RngCore;
use std::io::{Read, Seek, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// A 16-byte globally unique identifier, as used for the server and client GUIDs
/// on the wire (MS-DTYP 2.3.4.2).
///
/// Generated once per process via [`Guid::generate`] and otherwise opaque --
/// the core never interprets its bytes, only compares and round-trips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid([u8; 16]);

impl Guid {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Guid(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl BinRead for Guid {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let mut bytes = [0u8; 16];
        reader.read_exact(&mut bytes)?;
        Ok(Guid(bytes))
    }
}

impl BinWrite for Guid {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

/// Windows FILETIME: 100-ns ticks since 1601-01-01 UTC, unsigned 64-bit LE.
///
/// Reference: MS-DTYP 2.3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FileTime(u64);

/// Number of 100ns ticks between the Windows epoch (1601-01-01) and the
/// Unix epoch (1970-01-01).
const UNIX_EPOCH_OFFSET_TICKS: u64 = 116_444_736_000_000_000;

impl FileTime {
    pub const ZERO: FileTime = FileTime(0);

    pub const fn from_ticks(ticks: u64) -> Self {
        FileTime(ticks)
    }

    pub const fn ticks(&self) -> u64 {
        self.0
    }

    /// Current wall-clock time as a FILETIME. Saturates to zero if the
    /// system clock somehow predates the Unix epoch.
    pub fn now() -> Self {
        let since_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let ticks = since_unix.as_nanos() as u64 / 100 + UNIX_EPOCH_OFFSET_TICKS;
        FileTime(ticks)
    }
}

impl BinRead for FileTime {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        Ok(FileTime(u64::read_options(reader, endian, ())?))
    }
}

impl BinWrite for FileTime {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        self.0.write_options(writer, endian, ())
    }
}
