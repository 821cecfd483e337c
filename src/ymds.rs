//! IRIS YMDS timestamps and time-zone strings.
//!
//! Raw product files carry time as a 12-byte year/month/day/seconds
//! structure. The milliseconds field doubles as a flag word: the low ten
//! bits are milliseconds, bit 10 is the DST flag, bit 11 distinguishes UTC
//! from local time, and bit 12 says whether local time is in DST.

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, FixedOffset, NaiveDate};
use std::fmt;
use std::io::{Read, Write};

const MILLISECONDS_MASK: u16 = 0x03FF;
const DST_FLAG: u16 = 0x0400;
const UTC_FLAG: u16 = 0x0800;
const LOCAL_DST_FLAG: u16 = 0x1000;

/// The on-disk size of a [Ymds] in bytes.
pub const YMDS_SIZE: usize = 12;

/// The length of the wire protocol's time-zone string.
pub const TIME_ZONE_LEN: usize = 11;

/// A year/month/day/seconds timestamp as stored in raw product files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ymds {
    /// Seconds since midnight.
    pub seconds: i32,
    /// Milliseconds plus the DST/UTC flag bits.
    pub milliseconds: u16,
    /// Four-digit year.
    pub year: u16,
    /// Month of the year, 1-12.
    pub month: u16,
    /// Day of the month, 1-31.
    pub day: u16,
}

impl Ymds {
    /// Creates a timestamp from a date and seconds-plus-milliseconds of day.
    pub fn new(year: u16, month: u16, day: u16, seconds: i32, milliseconds: u16) -> Ymds {
        Ymds {
            seconds,
            milliseconds: milliseconds & MILLISECONDS_MASK,
            year,
            month,
            day,
        }
    }

    /// Reads a timestamp from a little-endian byte source.
    pub fn read_from<R: Read>(read: &mut R) -> Result<Ymds> {
        Ok(Ymds {
            seconds: read.read_i32::<LittleEndian>()?,
            milliseconds: read.read_u16::<LittleEndian>()?,
            year: read.read_u16::<LittleEndian>()?,
            month: read.read_u16::<LittleEndian>()?,
            day: read.read_u16::<LittleEndian>()?,
        })
    }

    /// Writes this timestamp in its on-disk form.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        write.write_i32::<LittleEndian>(self.seconds)?;
        write.write_u16::<LittleEndian>(self.milliseconds)?;
        write.write_u16::<LittleEndian>(self.year)?;
        write.write_u16::<LittleEndian>(self.month)?;
        write.write_u16::<LittleEndian>(self.day)?;
        Ok(())
    }

    /// Milliseconds past the whole second, 0-999.
    pub fn millis(&self) -> u16 {
        self.milliseconds & MILLISECONDS_MASK
    }

    /// True if the time was recorded during daylight saving time.
    pub fn is_dst(&self) -> bool {
        self.milliseconds & DST_FLAG != 0
    }

    /// True if the time is UTC rather than radar-local.
    pub fn is_utc(&self) -> bool {
        self.milliseconds & UTC_FLAG != 0
    }

    /// True if the radar's local time zone was in daylight saving time.
    pub fn local_is_dst(&self) -> bool {
        self.milliseconds & LOCAL_DST_FLAG != 0
    }

    /// True if every field is zero, the raw files' "no time" marker.
    pub fn is_zero(&self) -> bool {
        *self == Ymds::default()
    }

    /// Converts to seconds since the Unix epoch in the stated zone.
    ///
    /// The result is monotonic in the timestamp and carries millisecond
    /// resolution in its fractional part.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigmet::Ymds;
    /// let ymds = Ymds::new(1970, 1, 2, 60, 500);
    /// assert_eq!(86460.5, ymds.to_unix_seconds().unwrap());
    /// ```
    pub fn to_unix_seconds(&self) -> Result<f64> {
        let date = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .ok_or_else(|| {
            Error::MalformedHeader(format!(
                "{}-{}-{} is not a calendar date",
                self.year, self.month, self.day
            ))
        })?;
        let days = i64::from(date.num_days_from_ce()) - i64::from(EPOCH_DAYS_FROM_CE);
        Ok((days * 86_400 + i64::from(self.seconds)) as f64 + f64::from(self.millis()) / 1000.0)
    }
}

// chrono's day count for 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

impl fmt::Display for Ymds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year,
            self.month,
            self.day,
            self.seconds / 3600,
            self.seconds / 60 % 60,
            self.seconds % 60,
            self.millis()
        )
    }
}

/// The wire protocol's eleven-byte time-zone string.
///
/// The grammar is `"UTC"? sign hours ":" minutes`, e.g. `"UTC-05:00"`. A
/// blank string means radar-local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeZoneSpec {
    minutes_east: Option<i32>,
}

impl TimeZoneSpec {
    /// A radar-local (blank) time zone.
    pub fn local() -> TimeZoneSpec {
        TimeZoneSpec { minutes_east: None }
    }

    /// Creates a spec from an offset in minutes east of UTC.
    pub fn from_minutes_east(minutes: i32) -> TimeZoneSpec {
        TimeZoneSpec {
            minutes_east: Some(minutes),
        }
    }

    /// Returns the offset in minutes east of UTC, if stated.
    pub fn minutes_east(&self) -> Option<i32> {
        self.minutes_east
    }

    /// Encodes into the fixed eleven-byte wire form, zero padded.
    pub fn to_wire(self) -> [u8; TIME_ZONE_LEN] {
        let mut wire = [0u8; TIME_ZONE_LEN];
        if let Some(minutes) = self.minutes_east {
            let sign = if minutes < 0 { '-' } else { '+' };
            let magnitude = minutes.abs();
            let text = format!("UTC{}{:02}:{:02}", sign, magnitude / 60, magnitude % 60);
            for (slot, byte) in wire.iter_mut().zip(text.bytes()) {
                *slot = byte;
            }
        }
        wire
    }

    /// Parses the wire form; a blank field is radar-local.
    pub fn from_wire(wire: &[u8; TIME_ZONE_LEN]) -> Result<TimeZoneSpec> {
        let end = wire.iter().position(|&b| b == 0).unwrap_or(TIME_ZONE_LEN);
        let text = std::str::from_utf8(&wire[..end])
            .map_err(|_| Error::Protocol("time zone string is not ASCII".to_string()))?
            .trim();
        if text.is_empty() {
            return Ok(TimeZoneSpec::local());
        }
        let rest = text.strip_prefix("UTC").unwrap_or(text);
        let negative = rest.starts_with('-');
        let (hours, minutes) = rest
            .split_once(':')
            .ok_or_else(|| Error::Protocol(format!("malformed time zone string {:?}", text)))?;
        let hours: i32 = hours
            .parse()
            .map_err(|_| Error::Protocol(format!("malformed time zone hours {:?}", text)))?;
        // Some writers sign both components ("UTC-11:-59"); the minutes
        // magnitude is what counts.
        let minutes: i32 = minutes
            .trim_start_matches(['+', '-'])
            .parse()
            .map_err(|_| Error::Protocol(format!("malformed time zone minutes {:?}", text)))?;
        let total = hours.abs() * 60 + minutes.abs();
        Ok(TimeZoneSpec::from_minutes_east(if negative {
            -total
        } else {
            total
        }))
    }

    /// The chrono offset for formatting times, UTC when radar-local.
    pub fn to_fixed_offset(self) -> FixedOffset {
        use chrono::Offset;
        self.minutes_east
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
            .unwrap_or_else(|| chrono::Utc.fix())
    }
}

impl fmt::Display for TimeZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wire = self.to_wire();
        let end = wire.iter().position(|&b| b == 0).unwrap_or(TIME_ZONE_LEN);
        f.write_str(std::str::from_utf8(&wire[..end]).unwrap_or(""))
    }
}
