use crate::{
    Result,
    constants::{ANY_PID, ANY_VID, DEFAULT_BAUD_RATE, SUPPORTED_DATA_BITS},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of stop bits framing each character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    /// Decode the CDC `bCharFormat` value (0 = 1, 1 = 1.5, 2 = 2).
    ///
    /// # Errors
    /// Returns `Error::InvalidStopBits` for any other code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(StopBits::One),
            1 => Ok(StopBits::OnePointFive),
            2 => Ok(StopBits::Two),
            _ => Err(Error::InvalidStopBits(code)),
        }
    }

    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            StopBits::One => 0,
            StopBits::OnePointFive => 1,
            StopBits::Two => 2,
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StopBits::One => write!(f, "1"),
            StopBits::OnePointFive => write!(f, "1.5"),
            StopBits::Two => write!(f, "2"),
        }
    }
}

/// Parity bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// Decode the CDC `bParityType` value (0 = none, 1 = odd, 2 = even,
    /// 3 = mark, 4 = space).
    ///
    /// # Errors
    /// Returns `Error::InvalidParity` for any other code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            3 => Ok(Parity::Mark),
            4 => Ok(Parity::Space),
            _ => Err(Error::InvalidParity(code)),
        }
    }

    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }

    /// Single-letter form used in the usual `8N1` shorthand.
    #[must_use]
    pub fn to_char(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }
}

/// Character width in bits. Only 8 is accepted by the supported drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DataBits(u8);

impl DataBits {
    pub const EIGHT: DataBits = DataBits(SUPPORTED_DATA_BITS);

    /// # Errors
    /// Returns `Error::UnsupportedDataBits` for anything but 8.
    pub fn new(bits: u8) -> Result<Self> {
        if bits != SUPPORTED_DATA_BITS {
            return Err(Error::UnsupportedDataBits(bits));
        }
        Ok(DataBits(bits))
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Default for DataBits {
    fn default() -> Self {
        Self::EIGHT
    }
}

impl TryFrom<u8> for DataBits {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        DataBits::new(bits)
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> u8 {
        bits.0
    }
}

/// Line coding in the layout of the CDC `SET_LINE_CODING` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLineCoding {
    pub dte_rate: u32,
    pub char_format: u8,
    pub parity_type: u8,
    pub data_bits: u8,
}

/// Serial framing applied to every newly attached adapter.
///
/// # Examples
///
/// ```
/// use hostserial_core::{LineConfiguration, Parity, StopBits};
///
/// let line = LineConfiguration::from_raw(115_200, 0, 0, 8).unwrap();
/// assert_eq!(line.stop_bits, StopBits::One);
/// assert_eq!(line.parity, Parity::None);
/// assert_eq!(line.to_string(), "115200 8N1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LineConfigurationFields")]
pub struct LineConfiguration {
    pub baud_rate: u32,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub data_bits: DataBits,
}

/// Unchecked wire form of [`LineConfiguration`].
#[derive(Deserialize)]
struct LineConfigurationFields {
    baud_rate: u32,
    stop_bits: StopBits,
    parity: Parity,
    data_bits: DataBits,
}

impl TryFrom<LineConfigurationFields> for LineConfiguration {
    type Error = Error;

    fn try_from(fields: LineConfigurationFields) -> Result<Self> {
        LineConfiguration::new(
            fields.baud_rate,
            fields.stop_bits,
            fields.parity,
            fields.data_bits,
        )
    }
}

impl LineConfiguration {
    /// # Errors
    /// Returns `Error::InvalidBaudRate` if `baud_rate` is zero.
    pub fn new(
        baud_rate: u32,
        stop_bits: StopBits,
        parity: Parity,
        data_bits: DataBits,
    ) -> Result<Self> {
        if baud_rate == 0 {
            return Err(Error::InvalidBaudRate(baud_rate));
        }
        Ok(Self {
            baud_rate,
            stop_bits,
            parity,
            data_bits,
        })
    }

    /// Build from the numeric codes used by the CDC line coding request.
    ///
    /// # Errors
    /// Returns an error if any code is out of range or the baud rate is zero.
    pub fn from_raw(baud_rate: u32, stop_bits: u8, parity: u8, data_bits: u8) -> Result<Self> {
        Self::new(
            baud_rate,
            StopBits::from_code(stop_bits)?,
            Parity::from_code(parity)?,
            DataBits::new(data_bits)?,
        )
    }

    #[must_use]
    pub fn to_raw(&self) -> RawLineCoding {
        RawLineCoding {
            dte_rate: self.baud_rate,
            char_format: self.stop_bits.code(),
            parity_type: self.parity.code(),
            data_bits: self.data_bits.as_u8(),
        }
    }
}

impl Default for LineConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            stop_bits: StopBits::One,
            parity: Parity::None,
            data_bits: DataBits::EIGHT,
        }
    }
}

impl fmt::Display for LineConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}{}{}",
            self.baud_rate,
            self.data_bits.as_u8(),
            self.parity.to_char(),
            self.stop_bits
        )
    }
}

/// Which attached adapter the transport is willing to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceFilter {
    /// First adapter any registered driver accepts.
    #[default]
    Any,

    /// Only an adapter with this vendor/product pair. A wildcard
    /// ([`ANY_VID`]/[`ANY_PID`]) in either position matches anything.
    VidPid { vid: u16, pid: u16 },
}

impl DeviceFilter {
    /// Mirrors the `(vid, pid)` constructor of the adapter API: two
    /// wildcards collapse to [`DeviceFilter::Any`].
    #[must_use]
    pub fn from_ids(vid: u16, pid: u16) -> Self {
        if vid == ANY_VID && pid == ANY_PID {
            DeviceFilter::Any
        } else {
            DeviceFilter::VidPid { vid, pid }
        }
    }

    #[must_use]
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        match *self {
            DeviceFilter::Any => true,
            DeviceFilter::VidPid {
                vid: want_vid,
                pid: want_pid,
            } => {
                (want_vid == ANY_VID || want_vid == vid) && (want_pid == ANY_PID || want_pid == pid)
            }
        }
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceFilter::Any => write!(f, "any"),
            DeviceFilter::VidPid { vid, pid } => write!(f, "{vid:04x}:{pid:04x}"),
        }
    }
}

/// USB-to-serial chip families with a VCP driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipFamily {
    /// FTDI FT23x.
    Ftdi,
    /// Silicon Labs CP210x.
    Cp210x,
    /// WCH CH34x.
    Ch34x,
}

impl ChipFamily {
    pub const ALL: [ChipFamily; 3] = [ChipFamily::Ftdi, ChipFamily::Cp210x, ChipFamily::Ch34x];

    /// USB vendor id the family's driver claims.
    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        match self {
            ChipFamily::Ftdi => 0x0403,
            ChipFamily::Cp210x => 0x10c4,
            ChipFamily::Ch34x => 0x1a86,
        }
    }

    #[must_use]
    pub fn from_vendor_id(vid: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|chip| chip.vendor_id() == vid)
    }
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChipFamily::Ftdi => write!(f, "FT23x"),
            ChipFamily::Cp210x => write!(f, "CP210x"),
            ChipFamily::Ch34x => write!(f, "CH34x"),
        }
    }
}
