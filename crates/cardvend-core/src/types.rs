use crate::{
    Result,
    constants::{MAX_PASSWORD_LENGTH, TIME_ENTRY_DIGITS},
    error::Error,
};
use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Identity of one of the two redundant card dispenser units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitId {
    A,
    B,
}

impl UnitId {
    /// Both units, in polling order.
    pub const ALL: [UnitId; 2] = [UnitId::A, UnitId::B];

    /// The other unit of the pair.
    #[inline]
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            UnitId::A => UnitId::B,
            UnitId::B => UnitId::A,
        }
    }

    /// Zero-based index, stable across the pair (A=0, B=1).
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            UnitId::A => 0,
            UnitId::B => 1,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnitId::A => write!(f, "TCD-A"),
            UnitId::B => write!(f, "TCD-B"),
        }
    }
}

/// Bill denomination, identified by its wire code (1-7).
///
/// The acceptor reports a bill type code in every accepted-bill event; the
/// mapping to currency value is fixed:
///
/// | Code | Value   |
/// |------|---------|
/// | 1    | 2 000   |
/// | 2    | 5 000   |
/// | 3    | 10 000  |
/// | 4    | 20 000  |
/// | 5    | 50 000  |
/// | 6    | 100 000 |
/// | 7    | 200 000 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Denomination(u8);

impl Denomination {
    const VALUES: [u32; 7] = [2_000, 5_000, 10_000, 20_000, 50_000, 100_000, 200_000];

    /// Create a denomination from its wire code.
    ///
    /// # Errors
    /// Returns `Error::UnknownDenomination` if the code is outside 1-7.
    pub fn from_code(code: u8) -> Result<Self> {
        if !(1..=7).contains(&code) {
            return Err(Error::UnknownDenomination(code));
        }
        Ok(Denomination(code))
    }

    /// The raw wire code (1-7).
    #[inline]
    #[must_use]
    pub fn code(self) -> u8 {
        self.0
    }

    /// The mapped currency value.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardvend_core::Denomination;
    ///
    /// let bill = Denomination::from_code(4).unwrap();
    /// assert_eq!(bill.value(), 20_000);
    /// ```
    #[inline]
    #[must_use]
    pub fn value(self) -> u32 {
        Self::VALUES[(self.0 - 1) as usize]
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Where the acceptor routed a bill, from the accepted-bill event.
///
/// Only `Stacked` credits the balance; `EscrowPosition` requires an
/// escrow-accept echo back to the acceptor. The remaining codes are
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BillRouting {
    Stacked = 0x00,
    EscrowPosition = 0x01,
    Returned = 0x02,
    ToRecycler = 0x03,
    RejectedDisabled = 0x04,
    ToRecyclerManual = 0x05,
    ManualDispense = 0x06,
    TransferredToCashbox = 0x07,
}

impl BillRouting {
    /// Create a routing from its wire code.
    ///
    /// # Errors
    /// Returns `Error::UnknownRouting` for codes above 0x07.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(BillRouting::Stacked),
            0x01 => Ok(BillRouting::EscrowPosition),
            0x02 => Ok(BillRouting::Returned),
            0x03 => Ok(BillRouting::ToRecycler),
            0x04 => Ok(BillRouting::RejectedDisabled),
            0x05 => Ok(BillRouting::ToRecyclerManual),
            0x06 => Ok(BillRouting::ManualDispense),
            0x07 => Ok(BillRouting::TransferredToCashbox),
            _ => Err(Error::UnknownRouting(code)),
        }
    }

    /// The raw wire code.
    #[inline]
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for BillRouting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            BillRouting::Stacked => "stacked",
            BillRouting::EscrowPosition => "escrow position",
            BillRouting::Returned => "returned",
            BillRouting::ToRecycler => "to recycler",
            BillRouting::RejectedDisabled => "rejected while disabled",
            BillRouting::ToRecyclerManual => "to recycler (manual)",
            BillRouting::ManualDispense => "manual dispense",
            BillRouting::TransferredToCashbox => "transferred to cashbox",
        };
        write!(f, "{name}")
    }
}

/// Acceptor status taxonomy, reported in status-type poll events.
///
/// Codes follow the MDB bill validator activity byte: 0x01-0x0D are the
/// validator status family, 0x21-0x2F the recycler/dispenser family. 0x00
/// (no activity) is treated as `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AcceptorStatus {
    Success = 0x00,
    DefectiveMotor = 0x01,
    SensorProblem = 0x02,
    ValidatorBusy = 0x03,
    RomChecksumError = 0x04,
    ValidatorJammed = 0x05,
    ValidatorWasReset = 0x06,
    BillRemoved = 0x07,
    CashboxOutOfPosition = 0x08,
    ValidatorDisabled = 0x09,
    InvalidEscrowRequest = 0x0A,
    BillRejected = 0x0B,
    CreditedBillRemoval = 0x0C,
    InputAttemptWhileDisabled = 0x0D,
    EscrowRequest = 0x21,
    DispenserPayoutBusy = 0x22,
    DispenserBusy = 0x23,
    DefectiveDispenserSensor = 0x24,
    DispenserDidNotStart = 0x26,
    DispenserJam = 0x27,
    DispenserRomChecksumError = 0x28,
    DispenserDisabled = 0x29,
    BillWaiting = 0x2A,
    FilledKeyPressed = 0x2F,
}

impl AcceptorStatus {
    /// Create a status from its wire code.
    ///
    /// # Errors
    /// Returns `Error::UnknownStatus` for codes outside the taxonomy.
    pub fn from_code(code: u8) -> Result<Self> {
        let status = match code {
            0x00 => AcceptorStatus::Success,
            0x01 => AcceptorStatus::DefectiveMotor,
            0x02 => AcceptorStatus::SensorProblem,
            0x03 => AcceptorStatus::ValidatorBusy,
            0x04 => AcceptorStatus::RomChecksumError,
            0x05 => AcceptorStatus::ValidatorJammed,
            0x06 => AcceptorStatus::ValidatorWasReset,
            0x07 => AcceptorStatus::BillRemoved,
            0x08 => AcceptorStatus::CashboxOutOfPosition,
            0x09 => AcceptorStatus::ValidatorDisabled,
            0x0A => AcceptorStatus::InvalidEscrowRequest,
            0x0B => AcceptorStatus::BillRejected,
            0x0C => AcceptorStatus::CreditedBillRemoval,
            0x0D => AcceptorStatus::InputAttemptWhileDisabled,
            0x21 => AcceptorStatus::EscrowRequest,
            0x22 => AcceptorStatus::DispenserPayoutBusy,
            0x23 => AcceptorStatus::DispenserBusy,
            0x24 => AcceptorStatus::DefectiveDispenserSensor,
            0x26 => AcceptorStatus::DispenserDidNotStart,
            0x27 => AcceptorStatus::DispenserJam,
            0x28 => AcceptorStatus::DispenserRomChecksumError,
            0x29 => AcceptorStatus::DispenserDisabled,
            0x2A => AcceptorStatus::BillWaiting,
            0x2F => AcceptorStatus::FilledKeyPressed,
            _ => return Err(Error::UnknownStatus(code)),
        };
        Ok(status)
    }

    /// The raw wire code.
    #[inline]
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns `true` if this status is the healthy no-activity report.
    #[inline]
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, AcceptorStatus::Success)
    }
}

impl fmt::Display for AcceptorStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AcceptorStatus::Success => "success",
            AcceptorStatus::DefectiveMotor => "defective motor",
            AcceptorStatus::SensorProblem => "sensor problem",
            AcceptorStatus::ValidatorBusy => "validator busy",
            AcceptorStatus::RomChecksumError => "ROM checksum error",
            AcceptorStatus::ValidatorJammed => "validator jammed",
            AcceptorStatus::ValidatorWasReset => "validator was reset",
            AcceptorStatus::BillRemoved => "bill removed",
            AcceptorStatus::CashboxOutOfPosition => "cashbox out of position",
            AcceptorStatus::ValidatorDisabled => "validator disabled",
            AcceptorStatus::InvalidEscrowRequest => "invalid escrow request",
            AcceptorStatus::BillRejected => "bill rejected",
            AcceptorStatus::CreditedBillRemoval => "possible credited bill removal",
            AcceptorStatus::InputAttemptWhileDisabled => "input attempt while disabled",
            AcceptorStatus::EscrowRequest => "escrow request",
            AcceptorStatus::DispenserPayoutBusy => "dispenser payout busy",
            AcceptorStatus::DispenserBusy => "dispenser busy",
            AcceptorStatus::DefectiveDispenserSensor => "defective dispenser sensor",
            AcceptorStatus::DispenserDidNotStart => "dispenser did not start",
            AcceptorStatus::DispenserJam => "dispenser jam",
            AcceptorStatus::DispenserRomChecksumError => "dispenser ROM checksum error",
            AcceptorStatus::DispenserDisabled => "dispenser disabled",
            AcceptorStatus::BillWaiting => "bill waiting",
            AcceptorStatus::FilledKeyPressed => "filled key pressed",
        };
        write!(f, "{name}")
    }
}

/// Bill-type accept configuration pushed to the acceptor.
///
/// One bit per bill type code in each mask. `FULL` matches the vendor
/// default configuration (types 1-8 enabled for both accept and escrow);
/// `NONE` rejects everything and is what "disable the acceptor" writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptMask {
    pub bills: u16,
    pub escrow: u16,
}

impl AcceptMask {
    pub const FULL: AcceptMask = AcceptMask {
        bills: 0b0000_0001_1111_1110,
        escrow: 0b0000_0001_1111_1110,
    };

    pub const NONE: AcceptMask = AcceptMask { bills: 0, escrow: 0 };

    /// Whether this mask lets the given denomination through.
    #[inline]
    #[must_use]
    pub fn accepts(self, denomination: Denomination) -> bool {
        self.bills & (1u16 << denomination.code()) != 0
    }
}

/// Sensor snapshot of one dispenser unit.
///
/// `UNKNOWN` is all-true: until the first successful health read a unit is
/// assumed faulted and empty, so nothing is dispensed from a unit that was
/// never polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenserHealth {
    pub error: bool,
    pub low: bool,
    pub empty: bool,
}

impl DispenserHealth {
    pub const UNKNOWN: DispenserHealth = DispenserHealth {
        error: true,
        low: true,
        empty: true,
    };

    pub const OK: DispenserHealth = DispenserHealth {
        error: false,
        low: false,
        empty: false,
    };

    /// A unit can serve a payout when it is neither faulted nor empty.
    /// Low stock does not block dispensing.
    #[inline]
    #[must_use]
    pub fn available(self) -> bool {
        !self.error && !self.empty
    }
}

/// Calendar time as the kiosk clock keeps it: minute resolution, 4-digit
/// year. This is the unit the RTC capability trades in and what the
/// operator enters through the 12-digit set-time menu field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl ClockTime {
    /// Create a clock time with field validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidTime` if any field is out of range
    /// (hour 0-23, minute 0-59, day 1-31, month 1-12, year 2000-2155).
    pub fn new(hour: u8, minute: u8, day: u8, month: u8, year: u16) -> Result<Self> {
        if hour > 23 {
            return Err(Error::InvalidTime(format!("hour {hour} out of range")));
        }
        if minute > 59 {
            return Err(Error::InvalidTime(format!("minute {minute} out of range")));
        }
        if !(1..=31).contains(&day) {
            return Err(Error::InvalidTime(format!("day {day} out of range")));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidTime(format!("month {month} out of range")));
        }
        if !(2000..=2155).contains(&year) {
            return Err(Error::InvalidTime(format!("year {year} out of range")));
        }
        Ok(ClockTime {
            hour,
            minute,
            day,
            month,
            year,
        })
    }

    /// Parse the menu time entry: exactly 12 digits, pairwise
    /// hh mm dd MM and a 4-digit year.
    ///
    /// # Errors
    /// Returns `Error::InvalidTime` on a wrong digit count or any field
    /// out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardvend_core::ClockTime;
    ///
    /// let t = ClockTime::from_digits(&[1, 4, 3, 0, 0, 9, 1, 2, 2, 0, 2, 5]).unwrap();
    /// assert_eq!((t.hour, t.minute, t.day, t.month, t.year), (14, 30, 9, 12, 2025));
    /// ```
    pub fn from_digits(digits: &[u8]) -> Result<Self> {
        if digits.len() != TIME_ENTRY_DIGITS {
            return Err(Error::InvalidTime(format!(
                "expected {TIME_ENTRY_DIGITS} digits, got {}",
                digits.len()
            )));
        }
        if digits.iter().any(|d| *d > 9) {
            return Err(Error::InvalidTime("non-digit in time entry".to_string()));
        }
        let pair = |i: usize| digits[i] * 10 + digits[i + 1];
        let year = digits[8] as u16 * 1000
            + digits[9] as u16 * 100
            + digits[10] as u16 * 10
            + digits[11] as u16;
        ClockTime::new(pair(0), pair(2), pair(4), pair(6), year)
    }

    /// Snapshot a chrono local datetime into clock fields.
    #[must_use]
    pub fn from_datetime(dt: &DateTime<Local>) -> Self {
        ClockTime {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            day: dt.day() as u8,
            month: dt.month() as u8,
            year: dt.year() as u16,
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02} {:02}/{:02}/{:04}",
            self.hour, self.minute, self.day, self.month, self.year
        )
    }
}

/// Operator password for the configuration menu.
///
/// Stored as the literal ASCII-digit string the operator keys in
/// (each keypad digit value plus `'0'`).
///
/// # Security
/// Comparison is constant-time to avoid leaking the match position.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Password(String);

impl Password {
    /// Create a password with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidPassword` if the string is empty, longer than
    /// the configured bound, or contains non-digit characters.
    pub fn new(digits: &str) -> Result<Self> {
        if digits.is_empty() || digits.len() > MAX_PASSWORD_LENGTH {
            return Err(Error::InvalidPassword(format!(
                "password must be 1-{MAX_PASSWORD_LENGTH} digits, got {} chars",
                digits.len()
            )));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidPassword(
                "password must be ASCII digits".to_string(),
            ));
        }
        Ok(Password(digits.to_string()))
    }

    /// Build a password from raw keypad digit values (0-9), truncating at
    /// the configured length bound.
    ///
    /// # Errors
    /// Returns `Error::InvalidPassword` if the slice is empty or contains a
    /// value above 9.
    pub fn from_digits(digits: &[u8]) -> Result<Self> {
        if digits.iter().any(|d| *d > 9) {
            return Err(Error::InvalidPassword(
                "digit value above 9".to_string(),
            ));
        }
        let truncated = &digits[..digits.len().min(MAX_PASSWORD_LENGTH)];
        let s: String = truncated.iter().map(|d| (d + b'0') as char).collect();
        Password::new(&s)
    }

    /// Compare against raw keypad digit values. Length and every digit must
    /// match exactly; the comparison over the digit bytes is constant-time.
    #[must_use]
    pub fn matches_digits(&self, digits: &[u8]) -> bool {
        let candidate: Vec<u8> = digits.iter().map(|d| d.wrapping_add(b'0')).collect();
        self.0.as_bytes().ct_eq(&candidate).into()
    }

    /// The stored digit string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Password {
    /// Factory password, expected to be changed through the menu.
    fn default() -> Self {
        Password("0000".to_string())
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Constant-time comparison implementation for Password
///
/// This prevents timing attacks by ensuring comparison takes the same time
/// regardless of where the strings differ.
impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

/// The persisted kiosk configuration record.
///
/// The whole record is written back synchronously on every mutation, so a
/// power cut loses at most the in-flight transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KioskConfig {
    /// Opaque device identity, prefixes every published topic.
    pub device_id: String,
    /// Firmware version string, pass-through for reporting.
    pub version: String,
    pub password: Password,
    /// Price of one card; 0 disables vending until configured.
    pub card_price: u32,
    /// Running unspent balance.
    pub balance: u32,
    /// Lifetime accepted total.
    pub lifetime_total: u32,
    pub total_cards: u32,
    pub total_cards_day: u32,
    pub total_cards_month: u32,
}

impl Default for KioskConfig {
    fn default() -> Self {
        KioskConfig {
            device_id: uuid::Uuid::new_v4().to_string(),
            version: crate::VERSION.to_string(),
            password: Password::default(),
            card_price: 0,
            balance: 0,
            lifetime_total: 0,
            total_cards: 0,
            total_cards_day: 0,
            total_cards_month: 0,
        }
    }
}

/// Configuration menu fields, selected by a single digit keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MenuField {
    SetTime = 1,
    SetCardPrice = 2,
    SetPassword = 3,
    ViewTotalCards = 4,
    ClearTotalCards = 5,
    ViewTotalAmount = 6,
    ClearTotalAmount = 7,
}

impl MenuField {
    /// Map a menu digit to its field. Digits with no field (0, 8, 9)
    /// return `None`; selecting nothing is a normal menu outcome, not an
    /// error.
    #[must_use]
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(MenuField::SetTime),
            2 => Some(MenuField::SetCardPrice),
            3 => Some(MenuField::SetPassword),
            4 => Some(MenuField::ViewTotalCards),
            5 => Some(MenuField::ClearTotalCards),
            6 => Some(MenuField::ViewTotalAmount),
            7 => Some(MenuField::ClearTotalAmount),
            _ => None,
        }
    }

    /// The selecting digit.
    #[inline]
    #[must_use]
    pub fn digit(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MenuField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            MenuField::SetTime => "set time",
            MenuField::SetCardPrice => "set card price",
            MenuField::SetPassword => "set password",
            MenuField::ViewTotalCards => "view total cards",
            MenuField::ClearTotalCards => "clear total cards",
            MenuField::ViewTotalAmount => "view total amount",
            MenuField::ClearTotalAmount => "clear total amount",
        };
        write!(f, "{name}")
    }
}

/// Named screens of the customer/operator display.
///
/// The core describes what to show in structured form; rendering is the
/// display driver's problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scene {
    /// Normal attract screen: current balance, card price and clock.
    Idle {
        balance: u32,
        card_price: u32,
        time: ClockTime,
    },
    /// A card is on its way out.
    Working,
    /// Masked password prompt showing only how many digits were keyed.
    PasswordEntry { digits_entered: usize },
    /// Root of the configuration menu.
    SettingMenu,
    /// One menu field with its current or in-progress value.
    SettingField { field: MenuField, value: String },
}

/// Persistent display overlays, toggled independently of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CardLow,
    CardEmpty,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlertKind::CardLow => write!(f, "card low"),
            AlertKind::CardEmpty => write!(f, "card empty"),
        }
    }
}
