//! Common MariaDB wire protocol types.

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Server-side prepared statement identifier.
pub type StatementId = u32;

/// Statement id meaning "the statement prepared last in this pipeline".
///
/// Sent in `COM_STMT_EXECUTE` / `COM_STMT_BULK_EXECUTE` when the execute
/// directly follows its `COM_STMT_PREPARE` in the same exchange.
pub const STATEMENT_ID_UNASSIGNED: StatementId = u32::MAX;

/// Client command bytes.
pub mod command {
    /// COM_QUERY
    pub const QUERY: u8 = 0x03;
    /// COM_STMT_PREPARE
    pub const STMT_PREPARE: u8 = 0x16;
    /// COM_STMT_EXECUTE
    pub const STMT_EXECUTE: u8 = 0x17;
    /// COM_STMT_CLOSE
    pub const STMT_CLOSE: u8 = 0x19;
    /// COM_RESET_CONNECTION
    pub const RESET_CONNECTION: u8 = 0x1f;
    /// COM_STMT_BULK_EXECUTE (MariaDB 10.2+)
    pub const STMT_BULK_EXECUTE: u8 = 0xfa;
}

/// Capability bits negotiated during the handshake.
pub mod capabilities {
    /// Server allows LOAD DATA LOCAL INFILE
    pub const CLIENT_LOCAL_FILES: u64 = 1 << 7;
    /// Client understands the 4.1 protocol
    pub const CLIENT_PROTOCOL_41: u64 = 1 << 9;
    /// Multiple result sets
    pub const CLIENT_MULTI_RESULTS: u64 = 1 << 17;
    /// EOF packets replaced by OK packets
    pub const CLIENT_DEPRECATE_EOF: u64 = 1 << 24;
    /// MariaDB bulk execution (COM_STMT_BULK_EXECUTE)
    pub const MARIADB_CLIENT_STMT_BULK_OPERATIONS: u64 = 1 << 34;
}

/// Server status bits carried by OK and EOF packets.
pub mod server_status {
    /// In transaction
    pub const IN_TRANS: u16 = 0x0001;
    /// Autocommit enabled
    pub const AUTOCOMMIT: u16 = 0x0002;
    /// Another result set follows
    pub const MORE_RESULTS_EXISTS: u16 = 0x0008;
}

/// Field flags in column definitions and execute type headers.
pub mod column_flags {
    /// NOT NULL
    pub const NOT_NULL: u16 = 0x0001;
    /// Primary key part
    pub const PRIMARY_KEY: u16 = 0x0002;
    /// UNSIGNED numeric
    pub const UNSIGNED: u16 = 0x0020;
    /// BINARY collation
    pub const BINARY: u16 = 0x0080;
}

/// Unsigned marker in the second byte of an execute parameter type.
pub const PARAMETER_FLAG_UNSIGNED: u8 = 0x80;

/// Column/parameter type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0a,
    Time = 0x0b,
    DateTime = 0x0c,
    Year = 0x0d,
    VarChar = 0x0f,
    Bit = 0x10,
    Json = 0xf5,
    NewDecimal = 0xf6,
    Enum = 0xf7,
    Set = 0xf8,
    TinyBlob = 0xf9,
    MediumBlob = 0xfa,
    LongBlob = 0xfb,
    Blob = 0xfc,
    VarString = 0xfd,
    String = 0xfe,
    Geometry = 0xff,
}

impl ColumnType {
    /// Decode a type byte sent by the server.
    pub fn from_u8(value: u8) -> Option<Self> {
        let ty = match value {
            0x00 => ColumnType::Decimal,
            0x01 => ColumnType::Tiny,
            0x02 => ColumnType::Short,
            0x03 => ColumnType::Long,
            0x04 => ColumnType::Float,
            0x05 => ColumnType::Double,
            0x06 => ColumnType::Null,
            0x07 => ColumnType::Timestamp,
            0x08 => ColumnType::LongLong,
            0x09 => ColumnType::Int24,
            0x0a => ColumnType::Date,
            0x0b => ColumnType::Time,
            0x0c => ColumnType::DateTime,
            0x0d => ColumnType::Year,
            0x0f => ColumnType::VarChar,
            0x10 => ColumnType::Bit,
            0xf5 => ColumnType::Json,
            0xf6 => ColumnType::NewDecimal,
            0xf7 => ColumnType::Enum,
            0xf8 => ColumnType::Set,
            0xf9 => ColumnType::TinyBlob,
            0xfa => ColumnType::MediumBlob,
            0xfb => ColumnType::LongBlob,
            0xfc => ColumnType::Blob,
            0xfd => ColumnType::VarString,
            0xfe => ColumnType::String,
            0xff => ColumnType::Geometry,
            _ => return None,
        };
        Some(ty)
    }
}

/// Fixed tail of a column definition packet: the 0x0c marker plus 12 bytes.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct ColumnDefinitionTail {
    /// Length of the fixed fields (always 0x0c)
    pub fixed_length: u8,
    /// Character set number
    pub charset: U16LE,
    /// Maximum column length
    pub column_length: U32LE,
    /// Column type code
    pub column_type: u8,
    /// Column flags
    pub flags: U16LE,
    /// Number of decimals
    pub decimals: u8,
    /// Filler
    pub reserved: U16LE,
}

/// Fixed 11-byte body of a `COM_STMT_PREPARE_OK` packet (after the 0x00 header).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct PrepareOkBody {
    /// Statement id assigned by the server
    pub statement_id: U32LE,
    /// Number of result columns
    pub num_columns: U16LE,
    /// Number of parameters
    pub num_params: U16LE,
    /// Filler
    pub reserved: u8,
    /// Warning count
    pub warnings: U16LE,
}
