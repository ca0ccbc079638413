//! SMB2 packet header and wire-level status/command codes.
//!
//! Layout per MS-SMB2 2.2.1.1/2.2.1.2. Only the synchronous header shape is
//! modeled -- SMB2_FLAGS_ASYNC_COMMAND and the matching async_id field are
//! out of scope for this server core.

use binrw::prelude::*;
use modular_bitfield::prelude::*;

/// SMB2 command codes (MS-SMB2 2.2.1.2). The core only implements handlers
/// for a subset (see `smb2-core`'s dispatcher); the rest are still decodable
/// so the header can be parsed and a `NOT_SUPPORTED` response produced.
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u16))]
pub enum Command {
    Negotiate = 0,
    SessionSetup = 1,
    Logoff = 2,
    TreeConnect = 3,
    TreeDisconnect = 4,
    Create = 5,
    Close = 6,
    Flush = 7,
    Read = 8,
    Write = 9,
    Lock = 0xA,
    Ioctl = 0xB,
    Cancel = 0xC,
    Echo = 0xD,
    QueryDirectory = 0xE,
    ChangeNotify = 0xF,
    QueryInfo = 0x10,
    SetInfo = 0x11,
    OplockBreak = 0x12,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} ({:#x})", *self as u16)
    }
}

macro_rules! make_status {
    ( $($name:ident = $value:literal: $description:literal, )+ ) => {

/// NT_STATUS codes used by this server core. Exact values match MS-ERREF.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(repr(u32))]
pub enum Status {
    $(
        #[doc = concat!($description, " (", stringify!($value), ")")]
        $name = $value,
    )+
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let description = match self {
            $( Status::$name => $description, )+
        };
        write!(f, "{description} ({:#010x})", *self as u32)
    }
}

impl TryFrom<u32> for Status {
    type Error = crate::SmbMsgError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            $( $value => Ok(Status::$name), )+
            other => Err(crate::SmbMsgError::UnknownStatus(other)),
        }
    }
}
    };
}

make_status! {
    Success = 0x0000_0000: "Success",
    MoreProcessingRequired = 0xC000_0016: "More Processing Required",
    InvalidParameter = 0xC000_000D: "Invalid Parameter",
    NotSupported = 0xC000_00BB: "Not Supported",
    UserSessionDeleted = 0xC000_0203: "User Session Deleted",
    NetworkNameDeleted = 0xC000_00C9: "Network Name Deleted",
    BadNetworkName = 0xC000_00CC: "Bad Network Name",
    InvalidHandle = 0xC000_0008: "Invalid Handle",
    FileClosed = 0xC000_0128: "File Closed",
    AccessDenied = 0xC000_0022: "Access Denied",
    ObjectNameNotFound = 0xC000_0034: "Object Name Not Found",
    InternalError = 0xC000_00E5: "Internal Error",
    UnexpectedIoError = 0xC000_00E9: "Unexpected I/O Error",
    Cancelled = 0xC000_0120: "Cancelled",
}

/// SMB2 header flags (MS-SMB2 2.2.1.2). Only the bits this server core
/// inspects or sets are named; the rest are reserved padding.
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct HeaderFlags {
    /// Set on responses (SMB2_FLAGS_SERVER_TO_REDIR).
    pub server_to_redir: bool,
    /// SMB2_FLAGS_ASYNC_COMMAND. Always false: this core is synchronous-only.
    pub async_command: bool,
    pub related_operations: bool,
    pub signed: bool,
    priority_mask: B3,
    #[skip]
    __: B21,
    pub dfs_operation: bool,
    pub replay_operation: bool,
    #[skip]
    __: B2,
}

/// SMB2 packet header. Fixed 64 bytes, little-endian (MS-SMB2 2.2.1.1).
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(magic(b"\xfeSMB"), little)]
pub struct Header {
    #[bw(calc = 64)]
    #[br(assert(_structure_size == 64, "SMB2 header structure_size must be 64"))]
    _structure_size: u16,
    pub credit_charge: u16,
    pub status: u32,
    pub command: Command,
    pub credit_request: u16,
    pub flags: HeaderFlags,
    pub next_command: u32,
    pub message_id: u64,
    pub reserved: u32,
    pub tree_id: u32,
    pub session_id: u64,
    pub signature: u128,
}

impl Header {
    pub const STRUCT_SIZE: usize = 64;

    pub fn status(&self) -> crate::Result<Status> {
        self.status.try_into()
    }

    /// Builds a response header from the request it answers: echoes the
    /// message id, session, and tree, sets `server_to_redir`, and fills in
    /// the given status.
    pub fn response_for(request: &Header, status: Status) -> Header {
        let mut flags = HeaderFlags::new();
        flags.set_server_to_redir(true);
        Header {
            credit_charge: request.credit_charge,
            status: status as u32,
            command: request.command,
            credit_request: request.credit_request.max(1),
            flags,
            next_command: 0,
            message_id: request.message_id,
            reserved: 0,
            tree_id: request.tree_id,
            session_id: request.session_id,
            signature: 0,
        }
    }
}
