//! Wire protocol: request/response records and their line-delimited framing.
//!
//! Every connection carries exactly one [`Event`] from node to coordinator
//! and at most one [`Response`] back. Frames are JSON objects terminated by
//! a single `\n`.

pub mod codec;
pub mod facts;
pub mod message;

pub use codec::{decode_frame, encode_frame, FrameCodec, MAX_FRAME_LENGTH};
pub use facts::{HostFacts, OsInfo};
pub use message::{
    Action, Event, Response, CODE_FAILURE, CODE_SUCCESS, PARAM_DATA, PARAM_JOB, PARAM_NAME,
    PARAM_SYSINFO, SESSION_MARKER,
};
