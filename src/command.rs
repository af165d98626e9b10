//! In-memory representation of a meta-protocol request and its parsed
//! response header, plus the wire encoding for the former.
//!
//! Grounded in `memcache/meta_command.py`'s `MetaCommand.dump_header` /
//! `MetaResult.load_header` from the original implementation this crate
//! reimplements: the same header framing, the same `rc`/`datalen`/`flags`
//! split.

use bytes::{BufMut, BytesMut};

/// One of the four meta-protocol verbs this crate speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Set,
    Delete,
    Arithmetic,
}

impl Verb {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Verb::Get => b"mg",
            Verb::Set => b"ms",
            Verb::Delete => b"md",
            Verb::Arithmetic => b"ma",
        }
    }
}

/// A single meta-protocol flag token, e.g. `F0`, `T300`, `q`.
///
/// Stored pre-rendered so callers building a command can push whichever
/// flags apply to their operation in whatever order they like; flags are
/// emitted on the wire in the order they were pushed (spec requires this).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag(pub Vec<u8>);

impl Flag {
    /// A flag-only opcode with no argument, e.g. `v`, `q`, `I`, `ME`.
    pub fn bare(opcode: &str) -> Self {
        Flag(opcode.as_bytes().to_vec())
    }

    /// An opcode followed by a decimal argument, e.g. `T300`, `C55`.
    pub fn with_int(opcode: char, arg: impl itoa::Integer) -> Self {
        let mut printed = itoa::Buffer::new();
        let digits = printed.format(arg);
        let mut buf = Vec::with_capacity(1 + digits.len());
        buf.push(opcode as u8);
        buf.extend_from_slice(digits.as_bytes());
        Flag(buf)
    }

    /// An opcode followed by a raw byte argument, e.g. `Oopaque-token`.
    pub fn with_bytes(opcode: char, arg: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(1 + arg.len());
        buf.push(opcode as u8);
        buf.extend_from_slice(arg);
        Flag(buf)
    }
}

/// A meta-protocol request: verb, key, optional payload length, flags, and
/// an optional payload. Immutable once built.
#[derive(Debug, Clone)]
pub struct MetaCommand {
    pub verb: Verb,
    pub key: Vec<u8>,
    pub datalen: Option<u32>,
    pub flags: Vec<Flag>,
    pub value: Option<Vec<u8>>,
}

impl MetaCommand {
    pub fn new(verb: Verb, key: impl AsRef<[u8]>) -> Self {
        MetaCommand {
            verb,
            key: key.as_ref().to_vec(),
            datalen: None,
            flags: Vec::new(),
            value: None,
        }
    }

    pub fn with_datalen(mut self, datalen: u32) -> Self {
        self.datalen = Some(datalen);
        self
    }

    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.datalen = Some(value.len() as u32);
        self.value = Some(value);
        self
    }

    pub fn push_flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn push_flag_if(self, cond: bool, flag: impl FnOnce() -> Flag) -> Self {
        if cond {
            self.push_flag(flag())
        } else {
            self
        }
    }

    /// Render `cm SP key [SP datalen] (SP flag)* CRLF [value CRLF]` onto the
    /// wire buffer, matching `MetaCommand.dump_header` byte for byte.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self.verb.as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(&self.key);
        if let Some(datalen) = self.datalen {
            buf.put_u8(b' ');
            let mut printed = itoa::Buffer::new();
            buf.put_slice(printed.format(datalen).as_bytes());
        }
        for flag in &self.flags {
            buf.put_u8(b' ');
            buf.put_slice(&flag.0);
        }
        buf.put_slice(b"\r\n");
        if let Some(value) = &self.value {
            buf.put_slice(value);
            buf.put_slice(b"\r\n");
        }
    }
}

/// The parsed response to a [`MetaCommand`]: status code, optional length,
/// returned flag tokens, and the optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaResult {
    pub rc: String,
    pub datalen: Option<u32>,
    pub flags: Vec<(u8, Vec<u8>)>,
    pub value: Option<Vec<u8>>,
}

impl MetaResult {
    pub fn flag(&self, opcode: u8) -> Option<&[u8]> {
        self.flags
            .iter()
            .find(|(f, _)| *f == opcode)
            .map(|(_, v)| v.as_slice())
    }

    pub fn has_flag(&self, opcode: u8) -> bool {
        self.flags.iter().any(|(f, _)| *f == opcode)
    }
}
