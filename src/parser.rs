//! Streaming decoder for meta-protocol response headers and bodies.
//!
//! Grounded in `src/parser/meta.rs`'s `nom` combinator style (tag-based
//! status matching, `take_while_m_n` digit parsing, `many0` flag-token
//! scanning, `take_until_size` for exact-length bodies), generalized from
//! per-verb response grammars to the single rc-agnostic header format the
//! meta protocol shares across `mg`/`ms`/`md`/`ma`.

use std::num::NonZeroUsize;

use btoi::btou;
use nom::bytes::streaming::{tag, take, take_while, take_while1, take_while_m_n};
use nom::character::streaming::{crlf, space0, space1};
use nom::character::is_digit;
use nom::combinator::map_res;
use nom::multi::many0;
use nom::sequence::tuple;
use nom::IResult;

use crate::command::MetaResult;
use crate::error::Error;

/// Outcome of one decode attempt over the current read buffer.
pub enum Decoded {
    /// Not enough bytes buffered yet; caller should read more and retry.
    Incomplete,
    /// A full response was parsed; `consumed` bytes should be dropped from
    /// the front of the read buffer.
    Complete { consumed: usize, result: MetaResult },
}

/// Attempt to decode one [`MetaResult`] from the front of `buf`.
///
/// Implements spec's decoding algorithm exactly: read one CRLF-terminated
/// header line, split on whitespace, treat the first token as `rc`, detect
/// a numeric second token as `datalen`, and — only for `rc == "VA"` — read
/// exactly `datalen` bytes plus a trailing CRLF as the payload.
pub fn decode_response(buf: &[u8]) -> Result<Decoded, Error> {
    match parse_client_error(buf) {
        Ok((_rest, detail)) => return Err(Error::Protocol(detail)),
        Err(nom::Err::Incomplete(_)) => return Ok(Decoded::Incomplete),
        Err(_) => {} // not a CLIENT_ERROR line, fall through to the normal parse
    }

    match parse_response(buf) {
        Ok((rest, result)) => Ok(Decoded::Complete {
            consumed: buf.len() - rest.len(),
            result,
        }),
        Err(nom::Err::Incomplete(_)) => Ok(Decoded::Incomplete),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(Error::Protocol(format!(
            "malformed response header: {:?}",
            e.code
        ))),
    }
}

/// Recognise a `CLIENT_ERROR <detail>\r\n` line and return the trimmed
/// detail text. Fails (non-incomplete) if the line isn't a `CLIENT_ERROR`.
fn parse_client_error(buf: &[u8]) -> IResult<&[u8], String> {
    let (input, _) = tag(b"CLIENT_ERROR".as_ref())(buf)?;
    let (input, rest_of_line) = take_while(|c: u8| c != b'\r')(input)?;
    let (input, _) = crlf(input)?;
    Ok((input, String::from_utf8_lossy(rest_of_line).trim().to_string()))
}

fn parse_response(buf: &[u8]) -> IResult<&[u8], MetaResult> {
    let (input, rc) = parse_rc(buf)?;
    let (input, datalen) = parse_optional_datalen(input)?;
    let (input, flags) = parse_flag_tokens(input)?;
    let (input, _) = crlf(input)?;

    if rc == "VA" {
        let size = datalen.ok_or_else(|| {
            nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
        })?;
        let (input, value) = take_exact_with_crlf(input, size)?;
        Ok((
            input,
            MetaResult {
                rc,
                datalen: Some(size),
                flags,
                value: Some(value.to_vec()),
            },
        ))
    } else {
        Ok((
            input,
            MetaResult {
                rc,
                datalen,
                flags,
                value: None,
            },
        ))
    }
}

fn parse_rc(buf: &[u8]) -> IResult<&[u8], String> {
    let (input, token) = take_while1(|c: u8| c != b' ' && c != b'\r' && c != b'\n')(buf)?;
    Ok((input, String::from_utf8_lossy(token).to_string()))
}

fn parse_optional_datalen(input: &[u8]) -> IResult<&[u8], Option<u32>> {
    // Peek at whether a second whitespace-delimited token exists and looks
    // numeric; if so consume it as `datalen`, otherwise leave `input`
    // untouched so `parse_flag_tokens` sees the same token as a flag.
    fn probe_datalen(input: &[u8]) -> IResult<&[u8], u32> {
        let (after_space, _) = space1(input)?;
        map_res(take_while_m_n(1, 10, is_digit), btou)(after_space)
    }

    match probe_datalen(input) {
        Ok((rest, value)) => {
            // Only consume if the numeric token is itself a whole token,
            // i.e. immediately followed by a space or CRLF.
            if rest.first() == Some(&b' ') || rest.starts_with(b"\r\n") {
                let consumed = input.len() - rest.len();
                Ok((&input[consumed..], Some(value)))
            } else {
                Ok((input, None))
            }
        }
        Err(nom::Err::Incomplete(n)) => Err(nom::Err::Incomplete(n)),
        Err(_) => Ok((input, None)),
    }
}

fn parse_flag_tokens(input: &[u8]) -> IResult<&[u8], Vec<(u8, Vec<u8>)>> {
    if input.starts_with(b"\r\n") {
        return Ok((input, Vec::new()));
    }
    let (input, tokens) = many0(tuple((
        space1,
        take(1usize),
        take_while(|c: u8| c != b'\r' && c != b' '),
    )))(input)?;
    let (input, _) = space0(input)?;
    let flags = tokens
        .into_iter()
        .map(|(_, opcode, value): (_, &[u8], &[u8])| (opcode[0], value.to_vec()))
        .collect();
    Ok((input, flags))
}

fn take_exact_with_crlf(buf: &[u8], size: u32) -> IResult<&[u8], &[u8]> {
    let size = size as usize;
    if buf.len() < size + 2 {
        return Err(nom::Err::Incomplete(nom::Needed::Size(
            NonZeroUsize::new(size + 2 - buf.len()).unwrap_or(NonZeroUsize::new(1).unwrap()),
        )));
    }
    let (data, rest) = buf.split_at(size);
    let (rest, _) = tag(b"\r\n".as_ref())(rest)?;
    Ok((rest, data))
}

/// Decode a `u32` flag argument, e.g. the `f` (client flags) token.
pub fn parse_flag_u32(arg: &[u8]) -> Result<u32, Error> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::Protocol(format!("invalid u32 flag argument: {arg:?}")))
}

/// Decode a `u64` flag argument, e.g. the `c` (CAS) or `s` (size) token.
pub fn parse_flag_u64(arg: &[u8]) -> Result<u64, Error> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::Protocol(format!("invalid u64 flag argument: {arg:?}")))
}

/// Decode an `i64` flag argument, e.g. the `t` (TTL, possibly negative) or
/// `l` (last-access) token.
pub fn parse_flag_i64(arg: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::Protocol(format!("invalid i64 flag argument: {arg:?}")))
}

/// Decode the `h` (hit-before) flag's `0|1` argument.
pub fn parse_flag_bool(arg: &[u8]) -> bool {
    arg != b"0"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> MetaResult {
        match decode_response(input).unwrap() {
            Decoded::Complete { result, .. } => result,
            Decoded::Incomplete => panic!("expected a complete parse for {input:?}"),
        }
    }

    #[test]
    fn header_with_no_datalen_and_flags() {
        let result = decode(b"HD t20 c123\r\n");
        assert_eq!(result.rc, "HD");
        assert_eq!(result.datalen, None);
        assert!(result.has_flag(b't'));
        assert!(result.has_flag(b'c'));
    }

    #[test]
    fn header_with_datalen_and_flags() {
        let result = decode(b"VA 5 f16 c999\r\nhello\r\n");
        assert_eq!(result.rc, "VA");
        assert_eq!(result.datalen, Some(5));
        assert_eq!(result.value.as_deref(), Some(b"hello".as_ref()));
        assert_eq!(result.flag(b'f'), Some(b"16".as_ref()));
        assert_eq!(result.flag(b'c'), Some(b"999".as_ref()));
    }

    #[test]
    fn bare_header_no_flags_no_datalen() {
        let result = decode(b"EN\r\n");
        assert_eq!(result.rc, "EN");
        assert_eq!(result.datalen, None);
        assert!(result.flags.is_empty());
    }

    #[test]
    fn incomplete_header_requests_more_bytes() {
        match decode_response(b"VA 5 f0\r\nhel").unwrap() {
            Decoded::Incomplete => {}
            Decoded::Complete { .. } => panic!("expected incomplete"),
        }
    }

    #[test]
    fn value_with_embedded_crlf_is_read_by_exact_length() {
        let result = decode(b"VA 11 f0\r\nhe\r\nllo\r\n\r\n");
        assert_eq!(result.value.as_deref(), Some(b"he\r\nllo\r\n".as_ref()));
    }

    #[test]
    fn flag_order_is_preserved() {
        let result = decode(b"HD t2179 h1 l56\r\n");
        assert_eq!(
            result.flags,
            vec![
                (b't', b"2179".to_vec()),
                (b'h', b"1".to_vec()),
                (b'l', b"56".to_vec()),
            ]
        );
    }

    #[test]
    fn unknown_opcodes_are_preserved_verbatim() {
        let result = decode(b"HD x100\r\n");
        assert_eq!(result.flag(b'x'), Some(b"100".as_ref()));
    }

    #[test]
    fn bare_flag_opcode_with_no_argument_is_accepted() {
        let result = decode(b"HD W\r\n");
        assert_eq!(result.rc, "HD");
        assert_eq!(result.flag(b'W'), Some(b"".as_ref()));
    }

    #[test]
    fn bare_flag_opcode_after_value_is_accepted() {
        let result = decode(b"VA 3 f0 X\r\nbar\r\n");
        assert_eq!(result.value.as_deref(), Some(b"bar".as_ref()));
        assert_eq!(result.flag(b'X'), Some(b"".as_ref()));
    }
}
