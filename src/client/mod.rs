//! High-level typed API shared by [`blocking::BlockingClient`] and
//! [`cooperative::Client`]: flag construction and response mapping are
//! identical between the two execution surfaces, grounded operation by
//! operation in `examples/original_source/memcache/experiment/
//! meta_client.py` (blocking) and `async_meta_client.py` (cooperative) —
//! both already implement this exact flag-building and status-mapping
//! logic, one per execution surface, so only connection acquisition and
//! `execute` differ between [`blocking`] and [`cooperative`].

pub mod blocking;
pub mod cooperative;

use crate::command::{Flag, MetaCommand, Verb};
use crate::connection::Credentials;
use crate::error::Error;
use crate::parser::{parse_flag_bool, parse_flag_i64, parse_flag_u32, parse_flag_u64};
use crate::value::ValueCodec;
use std::time::Duration;

/// Keys are 1..250 raw bytes, no ASCII whitespace, no CR, no LF.
const MAX_KEY_LENGTH: usize = 250;

pub(crate) fn validate_key(key: &[u8]) -> Result<(), Error> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(Error::Protocol(format!(
            "key length {} outside 1..={MAX_KEY_LENGTH}",
            key.len()
        )));
    }
    if key.iter().any(|&b| b == b' ' || b == b'\r' || b == b'\n') {
        return Err(Error::Protocol("key contains whitespace or CRLF".to_string()));
    }
    Ok(())
}

/// Construction options for both [`blocking::BlockingClient`] and
/// [`cooperative::Client`]. No configuration-file format is supported —
/// construction is always programmatic, per spec's defaults.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub pool_size: usize,
    pub pool_timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            pool_size: 23,
            pool_timeout: Duration::from_secs(1),
            credentials: None,
        }
    }
}

impl ClientOptions {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Which extra fields a `get`-family call should ask the server to return.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    pub return_cas: bool,
    pub return_ttl: bool,
    pub return_last_access: bool,
    pub return_size: bool,
    pub return_hit_before: bool,
    pub update_ttl: Option<i64>,
    pub no_lru_bump: bool,
    pub vivify_on_miss_ttl: Option<i64>,
    pub recache_ttl_threshold: Option<i64>,
    pub check_cas: Option<u64>,
}

/// Typed projection of a `get`-family response.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResult<T> {
    pub value: Option<T>,
    pub key: Option<String>,
    pub cas_token: Option<u64>,
    pub ttl: Option<i64>,
    pub last_access: Option<i64>,
    pub size: Option<u64>,
    pub hit_before: Option<bool>,
    pub is_stale: bool,
    pub won_recache: bool,
    pub already_won: bool,
}

impl<T> Default for GetResult<T> {
    fn default() -> Self {
        GetResult {
            value: None,
            key: None,
            cas_token: None,
            ttl: None,
            last_access: None,
            size: None,
            hit_before: None,
            is_stale: false,
            won_recache: false,
            already_won: false,
        }
    }
}

pub(crate) fn build_get_command(key: &[u8], opts: &GetOptions) -> MetaCommand {
    let mut cmd = MetaCommand::new(Verb::Get, key)
        .push_flag(Flag::bare("v"))
        .push_flag(Flag::bare("f"))
        .push_flag_if(opts.return_cas, || Flag::bare("c"))
        .push_flag_if(opts.return_ttl, || Flag::bare("t"))
        .push_flag_if(opts.return_last_access, || Flag::bare("l"))
        .push_flag_if(opts.return_size, || Flag::bare("s"))
        .push_flag_if(opts.return_hit_before, || Flag::bare("h"));
    if let Some(ttl) = opts.update_ttl {
        cmd = cmd.push_flag(Flag::with_int('T', ttl));
    }
    cmd = cmd.push_flag_if(opts.no_lru_bump, || Flag::bare("u"));
    if let Some(ttl) = opts.vivify_on_miss_ttl {
        cmd = cmd.push_flag(Flag::with_int('N', ttl));
    }
    if let Some(threshold) = opts.recache_ttl_threshold {
        cmd = cmd.push_flag(Flag::with_int('R', threshold));
    }
    if let Some(cas) = opts.check_cas {
        cmd = cmd.push_flag(Flag::with_int('C', cas));
    }
    cmd
}

pub(crate) fn build_gat_command(key: &[u8], expire: i64) -> MetaCommand {
    MetaCommand::new(Verb::Get, key)
        .push_flag(Flag::bare("v"))
        .push_flag(Flag::bare("f"))
        .push_flag(Flag::with_int('T', expire))
}

pub(crate) fn build_touch_command(key: &[u8], expire: i64) -> MetaCommand {
    MetaCommand::new(Verb::Get, key).push_flag(Flag::with_int('T', expire))
}

pub(crate) fn build_store_command(
    key: &[u8],
    raw_value: Vec<u8>,
    client_flags: u32,
    expire: Option<i64>,
    mode: Option<&'static str>,
) -> MetaCommand {
    let mut cmd = MetaCommand::new(Verb::Set, key);
    if let Some(mode) = mode {
        cmd = cmd.push_flag(Flag::bare(mode));
    }
    cmd = cmd
        .push_flag(Flag::with_int('F', client_flags))
        .with_value(raw_value);
    if let Some(expire) = expire {
        cmd = cmd.push_flag(Flag::with_int('T', expire));
    }
    cmd
}

pub(crate) fn build_append_command(
    key: &[u8],
    raw_value: Vec<u8>,
    client_flags: u32,
    vivify_ttl: Option<i64>,
    prepend: bool,
) -> MetaCommand {
    let mode = if prepend { "MP" } else { "MA" };
    let mut cmd = MetaCommand::new(Verb::Set, key)
        .push_flag(Flag::bare(mode))
        .push_flag(Flag::with_int('F', client_flags))
        .with_value(raw_value);
    if let Some(ttl) = vivify_ttl {
        cmd = cmd.push_flag(Flag::with_int('N', ttl));
    }
    cmd
}

pub(crate) fn build_cas_command(
    key: &[u8],
    raw_value: Vec<u8>,
    client_flags: u32,
    cas_token: u64,
    expire: Option<i64>,
) -> MetaCommand {
    let mut cmd = MetaCommand::new(Verb::Set, key)
        .push_flag(Flag::with_int('F', client_flags))
        .push_flag(Flag::with_int('C', cas_token))
        .with_value(raw_value);
    if let Some(expire) = expire {
        cmd = cmd.push_flag(Flag::with_int('T', expire));
    }
    cmd
}

pub(crate) fn build_delete_command(key: &[u8], cas_token: Option<u64>) -> MetaCommand {
    let mut cmd = MetaCommand::new(Verb::Delete, key);
    if let Some(cas) = cas_token {
        cmd = cmd.push_flag(Flag::with_int('C', cas));
    }
    cmd
}

pub(crate) fn build_invalidate_command(
    key: &[u8],
    stale_ttl: Option<i64>,
    cas_token: Option<u64>,
) -> MetaCommand {
    let mut cmd = MetaCommand::new(Verb::Delete, key).push_flag(Flag::bare("I"));
    if let Some(ttl) = stale_ttl {
        cmd = cmd.push_flag(Flag::with_int('T', ttl));
    }
    if let Some(cas) = cas_token {
        cmd = cmd.push_flag(Flag::with_int('C', cas));
    }
    cmd
}

pub(crate) fn build_arithmetic_command(
    key: &[u8],
    delta: i64,
    initial: Option<u64>,
    initial_ttl: Option<i64>,
    update_ttl: Option<i64>,
    decrement: bool,
) -> MetaCommand {
    let mut cmd = MetaCommand::new(Verb::Arithmetic, key).push_flag(Flag::with_int('D', delta));
    cmd = cmd.push_flag_if(decrement, || Flag::bare("MD"));
    cmd = cmd.push_flag(Flag::bare("v"));
    if let Some(initial) = initial {
        cmd = cmd.push_flag(Flag::with_int('J', initial));
        if let Some(ttl) = initial_ttl {
            cmd = cmd.push_flag(Flag::with_int('N', ttl));
        }
    }
    if let Some(ttl) = update_ttl {
        cmd = cmd.push_flag(Flag::with_int('T', ttl));
    }
    cmd
}

/// Map store-family (`ms`) response codes the way `set`/`cas` variants do:
/// `HD` → true, `NS`/`EX`/`NF` → false, anything else → [`Error::Store`].
pub(crate) fn map_store_bool(
    op: &'static str,
    rc: &str,
    not_stored_codes: &[&str],
) -> Result<bool, Error> {
    if rc == "HD" {
        Ok(true)
    } else if not_stored_codes.contains(&rc) {
        Ok(false)
    } else {
        Err(Error::Store {
            op,
            rc: rc.to_string(),
        })
    }
}

/// Project a raw `mg` response into a [`GetResult<T>`], or `None` on `EN`.
pub(crate) fn parse_get_result<T, C: ValueCodec<T>>(
    rc: &str,
    flags: &[(u8, Vec<u8>)],
    value: Option<&[u8]>,
    opts: &GetOptions,
    codec: &C,
) -> Result<Option<GetResult<T>>, Error> {
    if rc == "EN" {
        return Ok(None);
    }

    let mut result = GetResult::default();
    let mut client_flags = 0u32;

    for (opcode, arg) in flags {
        match opcode {
            b'f' => client_flags = parse_flag_u32(arg)?,
            b'c' if opts.return_cas => result.cas_token = Some(parse_flag_u64(arg)?),
            b't' if opts.return_ttl => result.ttl = Some(parse_flag_i64(arg)?),
            b'l' if opts.return_last_access => result.last_access = Some(parse_flag_i64(arg)?),
            b's' if opts.return_size => result.size = Some(parse_flag_u64(arg)?),
            b'h' if opts.return_hit_before => result.hit_before = Some(parse_flag_bool(arg)),
            b'k' => {
                result.key = Some(
                    std::str::from_utf8(arg)
                        .map_err(|_| Error::Protocol("k flag is not valid utf-8".to_string()))?
                        .to_string(),
                )
            }
            b'W' => result.won_recache = true,
            b'Z' => result.already_won = true,
            b'X' => result.is_stale = true,
            _ => {}
        }
    }

    if let Some(bytes) = value {
        result.value = Some(codec.unmarshal(bytes, client_flags)?);
    }

    Ok(result).map(Some)
}

/// Decode the ASCII-decimal counter value `incr`/`decr` return in the `VA`
/// body, mapping `NF` to [`Error::NotFound`] first.
pub(crate) fn map_arithmetic_result(op: &'static str, rc: &str, value: Option<&[u8]>) -> Result<u64, Error> {
    if rc == "NF" {
        return Err(Error::NotFound);
    }
    if rc != "VA" {
        return Err(Error::Arithmetic {
            op,
            rc: rc.to_string(),
        });
    }
    let bytes = value.ok_or_else(|| Error::Protocol("arithmetic response missing value".to_string()))?;
    parse_flag_u64(bytes)
}
