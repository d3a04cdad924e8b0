// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-4361 sign-in message codec.
//!
//! The signature is computed over the exact text produced by [`Display`], so
//! the encoding is strict: fixed field order, `\n` line endings, no trailing
//! newline. Timestamps keep the text they were parsed from, which makes
//! `parse(s).to_string() == s` hold for every accepted `s`.
//!
//! ```text
//! example.com wants you to sign in with your Ethereum account:
//! 0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2
//!
//! Sign in with Ethereum to the app.
//!
//! URI: https://example.com
//! Version: 1
//! Chain ID: 1
//! Nonce: 32891756
//! Issued At: 2021-09-30T16:25:24.000Z
//! ```

use std::fmt;
use std::iter::Peekable;
use std::str::{FromStr, Split};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use super::error::{ParseError, ValidityError};

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const URI_TAG: &str = "URI";
const VERSION_TAG: &str = "Version";
const CHAIN_ID_TAG: &str = "Chain ID";
const NONCE_TAG: &str = "Nonce";
const ISSUED_AT_TAG: &str = "Issued At";
const EXPIRATION_TIME_TAG: &str = "Expiration Time";
const NOT_BEFORE_TAG: &str = "Not Before";
const REQUEST_ID_TAG: &str = "Request ID";
const RESOURCES_HEADER: &str = "Resources:";
const RESOURCE_PREFIX: &str = "- ";

/// Minimum nonce length accepted in a message.
const MIN_NONCE_LEN: usize = 8;

/// Message format version. Only `1` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    #[default]
    V1,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V1 => f.write_str("1"),
        }
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Version::V1),
            other => Err(ParseError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// RFC 3339 timestamp that remembers its textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    text: String,
    value: DateTime<Utc>,
}

impl Timestamp {
    /// Stamp with millisecond precision, the way browser wallets format it.
    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        let value = value.trunc_subsecs(3);
        Self {
            text: value.to_rfc3339_opts(SecondsFormat::Millis, true),
            value,
        }
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for Timestamp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = DateTime::parse_from_rfc3339(s)
            .map_err(|e| ParseError::Malformed(format!("invalid timestamp {s:?}: {e}")))?
            .with_timezone(&Utc);
        Ok(Self {
            text: s.to_string(),
            value,
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Structured sign-in statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInMessage {
    /// RFC 3986 authority requesting the sign-in
    pub domain: String,
    /// `0x`-prefixed account address, in whatever casing the wallet used
    pub address: String,
    /// Human-readable assertion the user signs
    pub statement: String,
    pub uri: String,
    pub version: Version,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: Timestamp,
    pub expiration_time: Option<Timestamp>,
    pub not_before: Option<Timestamp>,
    pub request_id: Option<String>,
    pub resources: Vec<String>,
}

impl SignInMessage {
    /// Build and validate a message with the required fields.
    pub fn new(
        domain: impl Into<String>,
        address: impl Into<String>,
        statement: impl Into<String>,
        uri: impl Into<String>,
        chain_id: u64,
        nonce: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, ParseError> {
        let message = Self {
            domain: domain.into(),
            address: address.into(),
            statement: statement.into(),
            uri: uri.into(),
            version: Version::V1,
            chain_id,
            nonce: nonce.into(),
            issued_at: Timestamp::from_datetime(issued_at),
            expiration_time: None,
            not_before: None,
            request_id: None,
            resources: Vec::new(),
        };
        message.validate()?;
        Ok(message)
    }

    pub fn with_expiration_time(mut self, at: DateTime<Utc>) -> Self {
        self.expiration_time = Some(Timestamp::from_datetime(at));
        self
    }

    pub fn with_not_before(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(Timestamp::from_datetime(at));
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Result<Self, ParseError> {
        let request_id = request_id.into();
        validate_single_line(REQUEST_ID_TAG, &request_id)?;
        self.request_id = Some(request_id);
        Ok(self)
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Result<Self, ParseError> {
        let resource = resource.into();
        validate_uri("resource", &resource)?;
        self.resources.push(resource);
        Ok(self)
    }

    /// Check every field against the message grammar.
    pub fn validate(&self) -> Result<(), ParseError> {
        validate_domain(&self.domain)?;
        validate_address(&self.address)?;
        validate_statement(&self.statement)?;
        validate_uri(URI_TAG, &self.uri)?;
        validate_chain_id(self.chain_id)?;
        validate_nonce(&self.nonce)?;
        if let Some(request_id) = &self.request_id {
            validate_single_line(REQUEST_ID_TAG, request_id)?;
        }
        for resource in &self.resources {
            validate_uri("resource", resource)?;
        }
        Ok(())
    }

    /// Check the optional time window and, when configured, the domain binding.
    pub fn check_validity(
        &self,
        now: DateTime<Utc>,
        expected_domain: Option<&str>,
    ) -> Result<(), ValidityError> {
        if let Some(expected) = expected_domain {
            if !self.domain.eq_ignore_ascii_case(expected) {
                return Err(ValidityError::DomainMismatch {
                    expected: expected.to_string(),
                    found: self.domain.clone(),
                });
            }
        }
        if let Some(expiration) = &self.expiration_time {
            if expiration.as_datetime() <= now {
                return Err(ValidityError::Expired);
            }
        }
        if let Some(not_before) = &self.not_before {
            if not_before.as_datetime() > now {
                return Err(ValidityError::NotYetValid);
            }
        }
        Ok(())
    }

    /// Exact bytes a wallet signs for this message.
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for SignInMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{HEADER_SUFFIX}\n{}\n\n{}\n\n", self.domain, self.address, self.statement)?;
        writeln!(f, "{URI_TAG}: {}", self.uri)?;
        writeln!(f, "{VERSION_TAG}: {}", self.version)?;
        writeln!(f, "{CHAIN_ID_TAG}: {}", self.chain_id)?;
        writeln!(f, "{NONCE_TAG}: {}", self.nonce)?;
        write!(f, "{ISSUED_AT_TAG}: {}", self.issued_at)?;
        if let Some(expiration) = &self.expiration_time {
            write!(f, "\n{EXPIRATION_TIME_TAG}: {expiration}")?;
        }
        if let Some(not_before) = &self.not_before {
            write!(f, "\n{NOT_BEFORE_TAG}: {not_before}")?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, "\n{REQUEST_ID_TAG}: {request_id}")?;
        }
        if !self.resources.is_empty() {
            write!(f, "\n{RESOURCES_HEADER}")?;
            for resource in &self.resources {
                write!(f, "\n{RESOURCE_PREFIX}{resource}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for SignInMessage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s.split('\n').peekable();

        let header = next_line(&mut lines, "domain header")?;
        let domain = header
            .strip_suffix(HEADER_SUFFIX)
            .ok_or_else(|| ParseError::Malformed("missing domain header".into()))?;
        validate_domain(domain)?;

        let address = next_line(&mut lines, "address")?;
        validate_address(address)?;

        expect_blank(&mut lines)?;
        let statement = next_line(&mut lines, "statement")?;
        validate_statement(statement)?;
        expect_blank(&mut lines)?;

        let uri = tagged(&mut lines, URI_TAG)?;
        validate_uri(URI_TAG, uri)?;

        let version: Version = tagged(&mut lines, VERSION_TAG)?.parse()?;

        let chain_id = parse_chain_id(tagged(&mut lines, CHAIN_ID_TAG)?)?;

        let nonce = tagged(&mut lines, NONCE_TAG)?;
        validate_nonce(nonce)?;

        let issued_at: Timestamp = tagged(&mut lines, ISSUED_AT_TAG)?.parse()?;

        let expiration_time = optional_tagged(&mut lines, EXPIRATION_TIME_TAG)
            .map(str::parse::<Timestamp>)
            .transpose()?;
        let not_before = optional_tagged(&mut lines, NOT_BEFORE_TAG)
            .map(str::parse::<Timestamp>)
            .transpose()?;
        let request_id = optional_tagged(&mut lines, REQUEST_ID_TAG).map(str::to_string);

        let mut resources = Vec::new();
        if lines.next_if_eq(&RESOURCES_HEADER).is_some() {
            for line in lines.by_ref() {
                let resource = line.strip_prefix(RESOURCE_PREFIX).ok_or_else(|| {
                    ParseError::Malformed(format!("invalid resource line {line:?}"))
                })?;
                validate_uri("resource", resource)?;
                resources.push(resource.to_string());
            }
            if resources.is_empty() {
                return Err(ParseError::Malformed("empty resources list".into()));
            }
        }

        if let Some(extra) = lines.next() {
            return Err(ParseError::Malformed(format!("unexpected line {extra:?}")));
        }

        Ok(SignInMessage {
            domain: domain.to_string(),
            address: address.to_string(),
            statement: statement.to_string(),
            uri: uri.to_string(),
            version,
            chain_id,
            nonce: nonce.to_string(),
            issued_at,
            expiration_time,
            not_before,
            request_id,
            resources,
        })
    }
}

type Lines<'a> = Peekable<Split<'a, char>>;

fn next_line<'a>(lines: &mut Lines<'a>, what: &str) -> Result<&'a str, ParseError> {
    lines
        .next()
        .ok_or_else(|| ParseError::Malformed(format!("missing {what}")))
}

fn expect_blank(lines: &mut Lines<'_>) -> Result<(), ParseError> {
    match lines.next() {
        Some("") => Ok(()),
        _ => Err(ParseError::Malformed("expected blank line".into())),
    }
}

fn tagged<'a>(lines: &mut Lines<'a>, tag: &str) -> Result<&'a str, ParseError> {
    let line = next_line(lines, tag)?;
    strip_tag(line, tag).ok_or_else(|| ParseError::Malformed(format!("missing {tag}")))
}

fn optional_tagged<'a>(lines: &mut Lines<'a>, tag: &str) -> Option<&'a str> {
    let line: &'a str = *lines.peek()?;
    let value = strip_tag(line, tag)?;
    lines.next();
    Some(value)
}

fn strip_tag<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.strip_prefix(tag)?.strip_prefix(": ")
}

fn validate_domain(domain: &str) -> Result<(), ParseError> {
    if domain.is_empty() || domain.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ParseError::Malformed(format!("invalid domain {domain:?}")));
    }
    Ok(())
}

fn validate_address(address: &str) -> Result<(), ParseError> {
    let valid = address
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(ParseError::Malformed(format!("invalid address {address:?}")));
    }
    Ok(())
}

fn validate_statement(statement: &str) -> Result<(), ParseError> {
    if statement.is_empty() {
        return Err(ParseError::Malformed("missing statement".into()));
    }
    validate_single_line("statement", statement)
}

fn validate_single_line(what: &str, value: &str) -> Result<(), ParseError> {
    if value.contains(['\n', '\r']) {
        return Err(ParseError::Malformed(format!("{what} spans multiple lines")));
    }
    Ok(())
}

fn validate_uri(what: &str, uri: &str) -> Result<(), ParseError> {
    validate_single_line(what, uri)?;
    url::Url::parse(uri)
        .map(|_| ())
        .map_err(|e| ParseError::Malformed(format!("invalid {what} {uri:?}: {e}")))
}

/// Only the canonical decimal form is accepted, so the number prints back as
/// the same text.
fn parse_chain_id(text: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::Malformed(format!("invalid chain id {text:?}"));
    let canonical = text.starts_with(|c: char| matches!(c, '1'..='9'))
        && text.chars().all(|c| c.is_ascii_digit());
    if !canonical {
        return Err(invalid());
    }
    text.parse().map_err(|_| invalid())
}

fn validate_chain_id(chain_id: u64) -> Result<(), ParseError> {
    if chain_id == 0 {
        return Err(ParseError::Malformed("chain id must be positive".into()));
    }
    Ok(())
}

fn validate_nonce(nonce: &str) -> Result<(), ParseError> {
    if nonce.len() < MIN_NONCE_LEN || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ParseError::Malformed(format!("invalid nonce {nonce:?}")));
    }
    Ok(())
}
