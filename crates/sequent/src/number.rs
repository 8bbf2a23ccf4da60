//! Tenant-scoped sequence number allocation
//!
//! [`NumberGenerator::allocate`] turns a persistent counter value into a
//! formatted, optionally checksummed document number:
//! 1. Compose the counter name as `{sequence_name}_{tenant_id}`
//! 2. Atomically fetch-and-increment the counter; on the first "sequence
//!    does not exist" failure, create it and retry once
//! 3. Render the number template with `year`, `month`, and `number`
//! 4. If configured, append an HMAC-derived decimal checksum via the
//!    wrapper template
//!
//! Counters are never deleted here; first use creates them. Gaps are
//! tolerated (a rolled-back caller burns a value), duplicates are not.

use crate::crypt;
use crate::template::{NumberTemplate, TemplateValue};
use chrono::{Datelike, Local};
use sequent_core::{
    error::{Result, SequentError},
    traits::SequenceStore,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum checksum digit length; the modular reduction is exact up to here.
const MAX_CHECKSUM_LENGTH: u32 = 18;

/// Hash algorithm used for the checksum HMAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

/// Checksum configuration for allocated numbers
///
/// The checksum is `HMAC(salt, number)` interpreted as a big integer,
/// reduced modulo `10^length`, and zero-padded to `length` digits.
#[derive(Debug, Clone)]
pub struct ChecksumConfig {
    salt: String,
    algorithm: ChecksumAlgorithm,
    length: u32,
    wrapper_format: NumberTemplate,
}

impl ChecksumConfig {
    /// Create a checksum configuration.
    ///
    /// `wrapper_format` may reference the fields `number` and `checksum`,
    /// e.g. `"%(number)s-%(checksum)s"`. A `length` of 0 disables the
    /// checksum; lengths above 18 are rejected.
    pub fn new(
        salt: impl Into<String>,
        algorithm: ChecksumAlgorithm,
        length: u32,
        wrapper_format: &str,
    ) -> Result<Self> {
        if length > MAX_CHECKSUM_LENGTH {
            return Err(SequentError::InvalidArgument(format!(
                "checksum length {length} exceeds maximum {MAX_CHECKSUM_LENGTH}"
            )));
        }

        let wrapper_format = NumberTemplate::parse(wrapper_format)?;
        for field in wrapper_format.fields() {
            if field != "number" && field != "checksum" {
                return Err(SequentError::InvalidArgument(format!(
                    "checksum wrapper format references unknown field '{field}'"
                )));
            }
        }

        Ok(Self {
            salt: salt.into(),
            algorithm,
            length,
            wrapper_format,
        })
    }
}

/// A request for one allocated number
#[derive(Debug, Clone)]
pub struct NumberRequest {
    tenant_id: String,
    sequence_name: String,
    number_format: NumberTemplate,
    checksum: Option<ChecksumConfig>,
}

impl NumberRequest {
    /// Create a request.
    ///
    /// `number_format` may reference the fields `year`, `month`, and
    /// `number`; it is parsed and validated here, not at allocation time.
    pub fn new(
        tenant_id: impl Into<String>,
        sequence_name: impl Into<String>,
        number_format: &str,
    ) -> Result<Self> {
        let number_format = NumberTemplate::parse(number_format)?;
        for field in number_format.fields() {
            if field != "year" && field != "month" && field != "number" {
                return Err(SequentError::InvalidArgument(format!(
                    "number format references unknown field '{field}'"
                )));
            }
        }

        Ok(Self {
            tenant_id: tenant_id.into(),
            sequence_name: sequence_name.into(),
            number_format,
            checksum: None,
        })
    }

    /// Attach a checksum configuration
    pub fn with_checksum(mut self, checksum: ChecksumConfig) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// The composite counter name for this request
    pub fn composite_name(&self) -> String {
        format!("{}_{}", self.sequence_name, self.tenant_id)
    }
}

/// Allocates formatted sequence numbers from a [`SequenceStore`]
pub struct NumberGenerator<S> {
    store: Arc<S>,
}

impl<S: SequenceStore> NumberGenerator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Allocate the next number for the request's tenant and sequence.
    ///
    /// The counter is created lazily on first use. At most two fetch
    /// attempts are made, with one creation attempt between them; any store
    /// failure other than "sequence does not exist" propagates unchanged.
    pub fn allocate(&self, request: &NumberRequest) -> Result<String> {
        if request.tenant_id.is_empty() {
            return Err(SequentError::InvalidArgument("tenant id not given".into()));
        }

        let name = request.composite_name();
        let mut value = None;

        for attempt in 0..2 {
            match self.store.next_value(&name) {
                Ok(v) => {
                    value = Some(v);
                    break;
                }
                Err(err) if err.is_undefined_sequence() && attempt == 0 => {
                    tracing::debug!(sequence = %name, "counter missing, creating");
                    self.store.create_sequence(&name)?;
                }
                Err(err) if err.is_undefined_sequence() => break,
                Err(err) => return Err(err),
            }
        }

        let value = value.ok_or_else(|| {
            tracing::warn!(sequence = %name, "retries exhausted without a counter value");
            SequentError::AllocationFailed(name.clone())
        })?;

        let now = Local::now();
        let mut fields: HashMap<&str, TemplateValue> = HashMap::new();
        fields.insert("year", TemplateValue::Int(i64::from(now.year())));
        fields.insert("month", TemplateValue::Int(i64::from(now.month())));
        fields.insert("number", TemplateValue::Int(value));
        let number = request.number_format.render(&fields)?;

        match &request.checksum {
            Some(cfg) if cfg.length > 0 => {
                let checksum = checksum_digits(cfg, &number);
                let mut wrapper_fields: HashMap<&str, TemplateValue> = HashMap::new();
                wrapper_fields.insert("number", TemplateValue::Str(number));
                wrapper_fields.insert("checksum", TemplateValue::Str(checksum));
                cfg.wrapper_format.render(&wrapper_fields)
            }
            _ => Ok(number),
        }
    }
}

/// Compute the checksum digits for a rendered number.
fn checksum_digits(cfg: &ChecksumConfig, number: &str) -> String {
    let digest = match cfg.algorithm {
        ChecksumAlgorithm::Sha256 => crypt::hmac_sha256_hex(cfg.salt.as_bytes(), number.as_bytes()),
        ChecksumAlgorithm::Sha512 => crypt::hmac_sha512_hex(cfg.salt.as_bytes(), number.as_bytes()),
    };
    let reduced = hex_mod_pow10(&digest, cfg.length);
    format!("{:0width$}", reduced, width = cfg.length as usize)
}

/// Reduce a hex digest, read as one big integer, modulo `10^digits`.
///
/// Streams over the hex characters so no big-integer arithmetic is needed.
/// Exact for `digits <= 18`: the accumulator stays below `16 * 10^18`,
/// within `u128` range.
fn hex_mod_pow10(hex_digest: &str, digits: u32) -> u128 {
    let modulus = 10u128.pow(digits);
    let mut acc: u128 = 0;
    for c in hex_digest.chars() {
        let d = c.to_digit(16).unwrap_or(0);
        acc = (acc * 16 + u128::from(d)) % modulus;
    }
    acc
}
