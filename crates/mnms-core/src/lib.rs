//! mnms Core - RouterOS CLI dump decoding
//!
//! This crate turns the text a RouterOS device reports into typed records:
//! - Value coercion and `key=value;` record tokenizing
//! - Splitting `.id`-delimited listings into per-entity records
//! - Merging the four interface listings into one view per interface
//! - Projecting system listings onto canonical device facts
//! - The eight-section envelope that frames a whole report
//!
//! Everything here is pure and stateless; decoding may run on any number of
//! threads at once.

pub mod device;
pub mod envelope;
pub mod error;
pub mod health;
pub mod interface;
pub mod rate;
pub mod record;
pub mod section;
pub mod value;

pub use device::DeviceFacts;
pub use envelope::{
    decode_envelope, encode_envelope, split_envelope, DecodeWarning, Section, TelemetryEnvelope,
    SECTION_COUNT, SECTION_SEPARATOR,
};
pub use error::DecodeError;
pub use health::reduce_health;
pub use interface::{merge_interfaces, InterfaceMerge, InterfaceRecord, InterfaceSource, LengthMismatch};
pub use rate::parse_rate_mbps;
pub use record::Record;
pub use section::{entity_chunks, split_section, IDENTITY_MARKER};
pub use value::CoercedValue;
