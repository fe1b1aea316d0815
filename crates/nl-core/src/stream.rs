//! Versioned binary stream framing.
//!
//! Every serializable object writes its `(major, minor, patch)` triplet as
//! little-endian 32-bit integers, then its payload, then its parameter list.
//! Readers reject payloads whose triplet is newer than the running version.
//! There are no file-format compatibility guarantees across major versions.

use crate::configurable::Configurable;
use crate::errors::{Error, Result};
use crate::parameter::ParamValue;
use crate::Real;
use std::fmt;
use std::io::{Read, Write};

/// A `(major, minor, patch)` version triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// Major version — breaking stream changes.
    pub major: i32,
    /// Minor version.
    pub minor: i32,
    /// Patch version.
    pub patch: i32,
}

/// The version written by this build of the library.
pub const CURRENT_VERSION: Version = Version { major: 0, minor: 1, patch: 0 };

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Version {
    /// Write the triplet as three little-endian `i32`.
    pub fn write(&self, writer: &mut dyn Write) -> Result<()> {
        writer.write_all(&self.major.to_le_bytes())?;
        writer.write_all(&self.minor.to_le_bytes())?;
        writer.write_all(&self.patch.to_le_bytes())?;
        Ok(())
    }

    /// Read a triplet and reject it if newer than the running version.
    pub fn read(reader: &mut dyn Read) -> Result<Self> {
        let version = Self {
            major: read_i32(reader)?,
            minor: read_i32(reader)?,
            patch: read_i32(reader)?,
        };
        if version > CURRENT_VERSION {
            return Err(Error::VersionMismatch { read: version, current: CURRENT_VERSION });
        }
        Ok(version)
    }
}

fn read_exact<const N: usize>(reader: &mut dyn Read) -> Result<[u8; N]> {
    let mut buffer = [0u8; N];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Read a little-endian `i32`.
pub fn read_i32(reader: &mut dyn Read) -> Result<i32> {
    Ok(i32::from_le_bytes(read_exact(reader)?))
}

/// Write a little-endian `u32`.
pub fn write_u32(writer: &mut dyn Write, value: u32) -> Result<()> {
    Ok(writer.write_all(&value.to_le_bytes())?)
}

/// Read a little-endian `u32`.
pub fn read_u32(reader: &mut dyn Read) -> Result<u32> {
    Ok(u32::from_le_bytes(read_exact(reader)?))
}

/// Write a little-endian `u64`.
pub fn write_u64(writer: &mut dyn Write, value: u64) -> Result<()> {
    Ok(writer.write_all(&value.to_le_bytes())?)
}

/// Read a little-endian `u64`.
pub fn read_u64(reader: &mut dyn Read) -> Result<u64> {
    Ok(u64::from_le_bytes(read_exact(reader)?))
}

/// Write a little-endian `i64`.
pub fn write_i64(writer: &mut dyn Write, value: i64) -> Result<()> {
    Ok(writer.write_all(&value.to_le_bytes())?)
}

/// Read a little-endian `i64`.
pub fn read_i64(reader: &mut dyn Read) -> Result<i64> {
    Ok(i64::from_le_bytes(read_exact(reader)?))
}

/// Write a little-endian `f64`.
pub fn write_f64(writer: &mut dyn Write, value: Real) -> Result<()> {
    Ok(writer.write_all(&value.to_le_bytes())?)
}

/// Read a little-endian `f64`.
pub fn read_f64(reader: &mut dyn Read) -> Result<Real> {
    Ok(Real::from_le_bytes(read_exact(reader)?))
}

/// Write a length-prefixed UTF-8 string.
pub fn write_string(writer: &mut dyn Write, value: &str) -> Result<()> {
    write_u64(writer, value.len() as u64)?;
    Ok(writer.write_all(value.as_bytes())?)
}

/// Read a length-prefixed UTF-8 string.
pub fn read_string(reader: &mut dyn Read) -> Result<String> {
    let length = read_u64(reader)? as usize;
    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer)?;
    String::from_utf8(buffer).map_err(|err| Error::Stream(err.to_string()))
}

fn write_value(writer: &mut dyn Write, value: &ParamValue) -> Result<()> {
    writer.write_all(&[value.kind_tag()])?;
    match value {
        ParamValue::Int(v) => write_i64(writer, *v),
        ParamValue::Float(v) => write_f64(writer, *v),
        ParamValue::Enum(v) => write_string(writer, v),
        ParamValue::IntPair(a, b) => {
            write_i64(writer, *a)?;
            write_i64(writer, *b)
        }
        ParamValue::FloatPair(a, b) => {
            write_f64(writer, *a)?;
            write_f64(writer, *b)
        }
    }
}

fn read_value(reader: &mut dyn Read) -> Result<ParamValue> {
    let tag = read_exact::<1>(reader)?[0];
    match tag {
        0 => Ok(ParamValue::Int(read_i64(reader)?)),
        1 => Ok(ParamValue::Float(read_f64(reader)?)),
        2 => Ok(ParamValue::Enum(read_string(reader)?)),
        3 => Ok(ParamValue::IntPair(read_i64(reader)?, read_i64(reader)?)),
        4 => Ok(ParamValue::FloatPair(read_f64(reader)?, read_f64(reader)?)),
        _ => Err(Error::Stream(format!("unknown parameter kind tag {tag}"))),
    }
}

/// Write the version triplet followed by the parameter list of a component.
pub fn write_configurable(writer: &mut dyn Write, config: &Configurable) -> Result<()> {
    CURRENT_VERSION.write(writer)?;
    write_u64(writer, config.len() as u64)?;
    for param in config.iter() {
        write_string(writer, param.name())?;
        write_value(writer, param.value())?;
    }
    Ok(())
}

/// Read a parameter list back into a component with matching declarations.
///
/// Unknown parameter names and kind mismatches are stream corruption.
pub fn read_configurable(reader: &mut dyn Read, config: &mut Configurable) -> Result<Version> {
    let version = Version::read(reader)?;
    let count = read_u64(reader)? as usize;
    for _ in 0..count {
        let name = read_string(reader)?;
        let value = read_value(reader)?;
        config
            .set(&name, value)
            .map_err(|err| Error::Stream(format!("parameter '{name}': {err}")))?;
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{Bounds, Parameter};

    fn make() -> Configurable {
        let mut config = Configurable::new();
        config
            .register(Parameter::integer("solver::max_evals", 500, Bounds::closed(10, 1_000_000)).unwrap())
            .unwrap();
        config
            .register(Parameter::float("solver::epsilon", 1e-7, Bounds::open(0.0, 1.0)).unwrap())
            .unwrap();
        config
            .register(Parameter::enumeration("lsearchk::interpolation", "cubic", &["bisection", "quadratic", "cubic"]).unwrap())
            .unwrap();
        config
    }

    #[test]
    fn version_round_trip() {
        let mut buffer = Vec::new();
        CURRENT_VERSION.write(&mut buffer).unwrap();
        let read = Version::read(&mut buffer.as_slice()).unwrap();
        assert_eq!(read, CURRENT_VERSION);
    }

    #[test]
    fn newer_version_rejected() {
        let newer = Version { major: CURRENT_VERSION.major + 1, minor: 0, patch: 0 };
        let mut buffer = Vec::new();
        newer.write(&mut buffer).unwrap();
        assert!(matches!(
            Version::read(&mut buffer.as_slice()),
            Err(Error::VersionMismatch { .. })
        ));
    }

    #[test]
    fn configurable_round_trip() {
        let mut original = make();
        original.set_float("solver::epsilon", 1e-9).unwrap();
        original.set_enum("lsearchk::interpolation", "quadratic").unwrap();

        let mut buffer = Vec::new();
        write_configurable(&mut buffer, &original).unwrap();

        let mut restored = make();
        read_configurable(&mut buffer.as_slice(), &mut restored).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let mut buffer = Vec::new();
        write_configurable(&mut buffer, &make()).unwrap();
        buffer.truncate(buffer.len() - 3);

        let mut restored = make();
        assert!(read_configurable(&mut buffer.as_slice(), &mut restored).is_err());
    }
}
