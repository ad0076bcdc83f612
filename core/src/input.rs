//! Input data sources for the command-line tool.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rand::RngCore;

use crate::error::{Result, SynapError};

/// Where the bytes of one network input come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// `zero:<bytes>`: zero-filled input.
    Zero(usize),
    /// `random:<bytes>`: pseudo-random input.
    Random(usize),
    /// `value:<n>`: a single little-endian `i32`, for scalar inputs.
    Value(i32),
    /// Any other string: path of a raw data file.
    File(PathBuf),
}

fn parse_size(kind: &str, s: &str) -> Result<usize> {
    s.parse()
        .map_err(|_| SynapError::config(format!("Invalid {} input size: {}", kind, s)))
}

impl FromStr for InputSource {
    type Err = SynapError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(size) = s.strip_prefix("zero:") {
            Ok(Self::Zero(parse_size("zero", size)?))
        } else if let Some(size) = s.strip_prefix("random:") {
            Ok(Self::Random(parse_size("random", size)?))
        } else if let Some(value) = s.strip_prefix("value:") {
            let value = value
                .trim()
                .parse()
                .map_err(|_| SynapError::config(format!("Invalid input value: {}", value)))?;
            Ok(Self::Value(value))
        } else if s.is_empty() {
            Err(SynapError::config("Empty input specification"))
        } else {
            Ok(Self::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero(size) => write!(f, "zero:{}", size),
            Self::Random(size) => write!(f, "random:{}", size),
            Self::Value(value) => write!(f, "value:{}", value),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl InputSource {
    /// Produce the input bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::FileNotFound`] or [`SynapError::Io`] when a
    /// data file cannot be read, and [`SynapError::Config`] when it is empty.
    pub fn load(&self) -> Result<Vec<u8>> {
        match self {
            Self::Zero(size) => Ok(vec![0; *size]),
            Self::Random(size) => {
                let mut data = vec![0; *size];
                rand::thread_rng().fill_bytes(&mut data);
                Ok(data)
            }
            Self::Value(value) => Ok(value.to_le_bytes().to_vec()),
            Self::File(path) => {
                if !path.exists() {
                    return Err(SynapError::FileNotFound(path.clone()));
                }
                let data = std::fs::read(path)?;
                if data.is_empty() {
                    return Err(SynapError::config(format!(
                        "Unable to read data from file: {}",
                        path.display()
                    )));
                }
                Ok(data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_special_inputs() {
        assert_eq!("zero:16".parse::<InputSource>().unwrap(), InputSource::Zero(16));
        assert_eq!(
            "random:3".parse::<InputSource>().unwrap(),
            InputSource::Random(3)
        );
        assert_eq!(
            "value:-2".parse::<InputSource>().unwrap(),
            InputSource::Value(-2)
        );
        assert_eq!(
            "in.dat".parse::<InputSource>().unwrap(),
            InputSource::File(PathBuf::from("in.dat"))
        );
        assert!("zero:many".parse::<InputSource>().is_err());
        assert!("value:x".parse::<InputSource>().is_err());
        assert!("".parse::<InputSource>().is_err());
    }

    #[test]
    fn test_load_generated_inputs() {
        assert_eq!(InputSource::Zero(3).load().unwrap(), vec![0, 0, 0]);
        assert_eq!(InputSource::Random(7).load().unwrap().len(), 7);
        assert_eq!(
            InputSource::Value(258).load().unwrap(),
            vec![2, 1, 0, 0]
        );
    }

    #[test]
    fn test_load_file_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[9, 8, 7]).unwrap();
        let source = InputSource::File(file.path().to_path_buf());
        assert_eq!(source.load().unwrap(), vec![9, 8, 7]);

        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            InputSource::File(empty.path().to_path_buf()).load(),
            Err(SynapError::Config(_))
        ));
        assert!(matches!(
            InputSource::File(PathBuf::from("/nonexistent/input.dat")).load(),
            Err(SynapError::FileNotFound(_))
        ));
    }
}
